//! pulsetrack: editor activity heartbeat tracker binary.
//! Reads activity signals from a host adapter (NDJSON on stdin) and reports
//! coalesced heartbeats to a local activity-tracking server.

use clap::Parser;

use pulsetrack_client::{BucketLifecycle, EventQuery, RestClient, ServerConfig};
use pulsetrack_core::bucket::{Bucket, EDITOR_ACTIVITY};
use pulsetrack_core::coalesce::CoalescerConfig;

mod cli;
mod source;
mod tracker;

use source::SignalSource;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    match args.command {
        cli::Command::Track(ref opts) => {
            let filter = std::env::var("PULSETRACK_LOG")
                .or_else(|_| std::env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string());
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
                .init();

            run_track(&args, opts).await?;
        }
        cli::Command::Events(ref opts) => {
            let client = RestClient::new(&server_config(&args))?;
            let query = EventQuery {
                limit: opts.limit,
                start: opts.start,
                end: opts.end,
            };
            let resp = client.get_events(bucket_of(&args).id(), &query).await?;
            println!("{}", serde_json::to_string_pretty(&resp.data)?);
        }
        cli::Command::Count(ref opts) => {
            let client = RestClient::new(&server_config(&args))?;
            let resp = client
                .get_event_count(bucket_of(&args).id(), opts.start, opts.end)
                .await?;
            println!("{}", resp.data);
        }
        cli::Command::DeleteBucket => {
            let client = RestClient::new(&server_config(&args))?;
            let bucket = bucket_of(&args);
            client.delete_bucket(bucket.id()).await?;
            println!("deleted bucket {}", bucket.id());
        }
    }

    Ok(())
}

async fn run_track(args: &cli::Cli, opts: &cli::TrackOpts) -> anyhow::Result<()> {
    let client = RestClient::new(&server_config(args))?;
    let bucket = bucket_of(args);
    let mut lifecycle = BucketLifecycle::new(client, bucket);

    match lifecycle.ensure().await {
        Ok(outcome) => {
            tracing::info!(
                bucket = lifecycle.bucket().id(),
                already_existed = outcome.already_existed,
                "bucket ready"
            );
        }
        Err(e) => {
            anyhow::bail!(
                "couldn't create bucket ({e}); make sure the server is running properly, then run `pulsetrack track` again"
            );
        }
    }

    let options = tracker::TrackerOptions {
        cfg: CoalescerConfig {
            max_heartbeats_per_sec: opts.max_heartbeats_per_sec,
            pulse_time_secs: opts.pulse_time_secs,
        },
        workspace_folders: opts.workspace_folders.clone(),
        workspace_strategy: opts.workspace_strategy,
    };

    let (tx, rx) = tokio::sync::mpsc::channel(256);
    let source_handle = source::StdinSource.spawn(tx);
    let tracker_handle = tokio::spawn(tracker::run_tracker(lifecycle, options, rx));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
        }
        _ = tracker_handle => {
            tracing::info!("signal source closed, tracker stopped");
        }
    }

    source_handle.dispose();
    Ok(())
}

fn server_config(args: &cli::Cli) -> ServerConfig {
    match &args.server_url {
        Some(url) => ServerConfig::with_base_url(&args.client_name, url),
        None => ServerConfig::local(&args.client_name, args.testing),
    }
}

fn bucket_of(args: &cli::Cli) -> Bucket {
    let hostname = args
        .hostname
        .clone()
        .unwrap_or_else(cli::default_hostname);
    Bucket::new(&args.client_name, hostname, EDITOR_ACTIVITY)
}
