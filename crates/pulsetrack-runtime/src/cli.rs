//! CLI definition using clap derive.

use clap::{Parser, Subcommand};
use chrono::{DateTime, Utc};

use pulsetrack_core::WorkspaceStrategy;

#[derive(Parser)]
#[command(name = "pulsetrack", about = "editor activity heartbeat tracker")]
pub struct Cli {
    /// API root override (default: http://localhost:5600/api/0)
    #[arg(long, global = true, env = "PULSETRACK_URL")]
    pub server_url: Option<String>,

    /// Talk to the testing server port (5666)
    #[arg(long, global = true)]
    pub testing: bool,

    /// Client name; forms the bucket id together with the hostname
    #[arg(
        long,
        global = true,
        default_value = "pulsetrack-editor",
        env = "PULSETRACK_CLIENT"
    )]
    pub client_name: String,

    /// Host name for the bucket id (default: /etc/hostname)
    #[arg(long, global = true, env = "PULSETRACK_HOSTNAME")]
    pub hostname: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Read activity signals (NDJSON on stdin) and send heartbeats
    Track(TrackOpts),
    /// List stored events from this client's bucket
    Events(EventsOpts),
    /// Count stored events in a time range
    Count(RangeOpts),
    /// Delete this client's bucket on the server
    DeleteBucket,
}

#[derive(clap::Args)]
pub struct TrackOpts {
    /// Server-side merge window in seconds
    #[arg(long, default_value = "20.0", env = "PULSETRACK_PULSE_TIME")]
    pub pulse_time_secs: f64,

    /// Outbound ceiling for unchanged activity data
    #[arg(long, default_value = "1.0", env = "PULSETRACK_MAX_HEARTBEATS_PER_SEC")]
    pub max_heartbeats_per_sec: f64,

    /// Workspace folder name; repeat for multi-root workspaces
    #[arg(long = "workspace-folder")]
    pub workspace_folders: Vec<String>,

    /// Project resolution for multi-root workspaces: first|match
    #[arg(long, default_value = "first")]
    pub workspace_strategy: WorkspaceStrategy,
}

#[derive(clap::Args)]
pub struct EventsOpts {
    /// Maximum number of events to return
    #[arg(long)]
    pub limit: Option<u64>,

    /// Range start (RFC3339)
    #[arg(long)]
    pub start: Option<DateTime<Utc>>,

    /// Range end (RFC3339)
    #[arg(long)]
    pub end: Option<DateTime<Utc>>,
}

#[derive(clap::Args)]
pub struct RangeOpts {
    /// Range start (RFC3339)
    #[arg(long)]
    pub start: Option<DateTime<Utc>>,

    /// Range end (RFC3339)
    #[arg(long)]
    pub end: Option<DateTime<Utc>>,
}

/// Host name for the bucket id: /etc/hostname, then $HOSTNAME, then unknown.
pub fn default_hostname() -> String {
    if let Ok(name) = std::fs::read_to_string("/etc/hostname") {
        let name = name.trim();
        if !name.is_empty() {
            return name.to_owned();
        }
    }
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_owned())
}
