//! Tracker loop: wires signal sources → coalescer → bucket heartbeats.
//!
//! Single-task, event-driven: one `select!` over the signal channel and a
//! retry ticker. Heartbeat sends are awaited inline, so no two sends for the
//! bucket ever run concurrently; signals arriving during a send queue in the
//! channel and update the pending slot right after it completes. A failed
//! send only logs a warning — tracking always continues.

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use pulsetrack_client::BucketLifecycle;
use pulsetrack_core::coalesce::{self, CoalescerConfig, CoalescerState, FlushDecision};
use pulsetrack_core::{ActivitySignal, HeartbeatEvent, WorkspaceStrategy, resolve_project};

/// Session-fixed tracking parameters.
pub struct TrackerOptions {
    pub cfg: CoalescerConfig,
    /// Open workspace folder names, for project resolution when a signal
    /// carries no project of its own.
    pub workspace_folders: Vec<String>,
    pub workspace_strategy: WorkspaceStrategy,
}

/// Build a candidate heartbeat from a raw signal.
///
/// Missing fields become `"unknown"`; a missing project is resolved from the
/// configured workspace folders first.
fn build_candidate(signal: &ActivitySignal, opts: &TrackerOptions) -> HeartbeatEvent {
    let mut signal = signal.clone();
    if signal.project.is_none() {
        signal.project = resolve_project(
            opts.workspace_strategy,
            &opts.workspace_folders,
            signal.file.as_deref(),
        );
    }
    let timestamp = signal.timestamp.unwrap_or_else(Utc::now);
    HeartbeatEvent::with_timestamp(timestamp, 0.0, signal.data())
}

/// Run the tracker until the signal channel closes.
///
/// Signals arriving before the bucket is ready are dropped silently; the
/// caller decides when (or whether) to re-run `ensure`.
pub async fn run_tracker(
    lifecycle: BucketLifecycle,
    opts: TrackerOptions,
    mut rx: mpsc::Receiver<ActivitySignal>,
) {
    let mut state = CoalescerState::new();
    let retry = opts
        .cfg
        .retry_interval()
        .to_std()
        .unwrap_or(std::time::Duration::from_secs(16));
    let mut ticker = tokio::time::interval(retry);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            maybe_signal = rx.recv() => {
                let Some(signal) = maybe_signal else {
                    break; // source disposed
                };
                if !lifecycle.is_ready() {
                    tracing::debug!("bucket not ready, dropping signal");
                    continue;
                }
                let candidate = build_candidate(&signal, &opts);
                let (next, decision) = coalesce::observe(&state, &opts.cfg, candidate, Utc::now());
                state = next;
                if let FlushDecision::Send(event) = decision {
                    state = send_heartbeat(&lifecycle, &opts.cfg, state, event).await;
                }
            }
            _ = ticker.tick() => {
                if let FlushDecision::Send(event) = coalesce::tick(&state, &opts.cfg, Utc::now()) {
                    state = send_heartbeat(&lifecycle, &opts.cfg, state, event).await;
                }
            }
        }
    }
}

async fn send_heartbeat(
    lifecycle: &BucketLifecycle,
    cfg: &CoalescerConfig,
    state: CoalescerState,
    event: HeartbeatEvent,
) -> CoalescerState {
    match lifecycle.heartbeat(cfg.pulse_time_secs, &event).await {
        Ok(_) => {
            let next = coalesce::flush_succeeded(&state, &event);
            tracing::debug!(
                file = next.last_sent_file(),
                branch = next.last_sent_branch(),
                "heartbeat sent"
            );
            next
        }
        Err(e) => {
            tracing::warn!("heartbeat send failed, keeping event pending: {e}");
            coalesce::flush_failed(&state, event)
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────
