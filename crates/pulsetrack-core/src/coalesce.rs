//! Heartbeat coalescing state machine.
//!
//! Editors fire selection-change events many times per second; sending one
//! heartbeat per event would flood the server. Every raw signal becomes a
//! candidate event here, and the machine decides per observation:
//!
//! - **Send now** when the candidate's `data` differs from the reference
//!   (pending event if one is buffered, else the last sent event), or when
//!   the rate-limit window (`1000 / max_heartbeats_per_sec` ms since the last
//!   send) has elapsed.
//! - **Hold** otherwise: the candidate replaces the pending slot
//!   (last-writer-wins) and no network call happens. A held event is flushed
//!   later by the driver's periodic tick.
//!
//! A send failure leaves the event pending, so it is merged with or resent on
//! the next opportunity — a heartbeat is never silently dropped. Completion
//! of an in-flight send clears the pending slot only when the slot still
//! holds the same `data`; a newer pending from a fresher signal survives.

use chrono::{DateTime, TimeDelta, Utc};

use crate::event::HeartbeatEvent;
use crate::signal::UNKNOWN_FIELD;

/// Session-immutable coalescing parameters, supplied by host configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoalescerConfig {
    /// Outbound ceiling for unchanged data (default 1/s).
    pub max_heartbeats_per_sec: f64,
    /// Server-side merge window passed on every heartbeat call.
    pub pulse_time_secs: f64,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            max_heartbeats_per_sec: 1.0,
            pulse_time_secs: 20.0,
        }
    }
}

impl CoalescerConfig {
    /// Minimum interval between sends of unchanged data.
    pub fn min_send_interval(&self) -> TimeDelta {
        // Guard against non-positive config; fall back to the 1/s default.
        let per_sec = if self.max_heartbeats_per_sec > 0.0 {
            self.max_heartbeats_per_sec
        } else {
            1.0
        };
        TimeDelta::milliseconds((1000.0 / per_sec) as i64)
    }

    /// Interval at which the driver re-flushes a held pending event.
    /// Scaled below pulse time so a merge window is never missed.
    pub fn retry_interval(&self) -> TimeDelta {
        TimeDelta::milliseconds(((self.pulse_time_secs * 0.8 * 1000.0) as i64).max(1))
    }
}

/// Mutable per-session coalescing state, owned by one tracker loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoalescerState {
    /// Buffered event awaiting flush or replacement. Also holds the event
    /// currently in flight, until `flush_succeeded` clears it.
    pending: Option<HeartbeatEvent>,
    /// The last event acknowledged by the server.
    last_sent: Option<HeartbeatEvent>,
}

impl CoalescerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<&HeartbeatEvent> {
        self.pending.as_ref()
    }

    /// File path of the last acknowledged heartbeat.
    pub fn last_sent_file(&self) -> &str {
        self.last_sent
            .as_ref()
            .and_then(|e| e.data_str("file"))
            .unwrap_or(UNKNOWN_FIELD)
    }

    /// Branch of the last acknowledged heartbeat.
    pub fn last_sent_branch(&self) -> &str {
        self.last_sent
            .as_ref()
            .and_then(|e| e.data_str("branch"))
            .unwrap_or(UNKNOWN_FIELD)
    }

    pub fn last_sent_at(&self) -> Option<DateTime<Utc>> {
        self.last_sent.as_ref().map(HeartbeatEvent::timestamp)
    }
}

/// Outcome of one coalescing step.
#[derive(Debug, Clone, PartialEq)]
pub enum FlushDecision {
    /// Send this event now. It stays in the pending slot until
    /// [`flush_succeeded`] confirms delivery.
    Send(HeartbeatEvent),
    /// Nothing to send this step.
    Hold,
}

/// Process one candidate event built from a raw signal.
///
/// Returns the next state and the flush decision. The candidate always lands
/// in the pending slot, replacing whatever was there (last-writer-wins);
/// the decision only controls whether the driver sends it now.
pub fn observe(
    state: &CoalescerState,
    cfg: &CoalescerConfig,
    candidate: HeartbeatEvent,
    now: DateTime<Utc>,
) -> (CoalescerState, FlushDecision) {
    let reference = state.pending.as_ref().or(state.last_sent.as_ref());
    let changed = reference.is_none_or(|r| !r.same_data(&candidate));
    let window_elapsed = is_window_elapsed(state, cfg, now);

    let next = CoalescerState {
        pending: Some(candidate.clone()),
        last_sent: state.last_sent.clone(),
    };

    if changed || window_elapsed {
        (next, FlushDecision::Send(candidate))
    } else {
        (next, FlushDecision::Hold)
    }
}

/// Periodic re-flush check, driven by the tracker's ticker.
///
/// A pending event becomes due once the rate-limit window has elapsed;
/// before that it is still covered by the server's merge window for the
/// last sent event.
pub fn tick(state: &CoalescerState, cfg: &CoalescerConfig, now: DateTime<Utc>) -> FlushDecision {
    match &state.pending {
        Some(pending) if is_window_elapsed(state, cfg, now) => {
            FlushDecision::Send(pending.clone())
        }
        _ => FlushDecision::Hold,
    }
}

/// Record a successful flush of `sent`.
///
/// Updates the last-sent slot and clears pending only when the slot still
/// holds the same data; a pending event replaced by a newer signal while the
/// send was in flight is kept.
pub fn flush_succeeded(state: &CoalescerState, sent: &HeartbeatEvent) -> CoalescerState {
    let pending = match &state.pending {
        Some(p) if p.same_data(sent) => None,
        other => other.clone(),
    };
    CoalescerState {
        pending,
        last_sent: Some(sent.clone()),
    }
}

/// Record a failed flush of `attempted`.
///
/// The event stays pending for the next eligible signal or tick. If a newer
/// signal already replaced the slot, the newer event wins.
pub fn flush_failed(state: &CoalescerState, attempted: HeartbeatEvent) -> CoalescerState {
    CoalescerState {
        pending: state.pending.clone().or(Some(attempted)),
        last_sent: state.last_sent.clone(),
    }
}

fn is_window_elapsed(state: &CoalescerState, cfg: &CoalescerConfig, now: DateTime<Utc>) -> bool {
    match state.last_sent_at() {
        Some(at) => now.signed_duration_since(at) >= cfg.min_send_interval(),
        None => true,
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use serde_json::{Map, Value, json};

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .expect("valid RFC3339")
            .with_timezone(&Utc)
    }

    fn t0() -> DateTime<Utc> {
        ts("2026-03-01T09:00:00Z")
    }

    fn data(file: &str) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("file".to_owned(), json!(file));
        m.insert("language".to_owned(), json!("typescript"));
        m.insert("branch".to_owned(), json!("main"));
        m
    }

    fn event(file: &str, at: DateTime<Utc>) -> HeartbeatEvent {
        HeartbeatEvent::with_timestamp(at, 0.0, data(file))
    }

    fn cfg() -> CoalescerConfig {
        CoalescerConfig::default()
    }

    // ── 1. First signal always sends ────────────────────────────────

    #[test]
    fn first_signal_sends_immediately() {
        let state = CoalescerState::new();
        let candidate = event("a.ts", t0());

        let (next, decision) = observe(&state, &cfg(), candidate.clone(), t0());

        assert_eq!(decision, FlushDecision::Send(candidate.clone()));
        assert_eq!(next.pending(), Some(&candidate));
    }

    // ── 2. Unchanged data within window is held ─────────────────────

    #[test]
    fn unchanged_data_within_window_is_held() {
        let sent = event("a.ts", t0());
        let state = flush_succeeded(&CoalescerState::new(), &sent);

        let now = t0() + TimeDelta::milliseconds(300);
        let (next, decision) = observe(&state, &cfg(), event("a.ts", now), now);

        assert_eq!(decision, FlushDecision::Hold);
        assert!(next.pending().is_some(), "candidate buffered as pending");
    }

    // ── 3. Changed data flushes regardless of window ────────────────

    #[test]
    fn changed_data_flushes_inside_window() {
        let sent = event("a.ts", t0());
        let state = flush_succeeded(&CoalescerState::new(), &sent);

        let now = t0() + TimeDelta::milliseconds(100);
        let candidate = event("b.ts", now);
        let (_, decision) = observe(&state, &cfg(), candidate.clone(), now);

        assert_eq!(decision, FlushDecision::Send(candidate));
    }

    // ── 4. Unchanged data sends again after window ──────────────────

    #[test]
    fn unchanged_data_sends_after_window() {
        let sent = event("a.ts", t0());
        let state = flush_succeeded(&CoalescerState::new(), &sent);

        let now = t0() + TimeDelta::milliseconds(1000);
        let candidate = event("a.ts", now);
        let (_, decision) = observe(&state, &cfg(), candidate.clone(), now);

        assert_eq!(decision, FlushDecision::Send(candidate));
    }

    // ── 5. Spec scenario: a.ts, a.ts, b.ts in one window → 2 sends ──

    #[test]
    fn identical_then_changed_sends_exactly_twice() {
        let c = cfg(); // 1 heartbeat/sec
        let mut state = CoalescerState::new();
        let mut sends = 0;

        let steps = [("a.ts", 0), ("a.ts", 200), ("b.ts", 400)];
        for (file, offset_ms) in steps {
            let now = t0() + TimeDelta::milliseconds(offset_ms);
            let (next, decision) = observe(&state, &c, event(file, now), now);
            state = next;
            if let FlushDecision::Send(sent) = decision {
                sends += 1;
                state = flush_succeeded(&state, &sent);
            }
        }

        assert_eq!(sends, 2, "initial + file change, middle duplicate held");
    }

    // ── 6. Rate cap: identical signals bounded by elapsed × max ─────

    #[test]
    fn identical_signal_burst_respects_rate_cap() {
        let c = cfg();
        let mut state = CoalescerState::new();
        let mut sends = 0;

        // 50 identical signals over 2.45s at 1 hb/s → at most ceil(2.45) + initial.
        for i in 0..50 {
            let now = t0() + TimeDelta::milliseconds(i * 50);
            let (next, decision) = observe(&state, &c, event("a.ts", now), now);
            state = next;
            if let FlushDecision::Send(sent) = decision {
                sends += 1;
                state = flush_succeeded(&state, &sent);
            }
        }

        assert!(sends <= 3, "expected at most 3 sends in 2.45s, got {sends}");
        assert!(sends >= 2, "rate limit must still let periodic sends out");
    }

    // ── 7. Failed flush stays pending and is retried ────────────────

    #[test]
    fn failed_flush_keeps_event_pending() {
        let state = CoalescerState::new();
        let candidate = event("a.ts", t0());
        let (state, decision) = observe(&state, &cfg(), candidate.clone(), t0());
        assert!(matches!(decision, FlushDecision::Send(_)));

        let state = flush_failed(&state, candidate.clone());
        assert_eq!(state.pending(), Some(&candidate));

        // Next tick after the window retries the same event.
        let later = t0() + TimeDelta::seconds(2);
        assert_eq!(tick(&state, &cfg(), later), FlushDecision::Send(candidate));
    }

    // ── 8. Failed flush never overwrites a newer pending ────────────

    #[test]
    fn failed_flush_keeps_newer_pending() {
        let old = event("a.ts", t0());
        let newer = event("b.ts", t0() + TimeDelta::milliseconds(100));
        let state = CoalescerState {
            pending: Some(newer.clone()),
            last_sent: None,
        };

        let state = flush_failed(&state, old);
        assert_eq!(state.pending(), Some(&newer), "newer signal wins the slot");
    }

    // ── 9. Success clears pending only for matching data ────────────

    #[test]
    fn success_clears_matching_pending() {
        let sent = event("a.ts", t0());
        let state = CoalescerState {
            pending: Some(sent.clone()),
            last_sent: None,
        };

        let state = flush_succeeded(&state, &sent);
        assert!(state.pending().is_none());
        assert_eq!(state.last_sent_at(), Some(sent.timestamp()));
    }

    #[test]
    fn success_keeps_pending_updated_by_newer_signal() {
        let sent = event("a.ts", t0());
        let newer = event("b.ts", t0() + TimeDelta::milliseconds(50));
        let state = CoalescerState {
            pending: Some(newer.clone()),
            last_sent: None,
        };

        let state = flush_succeeded(&state, &sent);
        assert_eq!(state.pending(), Some(&newer), "in-flight completion must not clobber");
    }

    // ── 10. Tick holds while window is open, sends when due ─────────

    #[test]
    fn tick_respects_rate_window() {
        let sent = event("a.ts", t0());
        let pending = event("a.ts", t0() + TimeDelta::milliseconds(200));
        let state = CoalescerState {
            pending: Some(pending.clone()),
            last_sent: Some(sent),
        };

        let early = t0() + TimeDelta::milliseconds(500);
        assert_eq!(tick(&state, &cfg(), early), FlushDecision::Hold);

        let due = t0() + TimeDelta::milliseconds(1100);
        assert_eq!(tick(&state, &cfg(), due), FlushDecision::Send(pending));
    }

    #[test]
    fn tick_with_no_pending_holds() {
        let state = CoalescerState::new();
        assert_eq!(
            tick(&state, &cfg(), t0() + TimeDelta::seconds(60)),
            FlushDecision::Hold
        );
    }

    // ── 11. Last-sent accessors track the flushed event ─────────────

    #[test]
    fn last_sent_file_and_branch_updated_on_success() {
        let state = CoalescerState::new();
        assert_eq!(state.last_sent_file(), "unknown");
        assert_eq!(state.last_sent_branch(), "unknown");

        let state = flush_succeeded(&state, &event("src/a.ts", t0()));
        assert_eq!(state.last_sent_file(), "src/a.ts");
        assert_eq!(state.last_sent_branch(), "main");
    }

    // ── 12. Pending acts as the comparison reference ────────────────

    #[test]
    fn candidate_matching_pending_is_held() {
        let sent = event("a.ts", t0());
        let state = flush_succeeded(&CoalescerState::new(), &sent);

        // Duplicate of last-sent inside the window: buffered.
        let now1 = t0() + TimeDelta::milliseconds(100);
        let (state, d1) = observe(&state, &cfg(), event("a.ts", now1), now1);
        assert_eq!(d1, FlushDecision::Hold);

        // Identical to pending, still inside the window: held again.
        let now2 = t0() + TimeDelta::milliseconds(200);
        let (_, d2) = observe(&state, &cfg(), event("a.ts", now2), now2);
        assert_eq!(d2, FlushDecision::Hold);
    }

    // ── 13. Config intervals ────────────────────────────────────────

    #[test]
    fn min_send_interval_follows_rate() {
        let c = CoalescerConfig {
            max_heartbeats_per_sec: 4.0,
            pulse_time_secs: 20.0,
        };
        assert_eq!(c.min_send_interval(), TimeDelta::milliseconds(250));
    }

    #[test]
    fn non_positive_rate_falls_back_to_default() {
        let c = CoalescerConfig {
            max_heartbeats_per_sec: 0.0,
            pulse_time_secs: 20.0,
        };
        assert_eq!(c.min_send_interval(), TimeDelta::milliseconds(1000));
    }

    #[test]
    fn retry_interval_is_fraction_of_pulse() {
        let c = cfg();
        assert_eq!(c.retry_interval(), TimeDelta::milliseconds(16_000));
    }
}
