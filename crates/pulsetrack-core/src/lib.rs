//! pulsetrack-core: pure domain logic for the activity tracker.
//! Event model, bucket identity, signal payloads, and the heartbeat
//! coalescing state machine. No IO — HTTP lives in pulsetrack-client.

pub mod bucket;
pub mod coalesce;
pub mod event;
pub mod signal;

pub use bucket::Bucket;
pub use coalesce::{CoalescerConfig, CoalescerState, FlushDecision};
pub use event::HeartbeatEvent;
pub use signal::{ActivitySignal, WorkspaceStrategy, UNKNOWN_FIELD, resolve_project};
