//! Bucket identity: the server-side container for one client's events.

use serde::{Deserialize, Serialize};

/// Default event type for editor activity buckets.
pub const EDITOR_ACTIVITY: &str = "app.editor.activity";

/// A bucket groups events of one type from one client on one host.
///
/// `id` is always derived as `{client_name}_{host_name}` and never mutated
/// independently of the pair it came from. The client creates the bucket once
/// per session; the server owns its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    id: String,
    client_name: String,
    host_name: String,
    event_type: String,
}

impl Bucket {
    pub fn new(
        client_name: impl Into<String>,
        host_name: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Self {
        let client_name = client_name.into();
        let host_name = host_name.into();
        Self {
            id: format!("{client_name}_{host_name}"),
            client_name,
            host_name,
            event_type: event_type.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_client_underscore_host() {
        let bucket = Bucket::new("pulsetrack-editor", "devbox", EDITOR_ACTIVITY);
        assert_eq!(bucket.id(), "pulsetrack-editor_devbox");
    }

    #[test]
    fn id_derivation_holds_for_arbitrary_names() {
        for (client, host) in [("a", "b"), ("aw-watcher", "my-laptop.local"), ("x y", "z")] {
            let bucket = Bucket::new(client, host, "t");
            assert_eq!(bucket.id(), format!("{client}_{host}"));
        }
    }

    #[test]
    fn accessors_return_constructor_inputs() {
        let bucket = Bucket::new("c", "h", "app.editor.activity");
        assert_eq!(bucket.client_name(), "c");
        assert_eq!(bucket.host_name(), "h");
        assert_eq!(bucket.event_type(), "app.editor.activity");
    }
}
