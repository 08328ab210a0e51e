//! pulsetrack-client: HTTP IO boundary for the activity-tracking server.
//! Typed REST client plus bucket lifecycle. No coalescing logic and no
//! retries — both belong to the caller (pulsetrack-runtime).

pub mod error;
pub mod lifecycle;
pub mod rest;

pub use error::ClientError;
pub use lifecycle::{BucketLifecycle, EnsureOutcome};
pub use rest::{ApiResponse, CreateBucketOutcome, EventQuery, RestClient, ServerConfig};
