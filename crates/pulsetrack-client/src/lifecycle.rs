//! Bucket lifecycle: ensure-once semantics and bucket-scoped operations.
//!
//! Composition over the REST client — the bucket is a plain value and every
//! call passes its id, rather than a bucket-as-client subclass.

use chrono::{DateTime, Utc};
use serde_json::Value;

use pulsetrack_core::{Bucket, HeartbeatEvent};

use crate::error::ClientError;
use crate::rest::{ApiResponse, CreateBucketOutcome, EventQuery, RestClient};

/// Result of [`BucketLifecycle::ensure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnsureOutcome {
    /// True when the server already had the bucket (HTTP 304).
    pub already_existed: bool,
}

/// One session's bucket: created once, then used for every heartbeat.
///
/// Until [`ensure`](Self::ensure) succeeds, `is_ready` stays false and the
/// tracker drops signals; a creation failure is fatal for the session until
/// the caller re-initializes (e.g. a manual reload).
#[derive(Debug, Clone)]
pub struct BucketLifecycle {
    client: RestClient,
    bucket: Bucket,
    ready: bool,
}

impl BucketLifecycle {
    pub fn new(client: RestClient, bucket: Bucket) -> Self {
        Self {
            client,
            bucket,
            ready: false,
        }
    }

    pub fn bucket(&self) -> &Bucket {
        &self.bucket
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Create the bucket, treating "already exists" as success.
    ///
    /// Idempotent against server state: calling twice with the same bucket
    /// yields `already_existed = true` the second time. Any other failure
    /// leaves the lifecycle not ready and surfaces as
    /// [`ClientError::BucketCreation`]. No automatic retry here.
    pub async fn ensure(&mut self) -> Result<EnsureOutcome, ClientError> {
        match self.client.create_bucket(&self.bucket).await {
            Ok(CreateBucketOutcome::Created) => {
                self.ready = true;
                Ok(EnsureOutcome {
                    already_existed: false,
                })
            }
            Ok(CreateBucketOutcome::AlreadyExisted) => {
                self.ready = true;
                Ok(EnsureOutcome {
                    already_existed: true,
                })
            }
            Err(source) => {
                self.ready = false;
                Err(ClientError::BucketCreation {
                    bucket_id: self.bucket.id().to_owned(),
                    source: Box::new(source),
                })
            }
        }
    }

    /// Submit a heartbeat with the configured pulse-time merge window.
    pub async fn heartbeat(
        &self,
        pulse_time_secs: f64,
        event: &HeartbeatEvent,
    ) -> Result<ApiResponse<Value>, ClientError> {
        self.client
            .heartbeat(self.bucket.id(), pulse_time_secs, event)
            .await
    }

    pub async fn insert_events(
        &self,
        events: &[HeartbeatEvent],
    ) -> Result<ApiResponse<Value>, ClientError> {
        self.client.insert_events(self.bucket.id(), events).await
    }

    pub async fn events(
        &self,
        query: &EventQuery,
    ) -> Result<ApiResponse<Vec<HeartbeatEvent>>, ClientError> {
        self.client.get_events(self.bucket.id(), query).await
    }

    pub async fn event_count(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<ApiResponse<u64>, ClientError> {
        self.client
            .get_event_count(self.bucket.id(), start, end)
            .await
    }

    pub async fn delete(&self) -> Result<ApiResponse<Value>, ClientError> {
        self.client.delete_bucket(self.bucket.id()).await
    }
}
