//! Typed REST client for the activity-tracking server's versioned API.
//!
//! Endpoints live under `/api/0`: bucket CRUD, event insertion/query, and
//! heartbeat submission. Transport failures and non-2xx statuses are
//! normalized into [`ClientError`]; the single idempotency exception is
//! bucket creation, where HTTP 304 means "already exists" and resolves
//! successfully.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use pulsetrack_core::{Bucket, HeartbeatEvent};

use crate::error::ClientError;

/// Fixed request timeout for every call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Production and testing ports of the local server.
const DEFAULT_PORT: u16 = 5600;
const TESTING_PORT: u16 = 5666;

/// Where and as whom to talk to the server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// API root, e.g. `http://localhost:5600/api/0`.
    pub base_url: String,
    /// Client identification, sent as the User-Agent header.
    pub client_name: String,
}

impl ServerConfig {
    /// Local server on the conventional port (5600, or 5666 when testing).
    pub fn local(client_name: impl Into<String>, testing: bool) -> Self {
        let port = if testing { TESTING_PORT } else { DEFAULT_PORT };
        Self {
            base_url: format!("http://localhost:{port}/api/0"),
            client_name: client_name.into(),
        }
    }

    /// Explicit API root (tests, non-default hosts).
    pub fn with_base_url(client_name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            client_name: client_name.into(),
        }
    }
}

/// Successful API result: parsed body plus the HTTP status it came with.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub data: T,
    pub status: u16,
}

/// Result of a bucket-creation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateBucketOutcome {
    Created,
    /// Server answered 304: the bucket existed from an earlier session.
    AlreadyExisted,
}

/// Query parameters for event listing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

/// Map a bucket-creation status to its outcome; `None` means error.
fn classify_create_status(status: u16) -> Option<CreateBucketOutcome> {
    match status {
        200..=299 => Some(CreateBucketOutcome::Created),
        304 => Some(CreateBucketOutcome::AlreadyExisted),
        _ => None,
    }
}

/// Payload for `POST /buckets/{id}`.
#[derive(Debug, Serialize)]
struct CreateBucketBody<'a> {
    client: &'a str,
    hostname: &'a str,
    #[serde(rename = "type")]
    event_type: &'a str,
}

/// HTTP wrapper over the events/heartbeats API. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
}

impl RestClient {
    pub fn new(config: &ServerConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(config.client_name.clone())
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
        })
    }

    fn bucket_url(&self, bucket_id: &str) -> String {
        format!("{}/buckets/{bucket_id}", self.base_url)
    }

    /// `POST /buckets/{id}`. HTTP 304 resolves as
    /// [`CreateBucketOutcome::AlreadyExisted`], never as an error.
    pub async fn create_bucket(&self, bucket: &Bucket) -> Result<CreateBucketOutcome, ClientError> {
        let body = CreateBucketBody {
            client: bucket.client_name(),
            hostname: bucket.host_name(),
            event_type: bucket.event_type(),
        };
        let resp = self
            .http
            .post(self.bucket_url(bucket.id()))
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        match classify_create_status(status) {
            Some(outcome) => Ok(outcome),
            None => Err(ClientError::Api {
                status,
                body: resp.text().await.unwrap_or_default(),
            }),
        }
    }

    /// `GET /buckets/{id}`.
    pub async fn get_bucket(&self, bucket_id: &str) -> Result<ApiResponse<Value>, ClientError> {
        let resp = self.http.get(self.bucket_url(bucket_id)).send().await?;
        read_json(resp).await
    }

    /// `DELETE /buckets/{id}`.
    pub async fn delete_bucket(&self, bucket_id: &str) -> Result<ApiResponse<Value>, ClientError> {
        let resp = self.http.delete(self.bucket_url(bucket_id)).send().await?;
        read_json(resp).await
    }

    /// `GET /buckets/{id}/events`.
    pub async fn get_events(
        &self,
        bucket_id: &str,
        query: &EventQuery,
    ) -> Result<ApiResponse<Vec<HeartbeatEvent>>, ClientError> {
        let url = format!("{}/events", self.bucket_url(bucket_id));
        let resp = self.http.get(url).query(query).send().await?;
        let raw = read_json(resp).await?;
        let data = serde_json::from_value(raw.data.clone()).map_err(|e| ClientError::Api {
            status: raw.status,
            body: format!("unexpected events payload: {e}"),
        })?;
        Ok(ApiResponse {
            data,
            status: raw.status,
        })
    }

    /// `GET /buckets/{id}/events/count`.
    pub async fn get_event_count(
        &self,
        bucket_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<ApiResponse<u64>, ClientError> {
        let url = format!("{}/events/count", self.bucket_url(bucket_id));
        let query = EventQuery {
            limit: None,
            start,
            end,
        };
        let resp = self.http.get(url).query(&query).send().await?;
        let raw = read_json(resp).await?;
        let data = raw.data.as_u64().ok_or_else(|| ClientError::Api {
            status: raw.status,
            body: format!("unexpected count payload: {}", raw.data),
        })?;
        Ok(ApiResponse {
            data,
            status: raw.status,
        })
    }

    /// `POST /buckets/{id}/events` with a single event.
    pub async fn insert_event(
        &self,
        bucket_id: &str,
        event: &HeartbeatEvent,
    ) -> Result<ApiResponse<Value>, ClientError> {
        self.insert_events(bucket_id, std::slice::from_ref(event))
            .await
    }

    /// `POST /buckets/{id}/events` with a JSON array of events.
    pub async fn insert_events(
        &self,
        bucket_id: &str,
        events: &[HeartbeatEvent],
    ) -> Result<ApiResponse<Value>, ClientError> {
        let url = format!("{}/events", self.bucket_url(bucket_id));
        let resp = self.http.post(url).json(events).send().await?;
        read_json(resp).await
    }

    /// `POST /buckets/{id}/heartbeat?pulsetime={n}`.
    ///
    /// The server merges this event with the latest stored one when their
    /// data matches within `pulse_time_secs`; the client only supplies the
    /// window.
    pub async fn heartbeat(
        &self,
        bucket_id: &str,
        pulse_time_secs: f64,
        event: &HeartbeatEvent,
    ) -> Result<ApiResponse<Value>, ClientError> {
        let url = format!("{}/heartbeat", self.bucket_url(bucket_id));
        let resp = self
            .http
            .post(url)
            .query(&[("pulsetime", pulse_time_secs)])
            .json(event)
            .send()
            .await?;
        read_json(resp).await
    }
}

/// Normalize a response: 2xx parses the body (empty bodies become null,
/// non-JSON bodies are kept as strings), anything else is an API error
/// carrying status and body.
async fn read_json(resp: reqwest::Response) -> Result<ApiResponse<Value>, ClientError> {
    let status = resp.status().as_u16();
    let text = resp.text().await?;
    if (200..300).contains(&status) {
        let data = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(ApiResponse { data, status })
    } else {
        Err(ClientError::Api { status, body: text })
    }
}

// ─── Tests ────────────────────────────────────────────────────────
