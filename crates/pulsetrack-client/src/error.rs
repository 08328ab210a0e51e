//! Error types for the activity-tracking API client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response (connection refused, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-2xx status. Bucket creation remaps
    /// 304 to success before this variant can be produced.
    #[error("api error: status {status}: {body}")]
    Api { status: u16, body: String },

    /// Bucket creation failed; fatal for the session until re-init.
    #[error("failed to create bucket {bucket_id}: {source}")]
    BucketCreation {
        bucket_id: String,
        #[source]
        source: Box<ClientError>,
    },
}

impl ClientError {
    /// Status code for API errors, `None` for transport failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::BucketCreation { source, .. } => source.status(),
            Self::Transport(_) => None,
        }
    }
}
