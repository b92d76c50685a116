//! Error types for the acquisition pipeline, with retry classification.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid video id: {0:?}")]
    InvalidVideoId(String),

    #[error("origin not allowed: {host}")]
    OriginRejected { host: String },

    #[error("declared content length {declared} exceeds {cap} byte cap")]
    DeclaredTooLarge { declared: u64, cap: u64 },

    #[error("download exceeded {cap} byte cap")]
    SizeExceeded { cap: u64 },

    #[error("{what} timed out after {budget_ms}ms")]
    Timeout { what: String, budget_ms: u64 },

    #[error("upstream error ({status}): {detail}")]
    Upstream { status: u16, detail: String },

    #[error("malformed caption payload: {0}")]
    Parse(String),

    #[error("transcript was empty")]
    EmptyTranscript,

    #[error("strategy unavailable: {0}")]
    Unavailable(String),

    #[error("command failed: `{command}`: {detail}")]
    Command { command: String, detail: String },

    #[error("no transcript available for video {video_id}: {detail}")]
    Exhausted { video_id: String, detail: String },
}

impl PipelineError {
    /// Whether a strategy attempt that failed with this error is worth
    /// retrying. Validation failures (origin, size caps) are final: the
    /// same input produces the same rejection.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http(_)
                | Self::Timeout { .. }
                | Self::Upstream { .. }
                | Self::Parse(_)
                | Self::Json(_)
                | Self::EmptyTranscript
                | Self::Command { .. }
        )
    }
}
