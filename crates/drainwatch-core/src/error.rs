//! Error types surfaced at the library boundary.
//!
//! Per-tick failures never leave the sampler; only request validation and
//! submission outcomes are returned to callers of the lifecycle controller.

use thiserror::Error;

/// A `JobRequest` that cannot be started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("resource id is empty")]
    EmptyResourceId,
    #[error("resource id {0:?} contains characters outside [A-Za-z0-9_.-]")]
    InvalidResourceId(String),
    #[error("target count must be at least 1")]
    ZeroTarget,
    #[error("target count {requested} exceeds the maximum of {max}")]
    TargetTooLarge { requested: u64, max: u64 },
}

/// Failure talking to the campaign API (snapshot fetch or job submission).
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport-level failure (DNS, connect, timeout, ...).
    #[error("transport: {0}")]
    Transport(String),
    /// Server answered with an error status or an envelope with `success: false`.
    #[error("api error (HTTP {status}{}): {message}", code_suffix(.code))]
    Api {
        status: u32,
        code: Option<String>,
        message: String,
    },
    /// Body could not be decoded into the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// The blocking worker running the request panicked or was cancelled.
    #[error("request task failed: {0}")]
    Task(String),
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(", {c}")).unwrap_or_default()
}

impl From<curl::Error> for SourceError {
    fn from(e: curl::Error) -> Self {
        SourceError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        SourceError::Malformed(e.to_string())
    }
}

/// Why `start()` refused to create a job.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("invalid request: {0}")]
    Invalid(#[from] RequestError),
    /// Server answered but did not accept the job.
    #[error("job rejected by server: {message}")]
    Rejected { message: String },
    /// Submission failed before the server could accept or reject it.
    #[error("job submission failed: {0}")]
    SubmitFailed(#[source] SourceError),
}
