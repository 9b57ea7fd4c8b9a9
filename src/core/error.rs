use thiserror::Error;

/// Error taxonomy for the pipeline. Each variant maps to one policy in the
/// error-handling design: transient errors retry, permanent ones are
/// recorded and skipped, auth/concurrency errors abort the process.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("transient remote error: {0}")]
    Transient(String),

    #[error("auth/configuration error: {0}")]
    AuthConfig(String),

    #[error("permanent remote error: {0}")]
    PermanentRemote(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("data validation error: {0}")]
    DataValidation(String),

    #[error("concurrency error: {0}")]
    Concurrency(String),

    #[error("disk error: {0}")]
    Disk(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// True for errors that should be retried with backoff rather than
    /// recorded as a permanent failure of the unit of work.
    pub fn is_transient(&self) -> bool {
        matches!(self, PipelineError::Transient(_))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Classifies an HTTP status code per the retry policy shared by the
/// scraper fetcher, the LLM client, and the geocoder client: 429 and 5xx
/// are transient, other 4xx are permanent.
pub fn classify_http_status(status: reqwest::StatusCode) -> PipelineError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        PipelineError::Transient(format!("http {status}"))
    } else {
        PipelineError::PermanentRemote(format!("http {status}"))
    }
}
