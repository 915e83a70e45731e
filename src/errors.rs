use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model provider error: {0}")]
    Provider(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("SSE parsing error: {0}")]
    SseParsing(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Executor error: {0}")]
    Executor(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

impl AgentError {
    /// Transient provider failures that the step loop retries with backoff.
    /// Everything else terminates the run.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AgentError::RateLimited(_))
    }
}

pub type AgentResult<T> = Result<T, AgentError>;
