use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("classification backend is disabled (no API key configured)")]
    Disabled,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request timeout after {0} seconds")]
    Timeout(u64),

    #[error("backend returned empty response")]
    EmptyResponse,
}

/// Failures that make a batch fall back to the canonical error result.
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    #[error("LLM analysis failed: {0}")]
    Backend(#[from] BackendError),

    #[error("invalid JSON response from LLM: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("I/O error on watched source: {0}")]
    Io(#[from] std::io::Error),

    #[error("file watch error: {0}")]
    Watch(#[from] notify::Error),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}
