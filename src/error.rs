use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Index unavailable: every index fetch failed for {days:?}")]
    IndexUnavailable { days: Vec<NaiveDate> },

    #[error("Upstream unavailable after {attempts} attempts: {url}")]
    UpstreamUnavailable { url: String, attempts: u32 },

    #[error("Request rejected with status {status}: {url}")]
    PermanentRequest { url: String, status: u16 },

    #[error("Header parse error: {0}")]
    HeaderParse(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Run exceeded its wall-clock budget of {0:?}")]
    RunBudgetExceeded(std::time::Duration),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScanError {
    /// Whether this error ends the run rather than a single filing.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScanError::Configuration(_)
                | ScanError::IndexUnavailable { .. }
                | ScanError::RunBudgetExceeded(_)
                | ScanError::Io(_)
        )
    }

    /// Short machine-friendly label used in the diagnostics artifact.
    pub fn kind(&self) -> &'static str {
        match self {
            ScanError::Configuration(_) => "configuration_error",
            ScanError::IndexUnavailable { .. } => "index_unavailable",
            ScanError::UpstreamUnavailable { .. } => "upstream_unavailable",
            ScanError::PermanentRequest { .. } => "permanent_request_error",
            ScanError::HeaderParse(_) => "header_parse_error",
            ScanError::InvalidResponse(_) => "invalid_response",
            ScanError::RunBudgetExceeded(_) => "run_budget_exceeded",
            ScanError::Request(_) => "request_error",
            ScanError::Json(_) => "json_error",
            ScanError::Io(_) => "io_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
