use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while harvesting records.
#[derive(Debug, Error)]
pub enum ScraperError {
    /// The run cannot start: output store missing or malformed, bad config file.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("input error: {0}")]
    Input(String),

    /// The browser driver failed to navigate, evaluate or read the page.
    #[error("browser error: {0}")]
    Browser(String),

    #[error("timed out after {timeout:?} waiting for '{selector}'")]
    MarkerTimeout { selector: String, timeout: Duration },

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("session error: {0}")]
    Session(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Xlsx(#[from] calamine::XlsxError),
}
