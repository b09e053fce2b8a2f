//! Error types for carousel-dl
//!
//! Two layers of errors exist:
//! - [`Error`] covers everything that can abort a run (bad configuration, an
//!   unusable post address, browser failures, count discovery).
//! - [`FetchError`] covers a single image download. It never aborts a run; the
//!   walker records it against the image index and moves on.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for carousel-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for carousel-dl
///
/// Every variant that reaches [`crate::driver::run`] is fatal for the run. Per-image
/// problems are reported through [`crate::types::DownloadOutcome`] instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "browser.navigation_timeout")
        key: Option<String>,
    },

    /// The input address does not identify a post
    #[error("invalid post URL '{url}': {reason}")]
    InvalidPostUrl {
        /// The address as given by the caller
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// Browser launch or DevTools protocol failure
    #[error("browser error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),

    /// Browser session could not be set up (bad launch options, missing executable)
    #[error("browser session error: {0}")]
    Session(String),

    /// Navigation to a page failed
    #[error("navigation to {url} failed: {reason}")]
    Navigation {
        /// Target address
        url: String,
        /// Underlying cause
        reason: String,
    },

    /// Navigation did not reach a stable rendered state in time
    #[error("navigation to {url} did not settle within {}s", timeout.as_secs())]
    NavigationTimeout {
        /// Target address
        url: String,
        /// The configured bound
        timeout: Duration,
    },

    /// A DOM query script failed or returned something unexpected
    #[error("DOM query '{selector}' failed: {reason}")]
    DomQuery {
        /// Selector (or script name) being evaluated
        selector: String,
        /// Underlying cause
        reason: String,
    },

    /// Output directory could not be prepared
    #[error("cannot prepare output directory {path}: {source}")]
    OutputDir {
        /// Directory that was being created
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// HTTP client construction or request error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a [`Error::Config`] tied to a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Machine-readable code for this error, stable across releases
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::InvalidPostUrl { .. } => "invalid_post_url",
            Error::Browser(_) => "browser_error",
            Error::Session(_) => "session_error",
            Error::Navigation { .. } => "navigation_failed",
            Error::NavigationTimeout { .. } => "navigation_timeout",
            Error::DomQuery { .. } => "dom_query_failed",
            Error::OutputDir { .. } => "output_dir_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
        }
    }
}

/// Failure to download a single resolved image
#[derive(Debug, Error)]
pub enum FetchError {
    /// Request could not be sent or the body stream broke off
    #[error("request to {url} failed: {source}")]
    Request {
        /// Image address
        url: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("HTTP {status} fetching {url}")]
    Status {
        /// Image address
        url: String,
        /// Status code returned
        status: u16,
        /// Wait requested by the server through `Retry-After`
        retry_after: Option<Duration>,
    },

    /// Body ended before the advertised length was received
    #[error("truncated body from {url}: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Image address
        url: String,
        /// Content-Length advertised by the server
        expected: u64,
        /// Bytes actually written
        actual: u64,
    },

    /// Writing the destination file failed
    #[error("cannot write {path}: {source}")]
    Io {
        /// File being written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
