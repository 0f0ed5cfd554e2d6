//! Error types for confluence-offline-copy
//!
//! The error taxonomy follows the failure classes of a snapshot run:
//! - Transport failures while talking to the search/content API
//! - Render failures inside a headless browser session
//! - Local filesystem failures
//! - Configuration errors, the only class allowed to abort a run

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for confluence-offline-copy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for confluence-offline-copy
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "BASE_URL")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error (connection refused, timeout, body read failure)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The API answered with a non-success status code
    #[error("HTTP {status} from {url}: {body}")]
    HttpStatus {
        /// Response status code
        status: u16,
        /// Requested URL
        url: String,
        /// Response body, truncated
        body: String,
    },

    /// A URL could not be built from the configured base
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A record returned by the API lacks a field the exporter depends on
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Rendering a page to a document failed
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// The headless browser could not be started or controlled
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// A task exceeded its wall-clock ceiling
    #[error("timed out after {}s", after.as_secs())]
    Timeout {
        /// The ceiling that was exceeded
        after: Duration,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors raised by a renderer session
#[derive(Debug, Error)]
pub enum RenderError {
    /// No usable browser binary was found
    #[error("no headless browser found (searched: {searched})")]
    BrowserNotFound {
        /// Binary names that were looked up
        searched: String,
    },

    /// Navigating to the page failed
    #[error("failed to load {url}: {reason}")]
    Navigation {
        /// Page URL
        url: String,
        /// Why the page could not be loaded
        reason: String,
    },

    /// A script run against the loaded page failed
    #[error("script failed: {reason}")]
    Script {
        /// Error reported by the page
        reason: String,
    },

    /// A session was used before any page was loaded
    #[error("no page loaded in session")]
    NoPageLoaded,

    /// Printing to a document failed
    #[error("failed to print {path}: {reason}")]
    Print {
        /// Target document path
        path: PathBuf,
        /// Why printing failed
        reason: String,
    },
}

impl Error {
    /// Shorthand for a configuration error tied to a config key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}
