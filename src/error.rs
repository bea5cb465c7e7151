//! Error types for nzb-monkey
//!
//! Only failures that a caller can act on are errors. A payload that is not an
//! NZB is reported through [`Nzb::malformed`](crate::nzb::Nzb::malformed) and an
//! incomplete NZB through a failed [`CheckResult`](crate::nzb::check::CheckResult);
//! neither ever surfaces here.

use thiserror::Error;

/// Result type alias for nzb-monkey operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for nzb-monkey
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "sources.nzbking.priority")
        key: Option<String>,
    },

    /// Network error while talking to a search engine
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The search engine had no NZB for the query, or refused the download
    #[error("not found: {0}")]
    NotFound(String),

    /// No search engine delivered an NZB at all
    #[error("no NZB downloaded after querying {sources_queried} search engine(s)")]
    NoNzbFound {
        /// Number of search engines that were asked
        sources_queried: usize,
    },

    /// Password cannot be placed into the NZB header
    #[error("cannot inject password: {0}")]
    InvalidPassword(String),

    /// NZBLNK URI could not be decoded
    #[error("invalid NZBLNK: {0}")]
    InvalidLink(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether this error only concerns a single search engine
    ///
    /// These are skipped by the search: the engine is logged as unavailable and
    /// the next one is asked. Everything else aborts the search.
    pub fn is_source_failure(&self) -> bool {
        match self {
            Error::Network(_) | Error::NotFound(_) => true,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            ),
            Error::Config { .. }
            | Error::NoNzbFound { .. }
            | Error::InvalidPassword(_)
            | Error::InvalidLink(_)
            | Error::Serialization(_)
            | Error::Other(_) => false,
        }
    }

    /// Short label for log lines and events ("timeout", "connection error", ...)
    pub fn kind_label(&self) -> &'static str {
        match self {
            Error::Network(e) if e.is_timeout() => "timeout",
            Error::Network(e) if e.is_connect() => "connection error",
            Error::Network(_) => "network error",
            Error::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => "timeout",
            Error::NotFound(_) => "not found",
            _ => "error",
        }
    }
}
