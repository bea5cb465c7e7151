//! Core types and events

use crate::nzb::{CheckResult, Nzb};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What to search for
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Release name, used for file names
    pub tag: String,

    /// Subject line (header) to search the engines for
    pub header: String,

    /// Archive password to place into the NZB
    #[serde(default)]
    pub password: Option<String>,
}

impl SearchQuery {
    /// Create a query without password
    pub fn new(tag: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            header: header.into(),
            password: None,
        }
    }

    /// Attach a password; an empty one counts as none
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        let password = password.into();
        self.password = (!password.is_empty()).then_some(password);
        self
    }

    /// Header as sent to the search engines: trimmed, underscores as spaces
    pub fn normalized_header(&self) -> String {
        self.header.trim().replace('_', " ")
    }
}

/// One engine's NZB after the completeness check
#[derive(Clone, Debug)]
pub struct Candidate {
    /// Engine that delivered the NZB
    pub source: String,
    /// Position in discovery order, starting at 0
    pub order: usize,
    /// Downloaded document as UTF-8, with its declaration adjusted if it was transcoded
    pub raw: String,
    /// Parsed and checked NZB
    pub nzb: Nzb,
    /// Check verdict
    pub result: CheckResult,
    /// Time spent locating and downloading
    pub fetch_time: Duration,
}

impl Candidate {
    /// Whether the NZB passed the check
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }

    /// Whether the NZB passed without any missing file or segment
    pub fn is_complete(&self) -> bool {
        self.result == CheckResult::Complete && self.nzb.stats.files_missing == Some(0)
    }

    /// Announced minus present files, if known
    pub fn files_missing(&self) -> Option<i64> {
        self.nzb.stats.files_missing
    }

    /// Missing segments in percent, if computed
    pub fn missing_percent(&self) -> Option<f64> {
        self.nzb.stats.segments_missing_percent
    }

    /// Seconds between the first and the last post
    pub fn upload_duration(&self) -> Option<i64> {
        self.nzb.stats.upload.map(|span| span.duration())
    }
}

/// Result of a successful search
#[derive(Clone, Debug)]
pub struct SearchOutcome {
    /// The selected NZB
    pub selected: Candidate,
    /// Document to hand on, with the password injected when requested
    pub text: String,
    /// Whether `text` carries the query password
    pub password_injected: bool,
    /// Number of candidates the selection chose from
    pub candidates: usize,
    /// Number of engines that were asked
    pub sources_queried: usize,
}

impl SearchOutcome {
    /// Whether the selected NZB passed the check
    ///
    /// False when the selected NZB failed the completeness check.
    pub fn is_success(&self) -> bool {
        self.selected.is_success()
    }
}

/// Event emitted while searching
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Search started
    SearchStarted {
        /// Normalized header
        header: String,
        /// Number of enabled engines
        sources: usize,
    },

    /// An engine is being asked
    SourceQueried {
        /// Engine name
        source: String,
        /// Priority group
        priority: u8,
    },

    /// The engine had no NZB
    SourceNotFound {
        /// Engine name
        source: String,
    },

    /// The engine could not be reached
    SourceFailed {
        /// Engine name
        source: String,
        /// Error message
        error: String,
    },

    /// The engine was skipped because a complete NZB was found already
    SourceSkipped {
        /// Engine name
        source: String,
    },

    /// An NZB was checked
    Checked {
        /// Engine name
        source: String,
        /// Check verdict
        result: CheckResult,
        /// Announced minus present files
        #[serde(skip_serializing_if = "Option::is_none")]
        files_missing: Option<i64>,
        /// Missing segments in percent
        #[serde(skip_serializing_if = "Option::is_none")]
        missing_percent: Option<f64>,
    },

    /// An NZB was selected
    Selected {
        /// Engine name
        source: String,
        /// Check verdict
        result: CheckResult,
        /// Number of candidates
        candidates: usize,
    },

    /// No engine delivered an NZB
    NothingFound {
        /// Number of engines asked
        sources_queried: usize,
    },
}
