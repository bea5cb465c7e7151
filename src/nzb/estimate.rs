//! Expected file and segment counts.
//!
//! Posters announce counts in the subject line, but with no common convention.
//! Each count therefore has an ordered list of independent patterns; the first
//! one that matches wins:
//!
//! | count    | tried in order                                                         |
//! |----------|------------------------------------------------------------------------|
//! | segments | `(x/y)` at the end of the subject, jBinDown `.x-y@` or PowerPost `partXofY` in the message-ID, highest segment number (guessed) |
//! | files    | `[a/b] ... (x/y)` or `(a/b) ... (x/y)` in the subject, plain `[a/b]`, jBinUp `_aob@` in the message-ID |

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use super::{Nzb, NzbFile};

/// Where an expected count was read from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CountSource {
    /// Counter in the subject line
    Subject,
    /// jBinDown/jBinUp counter in the message-ID
    JBin,
    /// PowerPost counter in the message-ID
    PowerPost,
    /// Highest segment number seen
    Guessed,
}

/// One subject or message-ID counter convention
struct CounterPattern {
    source: CountSource,
    regex: LazyLock<Regex>,
    /// Capture group holding the total
    total: usize,
}

impl CounterPattern {
    fn total(&self, haystack: &str) -> Option<u32> {
        let caps = self.regex.captures(haystack)?;
        caps.get(self.total)?.as_str().parse().ok()
    }
}

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    // patterns are literals in this file
    Regex::new(pattern).expect("invalid built-in pattern")
}

static SEGMENTS_IN_SUBJECT: CounterPattern = CounterPattern {
    source: CountSource::Subject,
    regex: LazyLock::new(|| compile(r"\((\d{1,4})/(\d{1,5})\)$")),
    total: 2,
};

static SEGMENTS_IN_MESSAGE_ID: [CounterPattern; 2] = [
    CounterPattern {
        source: CountSource::JBin,
        regex: LazyLock::new(|| compile(r".+?\.(\d{1,5})-(\d{1,5})@")),
        total: 2,
    },
    CounterPattern {
        source: CountSource::PowerPost,
        regex: LazyLock::new(|| compile(r"part(\d{1,4})of(\d{1,5})")),
        total: 2,
    },
];

static FILES_IN_SUBJECT: [CounterPattern; 2] = [
    CounterPattern {
        source: CountSource::Subject,
        regex: LazyLock::new(|| compile(r"[(\[](\d{1,4})/(\d{1,4})[)\]].*?\((\d{1,4})/(\d{1,5})\)")),
        total: 2,
    },
    CounterPattern {
        source: CountSource::Subject,
        regex: LazyLock::new(|| compile(r"\[(\d{1,4})/(\d{1,5})\]")),
        total: 2,
    },
];

static FILES_IN_MESSAGE_ID: CounterPattern = CounterPattern {
    source: CountSource::JBin,
    regex: LazyLock::new(|| compile(r".+?_(\d{1,5})o(\d{1,5})@")),
    total: 2,
};

/// An expected count and where it came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Estimate {
    /// The expected count
    pub count: u32,
    /// Where it was read from
    pub source: CountSource,
}

impl Estimate {
    /// Whether the count was inferred rather than announced
    pub fn is_guessed(&self) -> bool {
        self.source == CountSource::Guessed
    }
}

/// Expected number of segments for one file.
///
/// Always yields a value: without any announced counter the highest segment
/// number is taken and the estimate is marked as guessed.
pub fn expected_segments(file: &NzbFile) -> Estimate {
    if let Some(count) = SEGMENTS_IN_SUBJECT.total(&file.subject) {
        return Estimate {
            count,
            source: SEGMENTS_IN_SUBJECT.source,
        };
    }

    if let Some(message_id) = file.first_message_id() {
        for pattern in &SEGMENTS_IN_MESSAGE_ID {
            if let Some(count) = pattern.total(message_id) {
                return Estimate {
                    count,
                    source: pattern.source,
                };
            }
        }
    }

    let highest = file.segments.iter().map(|s| s.number).max().unwrap_or(0);
    let count = u32::try_from(highest).unwrap_or(u32::MAX);
    Estimate {
        count,
        source: CountSource::Guessed,
    }
}

/// Number of files announced by one file's subject or message-ID
pub fn announced_files(file: &NzbFile) -> Option<Estimate> {
    for pattern in &FILES_IN_SUBJECT {
        if let Some(count) = pattern.total(&file.subject) {
            return Some(Estimate {
                count,
                source: pattern.source,
            });
        }
    }

    let count = FILES_IN_MESSAGE_ID.total(file.first_message_id()?)?;
    (count > 0).then_some(Estimate {
        count,
        source: FILES_IN_MESSAGE_ID.source,
    })
}

/// Expected number of files for the whole NZB.
///
/// Takes the highest count announced by any file: some posters add files
/// after the first batch and raise the total in the later subjects.
pub fn expected_files(files: &[NzbFile]) -> Option<u32> {
    files
        .iter()
        .filter_map(announced_files)
        .map(|e| e.count)
        .max()
}

/// Fill in the per-file segment estimates and return the expected file count
pub fn estimate(nzb: &mut Nzb) -> Option<u32> {
    for file in &mut nzb.files {
        let estimate = expected_segments(file);
        file.set_expected_segments(estimate.count, estimate.is_guessed());
        debug!(
            subject = %file.subject,
            expected = estimate.count,
            present = file.segment_count(),
            source = ?estimate.source,
            "expected segments"
        );
    }
    expected_files(&nzb.files)
}

/// Oldest and newest posting date of an NZB
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct UploadSpan {
    /// Oldest posting date, seconds since the epoch
    pub first: i64,
    /// Newest posting date, seconds since the epoch
    pub last: i64,
}

impl UploadSpan {
    /// Span over all files with a usable (positive) date
    pub fn of(files: &[NzbFile]) -> Option<Self> {
        let mut dates = files.iter().map(|f| f.date).filter(|&d| d > 0);
        let first = dates.next()?;
        let (first, last) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        Some(Self { first, last })
    }

    /// Seconds between the first and the last post
    pub fn duration(&self) -> i64 {
        self.last - self.first
    }

    /// Seconds since the last post
    pub fn age(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp() - self.last
    }

    /// Date of the last post
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.last, 0)
    }
}
