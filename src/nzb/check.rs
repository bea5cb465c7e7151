//! NZB completeness check.
//!
//! 1. Compare the file count against the count announced in the subjects.
//! 2. Compare every file's segment count against its expected count.
//! 3. Grade the outcome by how much of the above could actually be verified.
//!
//! Both comparisons accept a configurable shortfall. The final grading is a
//! pure function over [`CheckFacts`] so it can be tested without an NZB.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::estimate::{self, UploadSpan};
use super::{Nzb, NzbStats};
use crate::config::CheckConfig;

/// Outcome of a completeness check, strongest first
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckResult {
    /// File count verified, every file has exactly its announced segments
    Complete,
    /// File and segment counts verified, missing segments within tolerance
    Ok,
    /// As [`CheckResult::Ok`], but some segment counts were guessed
    OkGuessedSegments,
    /// Segment counts verified, the file count could not be
    OkFileCountUnknown,
    /// Some segment counts verified, the rest unknown
    OkCountsUnknown,
    /// The payload was no usable NZB
    NoData,
    /// More files missing than allowed
    TooManyMissingFiles,
    /// More segments missing than allowed
    TooManyMissingSegments,
    /// Nothing could be verified
    NoInformation,
}

impl CheckResult {
    /// Whether the NZB passed
    pub fn is_success(self) -> bool {
        matches!(
            self,
            CheckResult::Complete
                | CheckResult::Ok
                | CheckResult::OkGuessedSegments
                | CheckResult::OkFileCountUnknown
                | CheckResult::OkCountsUnknown
        )
    }

    /// Reason code, numbered separately for passes (1-5) and failures (1-4)
    pub fn code(self) -> u8 {
        match self {
            CheckResult::Complete | CheckResult::NoData => 1,
            CheckResult::Ok | CheckResult::TooManyMissingFiles => 2,
            CheckResult::OkGuessedSegments | CheckResult::TooManyMissingSegments => 3,
            CheckResult::OkFileCountUnknown | CheckResult::NoInformation => 4,
            CheckResult::OkCountsUnknown => 5,
        }
    }

    /// Short human-readable description
    pub fn describe(self) -> &'static str {
        match self {
            CheckResult::Complete => "all files are complete",
            CheckResult::Ok => "file check ok, segment check ok",
            CheckResult::OkGuessedSegments => {
                "file check ok, segment check ok but based on an unreliable source"
            }
            CheckResult::OkFileCountUnknown => "file count is unknown, segment check ok",
            CheckResult::OkCountsUnknown => "file count and segment count are unknown",
            CheckResult::NoData => "received no NZB",
            CheckResult::TooManyMissingFiles => "too many missing files",
            CheckResult::TooManyMissingSegments => "too many missing segments",
            CheckResult::NoInformation => "no information found",
        }
    }
}

impl std::fmt::Display for CheckResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.describe())
    }
}

/// State of the file count comparison after it did not fail
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileCheck {
    /// No more files missing than allowed
    Ok,
    /// More files than announced
    MoreThanExpected,
    /// No file count announced
    Unknown,
}

/// Everything the final grading looks at
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckFacts {
    /// Outcome of the file count comparison
    pub file_check: FileCheck,
    /// Missing segments exist but stay within tolerance
    pub segment_check_ok: bool,
    /// Missing segments over all files
    pub segments_missing: u64,
    /// At least one file's segment count was guessed
    pub segments_guessed: bool,
    /// Files whose segment shortfall was computed
    pub files_checked: usize,
    /// Files with fewer segments than expected
    pub files_with_missing_segments: usize,
    /// Files with more segments than expected
    pub files_with_surplus_segments: usize,
    /// Files without a usable segment count
    pub files_with_unknown_segments: usize,
}

/// Grade the verified facts, strongest evidence first.
///
/// Never passes an NZB for which not a single file could be checked.
pub fn grade(facts: &CheckFacts) -> CheckResult {
    let files_ok = facts.file_check == FileCheck::Ok;
    let no_unknown = facts.files_with_unknown_segments == 0;

    if files_ok
        && facts.files_with_missing_segments == 0
        && facts.files_with_surplus_segments == 0
        && no_unknown
        && !facts.segments_guessed
    {
        return CheckResult::Complete;
    }

    if files_ok && facts.segment_check_ok && no_unknown && !facts.segments_guessed {
        return CheckResult::Ok;
    }

    if files_ok && facts.segment_check_ok && facts.segments_guessed {
        return CheckResult::OkGuessedSegments;
    }

    let segments_fine = facts.segments_missing == 0 || facts.segment_check_ok;
    if facts.files_checked > 0 && segments_fine {
        if no_unknown {
            return CheckResult::OkFileCountUnknown;
        }
        return CheckResult::OkCountsUnknown;
    }

    CheckResult::NoInformation
}

/// Check an NZB for completeness.
///
/// Recomputes [`Nzb::stats`] from scratch, so running it twice on the same
/// NZB gives the same result. A malformed NZB fails with
/// [`CheckResult::NoData`] and keeps default stats.
pub fn check_completion(nzb: &mut Nzb, config: &CheckConfig) -> CheckResult {
    nzb.stats = NzbStats::default();
    for file in &mut nzb.files {
        file.reset_estimate();
    }

    if nzb.malformed {
        return CheckResult::NoData;
    }

    info!(
        max_missing_files = config.max_missing_files,
        max_missing_segments_percent = config.max_missing_segments_percent,
        "checking NZB"
    );

    let files_expected = estimate::estimate(nzb);
    let mut stats = NzbStats {
        files_total: nzb.files.len(),
        files_expected,
        upload: UploadSpan::of(&nzb.files),
        ..Default::default()
    };
    let total = stats.files_total as i64;

    let file_check = match files_expected {
        Some(announced) => {
            let mut expected = i64::from(announced);
            let mut missing = expected - total;

            // one file more than announced, e.g. an .nzb posted as [000/xxx]
            if missing == -1 {
                missing = 0;
                expected += 1;
                stats.files_expected = Some(announced + 1);
                debug!("one extra file");
            }
            stats.files_missing = Some(missing);

            if total < expected - i64::from(config.max_missing_files) {
                warn!(present = total, expected, "file check failed, skipping segment check");
                nzb.stats = stats;
                return CheckResult::TooManyMissingFiles;
            }

            if missing < 0 {
                warn!(present = total, expected, "more files than expected");
                FileCheck::MoreThanExpected
            } else {
                info!(present = total, expected, "file check ok");
                FileCheck::Ok
            }
        }
        None => {
            stats.files_missing = Some(total);
            info!("file check skipped, no file count found");
            FileCheck::Unknown
        }
    };

    let mut facts = CheckFacts {
        file_check,
        segment_check_ok: false,
        segments_missing: 0,
        segments_guessed: false,
        files_checked: 0,
        files_with_missing_segments: 0,
        files_with_surplus_segments: 0,
        files_with_unknown_segments: 0,
    };

    for file in &nzb.files {
        match file.missing_segments {
            None => facts.files_with_unknown_segments += 1,
            Some(0) => facts.files_checked += 1,
            Some(missing) if missing > 0 => {
                stats.segments_missing += missing.unsigned_abs();
                facts.files_with_missing_segments += 1;
                facts.files_checked += 1;
            }
            Some(surplus) => {
                stats.segments_surplus += surplus.unsigned_abs();
                facts.files_with_surplus_segments += 1;
                facts.files_checked += 1;
            }
        }

        if let Some(expected) = file.expected_segments {
            stats.segments_expected += u64::from(expected);
        }

        // a guessed count is never fully trusted
        if file.segments_guessed {
            facts.segments_guessed = true;
            if stats.segments_missing == 0 {
                stats.segments_missing = 1;
                stats.segments_total += 1;
            }
        }

        stats.segments_total += file.segment_count() as u64;
    }

    facts.segments_missing = stats.segments_missing;
    stats.files_checked = facts.files_checked;
    stats.files_with_unknown_segments = facts.files_with_unknown_segments;
    stats.files_with_missing_segments = facts.files_with_missing_segments;
    stats.files_with_surplus_segments = facts.files_with_surplus_segments;

    debug!(
        total = stats.segments_total,
        expected = stats.segments_expected,
        missing = stats.segments_missing,
        surplus = stats.segments_surplus,
        unknown_files = stats.files_with_unknown_segments,
        "segment counters"
    );

    if stats.segments_missing > 0 {
        let percent = missing_percent(stats.segments_missing, stats.segments_expected);
        stats.segments_missing_percent = Some(percent);

        if percent > config.max_missing_segments_percent {
            warn!(
                missing = stats.segments_missing,
                percent,
                "segment check failed, too many missing segments"
            );
            nzb.stats = stats;
            return CheckResult::TooManyMissingSegments;
        }

        warn!(
            missing = stats.segments_missing,
            percent,
            "missing segments within tolerance"
        );
        facts.segment_check_ok = true;
    } else {
        // any passing verdict, not only Complete
        stats.segments_missing_percent = Some(0.0);
    }

    let result = grade(&facts);
    if result == CheckResult::NoInformation {
        stats.segments_missing_percent = Some(100.0);
    }

    if result.is_success() {
        info!(result = %result, code = result.code(), "NZB check passed");
    } else {
        warn!(result = %result, code = result.code(), "NZB check failed");
    }

    nzb.stats = stats;
    result
}

/// Missing segments as a percentage of the expected ones
fn missing_percent(missing: u64, expected: u64) -> f64 {
    if expected == 0 {
        return 100.0;
    }
    missing as f64 / (expected as f64 / 100.0)
}
