//! NZB data model, parsing and completeness checking.
//!
//! An [`Nzb`] is built once per download by [`parser::parse`]. The estimator
//! ([`estimate`]) and the classifier ([`check`]) then fill in the derived
//! per-file fields and the aggregate [`NzbStats`].

pub mod check;
pub mod estimate;
pub mod parser;

use serde::Serialize;

use crate::error::{Error, Result};

pub use check::{CheckResult, check_completion};
pub use estimate::UploadSpan;
pub use parser::{decode_document, parse};

/// Characters that would break the XML of an injected password meta element.
const XML_FORBIDDEN: &[char] = &['&', '"', '\'', '<', '>'];

/// One article of a posted file
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Segment {
    /// Article size in bytes
    pub bytes: u64,
    /// 1-based segment number claimed by the poster (may have gaps or repeats)
    pub number: u64,
    /// Message-ID of the article, when the element carried text
    pub message_id: Option<String>,
}

impl Segment {
    /// Create a segment
    pub fn new(bytes: u64, number: u64, message_id: Option<String>) -> Self {
        Self {
            bytes,
            number,
            message_id,
        }
    }
}

/// One posted file with its segments
#[derive(Clone, Debug, Default, Serialize)]
pub struct NzbFile {
    /// Poster as given in the NZB
    pub poster: String,
    /// Posting date in seconds since the epoch (poster supplied)
    pub date: i64,
    /// Subject line of the post
    pub subject: String,
    /// Newsgroups, in document order
    pub groups: Vec<String>,
    /// Segments, in document order
    pub segments: Vec<Segment>,

    /// Expected segment count; `None` until estimated
    pub expected_segments: Option<u32>,
    /// Whether `expected_segments` was guessed from segment numbers
    pub segments_guessed: bool,
    /// Expected minus present segments (negative = surplus); `None` while unknown
    pub missing_segments: Option<i64>,
}

impl NzbFile {
    /// Create a file without groups or segments
    pub fn new(poster: impl Into<String>, date: i64, subject: impl Into<String>) -> Self {
        Self {
            poster: poster.into(),
            date,
            subject: subject.into(),
            ..Default::default()
        }
    }

    /// Number of segments present in the NZB
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Total size of all present segments
    pub fn total_bytes(&self) -> u64 {
        self.segments.iter().map(|s| s.bytes).sum()
    }

    /// Message-ID of the first segment, used by the uploader counter patterns
    pub fn first_message_id(&self) -> Option<&str> {
        self.segments.first().and_then(|s| s.message_id.as_deref())
    }

    /// Set the expected segment count and recompute the shortfall
    pub fn set_expected_segments(&mut self, expected: u32, guessed: bool) {
        self.expected_segments = Some(expected);
        self.segments_guessed = guessed;
        self.missing_segments = Some(i64::from(expected) - self.segment_count() as i64);
    }

    /// Clear everything the estimator derived
    pub fn reset_estimate(&mut self) {
        self.expected_segments = None;
        self.segments_guessed = false;
        self.missing_segments = None;
    }
}

/// Aggregate counters filled in by [`check_completion`]
///
/// Recomputed from scratch on every check. `None` marks a value that could
/// not be determined (or was never reached because the check stopped early).
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct NzbStats {
    /// Files present in the NZB
    pub files_total: usize,
    /// Files announced by the subjects
    pub files_expected: Option<u32>,
    /// Announced minus present files; present count when nothing was announced
    pub files_missing: Option<i64>,
    /// Files whose segment shortfall was computed
    pub files_checked: usize,
    /// Files with no usable segment count
    pub files_with_unknown_segments: usize,
    /// Files with fewer segments than expected
    pub files_with_missing_segments: usize,
    /// Files with more segments than expected
    pub files_with_surplus_segments: usize,

    /// Segments present in the NZB (plus one when a guessed estimate forced a miss)
    pub segments_total: u64,
    /// Sum of the known per-file expected segment counts
    pub segments_expected: u64,
    /// Sum of per-file segment shortfalls
    pub segments_missing: u64,
    /// Sum of per-file segment surpluses
    pub segments_surplus: u64,
    /// `segments_missing` relative to `segments_expected`, in percent
    pub segments_missing_percent: Option<f64>,

    /// Oldest and newest posting dates
    pub upload: Option<UploadSpan>,
}

/// A parsed NZB document
#[derive(Clone, Debug, Default, Serialize)]
pub struct Nzb {
    /// Files, in document order
    pub files: Vec<NzbFile>,
    /// `<meta type="...">` entries of the header, in document order
    pub meta: Vec<(String, String)>,
    /// The payload was not a usable NZB (error page, broken XML, ...)
    pub malformed: bool,
    /// Why the payload was considered malformed
    pub diagnostic: Option<String>,
    /// Counters from the last completeness check
    pub stats: NzbStats,
}

impl Nzb {
    /// An NZB that stands for an unusable payload
    pub fn malformed(diagnostic: impl Into<String>) -> Self {
        Self {
            malformed: true,
            diagnostic: Some(diagnostic.into()),
            ..Default::default()
        }
    }

    /// Total number of segments over all files
    pub fn segment_count(&self) -> usize {
        self.files.iter().map(NzbFile::segment_count).sum()
    }

    /// Total size over all files
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(NzbFile::total_bytes).sum()
    }

    /// First header meta value of the given type
    pub fn meta_value(&self, kind: &str) -> Option<&str> {
        self.meta
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(kind))
            .map(|(_, v)| v.as_str())
    }

    /// Header title, if any
    pub fn title(&self) -> Option<&str> {
        self.meta_value("title")
    }

    /// Header password, if any
    pub fn password(&self) -> Option<&str> {
        self.meta_value("password")
    }
}

/// Place a password meta element into the header of an NZB document.
///
/// Download clients read `<meta type="password">` to unpack protected
/// releases. Documents without `<head>` get one right after the `<nzb>` start
/// tag; an existing header receives the element unless it already carries a
/// password, in which case the document is returned unchanged.
///
/// Passwords containing `& " ' < >` are refused, the caller keeps the
/// original text.
pub fn inject_password(raw: &str, password: &str) -> Result<String> {
    if password.contains(XML_FORBIDDEN) {
        return Err(Error::InvalidPassword(
            "forbidden characters (& \" ' < >) included".to_string(),
        ));
    }

    let meta = format!(r#"<meta type="password">{password}</meta>"#);

    if let Some(head) = find_start_tag(raw, "head") {
        if raw.contains(r#"type="password""#) {
            return Ok(raw.to_string());
        }
        if head.self_closing {
            return Ok(format!(
                "{}<head>{meta}</head>{}",
                &raw[..head.start],
                &raw[head.end..]
            ));
        }
        return Ok(format!("{}{}{}", &raw[..head.end], meta, &raw[head.end..]));
    }

    let head = format!("<head>{meta}</head>");
    if let Some(root) = find_start_tag(raw, "nzb").filter(|tag| !tag.self_closing) {
        return Ok(format!("{}{}{}", &raw[..root.end], head, &raw[root.end..]));
    }
    if let Some(end) = raw.rfind("</nzb>") {
        return Ok(format!("{}{}{}", &raw[..end], head, &raw[end..]));
    }

    Err(Error::InvalidPassword(
        "document has no <nzb> element".to_string(),
    ))
}

/// Byte range of a start tag in a document
struct StartTag {
    start: usize,
    /// Offset just past the closing `>`
    end: usize,
    self_closing: bool,
}

/// First `<name>` or `<name ...>` start tag; `<nzbfoo>` does not match `nzb`
fn find_start_tag(raw: &str, name: &str) -> Option<StartTag> {
    let open = format!("<{name}");
    let mut from = 0;
    while let Some(pos) = raw[from..].find(&open) {
        let start = from + pos;
        let after = &raw[start + open.len()..];
        if after.starts_with(|c: char| c == '>' || c == '/' || c.is_whitespace()) {
            let close = after.find('>')?;
            return Some(StartTag {
                start,
                end: start + open.len() + close + 1,
                self_closing: after[..close].ends_with('/'),
            });
        }
        from = start + open.len();
    }
    None
}
