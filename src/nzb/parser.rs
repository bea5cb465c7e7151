//! Streaming NZB parser.
//!
//! Reads the document event by event and keeps only the element currently
//! being built, so memory stays flat no matter how many segments an NZB lists.
//! Elements are matched by local name: `<file>` in the newzbin namespace and a
//! bare `<file>` are treated alike.
//!
//! Search engines answer "not found" or "removed" with an HTML page or a short
//! text instead of an NZB. Such payloads, and anything that is not well-formed
//! XML with an `<nzb>` root, come back as [`Nzb::malformed`] instead of an error.
//!
//! Documents in a legacy encoding such as ISO-8859-1 are transcoded to UTF-8
//! by [`decode_document`] before parsing.

use std::borrow::Cow;
use std::sync::LazyLock;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::bytes::Regex;
use tracing::{debug, warn};

use super::{Nzb, NzbFile, Segment};

/// Phrases that mark an error page returned in place of an NZB
static ERROR_PAGE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)does not exist|doctype html"));

/// Encoding attribute of a leading XML declaration
static DECLARED_ENCODING: LazyLock<regex::Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    regex::Regex::new(r#"^(\u{feff}?\s*<\?xml[^>]*?\sencoding\s*=\s*)(?:"[^"]*"|'[^']*')"#)
        .expect("invalid built-in pattern")
});

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    // patterns are literals in this file
    Regex::new(pattern).expect("invalid built-in pattern")
}

/// Element whose text content is being collected
enum TextTarget {
    Group,
    Segment { bytes: u64, number: u64 },
    Meta { kind: String },
}

/// Decode a downloaded document to UTF-8 text.
///
/// The encoding comes from a byte order mark or the `encoding` attribute of
/// the XML declaration, UTF-8 otherwise. A transcoded document gets its
/// declaration rewritten to `encoding="UTF-8"` so the text stays consistent
/// when written back to disk. Bytes that are invalid in the declared encoding
/// fall back to lossy UTF-8.
pub fn decode_document(raw: &[u8]) -> Cow<'_, str> {
    let mut reader = Reader::from_reader(raw);
    let mut buf = Vec::new();
    // the declaration is the first event and switches the decoder
    if reader.read_event_into(&mut buf).is_err() {
        return String::from_utf8_lossy(raw);
    }
    let decoder = reader.decoder();
    let encoding = decoder.encoding().name();

    let text = match decoder.decode(raw) {
        Ok(text) => text,
        Err(e) => {
            debug!(encoding, error = %e, "document does not match its encoding");
            return String::from_utf8_lossy(raw);
        }
    };
    if encoding == "UTF-8" {
        return text;
    }

    debug!(encoding, "transcoded NZB to UTF-8");
    let rewritten = match DECLARED_ENCODING.replace(&text, r#"${1}"UTF-8""#) {
        Cow::Owned(rewritten) => Some(rewritten),
        Cow::Borrowed(_) => None,
    };
    rewritten.map_or(text, Cow::Owned)
}

/// Parse raw NZB bytes.
///
/// Never fails: unusable input yields an NZB with `malformed` set and a
/// diagnostic describing the problem.
pub fn parse(raw: &[u8]) -> Nzb {
    let text = decode_document(raw);
    let raw = text.as_bytes();

    if let Some(found) = ERROR_PAGE.find(raw) {
        let phrase = String::from_utf8_lossy(found.as_bytes()).to_lowercase();
        warn!(phrase = %phrase, "received no NZB from search engine");
        return Nzb::malformed(format!("received an error page instead of an NZB ({phrase})"));
    }

    match parse_document(raw) {
        Ok(nzb) => {
            debug!(
                files = nzb.files.len(),
                segments = nzb.segment_count(),
                "parsed NZB"
            );
            nzb
        }
        Err(message) => {
            warn!(error = %message, "NZB could not be parsed");
            Nzb::malformed(message)
        }
    }
}

fn parse_document(raw: &[u8]) -> std::result::Result<Nzb, String> {
    let mut reader = Reader::from_reader(raw);
    reader.config_mut().trim_text(true);

    let mut nzb = Nzb::default();
    let mut buf = Vec::new();
    let mut root_open = false;
    let mut root_closed = false;
    let mut current_file: Option<NzbFile> = None;
    let mut target: Option<TextTarget> = None;
    let mut text = String::new();

    loop {
        buf.clear();
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| format!("XML error at byte {}: {e}", reader.buffer_position()))?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let name = e.local_name();
                let name = name.as_ref();

                if !root_open {
                    if name != b"nzb" {
                        return Err(format!(
                            "root element is <{}>, not <nzb>",
                            String::from_utf8_lossy(name)
                        ));
                    }
                    root_open = true;
                    root_closed = is_empty;
                    continue;
                }

                match name {
                    b"file" => {
                        if current_file.is_some() {
                            return Err("nested <file> element".to_string());
                        }
                        let file = start_file(e)?;
                        if is_empty {
                            nzb.files.push(file);
                        } else {
                            current_file = Some(file);
                        }
                    }
                    b"group" if current_file.is_some() => {
                        if is_empty {
                            debug!("skipping empty <group> element");
                        } else {
                            target = Some(TextTarget::Group);
                            text.clear();
                        }
                    }
                    b"segment" => {
                        let Some(file) = current_file.as_mut() else {
                            debug!("skipping <segment> outside of <file>");
                            continue;
                        };
                        let (bytes, number) = segment_attributes(e)?;
                        if is_empty {
                            file.segments.push(Segment::new(bytes, number, None));
                        } else {
                            target = Some(TextTarget::Segment { bytes, number });
                            text.clear();
                        }
                    }
                    b"meta" if current_file.is_none() && !is_empty => {
                        let kind = attribute(e, b"type")?.unwrap_or_default();
                        target = Some(TextTarget::Meta { kind });
                        text.clear();
                    }
                    _ => {}
                }
            }
            Event::Text(ref e) => {
                if target.is_some() {
                    text.push_str(&decode_text(e));
                }
            }
            Event::CData(ref e) => {
                if target.is_some() {
                    text.push_str(&String::from_utf8_lossy(e));
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"nzb" => root_closed = true,
                b"file" => {
                    if let Some(file) = current_file.take() {
                        nzb.files.push(file);
                    }
                }
                b"group" | b"segment" | b"meta" => {
                    if let Some(done) = target.take() {
                        let value = std::mem::take(&mut text);
                        finish_text(&mut nzb, current_file.as_mut(), done, value);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !root_open {
        return Err("document contains no <nzb> element".to_string());
    }
    if current_file.is_some() || !root_closed {
        return Err("document is truncated".to_string());
    }

    Ok(nzb)
}

fn finish_text(nzb: &mut Nzb, file: Option<&mut NzbFile>, target: TextTarget, value: String) {
    match target {
        TextTarget::Group => {
            if let Some(file) = file {
                file.groups.push(value);
            }
        }
        TextTarget::Segment { bytes, number } => {
            if let Some(file) = file {
                let message_id = (!value.is_empty()).then_some(value);
                file.segments.push(Segment::new(bytes, number, message_id));
            }
        }
        TextTarget::Meta { kind } => nzb.meta.push((kind, value)),
    }
}

fn start_file(e: &BytesStart<'_>) -> std::result::Result<NzbFile, String> {
    let poster = attribute(e, b"poster")?.unwrap_or_default();
    let subject = attribute(e, b"subject")?.unwrap_or_default();
    let date = match attribute(e, b"date")? {
        Some(date) => date.trim().parse::<i64>().unwrap_or_else(|_| {
            debug!(date = %date, "ignoring unparseable file date");
            0
        }),
        None => 0,
    };
    Ok(NzbFile::new(poster, date, subject))
}

fn segment_attributes(e: &BytesStart<'_>) -> std::result::Result<(u64, u64), String> {
    let bytes = attribute(e, b"bytes")?
        .ok_or_else(|| "segment without bytes attribute".to_string())?;
    let number = attribute(e, b"number")?
        .ok_or_else(|| "segment without number attribute".to_string())?;

    let bytes = bytes
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("segment has invalid bytes attribute {bytes:?}"))?;
    let number = number
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("segment has invalid number attribute {number:?}"))?;

    Ok((bytes, number))
}

fn attribute(e: &BytesStart<'_>, name: &[u8]) -> std::result::Result<Option<String>, String> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| format!("invalid attribute: {err}"))?;
        if attr.key.local_name().as_ref() == name {
            return Ok(Some(decode_text(&attr.value)));
        }
    }
    Ok(None)
}

/// Lossy UTF-8 decoding followed by entity unescaping
fn decode_text(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw).into_owned();
    let unescaped = quick_xml::escape::unescape(&text).map(|s| s.into_owned());
    unescaped.unwrap_or(text)
}
