//! NZBLNK URIs.
//!
//! An NZBLNK carries everything needed to search for a release:
//! `nzblnk:?t=<tag>&h=<header>&p=<password>`. Values are percent-encoded.

use url::Url;

use crate::error::{Error, Result};
use crate::types::SearchQuery;

/// URI scheme of NZBLNK links
pub const SCHEME: &str = "nzblnk";

/// A decoded NZBLNK
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NzbLink {
    /// Release name (`t`)
    pub tag: String,
    /// Header to search for (`h`)
    pub header: String,
    /// Archive password (`p`)
    pub password: Option<String>,
}

impl NzbLink {
    /// Decode an NZBLNK URI
    ///
    /// Empty values count as absent. The first occurrence of a key wins.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidLink`] for a foreign scheme, unparseable input or a
    /// missing tag or header.
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input.trim())
            .map_err(|e| Error::InvalidLink(format!("{e}: {input}")))?;

        if !url.scheme().eq_ignore_ascii_case(SCHEME) {
            return Err(Error::InvalidLink(format!(
                "expected {SCHEME}: scheme, got {}:",
                url.scheme()
            )));
        }

        let value = |key: &str| {
            url.query_pairs()
                .find(|(k, v)| k == key && !v.is_empty())
                .map(|(_, v)| v.into_owned())
        };

        let tag = value("t").ok_or_else(|| Error::InvalidLink("no tag (t=) given".to_string()))?;
        let header =
            value("h").ok_or_else(|| Error::InvalidLink("no header (h=) given".to_string()))?;

        Ok(Self {
            tag,
            header,
            password: value("p"),
        })
    }
}

impl From<NzbLink> for SearchQuery {
    fn from(link: NzbLink) -> Self {
        SearchQuery {
            tag: link.tag,
            header: link.header,
            password: link.password,
        }
    }
}

impl std::str::FromStr for NzbLink {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_link_is_decoded() {
        let link = NzbLink::parse("nzblnk:?t=My%20Release&h=abc_def.part01&p=s%26cret").unwrap();
        assert_eq!(link.tag, "My Release");
        assert_eq!(link.header, "abc_def.part01");
        assert_eq!(link.password.as_deref(), Some("s&cret"));
    }

    #[test]
    fn scheme_is_case_insensitive() {
        let link: NzbLink = "NZBLNK:?t=a&h=b".parse().unwrap();
        assert_eq!(link.header, "b");
        assert_eq!(link.password, None);
    }

    #[test]
    fn empty_password_is_absent() {
        let link = NzbLink::parse("nzblnk:?t=a&h=b&p=").unwrap();
        assert_eq!(link.password, None);
    }

    #[test]
    fn foreign_scheme_is_rejected() {
        let err = NzbLink::parse("https://example.com/?t=a&h=b").unwrap_err();
        assert!(matches!(err, Error::InvalidLink(_)));
    }

    #[test]
    fn missing_header_is_rejected() {
        let err = NzbLink::parse("nzblnk:?t=a").unwrap_err();
        assert!(err.to_string().contains("header"), "{err}");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(NzbLink::parse("not a link").is_err());
    }

    #[test]
    fn converts_into_search_query() {
        let query: SearchQuery = NzbLink::parse("nzblnk:?t=T&h=H_1&p=pw").unwrap().into();
        assert_eq!(query.normalized_header(), "H 1");
        assert_eq!(query.password.as_deref(), Some("pw"));
    }
}
