//! Configuration types for nzb-monkey

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Highest priority a search engine may have. 0 disables an engine.
pub const MAX_PRIORITY: u8 = 9;

/// Main configuration
///
/// Loading from disk is left to the embedding application; every struct
/// deserializes from any serde format and fills in defaults for missing keys.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Completeness check tolerances
    #[serde(default)]
    pub check: CheckConfig,

    /// Search engines and search policy
    #[serde(default)]
    pub search: SearchConfig,

    /// Local NZB file output
    #[serde(default)]
    pub sink: SinkConfig,
}

impl Config {
    /// Validate all sections
    pub fn validate(&self) -> Result<()> {
        self.check.validate()?;
        self.search.validate()
    }
}

/// Tolerances for the completeness check
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CheckConfig {
    /// Files that may be missing before an NZB fails (default: 2)
    #[serde(default = "default_max_missing_files")]
    pub max_missing_files: u32,

    /// Percentage of expected segments that may be missing (default: 2.5)
    ///
    /// 2.5 matches the checker's built-in tolerance. Many existing
    /// configuration files carry the stricter 2.0, which must be set explicitly.
    #[serde(default = "default_max_missing_segments_percent")]
    pub max_missing_segments_percent: f64,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            max_missing_files: default_max_missing_files(),
            max_missing_segments_percent: default_max_missing_segments_percent(),
        }
    }
}

impl CheckConfig {
    /// Reject a negative or non-numeric percentage
    pub fn validate(&self) -> Result<()> {
        let percent = self.max_missing_segments_percent;
        if !percent.is_finite() || percent < 0.0 {
            return Err(Error::config(
                format!("must be a non-negative number, got {percent}"),
                "check.max_missing_segments_percent",
            ));
        }
        Ok(())
    }
}

/// Search policy and the search engines to ask
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Keep searching for the best NZB after a passing one was found (default: true)
    ///
    /// A complete NZB without any missing segment always ends the search.
    #[serde(default = "default_true")]
    pub best_nzb: bool,

    /// Drop NZBs that failed the check instead of keeping the first one as a
    /// last resort (default: true)
    #[serde(default = "default_true")]
    pub skip_failed: bool,

    /// Timeout for every search and download request (default: 20 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Accept invalid TLS certificates (default: false)
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// User-Agent header (None = HTTP client default)
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Search engines (default: the built-in table)
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            best_nzb: true,
            skip_failed: true,
            request_timeout: default_request_timeout(),
            accept_invalid_certs: false,
            user_agent: None,
            sources: default_sources(),
        }
    }
}

impl SearchConfig {
    /// Check priorities and that at least one engine is enabled
    pub fn validate(&self) -> Result<()> {
        for source in &self.sources {
            source.validate()?;
        }
        if !self.sources.iter().any(SourceConfig::is_enabled) {
            return Err(Error::config(
                "no search engine enabled",
                "search.sources",
            ));
        }
        Ok(())
    }

    /// Enabled engines grouped by priority, lowest priority first
    ///
    /// Engines keep their configured order inside a group.
    pub fn priority_groups(&self) -> Vec<(u8, Vec<&SourceConfig>)> {
        (1..=MAX_PRIORITY)
            .map(|priority| {
                let group: Vec<&SourceConfig> = self
                    .sources
                    .iter()
                    .filter(|s| s.priority == priority)
                    .collect();
                (priority, group)
            })
            .filter(|(_, group)| !group.is_empty())
            .collect()
    }

    /// Set the priority of the engine with the given name
    ///
    /// Returns false when no engine has that name.
    pub fn set_priority(&mut self, name: &str, priority: u8) -> bool {
        match self.sources.iter_mut().find(|s| s.name == name) {
            Some(source) => {
                source.priority = priority;
                true
            }
            None => false,
        }
    }
}

/// One search engine
///
/// The search page is `search_url` with `{query}` replaced by the URL-encoded
/// search key. `pattern` is applied to the page; its named groups fill the
/// `{name}` placeholders of `download_url`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    /// Short identifier used in logs and events
    pub name: String,

    /// Name shown to users, logged next to `name` when the engine is asked
    pub display_name: String,

    /// Search page URL with a `{query}` placeholder
    pub search_url: String,

    /// Regex with named groups locating the NZB on the search page
    pub pattern: String,

    /// NZB download URL with `{group}` placeholders
    pub download_url: String,

    /// Priority 1-9, lower is asked first; 0 disables the engine (default: 1)
    #[serde(default = "default_priority")]
    pub priority: u8,

    /// Cookie sent with the search request
    #[serde(default = "default_cookie")]
    pub cookie: Option<String>,
}

impl SourceConfig {
    /// Whether the engine takes part in searches
    pub fn is_enabled(&self) -> bool {
        self.priority > 0
    }

    /// Reject priorities outside 0..=9
    pub fn validate(&self) -> Result<()> {
        if self.priority > MAX_PRIORITY {
            return Err(Error::config(
                format!(
                    "priority must be between 0 and {MAX_PRIORITY}, got {}",
                    self.priority
                ),
                format!("search.sources.{}.priority", self.name),
            ));
        }
        Ok(())
    }

    fn builtin(name: &str, display_name: &str, search_url: &str, pattern: &str, download_url: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            search_url: search_url.to_string(),
            pattern: pattern.to_string(),
            download_url: download_url.to_string(),
            priority: default_priority(),
            cookie: default_cookie(),
        }
    }
}

/// Local NZB file output
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Directory NZB files are written to (default: "./nzbs")
    #[serde(default = "default_nzb_dir")]
    pub nzb_dir: PathBuf,

    /// Append `{{password}}` to the file name (default: true)
    #[serde(default = "default_true")]
    pub pass_to_file: bool,

    /// Delete old NZB files once a day (default: false)
    #[serde(default)]
    pub clean_up_enable: bool,

    /// Age in days after which NZB files are deleted (default: 2)
    #[serde(default = "default_clean_up_max_age_days")]
    pub clean_up_max_age_days: u32,

    /// Unix timestamp of the last cleanup (None = never)
    #[serde(default)]
    pub clean_up_last_run: Option<i64>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            nzb_dir: default_nzb_dir(),
            pass_to_file: true,
            clean_up_enable: false,
            clean_up_max_age_days: default_clean_up_max_age_days(),
            clean_up_last_run: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_missing_files() -> u32 {
    2
}

fn default_max_missing_segments_percent() -> f64 {
    2.5
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_priority() -> u8 {
    1
}

fn default_cookie() -> Option<String> {
    Some("agreed=true".to_string())
}

fn default_nzb_dir() -> PathBuf {
    PathBuf::from("./nzbs")
}

fn default_clean_up_max_age_days() -> u32 {
    2
}

fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig::builtin(
            "binsearch",
            "BinSearch",
            "https://binsearch.info/?q={query}&max=100&adv_age=1100&server=",
            r#"name="(?P<id>\d{9,})""#,
            "http://www.binsearch.info/?action=nzb&{id}=1",
        ),
        SourceConfig::builtin(
            "binsearch_alternative",
            "BinSearch Alternative Server",
            "https://binsearch.info/?q={query}&max=100&adv_age=1100&server=2",
            r#"name="(?P<id>\d{9,})""#,
            "http://www.binsearch.info/?action=nzb&{id}=1&server=2",
        ),
        SourceConfig::builtin(
            "nzbking",
            "NZBKing",
            "http://www.nzbking.com/search/?q={query}",
            r#"href="/details:(?P<id>.*?)/""#,
            "http://www.nzbking.com/nzb:{id}",
        ),
        SourceConfig::builtin(
            "nzbindex",
            "NZBIndex",
            "http://nzbindex.com/search/?q={query}&sort=agedesc&hidespam=1",
            r#"label for="box(?P<id>\d{8,})".*?class="highlight""#,
            "http://nzbindex.com/download/{id}/",
        ),
        SourceConfig::builtin(
            "newzleech",
            "Newzleech",
            "https://www.newzleech.com/?m=search&q={query}",
            r#"name="binary\[\]" value="(?P<id>.*?)""#,
            "https://www.newzleech.com/?m=gen&dl=1&post={id}",
        ),
    ]
}

// Duration serialization helper (as seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
