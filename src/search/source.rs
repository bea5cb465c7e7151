//! Search engine abstraction and the HTTP implementation.

use async_trait::async_trait;
use regex::{Captures, Regex};
use tracing::debug;

use crate::config::{SearchConfig, SourceConfig};
use crate::error::{Error, Result};

/// A place to look for NZBs
///
/// Searching happens in two steps: [`locate`](NzbSource::locate) turns the
/// search key into a download address, [`fetch`](NzbSource::fetch) downloads
/// the document behind it.
///
/// Errors for which [`Error::is_source_failure`] holds (timeouts, refused
/// connections, HTTP errors) only take this engine out of the current search.
#[async_trait]
pub trait NzbSource: Send + Sync {
    /// Engine name for logs and events
    fn name(&self) -> &str;

    /// Name shown to users, the plain name unless the engine has a nicer one
    fn display_name(&self) -> &str {
        self.name()
    }

    /// Find the download address for a search key
    ///
    /// `Ok(None)` means the engine has nothing for this key.
    async fn locate(&self, key: &str) -> Result<Option<String>>;

    /// Download the NZB document at `address`
    async fn fetch(&self, address: &str) -> Result<Vec<u8>>;
}

/// Build the HTTP client shared by all engines of a search
pub fn build_client(config: &SearchConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .danger_accept_invalid_certs(config.accept_invalid_certs);
    if let Some(agent) = &config.user_agent {
        builder = builder.user_agent(agent.clone());
    }
    builder.build().map_err(|e| Error::Config {
        message: format!("failed to create HTTP client: {e}"),
        key: None,
    })
}

/// Search engine driven by a [`SourceConfig`]
///
/// Fetches the search page, applies the configured pattern and expands its
/// named groups into the download URL.
#[derive(Clone, Debug)]
pub struct HttpSource {
    name: String,
    display_name: String,
    search_url: String,
    pattern: Regex,
    download_url: String,
    cookie: Option<String>,
    client: reqwest::Client,
}

impl HttpSource {
    /// Create an engine from its configuration
    ///
    /// Fails when the pattern does not compile.
    pub fn new(config: &SourceConfig, client: reqwest::Client) -> Result<Self> {
        let pattern = Regex::new(&config.pattern).map_err(|e| {
            Error::config(
                format!("invalid pattern: {e}"),
                format!("search.sources.{}.pattern", config.name),
            )
        })?;

        Ok(Self {
            name: config.name.clone(),
            display_name: config.display_name.clone(),
            search_url: config.search_url.clone(),
            pattern,
            download_url: config.download_url.clone(),
            cookie: config.cookie.clone(),
            client,
        })
    }

    /// Search page address for a key
    pub fn search_address(&self, key: &str) -> String {
        self.search_url
            .replace("{query}", &urlencoding::encode(key))
    }

    /// Download address from the named groups of a pattern match
    fn download_address(&self, caps: &Captures<'_>) -> String {
        self.pattern
            .capture_names()
            .flatten()
            .fold(self.download_url.clone(), |url, group| {
                let value = caps.name(group).map_or("", |m| m.as_str());
                url.replace(&format!("{{{group}}}"), value)
            })
    }
}

#[async_trait]
impl NzbSource for HttpSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    async fn locate(&self, key: &str) -> Result<Option<String>> {
        let url = self.search_address(key);
        debug!(source = %self.name, url = %url, "searching");

        let mut request = self.client.get(&url);
        if let Some(cookie) = &self.cookie {
            request = request.header(reqwest::header::COOKIE, cookie);
        }
        let page = request.send().await?.text().await?;

        Ok(self
            .pattern
            .captures(&page)
            .map(|caps| self.download_address(&caps)))
    }

    async fn fetch(&self, address: &str) -> Result<Vec<u8>> {
        debug!(source = %self.name, url = %address, "downloading NZB");

        let response = self.client.get(address).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::NotFound(format!(
                "{}: HTTP {status} for {address}",
                self.name
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }
}
