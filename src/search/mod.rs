//! Multi-engine NZB search.
//!
//! Engines are asked one after another, lowest priority value first. Every
//! downloaded NZB is parsed and checked right away:
//!
//! - a complete NZB (all files, no missing segment) ends the search at once
//! - with `best_nzb` off, any NZB that passes the check ends the search
//! - an NZB that fails the check is kept only as a last resort, when nothing
//!   else was kept yet and `skip_failed` is off
//!
//! Engines that time out or refuse the connection are logged and skipped. The
//! best of all kept NZBs, a last-resort one included, is picked by
//! [`select::select_best`].

pub mod select;
pub mod source;

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::{CheckConfig, MAX_PRIORITY, SearchConfig};
use crate::error::{Error, Result};
use crate::nzb::{self, check_completion, inject_password};
use crate::types::{Candidate, Event, SearchOutcome, SearchQuery};

pub use select::select_best;
pub use source::{HttpSource, NzbSource};

/// Events buffered per subscriber
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// An engine and its priority
#[derive(Clone)]
struct RankedSource {
    priority: u8,
    source: Arc<dyn NzbSource>,
}

/// Searches the configured engines for the best NZB
pub struct NzbSearch {
    config: SearchConfig,
    check: CheckConfig,
    /// Enabled engines, sorted by priority (stable)
    sources: Vec<RankedSource>,
    event_tx: broadcast::Sender<Event>,
}

impl NzbSearch {
    /// Create a search over the HTTP engines of the configuration
    ///
    /// Fails when the configuration is invalid, no engine is enabled or a
    /// pattern does not compile.
    pub fn new(config: SearchConfig, check: CheckConfig) -> Result<Self> {
        config.validate()?;
        let client = source::build_client(&config)?;

        let mut sources: Vec<(u8, Arc<dyn NzbSource>)> = Vec::new();
        for (priority, group) in config.priority_groups() {
            for source_config in group {
                let source: Arc<dyn NzbSource> =
                    Arc::new(HttpSource::new(source_config, client.clone())?);
                sources.push((priority, source));
            }
        }

        Self::with_sources(config, check, sources)
    }

    /// Create a search over custom engines
    ///
    /// `config.sources` is ignored; only the policy flags apply. Engines with
    /// priority 0 are dropped.
    pub fn with_sources(
        config: SearchConfig,
        check: CheckConfig,
        sources: Vec<(u8, Arc<dyn NzbSource>)>,
    ) -> Result<Self> {
        check.validate()?;

        let mut ranked = Vec::with_capacity(sources.len());
        for (priority, source) in sources {
            if priority > MAX_PRIORITY {
                return Err(Error::config(
                    format!("priority must be between 0 and {MAX_PRIORITY}, got {priority}"),
                    format!("search.sources.{}.priority", source.name()),
                ));
            }
            if priority == 0 {
                debug!(source = %source.name(), "search engine disabled");
                continue;
            }
            ranked.push(RankedSource { priority, source });
        }

        if ranked.is_empty() {
            return Err(Error::config("no search engine enabled", "search.sources"));
        }
        ranked.sort_by_key(|r| r.priority);

        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config,
            check,
            sources: ranked,
            event_tx,
        })
    }

    /// Subscribe to search events
    ///
    /// Only events sent after subscribing are received.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Names of the enabled engines in the order they are asked
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|r| r.source.name()).collect()
    }

    fn emit_event(&self, event: Event) {
        // no subscribers is fine
        self.event_tx.send(event).ok();
    }

    /// Search all engines for the query and return the best NZB
    ///
    /// # Errors
    ///
    /// [`Error::NoNzbFound`] when no engine delivered an NZB worth keeping.
    /// Errors other than engine failures (see [`Error::is_source_failure`])
    /// abort the search.
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchOutcome> {
        let key = query.normalized_header();
        info!(
            header = %key,
            best_nzb = self.config.best_nzb,
            skip_failed = self.config.skip_failed,
            "searching NZB"
        );
        self.emit_event(Event::SearchStarted {
            header: key.clone(),
            sources: self.sources.len(),
        });

        let mut candidates: Vec<Candidate> = Vec::new();
        let mut downloaded = 0usize;
        let mut queried = 0usize;
        let mut found_complete = false;

        for ranked in &self.sources {
            let name = ranked.source.name();

            if found_complete {
                debug!(source = %name, "skipped, complete NZB found");
                self.emit_event(Event::SourceSkipped {
                    source: name.to_string(),
                });
                continue;
            }

            queried += 1;
            info!(
                source = %name,
                engine = %ranked.source.display_name(),
                priority = ranked.priority,
                "asking search engine"
            );
            self.emit_event(Event::SourceQueried {
                source: name.to_string(),
                priority: ranked.priority,
            });

            let started = Instant::now();
            let raw = match download(ranked.source.as_ref(), &key).await {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    info!(source = %name, "not found");
                    self.emit_event(Event::SourceNotFound {
                        source: name.to_string(),
                    });
                    continue;
                }
                Err(e) if e.is_source_failure() => {
                    warn!(source = %name, kind = e.kind_label(), error = %e, "search engine failed");
                    self.emit_event(Event::SourceFailed {
                        source: name.to_string(),
                        error: e.to_string(),
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };
            let fetch_time = started.elapsed();

            let raw = nzb::decode_document(&raw).into_owned();
            let mut parsed = nzb::parse(raw.as_bytes());
            let result = check_completion(&mut parsed, &self.check);
            self.emit_event(Event::Checked {
                source: name.to_string(),
                result,
                files_missing: parsed.stats.files_missing,
                missing_percent: parsed.stats.segments_missing_percent,
            });

            let candidate = Candidate {
                source: name.to_string(),
                order: downloaded,
                raw,
                nzb: parsed,
                result,
                fetch_time,
            };
            downloaded += 1;

            if candidate.is_success() {
                let stop = !self.config.best_nzb || candidate.is_complete();
                candidates.push(candidate);
                if stop {
                    info!(source = %name, "NZB accepted, stopping search");
                    found_complete = true;
                }
            } else if candidates.is_empty() && !self.config.skip_failed {
                debug!(source = %name, "keeping failed NZB as last resort");
                candidates.push(candidate);
            }
        }

        self.finish(query, candidates, queried)
    }

    /// Select among the kept candidates and prepare the document
    fn finish(
        &self,
        query: &SearchQuery,
        candidates: Vec<Candidate>,
        sources_queried: usize,
    ) -> Result<SearchOutcome> {
        let count = candidates.len();

        let Some(selected) = select_best(candidates) else {
            warn!(sources_queried, "no NZB downloaded");
            self.emit_event(Event::NothingFound { sources_queried });
            return Err(Error::NoNzbFound { sources_queried });
        };

        if selected.is_success() {
            info!(
                source = %selected.source,
                result = %selected.result,
                candidates = count,
                "using NZB"
            );
        } else {
            warn!(
                source = %selected.source,
                result = %selected.result,
                "using NZB that failed the completeness check"
            );
        }
        self.emit_event(Event::Selected {
            source: selected.source.clone(),
            result: selected.result,
            candidates: count,
        });

        let (text, password_injected) = match query.password.as_deref() {
            Some(password) => match inject_password(&selected.raw, password) {
                Ok(text) => {
                    let injected = text != selected.raw;
                    (text, injected)
                }
                Err(e) => {
                    warn!(error = %e, "password not injected");
                    (selected.raw.clone(), false)
                }
            },
            None => (selected.raw.clone(), false),
        };

        Ok(SearchOutcome {
            selected,
            text,
            password_injected,
            candidates: count,
            sources_queried,
        })
    }
}

/// Locate and download in one go; `None` when the engine has nothing
async fn download(source: &dyn NzbSource, key: &str) -> Result<Option<Vec<u8>>> {
    let Some(address) = source.locate(key).await? else {
        return Ok(None);
    };
    debug!(source = %source.name(), address = %address, "NZB located");
    source.fetch(&address).await.map(Some)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Fixed {
        name: &'static str,
        body: Option<&'static str>,
    }

    #[async_trait]
    impl NzbSource for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn locate(&self, _key: &str) -> Result<Option<String>> {
            Ok(self.body.map(|_| format!("mock://{}", self.name)))
        }

        async fn fetch(&self, _address: &str) -> Result<Vec<u8>> {
            Ok(self.body.unwrap_or_default().as_bytes().to_vec())
        }
    }

    const COMPLETE: &str = r#"<nzb><file poster="p" date="1700000000" subject="[1/1] - &quot;a.bin&quot; yEnc (1/1)"><groups><group>a.b.c</group></groups><segments><segment bytes="10" number="1">a@b</segment></segments></file></nzb>"#;

    fn fixed(name: &'static str, body: Option<&'static str>) -> Arc<dyn NzbSource> {
        Arc::new(Fixed { name, body })
    }

    #[test]
    fn engines_are_ordered_by_priority_and_disabled_ones_dropped() {
        let search = NzbSearch::with_sources(
            SearchConfig::default(),
            CheckConfig::default(),
            vec![
                (2, fixed("late", None)),
                (0, fixed("off", None)),
                (1, fixed("early", None)),
                (2, fixed("later", None)),
            ],
        )
        .unwrap();
        assert_eq!(search.source_names(), vec!["early", "late", "later"]);
    }

    #[test]
    fn priority_above_nine_is_rejected() {
        let result = NzbSearch::with_sources(
            SearchConfig::default(),
            CheckConfig::default(),
            vec![(10, fixed("x", None))],
        );
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn only_disabled_engines_is_a_configuration_error() {
        let result = NzbSearch::with_sources(
            SearchConfig::default(),
            CheckConfig::default(),
            vec![(0, fixed("x", None))],
        );
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[tokio::test]
    async fn default_configuration_builds_http_engines() {
        let search = NzbSearch::new(SearchConfig::default(), CheckConfig::default()).unwrap();
        assert_eq!(search.source_names().len(), 5);
    }

    #[tokio::test]
    async fn nothing_found_reports_queried_engines() {
        let search = NzbSearch::with_sources(
            SearchConfig::default(),
            CheckConfig::default(),
            vec![(1, fixed("a", None)), (2, fixed("b", None))],
        )
        .unwrap();
        let mut events = search.subscribe();

        let err = search
            .search(&SearchQuery::new("t", "h"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoNzbFound { sources_queried: 2 }), "got {err:?}");

        let mut last = None;
        while let Ok(event) = events.try_recv() {
            last = Some(event);
        }
        assert_eq!(last, Some(Event::NothingFound { sources_queried: 2 }));
    }

    #[tokio::test]
    async fn complete_nzb_gets_password_injected() {
        let search = NzbSearch::with_sources(
            SearchConfig::default(),
            CheckConfig::default(),
            vec![(1, fixed("a", Some(COMPLETE)))],
        )
        .unwrap();

        let outcome = search
            .search(&SearchQuery::new("t", "h").with_password("pw"))
            .await
            .unwrap();
        assert!(outcome.is_success());
        assert!(outcome.password_injected);
        assert_eq!(nzb::parse(outcome.text.as_bytes()).password(), Some("pw"));
    }

    #[tokio::test]
    async fn refused_password_keeps_the_document() {
        let search = NzbSearch::with_sources(
            SearchConfig::default(),
            CheckConfig::default(),
            vec![(1, fixed("a", Some(COMPLETE)))],
        )
        .unwrap();

        let outcome = search
            .search(&SearchQuery::new("t", "h").with_password("a<b"))
            .await
            .unwrap();
        assert!(!outcome.password_injected);
        assert_eq!(outcome.text, COMPLETE);
    }
}
