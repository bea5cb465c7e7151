//! # nzb-monkey
//!
//! Finds NZB files for a release on public Usenet search engines, checks
//! whether the NZB describes a complete upload and picks the best one.
//!
//! ## Design Philosophy
//!
//! - **Never trust a single signal** - file and segment counts come from the
//!   subject lines and uploader message-IDs, with a graded verdict saying how
//!   much could actually be verified
//! - **Broken input is data** - error pages and broken XML become a malformed
//!   [`Nzb`], not an error
//! - **Library-first** - no CLI, no config file handling; consumers subscribe
//!   to [`Event`]s and install their own `tracing` subscriber
//!
//! ## Quick Start
//!
//! ```no_run
//! use nzb_monkey::{Config, NzbLink, NzbSearch, SearchQuery};
//! use nzb_monkey::sink::FileSink;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let search = NzbSearch::new(config.search.clone(), config.check.clone())?;
//!
//!     let mut events = search.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let query: SearchQuery = NzbLink::parse("nzblnk:?t=Release&h=abcdef123&p=secret")?.into();
//!     let outcome = search.search(&query).await?;
//!
//!     let path = FileSink::new(&config.sink)
//!         .write(&query.tag, query.password.as_deref(), &outcome.text)
//!         .await?;
//!     println!("saved {}", path.display());
//!     Ok(())
//! }
//! ```
//!
//! Checking a single document works without any network access:
//!
//! ```
//! use nzb_monkey::config::CheckConfig;
//! use nzb_monkey::nzb::{self, CheckResult};
//!
//! let raw = br#"<nzb><file poster="p" date="1700000000" subject="[1/1] - &quot;a.bin&quot; yEnc (1/1)">
//!   <segments><segment bytes="10" number="1">a@b</segment></segments></file></nzb>"#;
//! let mut parsed = nzb::parse(raw);
//! let result = nzb::check_completion(&mut parsed, &CheckConfig::default());
//! assert_eq!(result, CheckResult::Complete);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// NZBLNK URIs
pub mod link;
/// NZB model, parser and completeness check
pub mod nzb;
/// Multi-engine search
pub mod search;
/// Local NZB files
pub mod sink;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{CheckConfig, Config, SearchConfig, SinkConfig, SourceConfig};
pub use error::{Error, Result};
pub use link::NzbLink;
pub use nzb::{CheckResult, Nzb, NzbFile, NzbStats, Segment, check_completion, inject_password};
pub use search::{HttpSource, NzbSearch, NzbSource, select_best};
pub use types::{Candidate, Event, SearchOutcome, SearchQuery};
