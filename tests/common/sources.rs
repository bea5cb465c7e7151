//! Scripted search engines

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use nzb_monkey::{Error, NzbSource, Result};

/// What a scripted engine answers
#[derive(Clone, Debug)]
pub enum Reply {
    /// Delivers this document
    Nzb(String),
    /// Has nothing for the key
    NotFound,
    /// Download refused with an HTTP error
    Gone,
    /// Does not answer in time
    Timeout,
    /// Refuses the connection
    Refused,
}

/// Engine with a fixed answer that counts how often it was asked
pub struct ScriptedSource {
    name: String,
    reply: Reply,
    calls: Arc<AtomicUsize>,
}

impl ScriptedSource {
    /// Engine plus a handle on its call counter
    pub fn new(name: &str, reply: Reply) -> (Arc<dyn NzbSource>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = Arc::new(Self {
            name: name.to_string(),
            reply,
            calls: Arc::clone(&calls),
        });
        (source, calls)
    }
}

#[async_trait]
impl NzbSource for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn locate(&self, key: &str) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Reply::NotFound => Ok(None),
            Reply::Timeout => Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "search timed out",
            ))),
            Reply::Refused => Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))),
            Reply::Nzb(_) | Reply::Gone => Ok(Some(format!("scripted://{}/{key}", self.name))),
        }
    }

    async fn fetch(&self, address: &str) -> Result<Vec<u8>> {
        match &self.reply {
            Reply::Nzb(text) => Ok(text.clone().into_bytes()),
            _ => Err(Error::NotFound(format!("{}: HTTP 404 for {address}", self.name))),
        }
    }
}

/// Number of times an engine was asked
pub fn calls(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}
