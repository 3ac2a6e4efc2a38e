//! Frontier store
//!
//! The frontier is the ordered, duplicate-free list of URLs the dispatcher
//! sweeps. It is seeded from the configuration document and checkpointed
//! back into that same document, so the config file doubles as the
//! frontier's durable state.
//!
//! The store has a single owner (the dispatcher task). Anything that needs
//! to look at the frontier concurrently gets a [`Frontier::snapshot`].

use crate::config::{write_config, Config};
use crate::PersistError;
use std::collections::HashSet;
use std::path::PathBuf;

/// The evolving set of target URLs plus the document they are persisted in
#[derive(Debug, Clone)]
pub struct Frontier {
    /// URLs in insertion order
    urls: Vec<String>,

    /// Membership index over `urls`
    seen: HashSet<String>,

    /// Every other field of the document, re-emitted unchanged on persist
    document: Config,

    /// Where the document lives
    path: PathBuf,
}

impl Frontier {
    /// Seeds a frontier from a loaded configuration
    ///
    /// Duplicate seed entries collapse onto their first occurrence.
    ///
    /// # Arguments
    ///
    /// * `config` - The loaded document
    /// * `path` - The document's location, used by [`Frontier::persist`]
    pub fn load(config: Config, path: impl Into<PathBuf>) -> Self {
        let mut frontier = Self {
            urls: Vec::with_capacity(config.urls.len()),
            seen: HashSet::with_capacity(config.urls.len()),
            document: Config {
                urls: Vec::new(),
                ..config.clone()
            },
            path: path.into(),
        };

        for url in config.urls {
            frontier.merge(&url);
        }

        frontier
    }

    /// Adds a URL if it is not already present
    ///
    /// # Returns
    ///
    /// * `true` - The URL was appended
    /// * `false` - The URL was already in the frontier; nothing changed
    pub fn merge(&mut self, url: &str) -> bool {
        if self.seen.contains(url) {
            return false;
        }

        self.seen.insert(url.to_string());
        self.urls.push(url.to_string());
        true
    }

    /// Returns a copy of the current URLs in insertion order
    pub fn snapshot(&self) -> Vec<String> {
        self.urls.clone()
    }

    /// The identities configured for this run
    pub fn identities(&self) -> &[String] {
        &self.document.user_agents
    }

    /// Number of URLs in the frontier
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    /// Returns true if the frontier holds no URLs
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// The full document as it would be persisted right now
    pub fn to_document(&self) -> Config {
        Config {
            urls: self.urls.clone(),
            ..self.document.clone()
        }
    }

    /// Rewrites the backing document with the current frontier
    ///
    /// A failure leaves the in-memory frontier untouched; it stays
    /// authoritative for the running process.
    pub fn persist(&self) -> Result<(), PersistError> {
        write_config(&self.path, &self.to_document())?;
        tracing::debug!(
            "Persisted {} URLs to {}",
            self.urls.len(),
            self.path.display()
        );
        Ok(())
    }
}
