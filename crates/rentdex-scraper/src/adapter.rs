//! Uniform contract every listing website implements.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use rentdex_core::ScrapedListing;

use crate::error::ScraperError;
use crate::progress::JobLogger;

/// A listing URL found during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredUrl {
    pub url: String,
    pub source_listing_id: Option<String>,
}

/// One listing website.
///
/// `scrape` returns:
///
/// - `Ok(Some(listing))` for a page that holds a listing,
/// - `Ok(None)` when the page is gone or does not describe a listing the
///   source wants indexed (the pipeline deactivates any stored copy),
/// - `Err(_)` for transient failures; the queue item is retried.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable source name, matching `SourceConfig::name`.
    fn name(&self) -> &str;

    /// Crawls the source's index pages for listing URLs.
    async fn discover(&self, log: &dyn JobLogger) -> Result<Vec<DiscoveredUrl>, ScraperError>;

    /// Extracts a single listing.
    async fn scrape(
        &self,
        url: &str,
        log: &dyn JobLogger,
    ) -> Result<Option<ScrapedListing>, ScraperError>;
}

/// Adapters keyed by source name.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: BTreeMap<String, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `adapter` under its own name, replacing any previous one.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(adapter.name().to_owned(), adapter);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.adapters.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopLogger;

    struct Fixed(&'static str);

    #[async_trait]
    impl SourceAdapter for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        async fn discover(
            &self,
            _log: &dyn JobLogger,
        ) -> Result<Vec<DiscoveredUrl>, ScraperError> {
            Ok(vec![DiscoveredUrl {
                url: format!("https://{}.example/1", self.0),
                source_listing_id: Some("1".to_owned()),
            }])
        }

        async fn scrape(
            &self,
            _url: &str,
            _log: &dyn JobLogger,
        ) -> Result<Option<ScrapedListing>, ScraperError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn registry_looks_up_by_name() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(Fixed("khmer24")));
        registry.register(Arc::new(Fixed("realestate-kh")));

        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["khmer24", "realestate-kh"]
        );

        let adapter = registry.get("khmer24").unwrap();
        let urls = adapter.discover(&NoopLogger).await.unwrap();
        assert_eq!(urls[0].url, "https://khmer24.example/1");
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn re_registering_replaces() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(Fixed("khmer24")));
        registry.register(Arc::new(Fixed("khmer24")));
        assert_eq!(registry.len(), 1);
    }
}
