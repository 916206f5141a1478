//! Configuration-driven adapter: regex link discovery plus JSON-LD extraction.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;
use rentdex_core::{ScrapedListing, SourceConfig};

use crate::adapter::{DiscoveredUrl, SourceAdapter};
use crate::client::FetchClient;
use crate::error::ScraperError;
use crate::jsonld;
use crate::progress::JobLogger;

static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*["']([^"'#]+)"#).expect("valid regex")
});

const PAGE_PLACEHOLDER: &str = "{page}";

/// Adapter for any source whose listing pages publish schema.org JSON-LD.
///
/// Discovery walks each configured index URL page by page and keeps links
/// matching `listing_url_pattern`. Paging stops early once a page yields no
/// new listing links.
pub struct GenericAdapter {
    config: SourceConfig,
    client: FetchClient,
    listing_re: Regex,
    id_re: Option<Regex>,
    max_pages: usize,
}

impl GenericAdapter {
    /// `default_max_pages` applies when the source sets no `max_pages`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidPattern`] if either configured regex
    /// does not compile.
    pub fn new(
        config: SourceConfig,
        client: FetchClient,
        default_max_pages: usize,
    ) -> Result<Self, ScraperError> {
        let invalid = |e: regex::Error| ScraperError::InvalidPattern {
            source_name: config.name.clone(),
            reason: e.to_string(),
        };
        let listing_re = Regex::new(&config.listing_url_pattern).map_err(invalid)?;
        let id_re = config
            .listing_id_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(invalid)?;
        let max_pages = config.max_pages.unwrap_or(default_max_pages).max(1);
        Ok(Self {
            config,
            client,
            listing_re,
            id_re,
            max_pages,
        })
    }

    fn listing_id(&self, url: &str) -> Option<String> {
        self.id_re
            .as_ref()?
            .captures(url)?
            .get(1)
            .map(|m| m.as_str().to_owned())
    }

    fn index_pages(&self, index_url: &str) -> Vec<String> {
        if index_url.contains(PAGE_PLACEHOLDER) {
            (1..=self.max_pages)
                .map(|page| index_url.replace(PAGE_PLACEHOLDER, &page.to_string()))
                .collect()
        } else {
            vec![index_url.to_owned()]
        }
    }
}

/// Absolute link targets found in `html`, resolved against `base`.
fn extract_links(html: &str, base: &Url) -> Vec<String> {
    HREF_RE
        .captures_iter(html)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().trim().replace("&amp;", "&"))
        .filter_map(|href| base.join(&href).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(String::from)
        .collect()
}

#[async_trait]
impl SourceAdapter for GenericAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn discover(&self, log: &dyn JobLogger) -> Result<Vec<DiscoveredUrl>, ScraperError> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        let mut last_error = None;

        for index_url in &self.config.index_urls {
            for (page, url) in self.index_pages(index_url).into_iter().enumerate() {
                let html = match self.client.fetch(&url).await {
                    Ok(Some(html)) => html,
                    Ok(None) => {
                        log.warn(&format!("index page unavailable: {url}"));
                        break;
                    }
                    Err(e) => {
                        log.warn(&format!("index page failed: {url}: {e}"));
                        last_error = Some(e);
                        break;
                    }
                };
                let Ok(base) = Url::parse(&url) else { break };

                let before = found.len();
                for link in extract_links(&html, &base) {
                    if self.listing_re.is_match(&link) && seen.insert(link.clone()) {
                        found.push(DiscoveredUrl {
                            source_listing_id: self.listing_id(&link),
                            url: link,
                        });
                    }
                }
                let added = found.len() - before;
                log.info(&format!(
                    "{} page {}: {added} new listing links",
                    self.config.name,
                    page + 1
                ));
                if added == 0 {
                    break;
                }
            }
        }

        match last_error {
            Some(e) if found.is_empty() => Err(e),
            _ => Ok(found),
        }
    }

    async fn scrape(
        &self,
        url: &str,
        log: &dyn JobLogger,
    ) -> Result<Option<ScrapedListing>, ScraperError> {
        let Some(html) = self.client.fetch(url).await? else {
            return Ok(None);
        };
        let Some(mut listing) = jsonld::extract_listing(&html) else {
            log.warn(&format!("no listing data on {url}"));
            return Ok(None);
        };

        if listing.city.is_none() {
            listing.city.clone_from(&self.config.default_city);
        }
        if let Some(id) = self.listing_id(url) {
            listing.source_listing_id = Some(id);
        }
        if let Ok(base) = Url::parse(url) {
            listing.image_urls = listing
                .image_urls
                .iter()
                .filter_map(|img| base.join(img).ok())
                .map(String::from)
                .collect();
        }
        Ok(Some(listing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_links_resolves_relative_hrefs() {
        let base = Url::parse("https://www.khmer24.com/en/property/apartment-for-rent.html").unwrap();
        let html = r##"
            <a href="/en/2br-condo-adid-101.html">one</a>
            <a class="x" href='https://www.khmer24.com/en/villa-adid-102.html?a=1&amp;b=2'>two</a>
            <a href="mailto:agent@example.com">mail</a>
            <a href="#top">top</a>
        "##;
        let links = extract_links(html, &base);
        assert_eq!(
            links,
            vec![
                "https://www.khmer24.com/en/2br-condo-adid-101.html".to_owned(),
                "https://www.khmer24.com/en/villa-adid-102.html?a=1&b=2".to_owned(),
            ]
        );
    }
}
