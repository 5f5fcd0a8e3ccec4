//! Search-page fetching: one attempt per isolated browser session, driven
//! by an explicit retry policy.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use browserless_client::{BrowserlessClient, RenderOptions};
use tracing::{info, warn};

use autograph_common::RawListing;

use crate::categories;
use crate::extract;
use crate::stealth;

/// Selector for the results container; rendering waits for it before the
/// DOM is captured.
const RESULTS_SELECTOR: &str = ".s-item";

/// Bound on navigation plus results-container wait.
const RENDER_TIMEOUT_MS: u64 = 20_000;

// --- ListingFetcher trait ---

#[async_trait]
pub trait ListingFetcher: Send + Sync {
    /// One fetch attempt for one search page. Errors are attempt failures;
    /// an Ok empty vec means the page rendered with no result cards.
    async fn fetch_page(
        &self,
        query: &str,
        category: &str,
        page: u32,
    ) -> Result<Vec<RawListing>>;

    fn name(&self) -> &str;
}

// --- Browserless-backed fetcher ---

pub struct BrowserlessFetcher {
    client: BrowserlessClient,
    proxies: Vec<String>,
}

impl BrowserlessFetcher {
    pub fn new(client: BrowserlessClient, proxies: Vec<String>) -> Self {
        Self { client, proxies }
    }
}

#[async_trait]
impl ListingFetcher for BrowserlessFetcher {
    async fn fetch_page(
        &self,
        query: &str,
        category: &str,
        page: u32,
    ) -> Result<Vec<RawListing>> {
        let category_id = categories::category_id(category)
            .with_context(|| format!("Unknown category slug: {category}"))?;
        let url = categories::build_search_url(query, category_id, page);

        let user_agent = stealth::random_user_agent();
        let proxy = stealth::random_proxy(&self.proxies);
        info!(category, page, user_agent, proxy = ?proxy, "Fetching search page");

        let opts = RenderOptions {
            user_agent: Some(user_agent.to_string()),
            proxy: proxy.map(str::to_string),
            wait_for_selector: Some(RESULTS_SELECTOR.to_string()),
            wait_timeout_ms: RENDER_TIMEOUT_MS,
            scroll_page: true,
        };

        let html = self
            .client
            .content(&url, &opts)
            .await
            .context("Render request failed")?;

        let listings = extract::parse_listings(&html, category);
        info!(category, page, count = listings.len(), "Page extracted");
        Ok(listings)
    }

    fn name(&self) -> &str {
        "browserless"
    }
}

// --- Retry policy ---

/// Bounded retries with a fixed backoff between attempts. The backoff is
/// longer than inter-page pacing so a transient block has time to clear.
/// Exhausting attempts yields an empty page, which the orchestrator reads
/// as a possible end-of-results signal.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub async fn fetch_page(
        &self,
        fetcher: &dyn ListingFetcher,
        query: &str,
        category: &str,
        page: u32,
    ) -> Vec<RawListing> {
        for attempt in 1..=self.max_attempts {
            match fetcher.fetch_page(query, category, page).await {
                Ok(listings) => return listings,
                Err(e) => {
                    warn!(
                        category,
                        page,
                        attempt,
                        fetcher = fetcher.name(),
                        error = %e,
                        "Fetch attempt failed"
                    );
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.backoff).await;
                    }
                }
            }
        }

        warn!(
            category,
            page,
            attempts = self.max_attempts,
            "Giving up on page"
        );
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Fails the first `failures` attempts, then returns one listing.
    struct FlakyFetcher {
        failures: u32,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl ListingFetcher for FlakyFetcher {
        async fn fetch_page(
            &self,
            _query: &str,
            category: &str,
            _page: u32,
        ) -> Result<Vec<RawListing>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                anyhow::bail!("render timeout");
            }
            Ok(vec![RawListing {
                title: "Jane Doe signed photo".to_string(),
                price: "$10".to_string(),
                img_url: "https://i.example/1.jpg".to_string(),
                listing_url: "https://www.example.com/itm/1".to_string(),
                category: category.to_string(),
            }])
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn first_success_short_circuits() {
        let calls = Arc::new(AtomicU32::new(0));
        let fetcher = FlakyFetcher {
            failures: 0,
            calls: calls.clone(),
        };
        let listings = policy(3).fetch_page(&fetcher, "autograph", "sports_mem", 1).await;
        assert_eq!(listings.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success_within_attempt_limit() {
        let calls = Arc::new(AtomicU32::new(0));
        let fetcher = FlakyFetcher {
            failures: 2,
            calls: calls.clone(),
        };
        let listings = policy(3).fetch_page(&fetcher, "autograph", "sports_mem", 1).await;
        assert_eq!(listings.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_yields_empty_page() {
        let calls = Arc::new(AtomicU32::new(0));
        let fetcher = FlakyFetcher {
            failures: 10,
            calls: calls.clone(),
        };
        let listings = policy(3).fetch_page(&fetcher, "autograph", "sports_mem", 1).await;
        assert!(listings.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
