//! Pipeline orchestration: drives the category/page loop, applies the
//! stopping rules, and runs each page through attribution, the dedup gate,
//! and the store.
//!
//! Per category the loop is `page = 1, consecutive_failures = 0` until
//! either the failure threshold or the global result cap stops it. An
//! empty page counts as a failure; end-of-results and persistent fetch
//! failure are indistinguishable here and both stop the category.

use std::time::Duration;

use anyhow::Result;
use tracing::info;

use autograph_common::Listing;

use crate::attribution::{AttributionResolver, CONFIDENCE_EXACT};
use crate::fetcher::{ListingFetcher, RetryPolicy};
use crate::stats::RunStats;
use crate::store::{CatalogStore, UpsertOutcome};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub query: String,
    pub categories: Vec<String>,
    /// Global cap on listings collected across the whole invocation.
    pub max_results: usize,
    /// Consecutive empty pages that stop a category.
    pub failure_limit: u32,
    /// Politeness delay between page fetches.
    pub page_delay: Duration,
}

pub struct ScrapePipeline {
    store: CatalogStore,
    fetcher: Box<dyn ListingFetcher>,
    resolver: AttributionResolver,
    retry: RetryPolicy,
    settings: PipelineSettings,
}

impl ScrapePipeline {
    pub fn new(
        store: CatalogStore,
        fetcher: Box<dyn ListingFetcher>,
        resolver: AttributionResolver,
        retry: RetryPolicy,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            fetcher,
            resolver,
            retry,
            settings,
        }
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    /// Run one scrape invocation: one run row, all configured categories.
    pub async fn run(&mut self, note: &str) -> Result<RunStats> {
        let run_id = self.store.create_run(note).await?;
        info!(run_id, note, "Scrape run started");

        let mut stats = RunStats::default();
        let query = self.settings.query.clone();
        let categories = self.settings.categories.clone();

        'categories: for category in &categories {
            info!(category, "Starting category");
            let mut page: u32 = 1;
            let mut consecutive_failures: u32 = 0;

            loop {
                if stats.listings_collected as usize >= self.settings.max_results {
                    info!(
                        cap = self.settings.max_results,
                        "Result cap reached, stopping run"
                    );
                    break 'categories;
                }

                let raw = self
                    .retry
                    .fetch_page(self.fetcher.as_ref(), &query, category, page)
                    .await;
                stats.pages_fetched += 1;

                if raw.is_empty() {
                    consecutive_failures += 1;
                    stats.pages_empty += 1;
                    info!(
                        category,
                        page, consecutive_failures, "No listings found on page"
                    );
                    if consecutive_failures >= self.settings.failure_limit {
                        info!(category, page, "No more results for category");
                        break;
                    }
                } else {
                    consecutive_failures = 0;

                    let mut attributed = Vec::with_capacity(raw.len());
                    for raw_listing in raw {
                        let resolution = self.resolver.resolve(&raw_listing.title).await;
                        if resolution.is_unknown() {
                            stats.unknown_titles += 1;
                        } else if resolution.confidence == CONFIDENCE_EXACT {
                            stats.exact_matches += 1;
                        } else {
                            stats.lookup_resolved += 1;
                        }
                        attributed.push(Listing::from_raw(raw_listing, resolution));
                    }

                    let urls: Vec<String> = attributed
                        .iter()
                        .map(|l| l.listing_url.clone())
                        .collect();

                    if self.store.already_fully_known(&urls).await? {
                        stats.pages_skipped += 1;
                        info!(category, page, "Skipping page, all listings already known");
                    } else {
                        stats.listings_collected += attributed.len() as u32;
                        for listing in &attributed {
                            match self.store.upsert_listing(listing, run_id).await? {
                                UpsertOutcome::Inserted => stats.listings_stored += 1,
                                UpsertOutcome::Updated => stats.listings_updated += 1,
                                UpsertOutcome::Skipped => stats.unknown_discarded += 1,
                            }
                        }
                    }
                }

                page += 1;
                tokio::time::sleep(self.settings.page_delay).await;
            }
        }

        // End-of-run cache flush; per-lookup flushes already bounded loss.
        self.resolver.flush()?;

        info!(run_id, "Scrape run finished");
        Ok(stats)
    }
}
