//! Registry bootstrap: builds the known-signer list by paging a Wikidata
//! SPARQL query over U.S. public figures in the configured occupations.
//!
//! The registry file is rewritten after every successful page and a meta
//! file tracks the next page, so an interrupted refresh resumes where it
//! stopped. Pages that fail all their retries are skipped; five skipped
//! pages in a row abort the refresh.

use std::fs;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use wikidata_client::WikidataClient;

use crate::registry::SignerRegistry;

/// Occupation QIDs included in the registry query.
pub const OCCUPATION_QIDS: &[(&str, &str)] = &[
    ("athlete", "Q2066131"),
    ("professional_wrestler", "Q2309784"),
    ("baseball_player", "Q10833314"),
    ("american_football_player", "Q3665646"),
    ("coach", "Q41583"),
];

const PAGE_RETRIES: u32 = 3;
const MAX_CONSECUTIVE_SKIPS: u32 = 5;

/// One page of signer labels from the knowledge base.
#[async_trait]
pub trait SignerPageSource: Send + Sync {
    async fn fetch_labels(&self, offset: u32, limit: u32) -> Result<Vec<String>>;
}

#[async_trait]
impl SignerPageSource for WikidataClient {
    async fn fetch_labels(&self, offset: u32, limit: u32) -> Result<Vec<String>> {
        let filter = OCCUPATION_QIDS
            .iter()
            .map(|(_, qid)| format!("wd:{qid}"))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!(
            r#"
            SELECT DISTINCT ?personLabel WHERE {{
                ?person wdt:P31 wd:Q5;
                        wdt:P106 ?occupation;
                        wdt:P27 wd:Q30.
                FILTER(?occupation IN ({filter}))
                SERVICE wikibase:label {{ bd:serviceParam wikibase:language "[AUTO_LANGUAGE],en". }}
            }}
            LIMIT {limit}
            OFFSET {offset}
            "#
        );

        let labels = self.sparql_values(&query, "personLabel").await?;
        Ok(labels)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct BootstrapMeta {
    last_page: u32,
}

pub struct RegistryBootstrapper<'a> {
    source: &'a dyn SignerPageSource,
    registry_path: String,
    meta_path: String,
    page_size: u32,
    retry_backoff: Duration,
    page_pace: Duration,
}

impl<'a> RegistryBootstrapper<'a> {
    pub fn new(source: &'a dyn SignerPageSource, registry_path: &str, meta_path: &str) -> Self {
        Self {
            source,
            registry_path: registry_path.to_string(),
            meta_path: meta_path.to_string(),
            page_size: 250,
            retry_backoff: Duration::from_secs(2),
            page_pace: Duration::from_secs(1),
        }
    }

    /// Shrink pages and pacing. Used by tests.
    pub fn with_pacing(mut self, page_size: u32, backoff: Duration, pace: Duration) -> Self {
        self.page_size = page_size;
        self.retry_backoff = backoff;
        self.page_pace = pace;
        self
    }

    /// Run the refresh. Returns the final registry size.
    pub async fn run(&self, full_refresh: bool) -> Result<usize> {
        let mut registry;
        let mut page;
        if full_refresh {
            info!("Full refresh, rebuilding registry from page 0");
            registry = SignerRegistry::empty();
            page = 0;
        } else {
            registry = SignerRegistry::load(&self.registry_path);
            page = self.load_meta().last_page;
            info!(page, existing = registry.len(), "Incremental refresh");
        }

        let mut consecutive_skips: u32 = 0;

        loop {
            let offset = page * self.page_size;

            match self.fetch_page_with_retries(offset).await {
                None => {
                    consecutive_skips += 1;
                    warn!(page, consecutive_skips, "Skipping page after failed attempts");
                    if consecutive_skips >= MAX_CONSECUTIVE_SKIPS {
                        warn!(
                            skipped = consecutive_skips,
                            "Aborting registry refresh, too many consecutive skipped pages"
                        );
                        break;
                    }
                }
                Some(labels) => {
                    let fetched = labels.len();
                    let added = registry.merge(labels.into_iter());
                    registry.save(&self.registry_path)?;
                    self.save_meta(page + 1)?;
                    info!(page, fetched, added, total = registry.len(), "Registry page merged");

                    if fetched < self.page_size as usize {
                        info!(page, "Short page, registry refresh complete");
                        break;
                    }
                    consecutive_skips = 0;
                }
            }

            page += 1;
            tokio::time::sleep(self.page_pace).await;
        }

        Ok(registry.len())
    }

    async fn fetch_page_with_retries(&self, offset: u32) -> Option<Vec<String>> {
        for attempt in 1..=PAGE_RETRIES {
            match self.source.fetch_labels(offset, self.page_size).await {
                Ok(labels) => return Some(labels),
                Err(e) => {
                    warn!(offset, attempt, error = %e, "Signer page fetch failed");
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
            }
        }
        None
    }

    fn load_meta(&self) -> BootstrapMeta {
        fs::read_to_string(&self.meta_path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    fn save_meta(&self, last_page: u32) -> Result<()> {
        let meta = BootstrapMeta { last_page };
        fs::write(&self.meta_path, serde_json::to_string_pretty(&meta)?)
            .with_context(|| format!("Failed to write {}", self.meta_path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    struct ScriptedSource {
        pages: Vec<Vec<&'static str>>,
        offsets: Mutex<Vec<u32>>,
        fail: bool,
    }

    impl ScriptedSource {
        fn pages(pages: Vec<Vec<&'static str>>) -> Self {
            Self {
                pages,
                offsets: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                pages: Vec::new(),
                offsets: Mutex::new(Vec::new()),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl SignerPageSource for ScriptedSource {
        async fn fetch_labels(&self, offset: u32, limit: u32) -> Result<Vec<String>> {
            self.offsets.lock().unwrap().push(offset);
            if self.fail {
                anyhow::bail!("endpoint unavailable");
            }
            let page = (offset / limit) as usize;
            Ok(self
                .pages
                .get(page)
                .map(|p| p.iter().map(|s| s.to_string()).collect())
                .unwrap_or_default())
        }
    }

    fn paths(dir: &tempfile::TempDir) -> (String, String) {
        (
            dir.path().join("signers.json").to_str().unwrap().to_string(),
            dir.path().join("meta.json").to_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn pages_merge_until_short_page() {
        let dir = tempfile::tempdir().unwrap();
        let (registry_path, meta_path) = paths(&dir);
        let source = ScriptedSource::pages(vec![vec!["Jane Doe", "John Public"], vec!["Hank Aaron"]]);

        let bootstrapper = RegistryBootstrapper::new(&source, &registry_path, &meta_path)
            .with_pacing(2, Duration::ZERO, Duration::ZERO);
        let total = bootstrapper.run(true).await.unwrap();
        assert_eq!(total, 3);

        // File is sorted, lower-cased, and reloadable.
        let registry = SignerRegistry::load(&registry_path);
        assert!(registry.match_title("hank aaron signed ball").is_some());

        let raw = std::fs::read_to_string(&registry_path).unwrap();
        let names: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(names, vec!["hank aaron", "jane doe", "john public"]);

        // Meta points past the last fully merged page.
        let meta = std::fs::read_to_string(&meta_path).unwrap();
        assert!(meta.contains("\"last_page\": 2"));
    }

    #[tokio::test]
    async fn incremental_run_resumes_from_meta() {
        let dir = tempfile::tempdir().unwrap();
        let (registry_path, meta_path) = paths(&dir);
        SignerRegistry::from_names(["jane doe"])
            .save(&registry_path)
            .unwrap();
        std::fs::write(&meta_path, r#"{"last_page": 1}"#).unwrap();

        let source = ScriptedSource::pages(vec![vec!["ignored", "ignored"], vec!["Hank Aaron"]]);
        let bootstrapper = RegistryBootstrapper::new(&source, &registry_path, &meta_path)
            .with_pacing(2, Duration::ZERO, Duration::ZERO);
        let total = bootstrapper.run(false).await.unwrap();

        // Page 0 was never re-fetched.
        assert_eq!(*source.offsets.lock().unwrap(), vec![2]);
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn persistent_failure_aborts_after_consecutive_skips() {
        let dir = tempfile::tempdir().unwrap();
        let (registry_path, meta_path) = paths(&dir);
        let source = ScriptedSource::failing();

        let bootstrapper = RegistryBootstrapper::new(&source, &registry_path, &meta_path)
            .with_pacing(2, Duration::ZERO, Duration::ZERO);
        let total = bootstrapper.run(true).await.unwrap();

        assert_eq!(total, 0);
        // 5 skipped pages x 3 attempts each.
        assert_eq!(source.offsets.lock().unwrap().len(), 15);
    }
}
