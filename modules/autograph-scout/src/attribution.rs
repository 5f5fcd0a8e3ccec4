//! Signer attribution: maps a listing title to a signer name and a
//! confidence score.
//!
//! Two-stage resolution: an exact substring pass over the registry
//! (confidence 1.0), then a cached external entity lookup (0.75 on a
//! resolution, 0.0 for the "Unknown" sentinel). The cache is write-through
//! and flushed after every successful lookup so a killed process loses at
//! most the in-flight entry.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, warn};

use autograph_common::{Resolution, UNKNOWN_SIGNER};

use crate::registry::SignerRegistry;

pub const CONFIDENCE_EXACT: f64 = 1.0;
pub const CONFIDENCE_RESOLVED: f64 = 0.75;

/// Collapse non-word runs to single spaces, trim, lower-case. This is the
/// cache key form: "John Q. Public autograph" → "john q public autograph".
pub fn normalize_phrase(text: &str) -> String {
    let re = Regex::new(r"\W+").expect("valid regex");
    re.replace_all(text, " ").trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// External lookup seam
// ---------------------------------------------------------------------------

/// Entity search against an external knowledge base. Returns candidate
/// labels best-first; the resolver takes the first one.
#[async_trait]
pub trait NameLookup: Send + Sync {
    async fn search_name(&self, query: &str) -> Result<Vec<String>>;
}

#[async_trait]
impl NameLookup for wikidata_client::WikidataClient {
    async fn search_name(&self, query: &str) -> Result<Vec<String>> {
        let hits = self.search_entities(query).await?;
        Ok(hits.into_iter().map(|h| h.label).collect())
    }
}

// ---------------------------------------------------------------------------
// AttributionCache
// ---------------------------------------------------------------------------

/// Persisted map from normalized title phrase to a canonical name or the
/// "Unknown" sentinel. Monotonic: entries are never evicted, so a failed
/// lookup is never retried across runs.
pub struct AttributionCache {
    path: PathBuf,
    entries: HashMap<String, String>,
}

impl AttributionCache {
    /// Read the cache file; a missing or unreadable file degrades to an
    /// empty cache.
    pub fn load(path: &str) -> Self {
        let entries = match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, String>>(&raw) {
                Ok(entries) => {
                    info!(path, count = entries.len(), "Loaded attribution cache");
                    entries
                }
                Err(e) => {
                    warn!(path, error = %e, "Attribution cache unreadable, starting empty");
                    HashMap::new()
                }
            },
            Err(_) => {
                info!(path, "No attribution cache yet, starting empty");
                HashMap::new()
            }
        };

        Self {
            path: PathBuf::from(path),
            entries,
        }
    }

    pub fn get(&self, normalized: &str) -> Option<&str> {
        self.entries.get(normalized).map(|s| s.as_str())
    }

    pub fn insert(&mut self, normalized: String, resolved: String) {
        self.entries.insert(normalized, resolved);
    }

    /// Rewrite the whole cache file.
    pub fn flush(&self) -> Result<()> {
        if let Some(parent) = Path::new(&self.path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write cache to {}", self.path.display()))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// AttributionResolver
// ---------------------------------------------------------------------------

pub struct AttributionResolver {
    registry: SignerRegistry,
    cache: AttributionCache,
    lookup: Box<dyn NameLookup>,
}

impl AttributionResolver {
    pub fn new(
        registry: SignerRegistry,
        cache: AttributionCache,
        lookup: Box<dyn NameLookup>,
    ) -> Self {
        Self {
            registry,
            cache,
            lookup,
        }
    }

    /// Attribute one title. Never fails: lookup errors are logged and
    /// collapse to the "Unknown" sentinel.
    pub async fn resolve(&mut self, title: &str) -> Resolution {
        let title_lower = title.to_lowercase();
        if let Some(name) = self.registry.match_title(&title_lower) {
            return Resolution {
                name: name.to_string(),
                confidence: CONFIDENCE_EXACT,
            };
        }

        let normalized = normalize_phrase(title);
        if let Some(cached) = self.cache.get(&normalized) {
            debug!(key = normalized.as_str(), resolved = cached, "Attribution cache hit");
            if cached == UNKNOWN_SIGNER {
                return Resolution::unknown();
            }
            return Resolution {
                name: cached.to_string(),
                confidence: CONFIDENCE_RESOLVED,
            };
        }

        info!(title, "Validating name with external lookup");
        let canonical = match self.lookup.search_name(title).await {
            Ok(labels) => labels
                .first()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty()),
            Err(e) => {
                warn!(title, error = %e, "Entity lookup failed, treating as no match");
                None
            }
        };

        match canonical {
            Some(name) => {
                debug!(title, resolved = name.as_str(), "Lookup resolved");
                self.cache.insert(normalized, name.clone());
                self.flush_cache_best_effort();
                Resolution {
                    name,
                    confidence: CONFIDENCE_RESOLVED,
                }
            }
            None => {
                self.cache.insert(normalized, UNKNOWN_SIGNER.to_string());
                self.flush_cache_best_effort();
                Resolution::unknown()
            }
        }
    }

    /// End-of-run flush; failures here should be loud.
    pub fn flush(&self) -> Result<()> {
        self.cache.flush()
    }

    fn flush_cache_best_effort(&self) {
        if let Err(e) = self.cache.flush() {
            warn!(error = %e, "Failed to flush attribution cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    /// Scripted lookup that counts calls.
    struct ScriptedLookup {
        labels: Vec<String>,
        fail: bool,
        calls: Mutex<u32>,
    }

    impl ScriptedLookup {
        fn returning<S: Into<String>>(labels: Vec<S>) -> Self {
            Self {
                labels: labels.into_iter().map(Into::into).collect(),
                fail: false,
                calls: Mutex::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                labels: Vec::new(),
                fail: true,
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl NameLookup for std::sync::Arc<ScriptedLookup> {
        async fn search_name(&self, _query: &str) -> Result<Vec<String>> {
            *self.calls.lock().unwrap() += 1;
            if self.fail {
                anyhow::bail!("simulated transport error");
            }
            Ok(self.labels.clone())
        }
    }

    fn cache_in(dir: &tempfile::TempDir) -> AttributionCache {
        AttributionCache::load(dir.path().join("signer_cache.json").to_str().unwrap())
    }

    #[test]
    fn normalize_collapses_punctuation_and_case() {
        assert_eq!(
            normalize_phrase("John Q. Public autograph"),
            "john q public autograph"
        );
        assert_eq!(normalize_phrase("  a -- b  "), "a b");
    }

    #[tokio::test]
    async fn registry_match_wins_without_external_call() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = std::sync::Arc::new(ScriptedLookup::returning(vec!["Should Not Happen"]));
        let mut resolver = AttributionResolver::new(
            SignerRegistry::from_names(["jane doe"]),
            cache_in(&dir),
            Box::new(lookup.clone()),
        );

        let r = resolver.resolve("Jane Doe signed photo").await;
        assert_eq!(r.name, "jane doe");
        assert_eq!(r.confidence, 1.0);
        assert_eq!(*lookup.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn lookup_resolution_caches_under_normalized_key() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = std::sync::Arc::new(ScriptedLookup::returning(vec!["John Public"]));
        let mut resolver = AttributionResolver::new(
            SignerRegistry::empty(),
            cache_in(&dir),
            Box::new(lookup.clone()),
        );

        let r = resolver.resolve("John Q. Public autograph").await;
        assert_eq!(r.name, "John Public");
        assert_eq!(r.confidence, 0.75);

        // The flushed cache file holds the normalized key.
        let reloaded = cache_in(&dir);
        assert_eq!(reloaded.get("john q public autograph"), Some("John Public"));

        // Second resolution is served from cache.
        let r2 = resolver.resolve("John Q. Public autograph").await;
        assert_eq!(r2.name, "John Public");
        assert_eq!(*lookup.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_lookup_caches_unknown_and_never_retries() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = std::sync::Arc::new(ScriptedLookup::returning(Vec::<String>::new()));
        let mut resolver = AttributionResolver::new(
            SignerRegistry::empty(),
            cache_in(&dir),
            Box::new(lookup.clone()),
        );

        let r = resolver.resolve("Completely Obscure Name").await;
        assert!(r.is_unknown());
        assert_eq!(r.confidence, 0.0);

        let r2 = resolver.resolve("Completely Obscure Name").await;
        assert!(r2.is_unknown());
        assert_eq!(*lookup.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn transport_error_collapses_to_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = std::sync::Arc::new(ScriptedLookup::failing());
        let mut resolver = AttributionResolver::new(
            SignerRegistry::empty(),
            cache_in(&dir),
            Box::new(lookup.clone()),
        );

        let r = resolver.resolve("Some Name").await;
        assert!(r.is_unknown());

        // The failure is cached as Unknown; no inline retry on resight.
        let r2 = resolver.resolve("Some Name").await;
        assert!(r2.is_unknown());
        assert_eq!(*lookup.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn blank_first_label_is_no_match() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = std::sync::Arc::new(ScriptedLookup::returning(vec!["", "Real Name"]));
        let mut resolver = AttributionResolver::new(
            SignerRegistry::empty(),
            cache_in(&dir),
            Box::new(lookup.clone()),
        );

        // Only the first result counts; a blank label is not a resolution.
        let r = resolver.resolve("Whoever This Is").await;
        assert!(r.is_unknown());
    }
}
