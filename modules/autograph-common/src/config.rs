use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Rendering service
    pub browserless_url: String,
    pub browserless_token: Option<String>,

    // File layout
    pub database_path: String,
    pub registry_path: String,
    pub registry_meta_path: String,
    pub cache_path: String,

    // Scrape shape
    pub search_query: String,
    pub categories: Vec<String>,
    pub max_results: usize,
    pub max_fetch_attempts: u32,
    pub failure_limit: u32,

    // Pacing. The retry backoff is deliberately longer than the page delay
    // so a transient block has time to clear before the next attempt.
    pub page_delay: Duration,
    pub retry_backoff: Duration,

    // Identity rotation
    pub proxies: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            browserless_url: required_env("BROWSERLESS_URL"),
            browserless_token: env::var("BROWSERLESS_TOKEN").ok(),
            database_path: env::var("AUTOGRAPH_DB_PATH")
                .unwrap_or_else(|_| "database/autographs.db".to_string()),
            registry_path: env::var("SIGNER_REGISTRY_PATH")
                .unwrap_or_else(|_| "config/known_signers.json".to_string()),
            registry_meta_path: env::var("SIGNER_REGISTRY_META_PATH")
                .unwrap_or_else(|_| "config/signers_meta.json".to_string()),
            cache_path: env::var("ATTRIBUTION_CACHE_PATH")
                .unwrap_or_else(|_| "config/signer_cache.json".to_string()),
            search_query: env::var("SEARCH_QUERY").unwrap_or_else(|_| "autograph".to_string()),
            categories: env::var("CATEGORIES")
                .unwrap_or_else(|_| "sports_mem".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            max_results: parsed_env("MAX_RESULTS", 5000),
            max_fetch_attempts: parsed_env("MAX_FETCH_ATTEMPTS", 3),
            failure_limit: parsed_env("FAILURE_LIMIT", 3),
            page_delay: Duration::from_secs(parsed_env("PAGE_DELAY_SECS", 30)),
            retry_backoff: Duration::from_secs(parsed_env("RETRY_BACKOFF_SECS", 60)),
            proxies: env::var("PROXY_LIST")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

impl Config {
    /// Log the effective configuration without leaking the service token.
    pub fn log_redacted(&self) {
        tracing::info!(
            browserless_url = self.browserless_url.as_str(),
            token_set = self.browserless_token.is_some(),
            database = self.database_path.as_str(),
            registry = self.registry_path.as_str(),
            cache = self.cache_path.as_str(),
            query = self.search_query.as_str(),
            categories = ?self.categories,
            max_results = self.max_results,
            proxies = self.proxies.len(),
            "Configuration loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(v) => v
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a number")),
        Err(_) => default,
    }
}
