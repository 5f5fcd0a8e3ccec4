use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use autograph_common::Config;
use autograph_scout::attribution::{AttributionCache, AttributionResolver};
use autograph_scout::bootstrap::RegistryBootstrapper;
use autograph_scout::fetcher::{BrowserlessFetcher, RetryPolicy};
use autograph_scout::pipeline::{PipelineSettings, ScrapePipeline};
use autograph_scout::registry::SignerRegistry;
use autograph_scout::store::CatalogStore;
use browserless_client::BrowserlessClient;
use wikidata_client::WikidataClient;

#[derive(Parser)]
#[command(name = "autograph-scout", about = "Autograph listing catalog pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape the configured marketplace categories into the catalog
    Scrape {
        /// Note stored on the scrape run row
        #[arg(long, default_value = "scheduled scrape")]
        note: String,
    },
    /// Refresh the known-signer registry from Wikidata
    RefreshSigners {
        /// Discard the existing registry and rebuild from page 0
        #[arg(long)]
        full: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("autograph_scout=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_redacted();

    match cli.command.unwrap_or(Command::Scrape {
        note: "scheduled scrape".to_string(),
    }) {
        Command::Scrape { note } => run_scrape(&config, &note).await,
        Command::RefreshSigners { full } => run_refresh(&config, full).await,
    }
}

async fn run_scrape(config: &Config, note: &str) -> Result<()> {
    info!("Autograph scout starting");

    let store = CatalogStore::connect(&config.database_path).await?;
    store.ensure_schema().await?;

    let registry = SignerRegistry::load(&config.registry_path);
    if registry.is_empty() {
        warn!(
            path = config.registry_path.as_str(),
            "Signer registry is empty, every title will fall through to the external lookup"
        );
    }
    let cache = AttributionCache::load(&config.cache_path);
    let resolver = AttributionResolver::new(registry, cache, Box::new(WikidataClient::new()));

    let client = BrowserlessClient::new(
        &config.browserless_url,
        config.browserless_token.as_deref(),
    );
    let fetcher = BrowserlessFetcher::new(client, config.proxies.clone());

    let retry = RetryPolicy {
        max_attempts: config.max_fetch_attempts,
        backoff: config.retry_backoff,
    };
    let settings = PipelineSettings {
        query: config.search_query.clone(),
        categories: config.categories.clone(),
        max_results: config.max_results,
        failure_limit: config.failure_limit,
        page_delay: config.page_delay,
    };

    let mut pipeline = ScrapePipeline::new(store, Box::new(fetcher), resolver, retry, settings);
    let stats = pipeline.run(note).await?;

    info!("{stats}");
    Ok(())
}

async fn run_refresh(config: &Config, full: bool) -> Result<()> {
    info!(full, "Refreshing signer registry");

    let wikidata = WikidataClient::new();
    let bootstrapper =
        RegistryBootstrapper::new(&wikidata, &config.registry_path, &config.registry_meta_path);
    let total = bootstrapper.run(full).await?;

    info!(total, "Signer registry refreshed");
    Ok(())
}
