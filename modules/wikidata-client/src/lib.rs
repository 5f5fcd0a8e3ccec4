pub mod error;
pub mod types;

pub use error::{Result, WikidataError};
pub use types::{EntityHit, EntitySearchResponse, SparqlResponse};

use std::time::Duration;

use tracing::debug;

const API_ENDPOINT: &str = "https://www.wikidata.org/w/api.php";
const SPARQL_ENDPOINT: &str = "https://query.wikidata.org/sparql";

/// Wikidata asks API consumers to identify themselves.
const USER_AGENT: &str = "AutographCatalogBot/0.1 (autograph catalog pipeline)";

/// Entity search requests are short lookups; SPARQL queries can scan large
/// class hierarchies and get the endpoint's full 60s allowance.
const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);
const SPARQL_TIMEOUT: Duration = Duration::from_secs(60);

pub struct WikidataClient {
    client: reqwest::Client,
}

impl WikidataClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");

        Self { client }
    }

    /// Free-text entity search via `wbsearchentities`. Returns candidate
    /// entities in relevance order; the first hit is the best match.
    pub async fn search_entities(&self, query: &str) -> Result<Vec<EntityHit>> {
        debug!(query, "Wikidata entity search");

        let resp = self
            .client
            .get(API_ENDPOINT)
            .timeout(SEARCH_TIMEOUT)
            .query(&[
                ("action", "wbsearchentities"),
                ("format", "json"),
                ("language", "en"),
                ("search", query),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(WikidataError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let data: EntitySearchResponse = resp.json().await?;
        debug!(query, hits = data.search.len(), "Entity search complete");
        Ok(data.search)
    }

    /// Run a SPARQL query and return the raw bindings.
    pub async fn sparql(&self, query: &str) -> Result<SparqlResponse> {
        let resp = self
            .client
            .get(SPARQL_ENDPOINT)
            .timeout(SPARQL_TIMEOUT)
            .query(&[("query", query), ("format", "json")])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(WikidataError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.json().await?)
    }

    /// Run a SPARQL query and pull one named variable out of every binding.
    /// Bindings missing the variable are skipped.
    pub async fn sparql_values(&self, query: &str, variable: &str) -> Result<Vec<String>> {
        let resp = self.sparql(query).await?;
        Ok(resp
            .results
            .bindings
            .into_iter()
            .filter_map(|mut b| b.remove(variable).map(|v| v.value))
            .collect())
    }
}
