use std::collections::HashMap;

use serde::Deserialize;

/// Response envelope for `wbsearchentities`.
#[derive(Debug, Deserialize)]
pub struct EntitySearchResponse {
    #[serde(default)]
    pub search: Vec<EntityHit>,
}

/// One candidate entity from `wbsearchentities`.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityHit {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Response envelope for the SPARQL query endpoint (`format=json`).
#[derive(Debug, Deserialize)]
pub struct SparqlResponse {
    pub results: SparqlResults,
}

#[derive(Debug, Deserialize)]
pub struct SparqlResults {
    #[serde(default)]
    pub bindings: Vec<HashMap<String, SparqlValue>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SparqlValue {
    #[serde(default)]
    pub value: String,
}
