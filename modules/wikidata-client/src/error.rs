use thiserror::Error;

pub type Result<T> = std::result::Result<T, WikidataError>;

#[derive(Debug, Error)]
pub enum WikidataError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for WikidataError {
    fn from(err: reqwest::Error) -> Self {
        WikidataError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for WikidataError {
    fn from(err: serde_json::Error) -> Self {
        WikidataError::Parse(err.to_string())
    }
}
