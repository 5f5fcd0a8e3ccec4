pub mod config;
pub mod types;

pub use config::Config;
pub use types::{normalize_listing_url, Listing, RawListing, Resolution, UNKNOWN_SIGNER};
