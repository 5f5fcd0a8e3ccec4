use serde::{Deserialize, Serialize};

/// Sentinel for titles that could not be attributed to any signer.
/// Listings carrying it are discarded before storage.
pub const UNKNOWN_SIGNER: &str = "Unknown";

/// One result card as extracted from a rendered search page, before
/// attribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawListing {
    pub title: String,
    pub price: String,
    pub img_url: String,
    pub listing_url: String,
    pub category: String,
}

/// A raw listing plus its resolved signer. `listing_url` is the listing's
/// identity in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub title: String,
    pub price: String,
    pub img_url: String,
    pub listing_url: String,
    pub category: String,
    pub signer: String,
    pub confidence: f64,
}

impl Listing {
    pub fn from_raw(raw: RawListing, resolution: Resolution) -> Self {
        Self {
            title: raw.title,
            price: raw.price,
            img_url: raw.img_url,
            listing_url: raw.listing_url,
            category: raw.category,
            signer: resolution.name,
            confidence: resolution.confidence,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.signer == UNKNOWN_SIGNER
    }
}

/// Outcome of attributing one title: a signer name and how it was found.
/// Confidence is 1.0 for a registry match, 0.75 for a cache/lookup
/// resolution, 0.0 for the unknown sentinel.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub name: String,
    pub confidence: f64,
}

impl Resolution {
    pub fn unknown() -> Self {
        Self {
            name: UNKNOWN_SIGNER.to_string(),
            confidence: 0.0,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.name == UNKNOWN_SIGNER
    }
}

/// Strip query parameters and fragments from a listing URL, leaving the
/// stable scheme/host/path identity. Marketplace links carry per-impression
/// tracking params that would defeat URL-keyed dedup.
pub fn normalize_listing_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => {
            let mut clean = parsed.clone();
            clean.set_query(None);
            clean.set_fragment(None);
            clean.to_string()
        }
        Err(_) => url
            .trim()
            .split(['?', '#'])
            .next()
            .unwrap_or(url)
            .to_string(),
    }
}
