//! Known-signer registry: the set of public-figure names that qualify a
//! listing title for an exact match.
//!
//! Loaded once at process start from a JSON array of lower-cased names.
//! Iteration order is sorted, so the first-substring-match tie-break is
//! reproducible across runs.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

pub struct SignerRegistry {
    names: BTreeSet<String>,
}

impl SignerRegistry {
    pub fn empty() -> Self {
        Self {
            names: BTreeSet::new(),
        }
    }

    /// Read the registry file. A missing or unreadable file degrades to the
    /// empty set, which pushes every title onto the external-lookup path.
    /// Loud warning, not a crash.
    pub fn load(path: &str) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path, error = %e, "Signer registry missing, starting with empty set");
                return Self::empty();
            }
        };

        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(names) => {
                let names: BTreeSet<String> =
                    names.into_iter().map(|n| n.trim().to_lowercase()).collect();
                info!(path, count = names.len(), "Loaded signer registry");
                Self { names }
            }
            Err(e) => {
                warn!(path, error = %e, "Signer registry unreadable, starting with empty set");
                Self::empty()
            }
        }
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.into().trim().to_lowercase())
                .collect(),
        }
    }

    /// First registry name occurring as a substring of the (already
    /// lower-cased) title. Sorted iteration makes ties deterministic.
    pub fn match_title(&self, title_lower: &str) -> Option<&str> {
        self.names
            .iter()
            .find(|name| title_lower.contains(name.as_str()))
            .map(|name| name.as_str())
    }

    /// Add names, returning how many were not already present.
    pub fn merge<I>(&mut self, names: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let before = self.names.len();
        self.names
            .extend(names.into_iter().map(|n| n.trim().to_lowercase()));
        self.names.len() - before
    }

    /// Persist as a sorted JSON array, the same shape `load` reads.
    pub fn save(&self, path: &str) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let names: Vec<&String> = self.names.iter().collect();
        let json = serde_json::to_string_pretty(&names)?;
        fs::write(path, json).with_context(|| format!("Failed to write registry to {path}"))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
