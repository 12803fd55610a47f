//! Staging index.
//!
//! The index maps filenames to the blob digests staged for the next
//! commit. It is stored as `.twig/index.json`. Entries are kept in a
//! `BTreeMap` so two logically equal indexes always serialize (and so
//! hash) identically.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TwigResult;
use crate::fsutil::atomic_write;

/// Filename → blob digest, in canonical (lexicographic) order.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Index {
    entries: BTreeMap<String, String>,
}

impl Index {
    /// Load the index from a JSON file, or return an empty index.
    pub fn load(path: &Path) -> TwigResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Save the index to a JSON file (atomic: temp + fsync + rename).
    pub fn save(&self, path: &Path) -> TwigResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        atomic_write(path, json.as_bytes())
    }

    /// Stage `digest` as the content of `name`, replacing any previous entry.
    pub fn put(&mut self, name: &str, digest: String) {
        self.entries.insert(name.to_string(), digest);
    }

    /// Unstage a file, returning the digest it had.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// `(name, digest)` pairs in canonical order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for Index {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Index {
            entries: iter.into_iter().collect(),
        }
    }
}
