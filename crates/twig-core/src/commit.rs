//! Commits — immutable snapshots in the history graph.
//!
//! A commit records the full staging index at the time it was made, a
//! message, a timestamp and up to two parents. Its identity is the digest
//! of its canonical JSON serialization, so a commit id transitively covers
//! every file content it tracks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TwigResult;
use crate::hash::hash_bytes;
use crate::index::Index;

/// Message of the root commit created by `init`.
pub const ROOT_MESSAGE: &str = "initial commit";

/// A commit record as stored in `.twig/commits/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Commit {
    /// Human-readable description of the change.
    pub message: String,
    /// When the commit was made. The root commit uses the Unix epoch.
    pub timestamp: DateTime<Utc>,
    /// First parent: the branch that was checked out. None only for the root.
    pub parent: Option<String>,
    /// Second parent: the branch merged in. Set only on merge commits.
    pub second_parent: Option<String>,
    /// Snapshot of the staging index.
    pub index: Index,
}

impl Commit {
    /// The single parentless commit created at `init`.
    pub fn root() -> Self {
        Commit {
            message: ROOT_MESSAGE.to_string(),
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            parent: None,
            second_parent: None,
            index: Index::default(),
        }
    }

    /// A new commit on top of `parent`, stamped with the current time.
    pub fn child(
        index: Index,
        message: String,
        parent: String,
        second_parent: Option<String>,
    ) -> Self {
        Commit {
            message,
            timestamp: Utc::now(),
            parent: Some(parent),
            second_parent,
            index,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_merge(&self) -> bool {
        self.second_parent.is_some()
    }

    /// First parent then second parent, whichever are present.
    pub fn parents(&self) -> impl Iterator<Item = &str> {
        self.parent
            .as_deref()
            .into_iter()
            .chain(self.second_parent.as_deref())
    }

    pub fn tracks(&self, name: &str) -> bool {
        self.index.contains(name)
    }

    /// Blob digest recorded for `name`.
    pub fn blob(&self, name: &str) -> Option<&str> {
        self.index.get(name)
    }

    /// Canonical serialization: compact JSON, fields in declaration order,
    /// index keys sorted.
    pub fn to_bytes(&self) -> TwigResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> TwigResult<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    /// The id this commit gets when stored.
    pub fn digest(&self) -> TwigResult<String> {
        Ok(hash_bytes(&self.to_bytes()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(pairs: &[(&str, &str)]) -> Index {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_root_commit() {
        let root = Commit::root();
        assert!(root.is_root());
        assert!(!root.is_merge());
        assert_eq!(root.message, ROOT_MESSAGE);
        assert_eq!(root.timestamp.timestamp(), 0);
        assert!(root.index.is_empty());
        assert_eq!(root.parents().count(), 0);
    }

    #[test]
    fn test_root_digest_is_stable() {
        assert_eq!(Commit::root().digest().unwrap(), Commit::root().digest().unwrap());
    }

    #[test]
    fn test_parents_order() {
        let c = Commit::child(
            Index::default(),
            "merge".to_string(),
            "aaaa".to_string(),
            Some("bbbb".to_string()),
        );
        assert!(c.is_merge());
        assert_eq!(c.parents().collect::<Vec<_>>(), vec!["aaaa", "bbbb"]);
    }

    #[test]
    fn test_digest_covers_file_contents() {
        let mut a = Commit::root();
        a.index = index_of(&[("f.txt", "1111")]);
        let mut b = a.clone();
        b.index = index_of(&[("f.txt", "2222")]);
        assert_ne!(a.digest().unwrap(), b.digest().unwrap());
    }

    #[test]
    fn test_digest_independent_of_insertion_order() {
        let mut a = Commit::root();
        let mut b = Commit::root();
        a.index.put("x", "1".to_string());
        a.index.put("y", "2".to_string());
        b.index.put("y", "2".to_string());
        b.index.put("x", "1".to_string());
        assert_eq!(a.digest().unwrap(), b.digest().unwrap());
    }

    #[test]
    fn test_bytes_round_trip() {
        let mut c = Commit::child(
            index_of(&[("a.txt", "abcd")]),
            "add a".to_string(),
            "ffff".to_string(),
            None,
        );
        c.timestamp = DateTime::<Utc>::UNIX_EPOCH;
        let bytes = c.to_bytes().unwrap();
        let back = Commit::from_bytes(&bytes).unwrap();
        assert_eq!(back, c);
        assert!(back.tracks("a.txt"));
        assert_eq!(back.blob("a.txt"), Some("abcd"));
    }
}
