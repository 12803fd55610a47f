//! Reconciling the staging index, the HEAD commit and the working tree.
//!
//! The working tree is flat: only plain files directly inside the
//! repository root are considered. Nothing here caches file state; every
//! question about the working tree is answered by reading and re-hashing.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::TwigResult;
use crate::fsutil::remove_if_exists;
use crate::hash::hash_bytes;
use crate::ignore::IgnoreRules;
use crate::index::Index;
use crate::object::ObjectStore;

/// Why a tracked file counts as modified but not staged.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Unstaged {
    /// Working content differs from the staged digest.
    Modified,
    /// Staged file is missing from the working tree.
    Deleted,
}

/// A tracked file whose working copy diverges from the index.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct UnstagedChange {
    pub name: String,
    pub kind: Unstaged,
}

/// The four status categories, each sorted by filename.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Status {
    /// In the index but absent or different in HEAD.
    pub staged: Vec<String>,
    /// In HEAD but absent from the index.
    pub removed: Vec<String>,
    /// Tracked by the index, changed or missing on disk.
    pub modified: Vec<UnstagedChange>,
    /// On disk but neither staged nor tracked by HEAD.
    pub untracked: Vec<String>,
}

impl Status {
    /// True if nothing is staged, removed or modified. Untracked files do
    /// not count.
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

/// Plain files directly inside `root`, sorted by name.
pub fn list_working_files(root: &Path) -> Vec<String> {
    WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.file_name().to_str().map(String::from))
        .collect()
}

/// Hash the working copy of `name`, or None if it is not a readable file.
pub fn working_digest(root: &Path, name: &str) -> Option<String> {
    let path = root.join(name);
    let meta = fs::symlink_metadata(&path).ok()?;
    if !meta.file_type().is_file() {
        return None;
    }
    fs::read(&path).ok().map(|c| hash_bytes(&c))
}

/// Classify every file against the index and HEAD's recorded index.
pub fn diff_status(index: &Index, head: &Index, root: &Path, rules: &IgnoreRules) -> Status {
    let staged = index
        .entries()
        .filter(|(name, digest)| head.get(name) != Some(*digest))
        .map(|(name, _)| name.to_string())
        .collect();

    let removed = head
        .names()
        .filter(|name| !index.contains(name))
        .map(String::from)
        .collect();

    let working: BTreeSet<String> = list_working_files(root).into_iter().collect();

    let mut modified = Vec::new();
    for (name, digest) in index.entries() {
        if !working.contains(name) {
            modified.push(UnstagedChange {
                name: name.to_string(),
                kind: Unstaged::Deleted,
            });
        } else if working_digest(root, name).as_deref() != Some(digest) {
            modified.push(UnstagedChange {
                name: name.to_string(),
                kind: Unstaged::Modified,
            });
        }
    }

    let untracked = working
        .into_iter()
        .filter(|name| !index.contains(name) && !head.contains(name))
        .filter(|name| !rules.is_ignored(name))
        .collect();

    Status {
        staged,
        removed,
        modified,
        untracked,
    }
}

/// Names tracked by `target` whose working-tree entry must not be
/// replaced: anything not staged and not tracked by HEAD, whatever its
/// type, plus any directory or symlink even if the name is tracked.
///
/// Entries are inspected with `symlink_metadata`, so a link is judged as
/// the link itself and never through its target.
pub fn untracked_in_the_way(root: &Path, index: &Index, head: &Index, target: &Index) -> Vec<String> {
    target
        .names()
        .filter(|name| match fs::symlink_metadata(root.join(name)) {
            Ok(meta) => {
                let known = index.contains(name) || head.contains(name);
                !known || !meta.file_type().is_file()
            }
            Err(_) => false,
        })
        .map(String::from)
        .collect()
}

/// Names whose working-tree entry exists but is not a regular file, so
/// it can be neither removed with `remove_file` nor safely overwritten.
pub fn non_file_entries<'a, I>(root: &Path, names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut blocked: Vec<String> = names
        .into_iter()
        .filter(|name| {
            fs::symlink_metadata(root.join(name))
                .map(|meta| !meta.file_type().is_file())
                .unwrap_or(false)
        })
        .map(String::from)
        .collect();
    blocked.sort();
    blocked.dedup();
    blocked
}

/// Working-tree edits needed to move from HEAD's snapshot to `target`'s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutPlan {
    /// Files tracked by HEAD but not by the target.
    pub delete: Vec<String>,
    /// `(name, blob digest)` to write from the target.
    pub write: Vec<(String, String)>,
}

impl CheckoutPlan {
    /// A target file is written if HEAD does not track it, tracks a
    /// different digest, or it is missing from the working tree.
    pub fn new(root: &Path, head: &Index, target: &Index) -> Self {
        let delete = head
            .names()
            .filter(|name| !target.contains(name))
            .map(String::from)
            .collect();

        let write = target
            .entries()
            .filter(|(name, digest)| {
                head.get(name) != Some(*digest) || !root.join(name).is_file()
            })
            .map(|(name, digest)| (name.to_string(), digest.to_string()))
            .collect();

        CheckoutPlan { delete, write }
    }

    /// Entries the plan would delete or overwrite that are not regular
    /// files. Must be empty before [`apply`](Self::apply) is called.
    pub fn blocked(&self, root: &Path) -> Vec<String> {
        non_file_entries(
            root,
            self.delete
                .iter()
                .map(String::as_str)
                .chain(self.write.iter().map(|(name, _)| name.as_str())),
        )
    }

    /// Read every blob the plan writes. Done before any mutation so a
    /// missing object aborts the checkout with the tree untouched.
    pub fn load_blobs(&self, objects: &ObjectStore) -> TwigResult<Vec<(String, Vec<u8>)>> {
        self.write
            .iter()
            .map(|(name, digest)| Ok((name.clone(), objects.retrieve(digest)?)))
            .collect()
    }

    /// Apply deletions, then write the preloaded blobs.
    pub fn apply(&self, root: &Path, blobs: &[(String, Vec<u8>)]) -> TwigResult<()> {
        for name in &self.delete {
            remove_if_exists(&root.join(name))?;
        }
        for (name, content) in blobs {
            fs::write(root.join(name), content)?;
        }
        debug!(
            deleted = self.delete.len(),
            written = blobs.len(),
            "applied checkout plan"
        );
        Ok(())
    }
}
