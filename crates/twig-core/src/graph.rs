//! The commit graph.
//!
//! Commits are nodes in an append-only DAG, stored by digest and linked
//! only through parent digests. Every traversal loads nodes by digest and
//! uses an explicit work-stack, so long histories never recurse.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::commit::Commit;
use crate::error::{TwigError, TwigResult};
use crate::object::ObjectStore;

/// A commit together with the id it is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitEntry {
    pub id: String,
    #[serde(flatten)]
    pub commit: Commit,
}

/// Read/write access to the commit namespace (`.twig/commits/`).
#[derive(Debug, Clone)]
pub struct CommitGraph {
    store: ObjectStore,
}

impl CommitGraph {
    pub fn new(commits_dir: &Path) -> Self {
        Self {
            store: ObjectStore::new(commits_dir),
        }
    }

    /// Persist a commit and return its id.
    ///
    /// A non-root commit is refused unless all of its parents are already
    /// stored, which keeps the graph acyclic by construction.
    pub fn write(&self, commit: &Commit) -> TwigResult<String> {
        for parent in commit.parents() {
            if !self.store.exists(parent) {
                return Err(TwigError::NotFound(parent.to_string()));
            }
        }
        let id = self.store.store(&commit.to_bytes()?)?;
        debug!(commit = %id, parents = commit.parents().count(), "wrote commit");
        Ok(id)
    }

    /// Load a commit by full digest.
    pub fn read(&self, id: &str) -> TwigResult<Commit> {
        let data = self.store.retrieve(id).map_err(|e| match e {
            TwigError::NotFound(_) => TwigError::CorruptOrMissing(id.to_string()),
            other => other,
        })?;
        Commit::from_bytes(&data).map_err(|_| TwigError::CorruptOrMissing(id.to_string()))
    }

    /// Resolve a full commit id or an unambiguous prefix (≥ 4 chars).
    pub fn resolve(&self, prefix: &str) -> TwigResult<String> {
        self.store.resolve_prefix(prefix)
    }

    /// Every commit reachable from `id` through either parent, including
    /// `id` itself.
    pub fn ancestors(&self, id: &str) -> TwigResult<HashSet<String>> {
        let mut seen = HashSet::new();
        let mut stack = vec![id.to_string()];

        while let Some(current) = stack.pop() {
            if seen.contains(&current) {
                continue;
            }
            let commit = self.read(&current)?;
            stack.extend(commit.parents().map(String::from));
            seen.insert(current);
        }

        Ok(seen)
    }

    /// Depth of every ancestor of `a` and `b`: the root has depth 0, any
    /// other commit is one more than its deepest parent.
    ///
    /// Post-order over the DAG with a two-pass visit: a node stays on the
    /// stack while any parent is unresolved, and is assigned only once all
    /// of its parents are. Resolved nodes are never pushed again.
    pub fn depths(&self, a: &str, b: &str) -> TwigResult<HashMap<String, usize>> {
        let mut depth: HashMap<String, usize> = HashMap::new();
        let mut cache: HashMap<String, Commit> = HashMap::new();
        let mut stack = vec![a.to_string(), b.to_string()];

        while let Some(current) = stack.last().cloned() {
            if depth.contains_key(&current) {
                stack.pop();
                continue;
            }
            if !cache.contains_key(&current) {
                let commit = self.read(&current)?;
                cache.insert(current.clone(), commit);
            }
            let commit = &cache[&current];

            let pending: Vec<String> = commit
                .parents()
                .filter(|p| !depth.contains_key(*p))
                .map(String::from)
                .collect();

            if pending.is_empty() {
                let d = commit
                    .parents()
                    .map(|p| depth[p] + 1)
                    .max()
                    .unwrap_or(0);
                depth.insert(current, d);
                stack.pop();
            } else {
                stack.extend(pending);
            }
        }

        Ok(depth)
    }

    /// The deepest commit that is an ancestor of both `a` and `b`.
    ///
    /// Ties between equally deep candidates go to the lexicographically
    /// smallest digest, so the result never depends on argument order.
    pub fn lowest_common_ancestor(&self, a: &str, b: &str) -> TwigResult<String> {
        let depth = self.depths(a, b)?;
        let ours = self.ancestors(a)?;
        let theirs = self.ancestors(b)?;

        let lca = ours
            .intersection(&theirs)
            .max_by(|x, y| depth[*x].cmp(&depth[*y]).then_with(|| y.cmp(x)))
            .cloned()
            .ok_or_else(|| TwigError::CorruptOrMissing(format!("{a}..{b}")))?;

        debug!(%a, %b, %lca, depth = depth[&lca], "lowest common ancestor");
        Ok(lca)
    }

    /// True if `ancestor` is reachable from `descendant` (or equal to it).
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> TwigResult<bool> {
        Ok(self.ancestors(descendant)?.contains(ancestor))
    }

    /// First-parent history from `id` back to the root, newest first.
    pub fn history(&self, id: &str) -> TwigResult<Vec<CommitEntry>> {
        let mut out = Vec::new();
        let mut cursor = Some(id.to_string());
        while let Some(current) = cursor {
            let commit = self.read(&current)?;
            cursor = commit.parent.clone();
            out.push(CommitEntry {
                id: current,
                commit,
            });
        }
        Ok(out)
    }

    /// Every stored commit, ordered by digest.
    pub fn all(&self) -> TwigResult<Vec<CommitEntry>> {
        self.store
            .digests()?
            .into_iter()
            .map(|id| {
                let commit = self.read(&id)?;
                Ok(CommitEntry { id, commit })
            })
            .collect()
    }

    /// Ids of every commit whose message is exactly `message`, sorted.
    pub fn find(&self, message: &str) -> TwigResult<Vec<String>> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|e| e.commit.message == message)
            .map(|e| e.id)
            .collect())
    }
}
