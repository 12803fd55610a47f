//! Three-way merge classification.
//!
//! Given the snapshots at the split point (the lowest common ancestor),
//! the current branch and the branch being merged in, every filename is
//! classified into one action. Classification is pure; the repository
//! applies the actions after all preconditions pass.

use crate::index::Index;

/// Opening line of a conflict block.
pub const MARKER_OURS: &str = "<<<<<<< HEAD\n";
/// Separator between the two sides.
pub const MARKER_SPLIT: &str = "=======\n";
/// Closing line of a conflict block.
pub const MARKER_THEIRS: &str = ">>>>>>>\n";

/// Terminal state of a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The target is already an ancestor of the current branch.
    Complete,
    /// The current branch was an ancestor of the target and now points at it.
    FastForward { commit: String },
    /// A two-parent merge commit was created.
    Merged { commit: String, conflict: bool },
}

impl MergeOutcome {
    pub fn has_conflict(&self) -> bool {
        matches!(self, MergeOutcome::Merged { conflict: true, .. })
    }
}

/// What the merge does with one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    /// Leave the current branch's version (or absence) in place.
    KeepCurrent,
    /// Check out the target branch's version.
    TakeTarget,
    /// Remove from the working tree and the index.
    Delete,
    /// Both sides diverged from the split point in different ways.
    Conflict,
}

/// Classify one filename from its digest in each snapshot.
///
/// - Same on both sides (including both absent): keep current.
/// - Current unchanged since the split: take whatever the target did,
///   which is a deletion if the target dropped the file.
/// - Target unchanged since the split: keep current's change.
/// - Anything else diverged: conflict.
pub fn classify(base: Option<&str>, current: Option<&str>, target: Option<&str>) -> FileAction {
    if current == target {
        return FileAction::KeepCurrent;
    }
    if base == current {
        return match target {
            Some(_) => FileAction::TakeTarget,
            None => FileAction::Delete,
        };
    }
    if base == target {
        return FileAction::KeepCurrent;
    }
    FileAction::Conflict
}

/// Every filename whose action is not [`FileAction::KeepCurrent`], in
/// filename order.
pub fn plan(base: &Index, current: &Index, target: &Index) -> Vec<(String, FileAction)> {
    let mut names: Vec<&str> = base
        .names()
        .chain(current.names())
        .chain(target.names())
        .collect();
    names.sort_unstable();
    names.dedup();

    names
        .into_iter()
        .filter_map(|name| {
            match classify(base.get(name), current.get(name), target.get(name)) {
                FileAction::KeepCurrent => None,
                action => Some((name.to_string(), action)),
            }
        })
        .collect()
}

/// Conflict file body: current's content then target's, framed by
/// markers. A missing side contributes nothing.
pub fn conflict_content(current: Option<&[u8]>, target: Option<&[u8]>) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(MARKER_OURS.as_bytes());
    out.extend_from_slice(current.unwrap_or_default());
    out.extend_from_slice(MARKER_SPLIT.as_bytes());
    out.extend_from_slice(target.unwrap_or_default());
    out.extend_from_slice(MARKER_THEIRS.as_bytes());
    out
}

/// Message recorded on a merge commit.
pub fn merge_message(target_branch: &str, current_branch: &str) -> String {
    format!("Merged {target_branch} into {current_branch}.")
}
