//! Error types for twig operations.
//!
//! Every fallible core operation returns [`TwigResult`]. Preconditions are
//! checked before anything is written, so an `Err` means nothing on disk
//! changed.

use std::io;

use thiserror::Error;

/// All possible twig errors.
#[derive(Debug, Error)]
pub enum TwigError {
    /// No repository at this location.
    #[error("not in an initialized twig directory")]
    Uninitialized,

    /// `init` found an existing repository.
    #[error("a twig version-control system already exists in the current directory")]
    AlreadyInitialized,

    /// A blob or other stored object is missing.
    #[error("object not found: {0}")]
    NotFound(String),

    /// A commit digest is unknown or its record cannot be parsed.
    #[error("no commit with that id exists: {0}")]
    CorruptOrMissing(String),

    /// A branch with this name already exists.
    #[error("a branch with that name already exists: {0}")]
    AlreadyExists(String),

    /// The named branch does not exist.
    #[error("no such branch exists: {0}")]
    NoSuchBranch(String),

    /// The branch name cannot be used as a reference.
    #[error("invalid branch name: '{0}'")]
    InvalidBranchName(String),

    /// The staging index matches the HEAD commit.
    #[error("no changes added to the commit")]
    NoChanges,

    /// Commit message is blank.
    #[error("please enter a commit message")]
    EmptyMessage,

    /// `rm` of a file that is neither staged nor tracked.
    #[error("no reason to remove the file: {0}")]
    NothingToRemove(String),

    /// Attempt to delete the checked-out branch.
    #[error("cannot remove the current branch: {0}")]
    CannotDeleteCurrentBranch(String),

    /// Attempt to check out the branch HEAD already points at.
    #[error("no need to checkout the current branch: {0}")]
    AlreadyOnBranch(String),

    /// Untracked working files would be clobbered by a checkout or merge.
    #[error(
        "there is an untracked file in the way; delete it, or add and commit it first: {}",
        .0.join(", ")
    )]
    UntrackedFileWouldBeOverwritten(Vec<String>),

    /// A commit id prefix matched zero or several commits.
    #[error("no unique commit matches id '{0}'")]
    AmbiguousOrNotFound(String),

    /// A working file named by the caller does not exist.
    #[error("file does not exist: {0}")]
    FileNotFound(String),

    /// The commit does not track the requested file.
    #[error("file does not exist in that commit: {0}")]
    FileNotInCommit(String),

    /// A filename is not a plain name inside the working directory.
    #[error("invalid path: '{0}'")]
    InvalidPath(String),

    /// Merge of a branch into itself.
    #[error("cannot merge a branch with itself")]
    SelfMerge,

    /// Merge attempted with a staging index that differs from HEAD.
    #[error("you have uncommitted changes")]
    UncommittedChanges,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for Results in twig.
pub type TwigResult<T> = Result<T, TwigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untracked_message_lists_files() {
        let err = TwigError::UntrackedFileWouldBeOverwritten(vec![
            "a.txt".to_string(),
            "b.txt".to_string(),
        ]);
        assert!(err.to_string().ends_with("a.txt, b.txt"));
    }

    #[test]
    fn test_io_conversion() {
        let err: TwigError = io::Error::new(io::ErrorKind::Other, "disk").into();
        assert!(matches!(err, TwigError::Io(_)));
    }
}
