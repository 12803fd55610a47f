//! Branch pointers and the symbolic HEAD.
//!
//! Each branch is a file `.twig/heads/<name>` holding one commit id.
//! `.twig/HEAD` holds `heads/<name>` for the checked-out branch. These are
//! the only mutable cells besides the staging index; the commit graph
//! itself never changes.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{TwigError, TwigResult};
use crate::fsutil::{atomic_write, read_trimmed};

/// Prefix written into HEAD before the branch name.
const HEAD_PREFIX: &str = "heads/";

/// Access to `.twig/HEAD` and `.twig/heads/`.
#[derive(Debug, Clone)]
pub struct RefStore {
    head_file: PathBuf,
    heads_dir: PathBuf,
}

impl RefStore {
    pub fn new(twig_dir: &Path) -> Self {
        Self {
            head_file: twig_dir.join("HEAD"),
            heads_dir: twig_dir.join("heads"),
        }
    }

    /// Name of the branch HEAD points at.
    pub fn current_branch_name(&self) -> TwigResult<String> {
        if !self.head_file.exists() {
            return Err(TwigError::Uninitialized);
        }
        let raw = read_trimmed(&self.head_file)?;
        raw.strip_prefix(HEAD_PREFIX)
            .map(String::from)
            .ok_or(TwigError::Uninitialized)
    }

    /// Commit id of the checked-out branch (HEAD → branch → commit).
    pub fn current_commit_digest(&self) -> TwigResult<String> {
        let name = self.current_branch_name()?;
        self.branch_head(&name)
    }

    /// Commit id a branch points at.
    pub fn branch_head(&self, name: &str) -> TwigResult<String> {
        read_trimmed(&self.existing_branch_path(name)?)
    }

    pub fn branch_exists(&self, name: &str) -> bool {
        self.existing_branch_path(name).is_ok()
    }

    /// Point an existing or new branch at `digest`.
    pub fn set_branch_head(&self, name: &str, digest: &str) -> TwigResult<()> {
        let path = self.branch_path(name)?;
        fs::create_dir_all(&self.heads_dir)?;
        atomic_write(&path, digest.as_bytes())?;
        debug!(branch = name, commit = digest, "moved branch");
        Ok(())
    }

    /// Create a branch; fails if the name is taken.
    pub fn create_branch(&self, name: &str, at_digest: &str) -> TwigResult<()> {
        if self.branch_path(name)?.exists() {
            return Err(TwigError::AlreadyExists(name.to_string()));
        }
        self.set_branch_head(name, at_digest)
    }

    /// Delete a branch pointer. The commits it pointed at stay in the store.
    pub fn delete_branch(&self, name: &str) -> TwigResult<()> {
        let path = self.existing_branch_path(name)?;
        if self.current_branch_name()? == name {
            return Err(TwigError::CannotDeleteCurrentBranch(name.to_string()));
        }
        fs::remove_file(&path)?;
        debug!(branch = name, "deleted branch");
        Ok(())
    }

    /// Point HEAD at an existing branch.
    pub fn move_head(&self, name: &str) -> TwigResult<()> {
        if !self.branch_exists(name) {
            return Err(TwigError::NoSuchBranch(name.to_string()));
        }
        atomic_write(&self.head_file, format!("{HEAD_PREFIX}{name}").as_bytes())
    }

    /// All branch names, sorted.
    pub fn branches(&self) -> TwigResult<Vec<String>> {
        let mut names = Vec::new();
        if !self.heads_dir.is_dir() {
            return Ok(names);
        }
        for entry in fs::read_dir(&self.heads_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if validate_branch_name(&name).is_ok() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Path for a branch about to be written. Rejects unusable names.
    fn branch_path(&self, name: &str) -> TwigResult<PathBuf> {
        validate_branch_name(name)?;
        Ok(self.heads_dir.join(name))
    }

    /// Path of a branch that must already exist. A name that could never
    /// have been created is simply not found.
    fn existing_branch_path(&self, name: &str) -> TwigResult<PathBuf> {
        let path = self
            .branch_path(name)
            .map_err(|_| TwigError::NoSuchBranch(name.to_string()))?;
        if !path.is_file() {
            return Err(TwigError::NoSuchBranch(name.to_string()));
        }
        Ok(path)
    }
}

/// Reject names that could escape `heads/` or are awkward on disk.
pub fn validate_branch_name(name: &str) -> TwigResult<()> {
    let invalid = name.is_empty()
        || name.len() > 255
        || name.starts_with('.')
        || name.contains("..")
        || name.ends_with(".tmp")
        || name
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_whitespace() || c.is_control());
    if invalid {
        return Err(TwigError::InvalidBranchName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    const C1: &str = "1111111111111111111111111111111111111111111111111111111111111111";
    const C2: &str = "2222222222222222222222222222222222222222222222222222222222222222";

    fn refs_on_master() -> (TempDir, RefStore) {
        let dir = tempdir().unwrap();
        let refs = RefStore::new(dir.path());
        refs.set_branch_head("master", C1).unwrap();
        refs.move_head("master").unwrap();
        (dir, refs)
    }

    #[test]
    fn test_uninitialized_without_head() {
        let dir = tempdir().unwrap();
        let refs = RefStore::new(dir.path());
        assert!(matches!(
            refs.current_branch_name(),
            Err(TwigError::Uninitialized)
        ));
        assert!(matches!(
            refs.current_commit_digest(),
            Err(TwigError::Uninitialized)
        ));
    }

    #[test]
    fn test_head_dereference() {
        let (_dir, refs) = refs_on_master();
        assert_eq!(refs.current_branch_name().unwrap(), "master");
        assert_eq!(refs.current_commit_digest().unwrap(), C1);
    }

    #[test]
    fn test_create_branch_rejects_duplicates() {
        let (_dir, refs) = refs_on_master();
        refs.create_branch("dev", C2).unwrap();
        assert_eq!(refs.branch_head("dev").unwrap(), C2);
        assert!(matches!(
            refs.create_branch("dev", C1),
            Err(TwigError::AlreadyExists(_))
        ));
        assert_eq!(refs.branch_head("dev").unwrap(), C2);
    }

    #[test]
    fn test_delete_branch_rules() {
        let (_dir, refs) = refs_on_master();
        refs.create_branch("dev", C1).unwrap();

        assert!(matches!(
            refs.delete_branch("master"),
            Err(TwigError::CannotDeleteCurrentBranch(_))
        ));
        assert!(matches!(
            refs.delete_branch("nope"),
            Err(TwigError::NoSuchBranch(_))
        ));

        refs.delete_branch("dev").unwrap();
        assert_eq!(refs.branches().unwrap(), vec!["master".to_string()]);
    }

    #[test]
    fn test_move_head() {
        let (_dir, refs) = refs_on_master();
        refs.create_branch("dev", C2).unwrap();
        refs.move_head("dev").unwrap();
        assert_eq!(refs.current_branch_name().unwrap(), "dev");
        assert_eq!(refs.current_commit_digest().unwrap(), C2);
        assert!(matches!(
            refs.move_head("ghost"),
            Err(TwigError::NoSuchBranch(_))
        ));
        assert_eq!(refs.current_branch_name().unwrap(), "dev");
    }

    #[test]
    fn test_branches_sorted() {
        let (_dir, refs) = refs_on_master();
        refs.create_branch("zed", C1).unwrap();
        refs.create_branch("alpha", C1).unwrap();
        assert_eq!(refs.branches().unwrap(), vec!["alpha", "master", "zed"]);
    }

    #[test]
    fn test_invalid_name_lookups_are_not_found() {
        let (_dir, refs) = refs_on_master();
        assert!(matches!(
            refs.branch_head("a/b"),
            Err(TwigError::NoSuchBranch(_))
        ));
        assert!(matches!(
            refs.delete_branch("../HEAD"),
            Err(TwigError::NoSuchBranch(_))
        ));
        assert!(matches!(
            refs.move_head("a/b"),
            Err(TwigError::NoSuchBranch(_))
        ));
        assert!(!refs.branch_exists("a/b"));
        assert!(matches!(
            refs.create_branch("a/b", C1),
            Err(TwigError::InvalidBranchName(_))
        ));
    }

    #[test]
    fn test_validate_branch_name() {
        assert!(validate_branch_name("feature-1").is_ok());
        assert!(validate_branch_name("").is_err());
        assert!(validate_branch_name("../HEAD").is_err());
        assert!(validate_branch_name("a/b").is_err());
        assert!(validate_branch_name(".hidden").is_err());
        assert!(validate_branch_name("has space").is_err());
    }
}
