//! Repository — the main entry point for twig operations.
//!
//! A Repository ties together the blob store, the commit graph, branch
//! references and the staging index, and drives the reconciler and merge
//! engine against the working tree.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::commit::Commit;
use crate::config::RepoConfig;
use crate::error::{TwigError, TwigResult};
use crate::fsutil::remove_if_exists;
use crate::graph::{CommitEntry, CommitGraph};
use crate::ignore::IgnoreRules;
use crate::index::Index;
use crate::merge::{self, FileAction, MergeOutcome};
use crate::object::ObjectStore;
use crate::reconcile::{self, CheckoutPlan, Status};
use crate::refs::{validate_branch_name, RefStore};

/// The `.twig` directory name.
pub const TWIG_DIR: &str = ".twig";

/// A twig repository.
///
/// Operations are synchronous and take no locks. Running two twig
/// invocations against the same repository at once is unsupported and can
/// leave the index or branch pointers inconsistent.
pub struct Repository {
    /// Root of the working directory (where `.twig/` lives).
    root: PathBuf,
    /// Path to the `.twig/` directory.
    twig_dir: PathBuf,
    /// File contents, keyed by digest.
    objects: ObjectStore,
    /// Commit records, keyed by digest.
    graph: CommitGraph,
    /// HEAD and branch pointers.
    refs: RefStore,
    config: RepoConfig,
}

/// Everything `status` prints.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusReport {
    pub current_branch: String,
    /// All branches, sorted; includes the current one.
    pub branches: Vec<String>,
    #[serde(flatten)]
    pub status: Status,
}

impl Repository {
    /// Initialize a new repository in `root` with default settings.
    pub fn init(root: &Path) -> TwigResult<Self> {
        Self::init_with(root, RepoConfig::default())
    }

    /// Initialize a new repository.
    ///
    /// Creates the `.twig/` layout, the root commit and the default branch,
    /// and points HEAD at it.
    pub fn init_with(root: &Path, config: RepoConfig) -> TwigResult<Self> {
        let twig_dir = root.join(TWIG_DIR);
        if twig_dir.exists() {
            return Err(TwigError::AlreadyInitialized);
        }
        validate_branch_name(&config.default_branch)?;

        fs::create_dir_all(twig_dir.join("objects"))?;
        fs::create_dir_all(twig_dir.join("commits"))?;
        fs::create_dir_all(twig_dir.join("heads"))?;
        config.save(&twig_dir.join("config.json"))?;
        Index::default().save(&twig_dir.join("index.json"))?;

        let graph = CommitGraph::new(&twig_dir.join("commits"));
        let root_id = graph.write(&Commit::root())?;
        let refs = RefStore::new(&twig_dir);
        refs.set_branch_head(&config.default_branch, &root_id)?;
        refs.move_head(&config.default_branch)?;

        info!(root = %root.display(), branch = %config.default_branch, "initialized repository");
        Self::open(root)
    }

    /// Open an existing repository rooted at `root`.
    pub fn open(root: &Path) -> TwigResult<Self> {
        let twig_dir = root.join(TWIG_DIR);
        if !twig_dir.is_dir() {
            return Err(TwigError::Uninitialized);
        }

        let config = RepoConfig::load(&twig_dir.join("config.json"))?;

        Ok(Self {
            root: root.to_path_buf(),
            objects: ObjectStore::new(&twig_dir.join("objects")),
            graph: CommitGraph::new(&twig_dir.join("commits")),
            refs: RefStore::new(&twig_dir),
            twig_dir,
            config,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn current_branch(&self) -> TwigResult<String> {
        self.refs.current_branch_name()
    }

    /// The commit the current branch points at.
    pub fn head(&self) -> TwigResult<CommitEntry> {
        let id = self.refs.current_commit_digest()?;
        let commit = self.graph.read(&id)?;
        Ok(CommitEntry { id, commit })
    }

    /// The staging index as currently persisted.
    pub fn index(&self) -> TwigResult<Index> {
        Index::load(&self.index_path())
    }

    /// Stage the working copy of `name`. Returns its blob digest.
    pub fn add(&self, name: &str) -> TwigResult<String> {
        let path = self.validate_filename(name)?;
        // Only regular files are snapshotted; symlinks are never followed.
        let is_file = fs::symlink_metadata(&path)
            .map(|meta| meta.file_type().is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(TwigError::FileNotFound(name.to_string()));
        }
        let mut index = self.index()?;
        let content = fs::read(&path)?;
        let digest = self.objects.store(&content)?;
        index.put(name, digest.clone());
        index.save(&self.index_path())?;
        debug!(file = name, blob = %digest, "staged");
        Ok(digest)
    }

    /// Unstage `name`. If HEAD tracks it, the working copy is deleted too
    /// so the next commit drops it.
    pub fn rm(&self, name: &str) -> TwigResult<()> {
        let path = self.validate_filename(name)?;
        let mut index = self.index()?;
        let head = self.head()?;

        let was_staged = index.remove(name).is_some();
        let tracked = head.commit.tracks(name);
        if !was_staged && !tracked {
            return Err(TwigError::NothingToRemove(name.to_string()));
        }

        if tracked {
            remove_if_exists(&path)?;
        }
        index.save(&self.index_path())?;
        debug!(file = name, tracked, "removed");
        Ok(())
    }

    /// Snapshot the staging index as a new commit on the current branch.
    pub fn commit(&self, message: &str) -> TwigResult<String> {
        let index = self.index()?;
        let branch = self.refs.current_branch_name()?;
        let head = self.head()?;

        if index == head.commit.index {
            return Err(TwigError::NoChanges);
        }
        if message.trim().is_empty() {
            return Err(TwigError::EmptyMessage);
        }

        let commit = Commit::child(index, message.to_string(), head.id, None);
        let id = self.graph.write(&commit)?;
        self.refs.set_branch_head(&branch, &id)?;
        info!(commit = %id, branch = %branch, files = commit.index.len(), "committed");
        Ok(id)
    }

    /// First-parent history of the current branch, newest first.
    pub fn log(&self) -> TwigResult<Vec<CommitEntry>> {
        let head = self.refs.current_commit_digest()?;
        self.graph.history(&head)
    }

    /// Every commit ever made, ordered by id.
    pub fn global_log(&self) -> TwigResult<Vec<CommitEntry>> {
        self.graph.all()
    }

    /// Ids of commits whose message is exactly `message`.
    pub fn find(&self, message: &str) -> TwigResult<Vec<String>> {
        self.graph.find(message)
    }

    pub fn status(&self) -> TwigResult<StatusReport> {
        let index = self.index()?;
        let head = self.head()?;
        let status = reconcile::diff_status(
            &index,
            &head.commit.index,
            &self.root,
            &self.ignore_rules(),
        );
        Ok(StatusReport {
            current_branch: self.refs.current_branch_name()?,
            branches: self.refs.branches()?,
            status,
        })
    }

    /// Overwrite the working copy of `name` with HEAD's version. The
    /// staging index is left alone.
    pub fn checkout_file(&self, name: &str) -> TwigResult<()> {
        let head = self.head()?;
        self.restore_file(&head.commit, name)
    }

    /// Overwrite the working copy of `name` with its version in the commit
    /// identified by `commit_prefix`.
    pub fn checkout_file_at(&self, commit_prefix: &str, name: &str) -> TwigResult<()> {
        let id = self.graph.resolve(commit_prefix)?;
        let commit = self.graph.read(&id)?;
        self.restore_file(&commit, name)
    }

    /// Switch to another branch, rewriting the working tree and index to
    /// its head commit.
    pub fn checkout_branch(&self, name: &str) -> TwigResult<()> {
        let target = self.refs.branch_head(name)?;
        if self.refs.current_branch_name()? == name {
            return Err(TwigError::AlreadyOnBranch(name.to_string()));
        }
        self.checkout_commit(&target)?;
        self.refs.move_head(name)?;
        info!(branch = name, commit = %target, "switched branch");
        Ok(())
    }

    /// Make the working tree and staging index match commit `target_id`.
    ///
    /// Does not move any reference. Nothing is written unless every
    /// precondition holds and every needed blob could be read.
    pub fn checkout_commit(&self, target_id: &str) -> TwigResult<CheckoutPlan> {
        let target = self.graph.read(target_id)?;
        let head = self.head()?;
        let index = self.index()?;

        let plan = CheckoutPlan::new(&self.root, &head.commit.index, &target.index);
        let mut in_the_way =
            reconcile::untracked_in_the_way(&self.root, &index, &head.commit.index, &target.index);
        in_the_way.extend(plan.blocked(&self.root));
        in_the_way.sort();
        in_the_way.dedup();
        if !in_the_way.is_empty() {
            return Err(TwigError::UntrackedFileWouldBeOverwritten(in_the_way));
        }

        let blobs = plan.load_blobs(&self.objects)?;
        plan.apply(&self.root, &blobs)?;
        target.index.save(&self.index_path())?;
        debug!(commit = target_id, "checked out commit");
        Ok(plan)
    }

    /// Check out the commit named by `commit_prefix` and move the current
    /// branch to it. Returns the full commit id.
    pub fn reset(&self, commit_prefix: &str) -> TwigResult<String> {
        let id = self.graph.resolve(commit_prefix)?;
        let branch = self.refs.current_branch_name()?;
        self.checkout_commit(&id)?;
        self.refs.set_branch_head(&branch, &id)?;
        info!(branch = %branch, commit = %id, "reset branch");
        Ok(id)
    }

    /// Create a branch at the current commit. HEAD does not move.
    pub fn branch(&self, name: &str) -> TwigResult<()> {
        let head = self.refs.current_commit_digest()?;
        self.refs.create_branch(name, &head)?;
        info!(branch = name, commit = %head, "created branch");
        Ok(())
    }

    /// Delete a branch pointer. Its commits remain in the graph.
    pub fn rm_branch(&self, name: &str) -> TwigResult<()> {
        self.refs.delete_branch(name)?;
        info!(branch = name, "deleted branch");
        Ok(())
    }

    /// Merge `target_branch` into the current branch.
    ///
    /// Preconditions, in order: no uncommitted changes, target exists,
    /// target is not the current branch. A diverged merge always records a
    /// two-parent commit, even when it produced conflicts.
    pub fn merge(&self, target_branch: &str) -> TwigResult<MergeOutcome> {
        let index = self.index()?;
        let current_branch = self.refs.current_branch_name()?;
        let head = self.head()?;

        if index != head.commit.index {
            return Err(TwigError::UncommittedChanges);
        }
        let target_id = self.refs.branch_head(target_branch)?;
        if target_branch == current_branch {
            return Err(TwigError::SelfMerge);
        }

        let split = self.graph.lowest_common_ancestor(&head.id, &target_id)?;
        debug!(current = %head.id, target = %target_id, split = %split, "found split point");

        if split == target_id {
            info!(target = target_branch, "given branch is an ancestor of the current branch");
            return Ok(MergeOutcome::Complete);
        }
        if split == head.id {
            self.checkout_commit(&target_id)?;
            self.refs.set_branch_head(&current_branch, &target_id)?;
            info!(branch = %current_branch, commit = %target_id, "fast-forwarded");
            return Ok(MergeOutcome::FastForward { commit: target_id });
        }

        let target = self.graph.read(&target_id)?;
        let base = self.graph.read(&split)?;

        let in_the_way =
            reconcile::untracked_in_the_way(&self.root, &index, &head.commit.index, &target.index);
        if !in_the_way.is_empty() {
            return Err(TwigError::UntrackedFileWouldBeOverwritten(in_the_way));
        }

        // Read everything the merge writes before touching the tree.
        let mut writes: Vec<(String, Vec<u8>)> = Vec::new();
        let mut deletes: Vec<String> = Vec::new();
        let mut conflicted: Vec<String> = Vec::new();
        for (name, action) in merge::plan(&base.index, &head.commit.index, &target.index) {
            match action {
                FileAction::KeepCurrent => {}
                FileAction::TakeTarget => {
                    let digest = target
                        .blob(&name)
                        .ok_or_else(|| TwigError::FileNotInCommit(name.clone()))?;
                    writes.push((name, self.objects.retrieve(digest)?));
                }
                FileAction::Delete => deletes.push(name),
                FileAction::Conflict => {
                    let ours = self.blob_content(&head.commit, &name)?;
                    let theirs = self.blob_content(&target, &name)?;
                    let content = merge::conflict_content(ours.as_deref(), theirs.as_deref());
                    conflicted.push(name.clone());
                    writes.push((name, content));
                }
            }
        }

        let blocked = reconcile::non_file_entries(
            &self.root,
            deletes
                .iter()
                .map(String::as_str)
                .chain(writes.iter().map(|(name, _)| name.as_str())),
        );
        if !blocked.is_empty() {
            return Err(TwigError::UntrackedFileWouldBeOverwritten(blocked));
        }

        let mut merged = head.commit.index.clone();
        for name in &deletes {
            remove_if_exists(&self.root.join(name))?;
            merged.remove(name);
        }
        for (name, content) in &writes {
            let digest = self.objects.store(content)?;
            fs::write(self.root.join(name), content)?;
            merged.put(name, digest);
        }
        merged.save(&self.index_path())?;

        let message = merge::merge_message(target_branch, &current_branch);
        let commit = Commit::child(merged, message, head.id, Some(target_id));
        let id = self.graph.write(&commit)?;
        self.refs.set_branch_head(&current_branch, &id)?;

        let conflict = !conflicted.is_empty();
        if conflict {
            warn!(files = ?conflicted, "encountered a merge conflict");
        }
        info!(commit = %id, branch = %current_branch, target = target_branch, conflict, "merged");
        Ok(MergeOutcome::Merged {
            commit: id,
            conflict,
        })
    }

    fn restore_file(&self, commit: &Commit, name: &str) -> TwigResult<()> {
        let path = self.validate_filename(name)?;
        let digest = commit
            .blob(name)
            .ok_or_else(|| TwigError::FileNotInCommit(name.to_string()))?;
        let content = self.objects.retrieve(digest)?;
        let blocked = reconcile::non_file_entries(&self.root, [name]);
        if !blocked.is_empty() {
            return Err(TwigError::UntrackedFileWouldBeOverwritten(blocked));
        }
        fs::write(&path, content)?;
        debug!(file = name, blob = digest, "restored file");
        Ok(())
    }

    fn blob_content(&self, commit: &Commit, name: &str) -> TwigResult<Option<Vec<u8>>> {
        commit
            .blob(name)
            .map(|digest| self.objects.retrieve(digest))
            .transpose()
    }

    fn ignore_rules(&self) -> IgnoreRules {
        IgnoreRules::load(&self.root, &self.config.ignore_file)
    }

    fn index_path(&self) -> PathBuf {
        self.twig_dir.join("index.json")
    }

    /// Validate a working-tree filename and return its absolute path.
    ///
    /// The working tree is flat, so only a bare filename is accepted: no
    /// separators, not `.` or `..`, and never the metadata directory.
    fn validate_filename(&self, name: &str) -> TwigResult<PathBuf> {
        let invalid = name.is_empty()
            || name == "."
            || name == ".."
            || name == TWIG_DIR
            || name.chars().any(|c| c == '/' || c == '\\' || c.is_control());
        if invalid {
            return Err(TwigError::InvalidPath(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}


#[cfg(test)]
mod checkout_tests {
    use super::tests::{commit_file, read, write};
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_checkout_file_from_head() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        commit_file(&repo, "a.txt", "committed", "add a");

        write(&repo, "a.txt", "scribbled");
        repo.add("a.txt").unwrap();
        repo.checkout_file("a.txt").unwrap();

        assert_eq!(read(&repo, "a.txt"), "committed");
        // The index is untouched, so the scribble is still staged.
        assert_eq!(repo.status().unwrap().status.staged, vec!["a.txt"]);
    }

    #[test]
    fn test_checkout_file_at_prefix() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let c1 = commit_file(&repo, "a.txt", "v1", "one");
        commit_file(&repo, "a.txt", "v2", "two");

        repo.checkout_file_at(&c1[..8], "a.txt").unwrap();
        assert_eq!(read(&repo, "a.txt"), "v1");
    }

    #[test]
    fn test_checkout_file_errors() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let c1 = commit_file(&repo, "a.txt", "v1", "one");

        assert!(matches!(
            repo.checkout_file("nope.txt"),
            Err(TwigError::FileNotInCommit(_))
        ));
        assert!(matches!(
            repo.checkout_file_at(&c1, "nope.txt"),
            Err(TwigError::FileNotInCommit(_))
        ));
        assert!(matches!(
            repo.checkout_file_at("0000000", "a.txt"),
            Err(TwigError::AmbiguousOrNotFound(_))
        ));
        assert!(matches!(
            repo.checkout_file_at("zz", "a.txt"),
            Err(TwigError::AmbiguousOrNotFound(_))
        ));
    }

    #[test]
    fn test_checkout_branch_rewrites_tree() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        commit_file(&repo, "shared.txt", "base", "base");
        repo.branch("other").unwrap();
        commit_file(&repo, "master_only.txt", "m", "master work");
        commit_file(&repo, "shared.txt", "master edit", "master edit");

        repo.checkout_branch("other").unwrap();
        assert_eq!(repo.current_branch().unwrap(), "other");
        assert_eq!(read(&repo, "shared.txt"), "base");
        assert!(!dir.path().join("master_only.txt").exists());
        assert!(repo.status().unwrap().status.is_clean());

        repo.checkout_branch("master").unwrap();
        assert_eq!(read(&repo, "shared.txt"), "master edit");
        assert_eq!(read(&repo, "master_only.txt"), "m");
    }

    #[test]
    fn test_checkout_branch_errors() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        assert!(matches!(
            repo.checkout_branch("ghost"),
            Err(TwigError::NoSuchBranch(_))
        ));
        assert!(matches!(
            repo.checkout_branch("master"),
            Err(TwigError::AlreadyOnBranch(_))
        ));
    }

    #[test]
    fn test_untracked_file_blocks_checkout() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        repo.branch("other").unwrap();
        commit_file(&repo, "a.txt", "master", "add a");
        commit_file(&repo, "b.txt", "master", "add b");
        repo.checkout_branch("other").unwrap();
        assert!(!dir.path().join("a.txt").exists());

        write(&repo, "a.txt", "precious");
        write(&repo, "b.txt", "precious too");
        let err = repo.checkout_branch("master").unwrap_err();
        match err {
            TwigError::UntrackedFileWouldBeOverwritten(names) => {
                assert_eq!(names, vec!["a.txt", "b.txt"]);
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(read(&repo, "a.txt"), "precious");
        assert_eq!(repo.current_branch().unwrap(), "other");
        assert!(repo.index().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_blocks_checkout() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let victim = outside.path().join("victim.txt");
        fs::write(&victim, "precious outside data").unwrap();

        let repo = Repository::init(dir.path()).unwrap();
        repo.branch("other").unwrap();
        commit_file(&repo, "link.txt", "tracked on master", "add link.txt");
        repo.checkout_branch("other").unwrap();
        std::os::unix::fs::symlink(&victim, dir.path().join("link.txt")).unwrap();

        assert!(matches!(
            repo.checkout_branch("master"),
            Err(TwigError::UntrackedFileWouldBeOverwritten(_))
        ));
        assert_eq!(fs::read_to_string(&victim).unwrap(), "precious outside data");
        assert_eq!(repo.current_branch().unwrap(), "other");
    }

    #[cfg(unix)]
    #[test]
    fn test_checkout_file_does_not_follow_symlink() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let victim = outside.path().join("victim.txt");
        fs::write(&victim, "precious outside data").unwrap();

        let repo = Repository::init(dir.path()).unwrap();
        commit_file(&repo, "a.txt", "committed", "add a");
        fs::remove_file(dir.path().join("a.txt")).unwrap();
        std::os::unix::fs::symlink(&victim, dir.path().join("a.txt")).unwrap();

        assert!(matches!(
            repo.checkout_file("a.txt"),
            Err(TwigError::UntrackedFileWouldBeOverwritten(_))
        ));
        assert_eq!(fs::read_to_string(&victim).unwrap(), "precious outside data");
    }

    #[test]
    fn test_directory_blocks_checkout_before_any_change() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        repo.branch("other").unwrap();
        commit_file(&repo, "a.txt", "a", "add a");
        commit_file(&repo, "z.txt", "z", "add z");
        repo.checkout_branch("other").unwrap();
        commit_file(&repo, "old.txt", "old", "other adds old");
        let index_before = repo.index().unwrap();
        fs::create_dir(dir.path().join("z.txt")).unwrap();

        match repo.checkout_branch("master").unwrap_err() {
            TwigError::UntrackedFileWouldBeOverwritten(names) => {
                assert_eq!(names, vec!["z.txt"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(read(&repo, "old.txt"), "old");
        assert!(!dir.path().join("a.txt").exists());
        assert!(dir.path().join("z.txt").is_dir());
        assert_eq!(repo.current_branch().unwrap(), "other");
        assert_eq!(repo.index().unwrap(), index_before);
    }

    #[test]
    fn test_checkout_commit_then_status_is_clean() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let c1 = commit_file(&repo, "a.txt", "1", "one");
        commit_file(&repo, "b.txt", "2", "two");
        fs::remove_file(dir.path().join("a.txt")).unwrap();

        repo.checkout_commit(&c1).unwrap();
        let status = repo.status().unwrap().status;
        assert!(status.staged.is_empty());
        assert!(status.modified.is_empty());
        // HEAD did not move, so b.txt reads as staged for removal.
        assert_eq!(status.removed, vec!["b.txt"]);
        assert!(!dir.path().join("b.txt").exists());
        assert_eq!(read(&repo, "a.txt"), "1");
    }

    #[test]
    fn test_reset_moves_branch() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let c1 = commit_file(&repo, "a.txt", "1", "one");
        commit_file(&repo, "a.txt", "2", "two");
        commit_file(&repo, "b.txt", "b", "three");

        let id = repo.reset(&c1[..6]).unwrap();
        assert_eq!(id, c1);
        assert_eq!(repo.head().unwrap().id, c1);
        assert_eq!(read(&repo, "a.txt"), "1");
        assert!(!dir.path().join("b.txt").exists());
        assert!(repo.status().unwrap().status.is_clean());
    }
}
