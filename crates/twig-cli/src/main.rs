//! twig CLI — the human interface to twig.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use twig_core::graph::CommitEntry;
use twig_core::reconcile::Unstaged;
use twig_core::{MergeOutcome, Repository};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "TWIG_LOG";

#[derive(Parser)]
#[command(name = "twig", about = "twig — a tiny local version-control system", version)]
struct Cli {
    /// Repository root (defaults to the current directory).
    #[arg(long, global = true)]
    repo: Option<PathBuf>,

    /// Log debug output to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a repository with a single root commit.
    Init {
        /// Name of the first branch.
        #[arg(long)]
        default_branch: Option<String>,
    },

    /// Stage a file's current contents.
    Add { file: String },

    /// Record the staging index as a new commit.
    Commit { message: String },

    /// Unstage a file, deleting it if the current commit tracks it.
    Rm { file: String },

    /// Show first-parent history of the current branch.
    Log {
        /// Output format: "human" (default) or "json".
        #[arg(long, default_value = "human")]
        format: String,
    },

    /// Show every commit ever made.
    GlobalLog {
        /// Output format: "human" (default) or "json".
        #[arg(long, default_value = "human")]
        format: String,
    },

    /// Print ids of commits with exactly this message.
    Find { message: String },

    /// Show branches, staged, removed, modified and untracked files.
    Status {
        /// Output format: "human" (default) or "json".
        #[arg(long, default_value = "human")]
        format: String,
    },

    /// `checkout <branch>`, `checkout -- <file>` or `checkout <commit> -- <file>`.
    Checkout {
        /// Branch name, or a commit id when a file follows `--`.
        target: Option<String>,

        /// File to restore.
        #[arg(last = true)]
        file: Option<String>,
    },

    /// Create a branch at the current commit.
    Branch { name: String },

    /// Delete a branch pointer.
    RmBranch { name: String },

    /// Check out a commit and move the current branch to it.
    Reset { commit: String },

    /// Merge a branch into the current branch.
    Merge { branch: String },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let root = match cli.repo {
        Some(path) => path,
        None => std::env::current_dir().unwrap_or_else(|e| {
            eprintln!("error: cannot determine current directory: {e}");
            process::exit(1);
        }),
    };

    let result = match cli.command {
        Commands::Init { default_branch } => cmd_init(&root, default_branch),
        Commands::Add { file } => cmd_add(&root, &file),
        Commands::Commit { message } => cmd_commit(&root, &message),
        Commands::Rm { file } => cmd_rm(&root, &file),
        Commands::Log { format } => cmd_log(&root, &format),
        Commands::GlobalLog { format } => cmd_global_log(&root, &format),
        Commands::Find { message } => cmd_find(&root, &message),
        Commands::Status { format } => cmd_status(&root, &format),
        Commands::Checkout { target, file } => cmd_checkout(&root, target, file),
        Commands::Branch { name } => cmd_branch(&root, &name),
        Commands::RmBranch { name } => cmd_rm_branch(&root, &name),
        Commands::Reset { commit } => cmd_reset(&root, &commit),
        Commands::Merge { branch } => cmd_merge(&root, &branch),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

/// Logs go to stderr so command output on stdout stays clean.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Abbreviated commit id for display. Ids shorter than seven characters
/// are printed whole.
fn short_id(id: &str) -> &str {
    id.get(..7).unwrap_or(id)
}

fn cmd_init(root: &Path, default_branch: Option<String>) -> CmdResult {
    let mut config = twig_core::config::RepoConfig::default();
    if let Some(branch) = default_branch {
        config.default_branch = branch;
    }
    let repo = Repository::init_with(root, config)?;
    println!(
        "initialized twig repository in .twig/ on branch {}",
        repo.config().default_branch
    );
    Ok(())
}

fn cmd_add(root: &Path, file: &str) -> CmdResult {
    Repository::open(root)?.add(file)?;
    Ok(())
}

fn cmd_commit(root: &Path, message: &str) -> CmdResult {
    let id = Repository::open(root)?.commit(message)?;
    println!("[{}] {message}", short_id(&id));
    Ok(())
}

fn cmd_rm(root: &Path, file: &str) -> CmdResult {
    Repository::open(root)?.rm(file)?;
    Ok(())
}

fn cmd_log(root: &Path, format: &str) -> CmdResult {
    let entries = Repository::open(root)?.log()?;
    print_entries(&entries, format)
}

fn cmd_global_log(root: &Path, format: &str) -> CmdResult {
    let entries = Repository::open(root)?.global_log()?;
    print_entries(&entries, format)
}

fn print_entries(entries: &[CommitEntry], format: &str) -> CmdResult {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(entries)?);
        return Ok(());
    }

    for entry in entries {
        println!("===");
        println!("commit {}", entry.id);
        if let (Some(p1), Some(p2)) = (&entry.commit.parent, &entry.commit.second_parent) {
            println!("Merge: {} {}", short_id(p1), short_id(p2));
        }
        println!(
            "Date: {}",
            entry.commit.timestamp.format("%a %b %-d %H:%M:%S %Y %z")
        );
        println!("{}", entry.commit.message);
        println!();
    }
    Ok(())
}

fn cmd_find(root: &Path, message: &str) -> CmdResult {
    let ids = Repository::open(root)?.find(message)?;
    if ids.is_empty() {
        println!("Found no commit with that message.");
    }
    for id in ids {
        println!("{id}");
    }
    Ok(())
}

fn cmd_status(root: &Path, format: &str) -> CmdResult {
    let report = Repository::open(root)?.status()?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("=== Branches ===");
    for branch in &report.branches {
        if *branch == report.current_branch {
            println!("*{branch}");
        } else {
            println!("{branch}");
        }
    }
    println!();

    println!("=== Staged Files ===");
    for name in &report.status.staged {
        println!("{name}");
    }
    println!();

    println!("=== Removed Files ===");
    for name in &report.status.removed {
        println!("{name}");
    }
    println!();

    println!("=== Modifications Not Staged For Commit ===");
    for change in &report.status.modified {
        let why = match change.kind {
            Unstaged::Modified => "modified",
            Unstaged::Deleted => "deleted",
        };
        println!("{} ({why})", change.name);
    }
    println!();

    println!("=== Untracked Files ===");
    for name in &report.status.untracked {
        println!("{name}");
    }
    println!();
    Ok(())
}

fn cmd_checkout(root: &Path, target: Option<String>, file: Option<String>) -> CmdResult {
    let repo = Repository::open(root)?;
    match (target, file) {
        (None, Some(file)) => repo.checkout_file(&file)?,
        (Some(commit), Some(file)) => repo.checkout_file_at(&commit, &file)?,
        (Some(branch), None) => repo.checkout_branch(&branch)?,
        (None, None) => return Err("usage: checkout <branch> | -- <file> | <commit> -- <file>".into()),
    }
    Ok(())
}

fn cmd_branch(root: &Path, name: &str) -> CmdResult {
    Repository::open(root)?.branch(name)?;
    Ok(())
}

fn cmd_rm_branch(root: &Path, name: &str) -> CmdResult {
    Repository::open(root)?.rm_branch(name)?;
    Ok(())
}

fn cmd_reset(root: &Path, commit: &str) -> CmdResult {
    let id = Repository::open(root)?.reset(commit)?;
    println!("HEAD is now at {}", short_id(&id));
    Ok(())
}

fn cmd_merge(root: &Path, branch: &str) -> CmdResult {
    match Repository::open(root)?.merge(branch)? {
        MergeOutcome::Complete => println!("Given branch is an ancestor of the current branch."),
        MergeOutcome::FastForward { .. } => println!("Current branch fast-forwarded."),
        MergeOutcome::Merged { conflict: true, .. } => println!("Encountered a merge conflict."),
        MergeOutcome::Merged { commit, .. } => println!("Merged as {}", short_id(&commit)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "0123456");
        assert_eq!(short_id("0123456"), "0123456");
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(short_id(""), "");
    }
}
