//! `.twigignore` — filename patterns hidden from untracked listings.
//!
//! Format:
//! - Blank lines are ignored
//! - Lines starting with `#` are comments
//! - Every other line is a glob (`*` any run of characters, `?` exactly one)
//!   matched against the plain filename
//!
//! The working tree is flat, so there are no directory rules. Ignoring a
//! file only hides it from `status`; it does not stop `add`, and it does
//! not exempt the file from the untracked-file-in-the-way check.

use std::fs;
use std::path::Path;

/// Maximum number of patterns read from an ignore file.
const MAX_RULES: usize = 1000;
/// Patterns longer than this are skipped.
const MAX_PATTERN_LEN: usize = 1024;

/// A parsed set of ignore patterns.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    globs: Vec<String>,
}

impl IgnoreRules {
    /// Load `file_name` from the working directory root. A missing or
    /// unreadable file yields an empty rule set.
    pub fn load(root: &Path, file_name: &str) -> Self {
        match fs::read_to_string(root.join(file_name)) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    pub fn parse(content: &str) -> Self {
        let globs = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .filter(|l| l.len() <= MAX_PATTERN_LEN)
            .take(MAX_RULES)
            .map(String::from)
            .collect();
        IgnoreRules { globs }
    }

    /// Should this filename be hidden?
    pub fn is_ignored(&self, name: &str) -> bool {
        self.globs.iter().any(|g| glob_match(g, name))
    }
}

/// Simple glob matching with single-star backtracking.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|&c| c == '*')
}
