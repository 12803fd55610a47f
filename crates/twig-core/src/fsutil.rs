//! Filesystem helpers for repository metadata and the working tree.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::error::TwigResult;

/// Write data to a file atomically using temp-file-then-rename.
///
/// Used for every mutable cell (index, HEAD, branch heads) so a crash
/// leaves either the old or the new content, never a torn write.
pub fn atomic_write(path: &Path, data: &[u8]) -> TwigResult<()> {
    let tmp = path.with_extension("tmp");
    let mut file = File::create(&tmp)?;
    file.write_all(data)?;
    file.sync_data()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Read a small text file and trim trailing whitespace.
pub fn read_trimmed(path: &Path) -> TwigResult<String> {
    let raw = fs::read_to_string(path)?;
    Ok(raw.trim_end().to_string())
}

/// Remove a file if it exists. Returns true if something was removed.
pub fn remove_if_exists(path: &Path) -> TwigResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write_replaces_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("HEAD");
        atomic_write(&path, b"heads/master").unwrap();
        atomic_write(&path, b"heads/dev").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "heads/dev");
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_read_trimmed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ref");
        fs::write(&path, "abc\n").unwrap();
        assert_eq!(read_trimmed(&path).unwrap(), "abc");
    }

    #[test]
    fn test_remove_if_exists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.txt");
        assert!(!remove_if_exists(&path).unwrap());
        fs::write(&path, "x").unwrap();
        assert!(remove_if_exists(&path).unwrap());
        assert!(!path.exists());
    }
}
