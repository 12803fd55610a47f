//! Content-addressable object store.
//!
//! Objects live under a 2-character prefix directory scheme (like git):
//! digest `abcdef...` is stored at `ab/cdef...`. The store is append-only;
//! there is no update or delete. twig keeps two stores, one for blobs
//! (`.twig/objects/`) and one for commit records (`.twig/commits/`).

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{TwigError, TwigResult};
use crate::hash::{hash_bytes, is_full_digest, is_hex_prefix, MIN_PREFIX_LEN};

/// A directory of immutable, digest-keyed objects.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    root: PathBuf,
}

impl ObjectStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            root: dir.to_path_buf(),
        }
    }

    /// Store bytes and return their digest.
    ///
    /// Writes only if no object with that digest exists yet; storing the
    /// same content twice returns the same digest and touches nothing.
    pub fn store(&self, data: &[u8]) -> TwigResult<String> {
        let hash = hash_bytes(data);
        let path = self.object_path(&hash);

        if path.exists() {
            return Ok(hash);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, data)?;
        debug!(digest = %hash, bytes = data.len(), "stored object");
        Ok(hash)
    }

    /// Retrieve an object by its full digest.
    pub fn retrieve(&self, hash: &str) -> TwigResult<Vec<u8>> {
        if !is_full_digest(hash) {
            return Err(TwigError::NotFound(hash.to_string()));
        }
        let path = self.object_path(hash);
        if !path.exists() {
            return Err(TwigError::NotFound(hash.to_string()));
        }
        Ok(fs::read(&path)?)
    }

    pub fn exists(&self, hash: &str) -> bool {
        is_full_digest(hash) && self.object_path(hash).exists()
    }

    /// Resolve a full digest or an unambiguous prefix of at least
    /// [`MIN_PREFIX_LEN`] characters.
    pub fn resolve_prefix(&self, prefix: &str) -> TwigResult<String> {
        let not_found = || TwigError::AmbiguousOrNotFound(prefix.to_string());

        if prefix.len() < MIN_PREFIX_LEN || !is_hex_prefix(prefix) {
            return Err(not_found());
        }
        if is_full_digest(prefix) {
            return if self.exists(prefix) {
                Ok(prefix.to_string())
            } else {
                Err(not_found())
            };
        }

        let (dir_part, rest) = prefix.split_at(2);
        let fan_dir = self.root.join(dir_part);
        if !fan_dir.is_dir() {
            return Err(not_found());
        }

        let mut matches = Vec::new();
        for entry in fs::read_dir(&fan_dir)? {
            let name = entry?.file_name().to_string_lossy().to_string();
            if name.starts_with(rest) {
                matches.push(format!("{dir_part}{name}"));
            }
        }

        match matches.len() {
            1 => Ok(matches.remove(0)),
            _ => Err(not_found()),
        }
    }

    /// Every stored digest, sorted.
    pub fn digests(&self) -> TwigResult<Vec<String>> {
        let mut out = Vec::new();
        if !self.root.is_dir() {
            return Ok(out);
        }
        for fan in fs::read_dir(&self.root)? {
            let fan = fan?;
            if !fan.file_type()?.is_dir() {
                continue;
            }
            let prefix = fan.file_name().to_string_lossy().to_string();
            for obj in fs::read_dir(fan.path())? {
                let name = obj?.file_name().to_string_lossy().to_string();
                let digest = format!("{prefix}{name}");
                if is_full_digest(&digest) {
                    out.push(digest);
                }
            }
        }
        out.sort();
        Ok(out)
    }

    /// Filesystem path for a digest: `ab/cdef...`.
    fn object_path(&self, hash: &str) -> PathBuf {
        let (prefix, rest) = hash.split_at(2);
        self.root.join(prefix).join(rest)
    }
}
