//! BLAKE3 file hasher with streaming support.
//!
//! # Overview
//!
//! The [`Hasher`] computes two digests:
//! - a *prehash* over a configurable leading prefix of the file, used to
//!   cheaply split same-size candidates
//! - a *full hash* over the complete content, used to confirm duplication
//!
//! Both use BLAKE3, so for files no longer than the prefix the two digests are
//! identical and the pipeline can skip the second read.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::HashError;

/// A 32-byte BLAKE3 digest.
pub type Digest = [u8; 32];

/// Default prefix length for the partial digest (4 MiB).
pub const DEFAULT_PREHASH_BYTES: u64 = 4 * 1024 * 1024;

/// Upper bound for the partial digest prefix (64 MiB).
pub const MAX_PREHASH_BYTES: u64 = 64 * 1024 * 1024;

/// Read buffer for streaming.
const BUFFER_SIZE: usize = 1024 * 1024;

/// Files above this size are hashed through a memory map.
const MMAP_THRESHOLD: u64 = 64 * 1024 * 1024;

/// Streaming hasher for partial and full digests.
#[derive(Debug, Clone)]
pub struct Hasher {
    prehash_bytes: u64,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher with the default prefix length.
    #[must_use]
    pub fn new() -> Self {
        Self {
            prehash_bytes: DEFAULT_PREHASH_BYTES,
            shutdown_flag: None,
        }
    }

    /// Set the prefix length used for the partial digest.
    ///
    /// Clamped to `1..=MAX_PREHASH_BYTES`.
    #[must_use]
    pub fn with_prehash_bytes(mut self, bytes: u64) -> Self {
        self.prehash_bytes = bytes.clamp(1, MAX_PREHASH_BYTES);
        self
    }

    /// Set the shutdown flag checked between buffer reads.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Prefix length used for the partial digest.
    #[must_use]
    pub fn prehash_bytes(&self) -> u64 {
        self.prehash_bytes
    }

    /// Digest the first `prehash_bytes` of a file.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if the file cannot be opened or read, or if
    /// shutdown is requested mid-read.
    pub fn prehash(&self, path: &Path) -> Result<Digest, HashError> {
        let file = open(path)?;
        self.hash_reader(file, Some(self.prehash_bytes), path)
    }

    /// Digest the complete file.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if the file cannot be opened or read, or if
    /// shutdown is requested mid-read.
    pub fn full_hash(&self, path: &Path) -> Result<Digest, HashError> {
        let file = open(path)?;
        let len = file
            .metadata()
            .map_err(|e| HashError::from_io(path, e))?
            .len();

        if len > MMAP_THRESHOLD {
            if self.is_shutdown_requested() {
                return Err(HashError::Interrupted(path.to_path_buf()));
            }
            let mut hasher = blake3::Hasher::new();
            hasher
                .update_mmap_rayon(path)
                .map_err(|e| HashError::from_io(path, e))?;
            return Ok(*hasher.finalize().as_bytes());
        }

        self.hash_reader(file, None, path)
    }

    fn hash_reader<R: Read>(
        &self,
        mut reader: R,
        limit: Option<u64>,
        path: &Path,
    ) -> Result<Digest, HashError> {
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut remaining = limit.unwrap_or(u64::MAX);

        while remaining > 0 {
            if self.is_shutdown_requested() {
                return Err(HashError::Interrupted(path.to_path_buf()));
            }
            let want = remaining.min(BUFFER_SIZE as u64) as usize;
            let read = match reader.read(&mut buffer[..want]) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            };
            hasher.update(&buffer[..read]);
            remaining -= read as u64;
        }

        Ok(*hasher.finalize().as_bytes())
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

fn open(path: &Path) -> Result<File, HashError> {
    File::open(path).map_err(|e| HashError::from_io(path, e))
}

/// Render a digest as lowercase hex (64 characters).
#[must_use]
pub fn hash_to_hex(hash: &Digest) -> String {
    blake3::Hash::from(*hash).to_hex().to_string()
}

/// Parse a 64-character hex string back into a digest.
#[must_use]
pub fn hex_to_hash(hex: &str) -> Option<Digest> {
    blake3::Hash::from_hex(hex).ok().map(|h| *h.as_bytes())
}
