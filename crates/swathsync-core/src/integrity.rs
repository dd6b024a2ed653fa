//! Size-based integrity check used for resumption.
//!
//! A local file is satisfied iff it exists and its length equals the size the
//! manifest advertises. There is no ledger: the filesystem is the only state,
//! so the fetcher must never leave a wrong-size file behind.
//!
//! The check is a plain stat and races with concurrent external writers
//! (two runs over the same tree). Sequential reruns are safe.

use std::fs;
use std::io;
use std::path::Path;

/// True iff `path` is an existing regular file of exactly `expected_size` bytes.
pub fn is_satisfied(path: &Path, expected_size: u64) -> bool {
    match fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.len() == expected_size,
        Err(_) => false,
    }
}

/// Delete `path` if present. A missing file is not an error.
pub fn remove_partial(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
