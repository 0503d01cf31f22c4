//! Keyed cross-process advisory file lock (spec.md §4.2).
//!
//! Correctness depends on every signer process sharing the same
//! `locks_dir`. The lock is not re-entrant: acquiring it twice for
//! the same key from the same thread will deadlock, which is why
//! batch signing (spec.md §4.4) takes it once for the whole batch
//! rather than once per file.

use std::fs::{File, OpenOptions};
use std::path::Path;

use fs2::FileExt;

use crate::error::{Error, Result};

/// An acquired exclusive lock on `<locks_dir>/<keyid>`. Released when
/// dropped, on every exit path including panics unwinding through it.
pub struct KeyLock {
    file: File,
    keyid: String,
}

impl KeyLock {
    /// Blocks until the lock is acquired. This is a suspension point
    /// for any caller running it on a blocking-pool thread (spec.md
    /// §5).
    pub fn acquire(locks_dir: &Path, keyid: &str) -> Result<Self> {
        std::fs::create_dir_all(locks_dir)?;
        let path = locks_dir.join(keyid);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        file.lock_exclusive().map_err(|source| Error::Lock { keyid: keyid.to_string(), source })?;
        tracing::debug!(keyid, path = %path.display(), "acquired signing key lock");
        Ok(Self { file, keyid: keyid.to_string() })
    }
}

impl Drop for KeyLock {
    fn drop(&mut self) {
        if let Err(e) = fs2::FileExt::unlock(&self.file) {
            tracing::warn!(keyid = %self.keyid, error = %e, "failed to release key lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_creates_lock_file_under_locks_dir() {
        let dir = tempfile::tempdir().unwrap();
        let lock = KeyLock::acquire(dir.path(), "ABCDEF0123456789").unwrap();
        assert!(dir.path().join("ABCDEF0123456789").exists());
        drop(lock);
    }

    #[test]
    fn sequential_acquisitions_on_same_key_succeed_once_released() {
        let dir = tempfile::tempdir().unwrap();
        {
            let _lock = KeyLock::acquire(dir.path(), "KEY1").unwrap();
        }
        let _lock2 = KeyLock::acquire(dir.path(), "KEY1").unwrap();
    }
}
