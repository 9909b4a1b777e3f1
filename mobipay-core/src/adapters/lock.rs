//! Data-directory lock
//!
//! One process at a time may open a data directory. The lock is an exclusive
//! advisory lock on `<dir>/.lock`, released when the guard is dropped or the
//! process exits.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::domain::result::{Error, Result};

pub const LOCK_FILE: &str = ".lock";

/// Held for as long as the data directory is open
#[derive(Debug)]
pub struct DataDirLock {
    path: PathBuf,
    _file: File,
}

impl DataDirLock {
    /// Take the lock without waiting; fails with [`Error::Locked`] if another
    /// process holds it
    pub fn acquire(dir: &Path) -> Result<Self> {
        let path = dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        file.try_lock_exclusive().map_err(|e| {
            Error::Locked(format!(
                "{} is in use by another process ({})",
                dir.display(),
                e
            ))
        })?;

        Ok(Self { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let dir = tempdir().unwrap();
        let first = DataDirLock::acquire(dir.path()).unwrap();
        assert!(first.path().exists());

        let err = DataDirLock::acquire(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Locked(_)));

        drop(first);
        assert!(DataDirLock::acquire(dir.path()).is_ok());
    }
}
