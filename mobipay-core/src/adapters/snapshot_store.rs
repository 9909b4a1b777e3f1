//! Encrypted snapshot store
//!
//! Holds one collection in memory and keeps a single encrypted file in sync
//! with it. Every write replaces the whole file through a temp file in the
//! same directory followed by an atomic rename, so the file on disk is always
//! either the previous complete snapshot or the new complete snapshot.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use chrono::Utc;
use serde::Serialize;

use super::crypto::{self, Key};
use crate::domain::result::{Error, Result};
use crate::ports::Snapshot;

/// How the in-memory collection came to be
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "origin", rename_all = "lowercase")]
pub enum StoreOrigin {
    /// No file existed; started empty
    Fresh,
    /// Decrypted and deserialized from disk
    Loaded,
    /// The file was unreadable and was moved aside on request
    Reset { quarantined: PathBuf },
}

/// Durable container for one [`Snapshot`] collection
pub struct EncryptedSnapshotStore<T: Snapshot> {
    path: PathBuf,
    key: Key,
    state: RwLock<T>,
    /// Serializes writers of this file
    write_lock: Mutex<()>,
    origin: StoreOrigin,
    /// Writes that may still succeed before every write fails
    #[cfg(test)]
    writes_allowed: std::sync::atomic::AtomicUsize,
}

impl<T: Snapshot> EncryptedSnapshotStore<T> {
    /// Open the store at `path`
    ///
    /// A missing file yields an empty collection. A file that fails
    /// authentication or does not deserialize is an error; it is never
    /// treated as empty.
    pub fn open(path: impl Into<PathBuf>, key: Key) -> Result<Self> {
        let path = path.into();
        let (state, origin) = match Self::load(&path, &key)? {
            Some(state) => (state, StoreOrigin::Loaded),
            None => (T::default(), StoreOrigin::Fresh),
        };
        Ok(Self::from_parts(path, key, state, origin))
    }

    /// Open the store, moving an unreadable file aside and starting empty
    ///
    /// This discards access to the data under the given key. The original
    /// file is kept next to the store with an `.unreadable-<timestamp>`
    /// suffix. I/O errors other than decryption/decoding still fail.
    pub fn open_discarding_unreadable(path: impl Into<PathBuf>, key: Key) -> Result<Self> {
        let path = path.into();
        match Self::load(&path, &key) {
            Ok(Some(state)) => Ok(Self::from_parts(path, key, state, StoreOrigin::Loaded)),
            Ok(None) => Ok(Self::from_parts(path, key, T::default(), StoreOrigin::Fresh)),
            Err(e) if e.is_unreadable_store() => {
                let quarantined = quarantine_path(&path);
                fs::rename(&path, &quarantined).map_err(|io| {
                    Error::persistence(format!(
                        "failed to move unreadable {} aside: {}",
                        path.display(),
                        io
                    ))
                })?;
                eprintln!(
                    "[mobipay] {} store at {} is unreadable ({}); moved to {} and starting EMPTY",
                    T::KIND,
                    path.display(),
                    e,
                    quarantined.display()
                );
                Ok(Self::from_parts(
                    path,
                    key,
                    T::default(),
                    StoreOrigin::Reset { quarantined },
                ))
            }
            Err(e) => Err(e),
        }
    }

    fn from_parts(path: PathBuf, key: Key, state: T, origin: StoreOrigin) -> Self {
        Self {
            path,
            key,
            state: RwLock::new(state),
            write_lock: Mutex::new(()),
            origin,
            #[cfg(test)]
            writes_allowed: std::sync::atomic::AtomicUsize::new(usize::MAX),
        }
    }

    /// Read and decode the file; `None` when it does not exist
    fn load(path: &Path, key: &Key) -> Result<Option<T>> {
        let sealed = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };

        let plain = crypto::open(&sealed, key).map_err(|e| match e {
            Error::Authentication(msg) => {
                Error::Authentication(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;

        let mut state: T =
            serde_json::from_slice(&plain).map_err(|e| Error::corrupt(path, e.to_string()))?;
        state
            .restore()
            .map_err(|e| Error::corrupt(path, e.to_string()))?;
        Ok(Some(state))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn origin(&self) -> &StoreOrigin {
        &self.origin
    }

    /// Current published snapshot, by value
    pub fn read(&self) -> T {
        self.view(T::clone)
    }

    /// Borrow the current published snapshot for the duration of `f`
    pub fn view<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        // Only whole snapshots are ever published, so a poisoned lock still
        // guards a consistent value.
        let guard = self.state.read().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }

    /// Apply `f` to a copy of the collection, make it durable, then publish it
    ///
    /// If `f` or the write fails, the published state is unchanged.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut T) -> Result<R>) -> Result<R> {
        let _writer = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = self.read();
        let out = f(&mut next)?;
        self.write(&next)?;
        self.publish(next);
        Ok(out)
    }

    /// Durably write `value` without publishing it
    pub fn persist(&self, value: &T) -> Result<()> {
        let _writer = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.write(value)
    }

    /// Replace the in-memory snapshot
    pub fn publish(&self, value: T) {
        let mut guard = self.state.write().unwrap_or_else(|e| e.into_inner());
        *guard = value;
    }

    fn write(&self, value: &T) -> Result<()> {
        self.take_write_permit()?;
        let plain = serde_json::to_vec(value)?;
        let sealed = crypto::seal(&plain, &self.key)?;
        write_atomic(&self.path, &sealed)
    }
}

#[cfg(test)]
impl<T: Snapshot> EncryptedSnapshotStore<T> {
    /// Let the next `n` writes through, then fail every write
    pub(crate) fn fail_writes_after(&self, n: usize) {
        self.writes_allowed
            .store(n, std::sync::atomic::Ordering::SeqCst);
    }

    fn take_write_permit(&self) -> Result<()> {
        use std::sync::atomic::Ordering;
        self.writes_allowed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map(|_| ())
            .map_err(|_| Error::persistence(format!("write to {} refused", self.path.display())))
    }
}

#[cfg(not(test))]
impl<T: Snapshot> EncryptedSnapshotStore<T> {
    #[inline(always)]
    fn take_write_permit(&self) -> Result<()> {
        Ok(())
    }
}

/// Replace `path` with `bytes` via temp file + fsync + rename
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::persistence(format!("invalid store path {}", path.display())))?;

    let fail = |stage: &str, e: std::io::Error| {
        Error::persistence(format!("{} {}: {}", stage, path.display(), e))
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{}.", name))
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| fail("create temp file for", e))?;
    tmp.write_all(bytes).map_err(|e| fail("write temp file for", e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| fail("sync temp file for", e))?;
    tmp.persist(path).map_err(|e| fail("rename temp file onto", e.error))?;

    sync_dir(dir);
    Ok(())
}

/// Flush the directory entry after a rename (best effort; the rename is already visible)
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(d) = fs::File::open(dir) {
        let _ = d.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

fn quarantine_path(path: &Path) -> PathBuf {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%6f");
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".unreadable-{}", stamp));
    path.with_file_name(name)
}
