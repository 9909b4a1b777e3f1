//! Backup service - data directory snapshots
//!
//! Creates ZIP archives holding the encrypted store files and the config
//! files. Store files are copied as sealed bytes; a backup can only be read
//! back with the key that wrote it.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::Serialize;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use super::encryption::ENCRYPTION_FILE;
use super::ledger::STORE_FILES;
use crate::adapters::snapshot_store::write_atomic;
use crate::config::SETTINGS_FILE;
use crate::domain::BackupMetadata;

/// Config files to include in backup (relative to the data dir)
const CONFIG_FILES: &[&str] = &[SETTINGS_FILE, ENCRYPTION_FILE];

const PREFIX: &str = "mobipay-";
const PRE_RESTORE: &str = "pre-restore-";

pub struct BackupService {
    data_dir: PathBuf,
}

impl BackupService {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    fn backups_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }

    fn archived_files() -> impl Iterator<Item = &'static str> {
        STORE_FILES.iter().chain(CONFIG_FILES.iter()).copied()
    }

    fn timestamped_name(label: &str) -> String {
        let now = Utc::now();
        format!(
            "{}{}{}-{:06}.zip",
            PREFIX,
            label,
            now.format("%Y-%m-%dT%H-%M-%S"),
            now.timestamp_subsec_micros()
        )
    }

    /// Zip every present store and config file into `backups/`
    fn write_archive(&self, backup_name: &str) -> Result<u64> {
        let backups_dir = self.backups_dir();
        fs::create_dir_all(&backups_dir)?;
        let backup_path = backups_dir.join(backup_name);

        let file = File::create(&backup_path).context("Failed to create backup file")?;
        let mut zip = ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        let mut buffer = Vec::new();
        for name in Self::archived_files() {
            let path = self.data_dir.join(name);
            if !path.exists() {
                continue;
            }
            zip.start_file(name, options)?;
            buffer.clear();
            File::open(&path)?.read_to_end(&mut buffer)?;
            zip.write_all(&buffer)?;
        }
        zip.finish()?;

        Ok(fs::metadata(&backup_path)?.len())
    }

    /// Create a backup of the store and config files as a ZIP archive
    ///
    /// With `max_backups`, the oldest regular backups beyond that count are
    /// deleted afterwards. Pre-restore archives are neither counted nor pruned.
    pub fn create(&self, max_backups: Option<usize>) -> Result<BackupMetadata> {
        if max_backups == Some(0) {
            bail!("max_backups must be at least 1");
        }
        if !STORE_FILES.iter().any(|f| self.data_dir.join(f).exists()) {
            bail!("No ledger data to back up in {}", self.data_dir.display());
        }

        let backup_name = Self::timestamped_name("");
        let size_bytes = self.write_archive(&backup_name)?;

        if let Some(max) = max_backups {
            self.apply_retention(max, &backup_name)?;
        }

        Ok(BackupMetadata::new(backup_name, Utc::now(), size_bytes))
    }

    /// All backups, newest first
    pub fn list(&self) -> Result<Vec<BackupMetadata>> {
        let backups_dir = self.backups_dir();
        if !backups_dir.exists() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();
        for entry in fs::read_dir(&backups_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("zip") {
                continue;
            }
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("")
                .to_string();
            if !name.starts_with(PREFIX) {
                continue;
            }

            let size_bytes = fs::metadata(&path)?.len();
            let created_at = Self::parse_backup_time(&name);
            backups.push(BackupMetadata::new(name, created_at, size_bytes));
        }

        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(backups)
    }

    /// Parse creation time from a backup filename
    fn parse_backup_time(backup_name: &str) -> chrono::DateTime<Utc> {
        let ts = backup_name
            .strip_prefix(PREFIX)
            .map(|s| s.strip_prefix(PRE_RESTORE).unwrap_or(s))
            .and_then(|s| s.strip_suffix(".zip"));

        ts.and_then(|ts| {
            chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H-%M-%S-%f")
                .or_else(|_| chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H-%M-%S"))
                .ok()
        })
        .map(|dt| dt.and_utc())
        .unwrap_or_else(Utc::now)
    }

    /// Restore the data directory from a backup
    ///
    /// The current files are archived first as `mobipay-pre-restore-*.zip`.
    /// Store and config files absent from the archive are removed, then each
    /// archived file is replaced by atomic rename. Must not run while a ledger
    /// is open on the directory.
    ///
    /// Replacement is atomic per file, not across files. A crash part-way
    /// can leave snapshots from both sides of the restore; opening such a
    /// directory may succeed, so run `mobipay doctor` and, if it reports
    /// errors, restore again or fall back to the pre-restore archive named in
    /// the result. Removals go first so a stale journal is never replayed onto
    /// restored snapshots.
    pub fn restore(&self, backup_name: &str) -> Result<RestoreResult> {
        let backup_path = self.backups_dir().join(backup_name);
        if backup_name.contains(['/', '\\']) || !backup_path.exists() {
            bail!("Backup not found: {}", backup_name);
        }

        // Read the whole archive before touching anything
        let mut archive = ZipArchive::new(File::open(&backup_path)?)
            .with_context(|| format!("Invalid backup archive {}", backup_name))?;
        let known: HashSet<&str> = Self::archived_files().collect();
        let mut contents = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let name = entry.name().to_string();
            if !known.contains(name.as_str()) {
                bail!("Backup {} contains unexpected file {}", backup_name, name);
            }
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            contents.push((name, bytes));
        }

        let pre_restore = if Self::archived_files().any(|f| self.data_dir.join(f).exists()) {
            let name = Self::timestamped_name(PRE_RESTORE);
            self.write_archive(&name)?;
            Some(name)
        } else {
            None
        };

        let restored: HashSet<&str> = contents.iter().map(|(n, _)| n.as_str()).collect();
        let mut removed = Vec::new();
        for name in Self::archived_files() {
            let path = self.data_dir.join(name);
            if !restored.contains(name) && path.exists() {
                fs::remove_file(&path)?;
                removed.push(name.to_string());
            }
        }

        for (name, bytes) in &contents {
            write_atomic(&self.data_dir.join(name), bytes)?;
        }

        Ok(RestoreResult {
            restored: contents.into_iter().map(|(name, _)| name).collect(),
            removed,
            pre_restore,
        })
    }

    /// Delete all backups
    pub fn clear(&self) -> Result<ClearResult> {
        let backups = self.list()?;
        for backup in &backups {
            fs::remove_file(self.backups_dir().join(&backup.name))?;
        }
        Ok(ClearResult {
            deleted: backups.len(),
        })
    }

    /// Keep the newest `max_backups` regular backups, `keep` always among them
    fn apply_retention(&self, max_backups: usize, keep: &str) -> Result<()> {
        let pre_restore = format!("{}{}", PREFIX, PRE_RESTORE);
        let prunable: Vec<BackupMetadata> = self
            .list()?
            .into_iter()
            .filter(|b| !b.name.starts_with(&pre_restore) && b.name != keep)
            .collect();

        for old in prunable.iter().skip(max_backups.saturating_sub(1)) {
            fs::remove_file(self.backups_dir().join(&old.name))?;
        }

        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct ClearResult {
    pub deleted: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResult {
    pub restored: Vec<String>,
    pub removed: Vec<String>,
    /// Archive of the files the restore replaced
    pub pre_restore: Option<String>,
}
