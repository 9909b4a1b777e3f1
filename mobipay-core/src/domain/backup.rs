//! Backup domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for a backup archive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMetadata {
    /// Archive filename (e.g., "mobipay-2025-01-15T10-30-00-000000.zip")
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
}

impl BackupMetadata {
    pub fn new(name: impl Into<String>, created_at: DateTime<Utc>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            created_at,
            size_bytes,
        }
    }

    /// Format size for human display
    pub fn size_display(&self) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;

        if self.size_bytes >= MB {
            format!("{:.1} MB", self.size_bytes as f64 / MB as f64)
        } else if self.size_bytes >= KB {
            format!("{:.1} KB", self.size_bytes as f64 / KB as f64)
        } else {
            format!("{} bytes", self.size_bytes)
        }
    }
}
