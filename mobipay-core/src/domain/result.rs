//! Result and error types for the core library

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core library error type
///
/// Business rejections (wrong PIN, insufficient funds, ...) are not errors;
/// they are reported through [`crate::domain::Outcome`]. Everything here is
/// terminal for the operation that produced it.
#[derive(Error, Debug)]
pub enum Error {
    /// Ciphertext failed tag verification: wrong key, tampering or corruption
    #[error("Authentication failure: {0}")]
    Authentication(String),

    /// File decrypted but its contents are not a valid collection
    #[error("Store corrupt or wrong key: {path}: {reason}")]
    CorruptStore { path: PathBuf, reason: String },

    /// File-system failure during an atomic rewrite
    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Data directory is locked: {0}")]
    Locked(String),

    #[error("Integrity violation: {0}")]
    Integrity(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptStore {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }

    /// True for the failures that mean "this file cannot be read with this key"
    pub fn is_unreadable_store(&self) -> bool {
        matches!(self, Self::Authentication(_) | Self::CorruptStore { .. })
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Operation result with optional context (for JSON output)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub context: Option<HashMap<String, serde_json::Value>>,
}

impl<T> OperationResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            context: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            context: None,
        }
    }

    pub fn fail_with_context(
        error: impl Into<String>,
        context: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            context: Some(context),
        }
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::fail(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_result_ok() {
        let result: OperationResult<i32> = OperationResult::ok(42);
        assert!(result.success);
        assert_eq!(result.data, Some(42));
        assert!(result.error.is_none());
    }

    #[test]
    fn test_fail_with_context_serializes_context() {
        let context = HashMap::from([("errorKind".to_string(), "locked".into())]);
        let result = OperationResult::<()>::fail_with_context("busy", context);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "busy");
        assert_eq!(json["context"]["errorKind"], "locked");
    }

    #[test]
    fn test_from_result() {
        let err: Result<i32> = Err(Error::persistence("disk full"));
        let result: OperationResult<i32> = err.into();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Persistence failure"));
    }

    #[test]
    fn test_unreadable_store_classification() {
        assert!(Error::Authentication("tag mismatch".into()).is_unreadable_store());
        assert!(Error::corrupt("/tmp/a.dat", "bad json").is_unreadable_store());
        assert!(!Error::persistence("rename failed").is_unreadable_store());
    }
}
