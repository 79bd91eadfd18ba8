//! Error types for the budget workbook library.
//!
//! The taxonomy deliberately separates malformed input (rejected before any
//! mutation), not-found conditions (callers may offer "create it" flows),
//! and shape violations (hard errors) so callers can branch on the variant
//! rather than on message text.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the budman library.
#[derive(Debug, Error)]
pub enum BudmanError {
    // URL / input errors
    #[error("URL has no scheme: {url}")]
    MalformedUrl { url: String },

    #[error("URL scheme is not supported: {scheme} ({url})")]
    UnsupportedScheme { scheme: String, url: String },

    #[error("URL scheme {scheme} is recognized but not implemented: {url}")]
    SchemeNotImplemented { scheme: String, url: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Store file not found: {0}")]
    StoreNotFound(PathBuf),

    #[error("Path is not a file: {0}")]
    NotAFile(PathBuf),

    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Store file is empty: {0}")]
    EmptyStore(PathBuf),

    #[error("Unsupported store filetype {filetype}: {path}")]
    InvalidStoreFiletype { filetype: String, path: PathBuf },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Failed to decode store at {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Cannot encode value of type {type_name}: {value}")]
    Encode { type_name: String, value: String },

    // Snapshot shape errors
    #[error("Store content is not a non-empty object: {url}")]
    InvalidStoreShape { url: String },

    #[error("Invalid workbook record, field {field}: {message}")]
    InvalidRecord { field: String, message: String },

    // Tree shape errors
    #[error("Tree shape violation: {message}")]
    TreeShape { message: String },

    #[error("Tree node not found: {identifier}")]
    NodeNotFound { identifier: String },

    // Domain lookup errors
    #[error("Unknown institution key: {fi_key}")]
    UnknownInstitution { fi_key: String },

    #[error("Unknown workflow key: {wf_key}")]
    UnknownWorkflow { wf_key: String },

    #[error("Workbook not found: {wb_id}")]
    WorkbookNotFound { wb_id: String },

    // Key parsing errors
    #[error("Invalid workflow purpose: {0}")]
    InvalidPurpose(String),

    #[error("Invalid institution type: {0}")]
    InvalidInstitutionType(String),

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for budman operations.
pub type Result<T> = std::result::Result<T, BudmanError>;

// Conversion implementations for common error types

impl From<std::io::Error> for BudmanError {
    fn from(err: std::io::Error) -> Self {
        BudmanError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for BudmanError {
    fn from(err: serde_json::Error) -> Self {
        BudmanError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl BudmanError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        BudmanError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Check whether this error is a not-found condition, as opposed to
    /// malformed input or a shape violation.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BudmanError::StoreNotFound(_)
                | BudmanError::NodeNotFound { .. }
                | BudmanError::UnknownInstitution { .. }
                | BudmanError::UnknownWorkflow { .. }
                | BudmanError::WorkbookNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_offending_value() {
        let err = BudmanError::UnknownInstitution {
            fi_key: "acme".into(),
        };
        assert_eq!(err.to_string(), "Unknown institution key: acme");

        let err = BudmanError::UnsupportedScheme {
            scheme: "ftp".into(),
            url: "ftp://host/store.json".into(),
        };
        assert!(err.to_string().contains("ftp"));
        assert!(err.to_string().contains("ftp://host/store.json"));
    }

    #[test]
    fn test_not_found_classification() {
        assert!(BudmanError::StoreNotFound(PathBuf::from("/tmp/x.jsonc")).is_not_found());
        assert!(BudmanError::UnknownInstitution {
            fi_key: "acme".into()
        }
        .is_not_found());
        assert!(!BudmanError::MalformedUrl {
            url: "no-scheme".into()
        }
        .is_not_found());
        assert!(!BudmanError::TreeShape {
            message: "second root".into()
        }
        .is_not_found());
    }
}
