//! Error taxonomy shared by every modspec crate.

use serde::{Deserialize, Serialize};

use crate::ModuleType;

/// Result alias using [`ModuleError`].
pub type Result<T> = std::result::Result<T, ModuleError>;

/// Errors surfaced by module operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModuleError {
    /// Document missing
    #[error("Not found: {path}")]
    NotFound {
        /// Document path
        path: String,
    },

    /// Document unreadable or unwritable
    #[error("File system error at {path}: {message}")]
    FileSystem {
        /// Document path
        path: String,
        /// Underlying error
        message: String,
    },

    /// Content generator failure
    #[error("Generation failed for {module_type}: {message}")]
    Generation {
        /// Module being generated
        module_type: ModuleType,
        /// Underlying error
        message: String,
    },

    /// Malformed metadata, legacy document or request
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing workspace or base path
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ModuleError {
    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModuleError::NotFound { .. } | ModuleError::FileSystem { .. } => ErrorKind::FileSystem,
            ModuleError::Generation { .. } => ErrorKind::Generation,
            ModuleError::Validation(_) => ErrorKind::Validation,
            ModuleError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Whether the error is a missing document.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ModuleError::NotFound { .. })
    }

    /// Whether the detail looks transient (timeouts, network, rate limits).
    pub fn is_retryable(&self) -> bool {
        const MARKERS: [&str; 9] = [
            "timeout",
            "timed out",
            "network",
            "connection",
            "econnreset",
            "rate limit",
            "too many requests",
            "429",
            "503",
        ];
        let detail = self.to_string().to_lowercase();
        MARKERS.iter().any(|m| detail.contains(m))
    }

    /// Build the user-facing report for this error.
    pub fn report(&self) -> ErrorReport {
        let kind = self.kind();
        ErrorReport {
            kind,
            message: kind.user_message().to_string(),
            detail: self.to_string(),
            retryable: self.is_retryable(),
        }
    }
}

/// Error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Document store problems
    FileSystem,
    /// Content generation problems
    Generation,
    /// Malformed input
    Validation,
    /// Bad configuration
    Configuration,
}

impl ErrorKind {
    /// Short message suitable for a primary notification.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::FileSystem => "Could not access the design documents.",
            ErrorKind::Generation => "Module generation failed.",
            ErrorKind::Validation => "The document or metadata is not valid.",
            ErrorKind::Configuration => "The workspace is not configured.",
        }
    }
}

/// What a caller shows for a failed operation.
///
/// `message` is the short primary text; `detail` holds the technical error
/// and belongs in the diagnostic log only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    /// Classification
    pub kind: ErrorKind,

    /// Short classification-derived message
    pub message: String,

    /// Full technical detail
    pub detail: String,

    /// Whether retrying may help
    pub retryable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_hides_detail_from_message() {
        let err = ModuleError::FileSystem {
            path: "/specs/f/requirements.md".into(),
            message: "permission denied".into(),
        };
        let report = err.report();
        assert_eq!(report.kind, ErrorKind::FileSystem);
        assert!(!report.message.contains("permission denied"));
        assert!(report.detail.contains("permission denied"));
        assert!(!report.retryable);
    }

    #[test]
    fn test_retryable_markers() {
        let err = ModuleError::Generation {
            module_type: ModuleType::Frontend,
            message: "request timed out after 60s".into(),
        };
        assert!(err.is_retryable());
        assert!(err.report().retryable);

        let err = ModuleError::Validation("bad json".into());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_not_found_is_file_system_kind() {
        let err = ModuleError::NotFound { path: "x".into() };
        assert!(err.is_not_found());
        assert_eq!(err.kind(), ErrorKind::FileSystem);
    }
}
