//! Unified error type for the stock-taking core.
//!
//! Variants follow the four failure families callers must tell apart:
//! validation (never retried), conflict (caller decides), not found, and
//! infrastructure (store errors, propagated unmodified).

use sea_orm::{DbErr, SqlErr};
use std::fmt;
use thiserror::Error;

/// Machine-readable reason attached to [`Error::Conflict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// A product with the same normalized SKU already exists in the shop
    DuplicateSku,
    /// A scanned code matched several products
    AmbiguousCode,
    /// An open run already exists for the same session/zone/pass/operator
    OpenRunExists,
    /// Replace import refused because counts already reference the catalog
    CatalogLocked,
    /// Another import for the same shop holds the import lock
    ImportLocked,
    /// Release refused because the run already has count lines
    RunHasLines,
    /// The operator releasing a run is not the one who started it
    NotRunOwner,
}

impl ConflictReason {
    /// Stable identifier for clients.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DuplicateSku => "duplicate_sku",
            Self::AmbiguousCode => "ambiguous_code",
            Self::OpenRunExists => "open_run_exists",
            Self::CatalogLocked => "catalog_locked",
            Self::ImportLocked => "import_locked",
            Self::RunHasLines => "run_has_lines",
            Self::NotRunOwner => "not_run_owner",
        }
    }
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an active-run lookup came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoActiveRunReason {
    /// No open session for the zone and pass (or the hinted session is closed)
    NoActiveSession,
    /// The operator identity does not map to a usable operator
    OperatorUnresolvable,
    /// Open runs exist, but none for this operator
    NoMatchingRun,
}

impl NoActiveRunReason {
    /// Stable identifier for clients.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoActiveSession => "no_active_session",
            Self::OperatorUnresolvable => "operator_unresolvable",
            Self::NoMatchingRun => "no_matching_run",
        }
    }
}

impl fmt::Display for NoActiveRunReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by the stock-taking core.
#[derive(Debug, Error)]
pub enum Error {
    /// Input rejected before touching the store
    #[error("Invalid {field}: {reason}")]
    Validation {
        /// Offending field
        field: String,
        /// Human-readable reason
        reason: String,
    },

    /// Operation refused; resolution is the caller's decision
    #[error("Conflict ({reason}): {message}")]
    Conflict {
        /// Machine-readable reason
        reason: ConflictReason,
        /// Human-readable message
        message: String,
    },

    /// Referenced entity does not exist
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Entity kind (e.g. "location")
        entity: &'static str,
        /// Lookup key as given by the caller
        key: String,
    },

    /// Active-run lookup found nothing
    #[error("No active run: {reason}")]
    NoActiveRun {
        /// Sub-reason for client messaging
        reason: NoActiveRunReason,
    },

    /// Configuration could not be loaded
    #[error("Configuration error: {message}")]
    Config {
        /// Details
        message: String,
    },

    /// Store failure
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Builds a validation error.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Builds a conflict error.
    pub fn conflict(reason: ConflictReason, message: impl Into<String>) -> Self {
        Self::Conflict {
            reason,
            message: message.into(),
        }
    }

    /// Builds a not-found error.
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Stable machine-readable code for the error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Conflict { reason, .. } => reason.as_str(),
            Self::NotFound { .. } => "not_found",
            Self::NoActiveRun { reason } => reason.as_str(),
            Self::Config { .. } => "config",
            Self::Database(_) | Self::Io(_) => "infrastructure",
        }
    }

    /// Maps a unique-constraint violation to a conflict with the given reason;
    /// every other store error is passed through unchanged.
    pub fn from_unique_violation(err: DbErr, reason: ConflictReason, message: &str) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => Self::Conflict {
                reason,
                message: format!("{message} ({detail})"),
            },
            _ => Self::Database(err),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_reason_specific() {
        let err = Error::conflict(ConflictReason::CatalogLocked, "counts exist");
        assert_eq!(err.code(), "catalog_locked");

        let err = Error::NoActiveRun {
            reason: NoActiveRunReason::OperatorUnresolvable,
        };
        assert_eq!(err.code(), "operator_unresolvable");

        let err = Error::validation("quantity", "must be positive");
        assert_eq!(err.code(), "validation");
        assert_eq!(err.to_string(), "Invalid quantity: must be positive");
    }

    #[test]
    fn test_non_unique_db_error_passes_through() {
        let err = Error::from_unique_violation(
            DbErr::Custom("boom".to_string()),
            ConflictReason::OpenRunExists,
            "run already open",
        );
        assert!(matches!(err, Error::Database(DbErr::Custom(_))));
        assert_eq!(err.code(), "infrastructure");
    }
}
