//! Error types for the analytics library.

use serde::Serialize;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    InvalidFilter,
    InvalidConfig,
    UnknownReport,

    // Not found errors
    BoardNotFound,
    MissingTable,

    // Internal errors
    DatabaseError,
    ExportError,
    InternalError,
}

/// Errors raised while loading data or producing reports.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] refinery::Error),

    #[error("required table '{0}' is missing")]
    MissingTable(String),

    #[error("invalid filter value for {field}: {reason}")]
    InvalidFilter { field: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown report '{0}'")]
    UnknownReport(String),

    #[error("board not found: {0}")]
    BoardNotFound(String),

    #[error("database connection lock poisoned")]
    LockPoisoned,

    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AnalyticsError {
    pub fn invalid_filter(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidFilter {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Stable code for API responses.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Database(_) | Self::Migration(_) | Self::LockPoisoned => ErrorCode::DatabaseError,
            Self::MissingTable(_) => ErrorCode::MissingTable,
            Self::InvalidFilter { .. } => ErrorCode::InvalidFilter,
            Self::InvalidConfig(_) => ErrorCode::InvalidConfig,
            Self::UnknownReport(_) => ErrorCode::UnknownReport,
            Self::BoardNotFound(_) => ErrorCode::BoardNotFound,
            Self::Csv(_) | Self::Json(_) => ErrorCode::ExportError,
            Self::Io(_) => ErrorCode::InternalError,
        }
    }

    /// Whether the error was caused by the request rather than the data source.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::InvalidFilter | ErrorCode::UnknownReport | ErrorCode::BoardNotFound
        )
    }
}

/// Serializable error body returned by the JSON API.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&AnalyticsError> for ErrorBody {
    fn from(err: &AnalyticsError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
