//! Error handling for Postwatch Core.
//!
//! One error type, [`PostwatchError`], travels from the storage and collector
//! layers up to the HTTP handlers. It carries:
//! - a stable [`ErrorCode`] that maps to an HTTP status and a log severity
//! - a message safe to return to API clients
//! - an optional internal message for logs and run status
//! - structured context merged into the JSON error body
//!
//! ```rust,ignore
//! use postwatch_core::error::{ErrorCode, ErrorContext, Result};
//!
//! fn open(url: &str) -> Result<SqliteConnectOptions> {
//!     SqliteConnectOptions::from_str(url).with_error_code(ErrorCode::InvalidConfiguration)
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, warn};

/// A specialized Result type for Postwatch operations.
pub type Result<T> = std::result::Result<T, PostwatchError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes, serialized as `SCREAMING_SNAKE_CASE` in
/// API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Runs (1000-1099)
    RunInProgress,
    CollectorFailed,
    CollectorTimeout,
    CollectorOutputInvalid,

    // Database (2000-2099)
    DatabaseError,
    DatabaseConnectionFailed,
    DatabaseQueryFailed,
    DatabaseTransactionFailed,
    RecordNotFound,
    DuplicateRecord,

    // Image cache (2100-2199)
    ImageFetchFailed,
    ImageDecodeFailed,
    ImageWriteFailed,

    // Outbound HTTP (3000-3099)
    NetworkError,
    Timeout,
    ExternalServiceError,

    // Request input (4000-4099)
    InvalidInput,

    // Configuration (5000-5099)
    InvalidConfiguration,

    // Internal (9000-9099)
    InternalError,
}

impl ErrorCode {
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::RunInProgress => 1000,
            Self::CollectorFailed => 1001,
            Self::CollectorTimeout => 1002,
            Self::CollectorOutputInvalid => 1003,

            Self::DatabaseError => 2000,
            Self::DatabaseConnectionFailed => 2001,
            Self::DatabaseQueryFailed => 2002,
            Self::DatabaseTransactionFailed => 2003,
            Self::RecordNotFound => 2004,
            Self::DuplicateRecord => 2005,

            Self::ImageFetchFailed => 2100,
            Self::ImageDecodeFailed => 2101,
            Self::ImageWriteFailed => 2102,

            Self::NetworkError => 3000,
            Self::Timeout => 3001,
            Self::ExternalServiceError => 3002,

            Self::InvalidInput => 4000,

            Self::InvalidConfiguration => 5000,

            Self::InternalError => 9000,
        }
    }

    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::InvalidInput => StatusCode::BAD_REQUEST,
            Self::RecordNotFound => StatusCode::NOT_FOUND,
            Self::RunInProgress | Self::DuplicateRecord => StatusCode::CONFLICT,
            Self::CollectorOutputInvalid => StatusCode::UNPROCESSABLE_ENTITY,
            Self::CollectorFailed | Self::ImageFetchFailed | Self::NetworkError => {
                StatusCode::BAD_GATEWAY
            }
            Self::DatabaseConnectionFailed | Self::ExternalServiceError => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::CollectorTimeout | Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::DatabaseError
            | Self::DatabaseQueryFailed
            | Self::DatabaseTransactionFailed
            | Self::ImageDecodeFailed
            | Self::ImageWriteFailed
            | Self::InvalidConfiguration
            | Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the same operation may succeed if attempted again later.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RunInProgress
                | Self::CollectorTimeout
                | Self::DatabaseConnectionFailed
                | Self::ImageFetchFailed
                | Self::NetworkError
                | Self::Timeout
                | Self::ExternalServiceError
        )
    }

    pub const fn category(&self) -> &'static str {
        match self.numeric_code() {
            1000..=1099 => "run",
            2000..=2099 => "database",
            2100..=2199 => "image",
            3000..=3099 => "external_service",
            4000..=4099 => "input",
            5000..=5099 => "configuration",
            _ => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Drives the log level an error is reported at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Caller mistakes and rejected triggers
    Low,
    /// Collector and image failures
    Medium,
    /// Storage and configuration failures
    High,
    /// Unreachable database, internal faults
    Critical,
}

impl ErrorSeverity {
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::RunInProgress
            | ErrorCode::InvalidInput
            | ErrorCode::RecordNotFound
            | ErrorCode::DuplicateRecord => Self::Low,

            ErrorCode::CollectorFailed
            | ErrorCode::CollectorTimeout
            | ErrorCode::CollectorOutputInvalid
            | ErrorCode::ImageFetchFailed
            | ErrorCode::ImageDecodeFailed
            | ErrorCode::NetworkError
            | ErrorCode::Timeout
            | ErrorCode::ExternalServiceError => Self::Medium,

            ErrorCode::DatabaseError
            | ErrorCode::DatabaseQueryFailed
            | ErrorCode::DatabaseTransactionFailed
            | ErrorCode::ImageWriteFailed
            | ErrorCode::InvalidConfiguration => Self::High,

            ErrorCode::DatabaseConnectionFailed | ErrorCode::InternalError => Self::Critical,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Error, Debug)]
pub struct PostwatchError {
    code: ErrorCode,
    user_message: Cow<'static, str>,
    internal_message: Option<String>,
    context: BTreeMap<String, serde_json::Value>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for PostwatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl PostwatchError {
    /// Build an error and count it in `postwatch_errors_total`.
    pub fn new(code: ErrorCode, user_message: impl Into<Cow<'static, str>>) -> Self {
        counter!(
            "postwatch_errors_total",
            "code" => code.to_string(),
            "category" => code.category(),
        )
        .increment(1);

        Self {
            code,
            user_message: user_message.into(),
            internal_message: None,
            context: BTreeMap::new(),
            source: None,
        }
    }

    pub fn with_internal(
        code: ErrorCode,
        user_message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, user_message);
        error.internal_message = Some(internal_message.into());
        error
    }

    pub fn invalid_input(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, message.into())
    }

    /// A trigger was rejected because a run is already in flight.
    ///
    /// The message is part of the HTTP contract; clients match on it.
    pub fn run_in_progress(current_status: impl Serialize) -> Self {
        Self::new(ErrorCode::RunInProgress, "A scraping job is already running")
            .with_context("current_status", current_status)
    }

    /// A background run task panicked or was aborted.
    pub fn run_aborted(reason: impl Into<String>) -> Self {
        Self::with_internal(
            ErrorCode::InternalError,
            "Collection run aborted unexpectedly",
            reason,
        )
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Add an entry to the JSON error body.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn context(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.context
    }

    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    /// A single-line description used as a run's `error_message`, including
    /// the internal message when present.
    pub fn describe(&self) -> String {
        match &self.internal_message {
            Some(internal) => format!("{}: {}", self.user_message, internal),
            None => self.user_message.to_string(),
        }
    }

    /// Log at the level given by the severity.
    pub fn log(&self) {
        let code = self.code.to_string();
        let category = self.code.category();
        let retryable = self.code.is_retryable();
        let message = self.describe();

        match self.severity() {
            ErrorSeverity::Critical | ErrorSeverity::High => error!(
                error_code = %code,
                category,
                retryable,
                context = ?self.context,
                source = ?self.source,
                "{}",
                message
            ),
            ErrorSeverity::Medium => warn!(
                error_code = %code,
                category,
                retryable,
                context = ?self.context,
                "{}",
                message
            ),
            ErrorSeverity::Low => debug!(error_code = %code, category, "{}", message),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// API Response
// ═══════════════════════════════════════════════════════════════════════════════

/// Error body returned to API clients.
///
/// Context entries sit next to `error` and `code`, so a rejected trigger
/// renders as `{"error": ..., "code": ..., "current_status": {...}}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: ErrorCode,
    #[serde(flatten)]
    pub context: BTreeMap<String, serde_json::Value>,
}

impl From<&PostwatchError> for ErrorResponse {
    fn from(error: &PostwatchError) -> Self {
        Self {
            error: error.user_message.to_string(),
            code: error.code,
            context: error.context.clone(),
        }
    }
}

impl IntoResponse for PostwatchError {
    fn into_response(self) -> Response {
        self.log();
        (self.http_status(), Json(ErrorResponse::from(&self))).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Conversions
// ═══════════════════════════════════════════════════════════════════════════════

/// Attach an [`ErrorCode`] to a foreign error.
pub trait ErrorContext<T> {
    fn with_error_code(self, code: ErrorCode) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_error_code(self, code: ErrorCode) -> Result<T> {
        self.map_err(|e| PostwatchError::new(code, e.to_string()).with_source(e))
    }
}

impl From<sqlx::Error> for PostwatchError {
    fn from(error: sqlx::Error) -> Self {
        let (code, user_msg) = match &error {
            sqlx::Error::RowNotFound => (ErrorCode::RecordNotFound, "Record not found"),
            sqlx::Error::Database(db) if db.is_unique_violation() => (
                ErrorCode::DuplicateRecord,
                "A record with this identifier already exists",
            ),
            sqlx::Error::Database(_) => (ErrorCode::DatabaseQueryFailed, "A database error occurred"),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => (
                ErrorCode::DatabaseConnectionFailed,
                "Unable to connect to the database",
            ),
            _ => (ErrorCode::DatabaseError, "A database error occurred"),
        };

        Self::with_internal(code, user_msg, error.to_string()).with_source(error)
    }
}

impl From<reqwest::Error> for PostwatchError {
    fn from(error: reqwest::Error) -> Self {
        let (code, user_msg) = if error.is_timeout() {
            (ErrorCode::Timeout, "External request timed out")
        } else if error.is_status() {
            (ErrorCode::ExternalServiceError, "External service returned an error")
        } else {
            (ErrorCode::NetworkError, "Network error occurred")
        };

        Self::with_internal(code, user_msg, error.to_string()).with_source(error)
    }
}

impl From<std::io::Error> for PostwatchError {
    fn from(error: std::io::Error) -> Self {
        let (code, user_msg) = match error.kind() {
            std::io::ErrorKind::NotFound => (ErrorCode::RecordNotFound, "File not found"),
            std::io::ErrorKind::TimedOut => (ErrorCode::Timeout, "Operation timed out"),
            _ => (ErrorCode::InternalError, "An I/O error occurred"),
        };

        Self::with_internal(code, user_msg, error.to_string()).with_source(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(ErrorCode::RunInProgress.http_status(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::InvalidInput.http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ErrorCode::CollectorOutputInvalid.http_status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ErrorCode::InternalError.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_categories_and_severity() {
        assert_eq!(ErrorCode::CollectorFailed.category(), "run");
        assert_eq!(ErrorCode::DatabaseQueryFailed.category(), "database");
        assert_eq!(ErrorCode::ImageDecodeFailed.category(), "image");
        assert_eq!(ErrorCode::InvalidInput.category(), "input");
        assert_eq!(ErrorCode::InternalError.category(), "internal");

        assert_eq!(ErrorSeverity::from_code(&ErrorCode::RunInProgress), ErrorSeverity::Low);
        assert_eq!(ErrorSeverity::from_code(&ErrorCode::ImageFetchFailed), ErrorSeverity::Medium);
        assert_eq!(ErrorSeverity::from_code(&ErrorCode::DatabaseError), ErrorSeverity::High);
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::DatabaseConnectionFailed),
            ErrorSeverity::Critical
        );
    }

    #[test]
    fn test_retryable_codes() {
        assert!(ErrorCode::RunInProgress.is_retryable());
        assert!(ErrorCode::ImageFetchFailed.is_retryable());
        assert!(!ErrorCode::CollectorOutputInvalid.is_retryable());
        assert!(!ErrorCode::ImageDecodeFailed.is_retryable());
    }

    #[test]
    fn test_run_in_progress_body() {
        let error = PostwatchError::run_in_progress(serde_json::json!({"status": "running"}));
        let body = serde_json::to_value(ErrorResponse::from(&error)).unwrap();

        assert_eq!(body["error"], "A scraping job is already running");
        assert_eq!(body["code"], "RUN_IN_PROGRESS");
        assert_eq!(body["current_status"]["status"], "running");
    }

    #[test]
    fn test_describe_includes_internal_message() {
        let error = PostwatchError::with_internal(
            ErrorCode::DatabaseQueryFailed,
            "A database error occurred",
            "no such table: posts",
        );
        assert_eq!(error.describe(), "A database error occurred: no such table: posts");
        assert!(error.to_string().contains("DatabaseQueryFailed"));

        let plain = PostwatchError::new(ErrorCode::CollectorFailed, "timeout");
        assert_eq!(plain.describe(), "timeout");
    }

    #[test]
    fn test_with_error_code() {
        let parsed: std::result::Result<u8, _> = "x".parse::<u8>();
        let err = parsed.with_error_code(ErrorCode::InvalidConfiguration).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfiguration);
        assert_eq!(err.http_status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
