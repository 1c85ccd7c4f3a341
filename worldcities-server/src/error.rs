//! Error types and HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::paging::PageError;

// ============================================================================
// Structured Database Errors
// ============================================================================

/// Database operation being performed when the error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseOperation {
    /// Establishing a database connection
    Connect,
    /// Executing a query
    Query,
    /// Inserting records
    Insert,
    /// Updating records
    Update,
    /// Deleting records
    Delete,
    /// Running database migrations
    Migration,
    /// Acquiring a connection from the pool
    PoolAcquire,
}

impl fmt::Display for DatabaseOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Query => write!(f, "query"),
            Self::Insert => write!(f, "insert"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
            Self::Migration => write!(f, "migration"),
            Self::PoolAcquire => write!(f, "pool_acquire"),
        }
    }
}

/// Category of database error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseErrorKind {
    /// Failed to establish connection
    ConnectionFailed,
    /// Record not found
    NotFound,
    /// Constraint violation (unique, foreign key, check)
    ConstraintViolation,
    /// Query execution failed
    QueryFailed,
    /// Type conversion error
    TypeConversion,
    /// Configuration error
    Configuration,
    /// Connection pool exhausted
    PoolExhausted,
    /// Other/unknown error
    Other,
}

impl fmt::Display for DatabaseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::NotFound => write!(f, "not_found"),
            Self::ConstraintViolation => write!(f, "constraint_violation"),
            Self::QueryFailed => write!(f, "query_failed"),
            Self::TypeConversion => write!(f, "type_conversion"),
            Self::Configuration => write!(f, "configuration"),
            Self::PoolExhausted => write!(f, "pool_exhausted"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Structured database error with operation context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseError {
    /// The operation being performed when the error occurred
    pub operation: DatabaseOperation,
    /// The category of error
    pub kind: DatabaseErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Additional context (table name, entity kind)
    pub context: Option<String>,
}

impl DatabaseError {
    /// Create a new database error
    pub fn new(
        operation: DatabaseOperation,
        kind: DatabaseErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            context: None,
        }
    }

    /// Create a connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(
            DatabaseOperation::Connect,
            DatabaseErrorKind::ConnectionFailed,
            message,
        )
    }

    /// Create a pool exhausted error
    pub fn pool_exhausted(message: impl Into<String>) -> Self {
        Self::new(
            DatabaseOperation::PoolAcquire,
            DatabaseErrorKind::PoolExhausted,
            message,
        )
    }

    /// Check if this error is transient
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            DatabaseErrorKind::ConnectionFailed | DatabaseErrorKind::PoolExhausted
        )
    }

    /// Re-tag the operation the error happened in
    pub fn during(mut self, operation: DatabaseOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Add context to an existing error
    pub fn add_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Database {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let Some(ref ctx) = self.context {
            write!(f, " [context: {}]", ctx)?;
        }
        Ok(())
    }
}

impl std::error::Error for DatabaseError {}

/// Sanitize a database URL by removing credentials
pub fn sanitize_url(url: &str) -> String {
    if let (Some(at_pos), Some(scheme_end)) = (url.rfind('@'), url.find("://")) {
        if at_pos > scheme_end {
            let scheme = &url[..scheme_end + 3];
            let after_at = &url[at_pos + 1..];
            return format!("{}<redacted>@{}", scheme, after_at);
        }
    }
    url.to_string()
}

/// Result type alias using the service error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type of the service
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Structured database error with operation context
    #[error("{0}")]
    Database(DatabaseError),

    /// JWT error
    #[error("JWT error: {0}")]
    Jwt(Box<jsonwebtoken::errors::Error>),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or invalid credentials
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Authenticated but lacking a role
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed or inconsistent request
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Resource conflict (409)
    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,

    /// Optional error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// HTTP status code
    pub status: u16,
}

impl ErrorResponse {
    /// Create error response with a code
    pub fn with_code(
        status: StatusCode,
        code: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            error: error.into(),
            code: Some(code.into()),
            status: status.as_u16(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            Error::Config(e) => {
                tracing::error!("Configuration error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_code(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "CONFIG_ERROR",
                        "Service misconfigured",
                    ),
                )
            }

            Error::Database(ref e) => {
                tracing::error!(
                    operation = %e.operation,
                    kind = %e.kind,
                    context = ?e.context,
                    retriable = e.is_retriable(),
                    "Database error: {}", e.message
                );

                let status = match e.kind {
                    DatabaseErrorKind::NotFound => StatusCode::NOT_FOUND,
                    DatabaseErrorKind::ConstraintViolation => StatusCode::CONFLICT,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };

                let code = format!("DATABASE_{}", e.kind.to_string().to_uppercase());

                // never expose driver messages
                let user_message = match e.kind {
                    DatabaseErrorKind::NotFound => "Resource not found",
                    DatabaseErrorKind::ConstraintViolation => {
                        "Operation conflicts with existing data"
                    }
                    _ => "Database operation failed",
                };

                (status, ErrorResponse::with_code(status, code, user_message))
            }

            Error::Jwt(e) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::with_code(StatusCode::UNAUTHORIZED, "INVALID_TOKEN", e.to_string()),
            ),

            Error::Io(e) => {
                tracing::error!("I/O error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_code(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "IO_ERROR",
                        "I/O operation failed",
                    ),
                )
            }

            Error::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::with_code(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ),

            Error::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                ErrorResponse::with_code(StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ),

            Error::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::with_code(StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ),

            Error::InvalidArgument(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::with_code(StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", msg),
            ),

            Error::Conflict(msg) => (
                StatusCode::CONFLICT,
                ErrorResponse::with_code(StatusCode::CONFLICT, "CONFLICT", msg),
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Error::Jwt(Box::new(err))
    }
}

impl From<PageError> for Error {
    fn from(err: PageError) -> Self {
        Error::InvalidArgument(err.to_string())
    }
}

impl From<DatabaseError> for Error {
    fn from(err: DatabaseError) -> Self {
        Error::Database(err)
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::Error as E;
        match err {
            E::RowNotFound => Self::new(
                DatabaseOperation::Query,
                DatabaseErrorKind::NotFound,
                "Row not found",
            ),
            E::PoolTimedOut => Self::pool_exhausted("Connection pool timed out"),
            E::PoolClosed => Self::connection_failed("Connection pool is closed"),
            E::Configuration(e) => Self::new(
                DatabaseOperation::Connect,
                DatabaseErrorKind::Configuration,
                e.to_string(),
            ),
            E::Io(e) => Self::connection_failed(e.to_string()),
            E::Tls(e) => Self::connection_failed(format!("TLS error: {}", e)),
            E::ColumnNotFound(col) => Self::new(
                DatabaseOperation::Query,
                DatabaseErrorKind::QueryFailed,
                format!("Column not found: {}", col),
            ),
            E::ColumnDecode { index, source } => Self::new(
                DatabaseOperation::Query,
                DatabaseErrorKind::TypeConversion,
                format!("Failed to decode column {}: {}", index, source),
            ),
            E::Decode(e) => Self::new(
                DatabaseOperation::Query,
                DatabaseErrorKind::TypeConversion,
                e.to_string(),
            ),
            E::Migrate(e) => Self::new(
                DatabaseOperation::Migration,
                DatabaseErrorKind::QueryFailed,
                e.to_string(),
            ),
            E::Database(db_err) => {
                let kind = if db_err.is_unique_violation()
                    || db_err.is_foreign_key_violation()
                    || db_err.is_check_violation()
                {
                    DatabaseErrorKind::ConstraintViolation
                } else {
                    DatabaseErrorKind::QueryFailed
                };
                Self::new(DatabaseOperation::Query, kind, db_err.to_string())
            }
            E::WorkerCrashed => Self::connection_failed("Database worker crashed"),
            _ => Self::new(
                DatabaseOperation::Query,
                DatabaseErrorKind::Other,
                err.to_string(),
            ),
        }
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Database(DatabaseError::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(error: Error) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let cases = [
            (Error::NotFound("city 9".into()), StatusCode::NOT_FOUND),
            (Error::InvalidArgument("id".into()), StatusCode::BAD_REQUEST),
            (Error::Unauthorized("token".into()), StatusCode::UNAUTHORIZED),
            (Error::Forbidden("role".into()), StatusCode::FORBIDDEN),
            (Error::Conflict("stale".into()), StatusCode::CONFLICT),
            (
                Error::Io(std::io::Error::other("disk full")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            let (status, body) = body_json(error).await;
            assert_eq!(status, expected);
            assert_eq!(body["status"], expected.as_u16());
        }
    }

    #[tokio::test]
    async fn test_failure_details_are_hidden() {
        let io = std::io::Error::other("open /etc/worldcities/secret: denied");
        let (_, body) = body_json(Error::Io(io)).await;
        assert_eq!(body["error"], "I/O operation failed");
        assert_eq!(body["code"], "IO_ERROR");

        let pool = DatabaseError::pool_exhausted("postgres://app:secret@db timed out");
        let (status, body) = body_json(Error::Database(pool)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Database operation failed");
    }

    #[tokio::test]
    async fn test_constraint_violation_maps_to_conflict() {
        let error = DatabaseError::new(
            DatabaseOperation::Insert,
            DatabaseErrorKind::ConstraintViolation,
            "duplicate key value violates unique constraint",
        );
        let (status, body) = body_json(Error::Database(error)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "DATABASE_CONSTRAINT_VIOLATION");
    }

    #[test]
    fn test_page_error_is_invalid_argument() {
        let error: Error = PageError::NonPositivePageSize(0).into();
        assert!(matches!(error, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_sanitize_url() {
        assert_eq!(
            sanitize_url("postgres://app:secret@db:5432/worldcities"),
            "postgres://<redacted>@db:5432/worldcities"
        );
        assert_eq!(
            sanitize_url("postgres://localhost/worldcities"),
            "postgres://localhost/worldcities"
        );
    }
}
