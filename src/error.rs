/// Error Handling Module
///
/// Every layer of the service reports failures through the types below:
/// 1. Component errors (hashing, token codec, header extraction, entropy, stores)
/// 2. The authentication facade error, which collapses component detail
/// 3. The unified application error used by HTTP handlers
/// 4. HTTP response mapping with structured logging

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

/// ============================================================================
/// 1. COMPONENT ERRORS
/// ============================================================================

/// Credential hashing failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashingError {
    /// Plaintext longer than the hasher accepts
    InputTooLong(usize),
    /// Stored hash is structurally invalid or bcrypt itself failed
    Bcrypt(String),
}

impl fmt::Display for HashingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashingError::InputTooLong(max) => {
                write!(f, "plaintext exceeds the maximum of {} bytes", max)
            }
            HashingError::Bcrypt(msg) => write!(f, "bcrypt failure: {}", msg),
        }
    }
}

impl StdError for HashingError {}

/// Access token codec failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Signature does not match the payload under the process secret
    SignatureInvalid,
    /// Token structure or claims cannot be accepted
    Malformed(String),
    /// `now >= exp`
    Expired,
    /// Signing a new token failed
    Encoding(String),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::SignatureInvalid => write!(f, "token signature is invalid"),
            TokenError::Malformed(msg) => write!(f, "token is malformed: {}", msg),
            TokenError::Expired => write!(f, "token has expired"),
            TokenError::Encoding(msg) => write!(f, "token encoding failed: {}", msg),
        }
    }
}

impl StdError for TokenError {}

/// Authorization header could not produce a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractError {
    MissingCredential,
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractError::MissingCredential => write!(f, "missing or malformed credential"),
        }
    }
}

impl StdError for ExtractError {}

/// The operating system random source failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntropyError(pub String);

impl fmt::Display for EntropyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entropy unavailable: {}", self.0)
    }
}

impl StdError for EntropyError {}

/// Persistence failures shared by the session and user stores
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Unique key already present
    Conflict,
    NotFound,
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Conflict => write!(f, "record already exists"),
            StoreError::NotFound => write!(f, "record not found"),
            StoreError::Backend(msg) => write!(f, "store backend error: {}", msg),
        }
    }
}

impl StdError for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                StoreError::Conflict
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

/// ============================================================================
/// 2. AUTHENTICATION FACADE ERROR
/// ============================================================================

/// Outward-facing authentication failures
///
/// Expired, malformed, revoked, unknown and forged credentials all become
/// `Unauthorized`; the distinction only survives in the logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Wrong password at login
    InvalidCredentials,
    /// Any post-login credential failure
    Unauthorized,
    /// Refresh token collided in the store; safe to retry once
    TransientFailure,
    HashingFailure(String),
    EntropyUnavailable(String),
    SigningFailure(String),
    StoreFailure(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid credentials"),
            AuthError::Unauthorized => write!(f, "Unauthorized"),
            AuthError::TransientFailure => write!(f, "Transient failure, retry the request"),
            AuthError::HashingFailure(msg) => write!(f, "Hashing failure: {}", msg),
            AuthError::EntropyUnavailable(msg) => write!(f, "Entropy unavailable: {}", msg),
            AuthError::SigningFailure(msg) => write!(f, "Token signing failure: {}", msg),
            AuthError::StoreFailure(msg) => write!(f, "Session store failure: {}", msg),
        }
    }
}

impl StdError for AuthError {}

impl From<HashingError> for AuthError {
    fn from(err: HashingError) -> Self {
        AuthError::HashingFailure(err.to_string())
    }
}

impl From<EntropyError> for AuthError {
    fn from(err: EntropyError) -> Self {
        AuthError::EntropyUnavailable(err.0)
    }
}

/// ============================================================================
/// 3. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

/// Input validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyField(&'static str),
    TooShort(&'static str, usize),
    TooLong(&'static str, usize),
    InvalidFormat(&'static str),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
        }
    }
}

impl StdError for ValidationError {}

/// Database operation errors surfaced by handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    UniqueConstraintViolation(String),
    NotFound(String),
    UnexpectedError(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::UniqueConstraintViolation(msg) => {
                write!(f, "Duplicate entry: {}", msg)
            }
            DatabaseError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DatabaseError::UnexpectedError(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl StdError for DatabaseError {}

/// Central error type returned by HTTP handlers
#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Database(DatabaseError),
    Auth(AuthError),
    BadRequest(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Database(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

// ============================================================================
// FROM IMPLEMENTATIONS
// ============================================================================

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<HashingError> for AppError {
    fn from(err: HashingError) -> Self {
        match err {
            HashingError::InputTooLong(max) => {
                AppError::Validation(ValidationError::TooLong("password", max))
            }
            other => AppError::Auth(other.into()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => AppError::Database(DatabaseError::UniqueConstraintViolation(
                "Email already registered".to_string(),
            )),
            StoreError::NotFound => {
                AppError::Database(DatabaseError::NotFound("Record not found".to_string()))
            }
            StoreError::Backend(msg) => AppError::Database(DatabaseError::UnexpectedError(msg)),
        }
    }
}

// ============================================================================
// 4. HTTP RESPONSE MAPPING
// ============================================================================

/// Error response body
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID for correlating with server logs
    pub error_id: String,
    pub message: String,
    /// Machine-readable code for client-side handling
    pub code: String,
    pub status: u16,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Converts errors to HTTP responses with matching log records
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl AppError {
    fn classify(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),

            AppError::Database(e) => match e {
                DatabaseError::UniqueConstraintViolation(_) => {
                    (StatusCode::CONFLICT, "DUPLICATE_ENTRY", e.to_string())
                }
                DatabaseError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string()),
                DatabaseError::UnexpectedError(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database error occurred".to_string(),
                ),
            },

            // Messages never reveal why a credential was rejected
            AppError::Auth(e) => match e {
                AuthError::InvalidCredentials => (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_CREDENTIALS",
                    "Incorrect email or password".to_string(),
                ),
                AuthError::Unauthorized => (
                    StatusCode::UNAUTHORIZED,
                    "UNAUTHORIZED",
                    "Unauthorized".to_string(),
                ),
                AuthError::TransientFailure => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "TRANSIENT_FAILURE",
                    "Temporarily unavailable, please retry".to_string(),
                ),
                AuthError::HashingFailure(_)
                | AuthError::EntropyUnavailable(_)
                | AuthError::SigningFailure(_)
                | AuthError::StoreFailure(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                ),
            },

            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        }
    }
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let (status, code, message) = self.classify();
        let body = ErrorResponse::new(
            request_id.to_string(),
            message,
            code.to_string(),
            status.as_u16(),
        );
        (status, body)
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => {
                tracing::warn!(request_id = request_id, error = %self, "Rejected request input");
            }
            AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => {
                tracing::warn!(request_id = request_id, error = %self, "Duplicate entry attempt");
            }
            AppError::Database(DatabaseError::NotFound(_)) => {
                tracing::info!(request_id = request_id, error = %self, "Record not found");
            }
            AppError::Database(e) => {
                tracing::error!(request_id = request_id, error = %e, "Database error");
            }
            AppError::Auth(e @ (AuthError::InvalidCredentials | AuthError::Unauthorized)) => {
                tracing::warn!(request_id = request_id, error = %e, "Authentication rejected");
            }
            AppError::Auth(AuthError::TransientFailure) => {
                tracing::warn!(request_id = request_id, error = %self, "Transient authentication failure");
            }
            AppError::Auth(e) => {
                tracing::error!(request_id = request_id, error = %e, "Authentication infrastructure failure");
            }
            AppError::Internal(msg) => {
                tracing::error!(request_id = request_id, error = %msg, "Internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, body) = <Self as ErrorHandler>::error_response(self, &request_id);
        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        self.classify().0
    }
}

// ============================================================================
// 5. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Per-request context attached to success and failure logs
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub operation: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            operation: operation.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::EmptyField("email");
        assert_eq!(err.to_string(), "email is empty");
    }

    #[test]
    fn test_auth_failures_share_status_and_hide_cause() {
        let unauthorized = AppError::Auth(AuthError::Unauthorized);
        assert_eq!(unauthorized.status_code(), StatusCode::UNAUTHORIZED);

        let (_, body) = ErrorHandler::error_response(&unauthorized, "req-1");
        assert_eq!(body.message, "Unauthorized");
        assert_eq!(body.code, "UNAUTHORIZED");
    }

    #[test]
    fn test_transient_failure_is_retryable_status() {
        let err = AppError::Auth(AuthError::TransientFailure);
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_infrastructure_failures_are_500_without_detail() {
        let err = AppError::Auth(AuthError::HashingFailure("corrupt".to_string()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let (_, body) = ErrorHandler::error_response(&err, "req-2");
        assert!(!body.message.contains("corrupt"));
    }

    #[test]
    fn test_store_conflict_maps_to_409() {
        let err: AppError = StoreError::Conflict.into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    /// Database error carrying only a SQLSTATE code
    #[derive(Debug)]
    struct SqlState(&'static str);

    impl fmt::Display for SqlState {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "sqlstate {}", self.0)
        }
    }

    impl StdError for SqlState {}

    impl sqlx::error::DatabaseError for SqlState {
        fn message(&self) -> &str {
            "database error"
        }

        fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
            Some(std::borrow::Cow::Borrowed(self.0))
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }
    }

    #[test]
    fn test_sqlx_errors_map_to_store_errors() {
        let unique_violation = sqlx::Error::Database(Box::new(SqlState("23505")));
        assert_eq!(StoreError::from(unique_violation), StoreError::Conflict);

        let other = sqlx::Error::Database(Box::new(SqlState("40001")));
        assert!(matches!(StoreError::from(other), StoreError::Backend(_)));

        assert_eq!(StoreError::from(sqlx::Error::RowNotFound), StoreError::NotFound);
    }

    #[test]
    fn test_oversized_password_is_validation_error() {
        let err: AppError = HashingError::InputTooLong(72).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_response_creation() {
        let response = ErrorResponse::new(
            "test-123".to_string(),
            "Test error".to_string(),
            "TEST_ERROR".to_string(),
            400,
        );

        assert_eq!(response.error_id, "test-123");
        assert_eq!(response.code, "TEST_ERROR");
        assert_eq!(response.status, 400);
    }
}
