use thiserror::Error;
use warp::http::StatusCode;

/// Error types for the attendance server
#[derive(Debug, Error)]
pub enum AttendanceError {
    /// Request validation errors
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Email {0} is already registered")]
    DuplicateEmail(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Authentication errors
    #[error("Missing authorization token")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token has expired")]
    TokenExpired,

    /// Authorization errors
    #[error("Forbidden, {0} access only")]
    RoleRequired(String),

    #[error("Forbidden, not class teacher")]
    NotClassOwner,

    #[error("Forbidden, not enrolled in class")]
    NotEnrolled,

    /// Lookup errors
    #[error("User {0} not found")]
    UserNotFound(String),

    #[error("Student {0} not found")]
    StudentNotFound(String),

    #[error("Class {0} not found")]
    ClassNotFound(String),

    /// Live session errors
    #[error("Attendance session already active for class {0}")]
    SessionAlreadyActive(String),

    #[error("No active attendance session")]
    NoActiveSession,

    /// Storage errors
    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Failed to serialize message: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Generic errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Convenience type alias for Results using AttendanceError
pub type Result<T> = std::result::Result<T, AttendanceError>;

impl AttendanceError {
    pub fn internal(msg: impl Into<String>) -> Self {
        AttendanceError::Internal(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AttendanceError::Validation(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        AttendanceError::Storage(msg.into())
    }

    /// HTTP status the REST layer answers with for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AttendanceError::Validation(_)
            | AttendanceError::DuplicateEmail(_)
            | AttendanceError::InvalidCredentials => StatusCode::BAD_REQUEST,
            AttendanceError::MissingToken
            | AttendanceError::InvalidToken(_)
            | AttendanceError::TokenExpired => StatusCode::UNAUTHORIZED,
            AttendanceError::RoleRequired(_)
            | AttendanceError::NotClassOwner
            | AttendanceError::NotEnrolled => StatusCode::FORBIDDEN,
            AttendanceError::UserNotFound(_)
            | AttendanceError::StudentNotFound(_)
            | AttendanceError::ClassNotFound(_) => StatusCode::NOT_FOUND,
            AttendanceError::SessionAlreadyActive(_) => StatusCode::CONFLICT,
            AttendanceError::NoActiveSession => StatusCode::BAD_REQUEST,
            AttendanceError::Storage(_)
            | AttendanceError::SerializationFailed(_)
            | AttendanceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AttendanceError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AttendanceError::TokenExpired,
            _ => AttendanceError::InvalidToken(err.to_string()),
        }
    }
}

impl From<argon2::password_hash::Error> for AttendanceError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AttendanceError::Internal(format!("password hashing: {}", err))
    }
}

/// Lets filters reject with an AttendanceError and recover it later
impl warp::reject::Reject for AttendanceError {}
