pub mod directory;
pub mod http;
pub mod notifications;
pub mod survey;
pub mod training;

use axum::http::StatusCode;

/// Error categories callers can act on. Everything that is not the caller's fault is a
/// server fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Forbidden,
    NotFound,
    Conflict,
    ServerFault,
}

impl ErrorKind {
    pub const fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::ServerFault => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
