use std::fmt;

/// Errors returned by the remote topic API.
///
/// `NotFound` and `AlreadyExists` are authoritative and must stay
/// distinguishable after any wrapping done by callers.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("[404 {operation}]: {message}")]
    NotFound { operation: String, message: String },
    #[error("[409 {operation}]: {message}")]
    AlreadyExists { operation: String, message: String },
    #[error("[{status} {operation}]: {message}")]
    Remote {
        operation: String,
        status: u16,
        message: String,
    },
}

impl ApiError {
    pub fn not_found(operation: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::NotFound {
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }

    pub fn already_exists(operation: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::AlreadyExists {
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }

    pub fn remote(operation: impl fmt::Display, status: u16, message: impl fmt::Display) -> Self {
        Self::Remote {
            operation: operation.to_string(),
            status,
            message: message.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// http-like status code of the error
    pub fn status(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::AlreadyExists { .. } => 409,
            Self::Remote { status, .. } => *status,
        }
    }
}
