use crate::api::models::envelope::ErrorEnvelope;
use crate::db::errors::DbError;
use crate::types::Platform;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided, or credentials rejected
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Authenticated caller is not allowed to perform the operation
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// Hosted API allowance exhausted
    #[error("Limit reached: {message}")]
    LimitReached { message: String },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Operation is not available for the comment's platform
    #[error("Platform {platform} is not supported for this operation")]
    UnsupportedPlatform { platform: Platform },

    /// The user has no connected account on the platform
    #[error("No connected {platform} account")]
    NotConnected { platform: Platform },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Posting a reply to the platform failed
    #[error("Failed to post reply: {message}")]
    PostFailed { message: String },

    /// A third-party API returned an error or timed out
    #[error("{service} request failed: {message}")]
    Upstream { service: String, message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// Conflict error, e.g., for unique constraint violations
    #[error("Conflict: {message}")]
    Conflict { message: String },
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::Forbidden { .. } | Error::LimitReached { .. } => StatusCode::FORBIDDEN,
            Error::BadRequest { .. } | Error::UnsupportedPlatform { .. } | Error::NotConnected { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::PostFailed { .. } | Error::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Error::Internal { .. } | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } | DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Conflict { .. } => StatusCode::CONFLICT,
        }
    }

    /// Machine-readable error code carried in the response envelope
    pub fn code(&self) -> &'static str {
        match self {
            Error::Unauthenticated { .. } => "AUTH_FAILED",
            Error::Forbidden { .. } => "FORBIDDEN",
            Error::LimitReached { .. } => "LIMIT_REACHED",
            Error::BadRequest { .. } => "VALIDATION_ERROR",
            Error::UnsupportedPlatform { .. } => "UNSUPPORTED_PLATFORM",
            Error::NotConnected { .. } => "NOT_CONNECTED",
            Error::NotFound { .. } => "NOT_FOUND",
            Error::PostFailed { .. } => "POST_FAILED",
            Error::Upstream { .. } => "UPSTREAM_ERROR",
            Error::Internal { .. } | Error::Other(_) => "INTERNAL_ERROR",
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "NOT_FOUND",
                DbError::UniqueViolation { .. } => "CONFLICT",
                DbError::ForeignKeyViolation { .. } | DbError::CheckViolation { .. } => "VALIDATION_ERROR",
                DbError::Other(_) => "INTERNAL_ERROR",
            },
            Error::Conflict { .. } => "CONFLICT",
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::Forbidden { message } | Error::LimitReached { message } | Error::BadRequest { message } => message.clone(),
            Error::UnsupportedPlatform { platform } => format!("Replying is not supported for {platform} comments"),
            Error::NotConnected { platform } => format!("No connected {platform} account"),
            Error::NotFound { resource, id } => format!("{resource} with ID {id} not found"),
            Error::PostFailed { .. } => "Failed to post reply".to_string(),
            Error::Upstream { service, .. } => format!("{service} request failed"),
            Error::Internal { .. } | Error::Other(_) => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { table, .. } => match table.as_deref() {
                    Some("users") => "An account with this username or email already exists".to_string(),
                    Some("instagram_accounts") => "This Instagram account is already connected".to_string(),
                    Some("shopify_stores") => "This store is already connected".to_string(),
                    _ => "Resource already exists".to_string(),
                },
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::CheckViolation { .. } => "Invalid data provided".to_string(),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Conflict { message } => message.clone(),
        }
    }

    /// Extra context safe to hand back to the client
    fn details(&self) -> Option<String> {
        match self {
            Error::PostFailed { message } => Some(message.clone()),
            _ => None,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) | Error::Conflict { .. } => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::PostFailed { .. } | Error::Upstream { .. } => {
                tracing::warn!("Upstream error: {}", self);
            }
            Error::Unauthenticated { .. } | Error::Forbidden { .. } | Error::LimitReached { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::BadRequest { .. } | Error::UnsupportedPlatform { .. } | Error::NotConnected { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let body = ErrorEnvelope::new(self.code(), self.user_message(), self.details());
        (self.status_code(), Json(body)).into_response()
    }
}

/// Convert from String errors (e.g., from external functions)
impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Internal { operation: msg }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
