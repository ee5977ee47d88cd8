//! Error types for the application

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::delegation::InvitationStatus;

/// Broad grouping of errors, used by callers to decide user messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    Authorization,
    Conflict,
    Expiry,
    NotFound,
    Internal,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid permission set: {0}")]
    InvalidPermissionSet(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Missing actor identity")]
    MissingActor,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("A pending invitation already exists for {email} on listing {listing_id}")]
    DuplicateActiveInvitation { listing_id: String, email: String },

    #[error("Invitation already resolved: {}", .status.as_str())]
    InvitationAlreadyResolved { status: InvitationStatus },

    #[error("User {user_id} is already a co-host of listing {listing_id}")]
    DelegationExists { listing_id: String, user_id: String },

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("Invitation expired")]
    InvitationExpired,

    #[error("Invitation not found")]
    InvitationNotFound,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Notifier error: {0}")]
    Notifier(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn class(&self) -> ErrorClass {
        match self {
            AppError::InvalidEmail(_)
            | AppError::InvalidPermissionSet(_)
            | AppError::BadRequest(_) => ErrorClass::Validation,
            AppError::MissingActor | AppError::Forbidden(_) => ErrorClass::Authorization,
            AppError::DuplicateActiveInvitation { .. }
            | AppError::InvitationAlreadyResolved { .. }
            | AppError::DelegationExists { .. }
            | AppError::InvalidTransition(_) => ErrorClass::Conflict,
            AppError::InvitationExpired => ErrorClass::Expiry,
            AppError::InvitationNotFound | AppError::NotFound(_) => ErrorClass::NotFound,
            AppError::Database(_) | AppError::Notifier(_) | AppError::Internal(_) => {
                ErrorClass::Internal
            }
        }
    }

    /// Stable machine-readable code for API clients
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::InvalidEmail(_) => "invalid_email",
            AppError::InvalidPermissionSet(_) => "invalid_permission_set",
            AppError::BadRequest(_) => "bad_request",
            AppError::MissingActor => "missing_actor",
            AppError::Forbidden(_) => "forbidden",
            AppError::DuplicateActiveInvitation { .. } => "duplicate_active_invitation",
            AppError::InvitationAlreadyResolved { .. } => "invitation_already_resolved",
            AppError::DelegationExists { .. } => "delegation_exists",
            AppError::InvalidTransition(_) => "invalid_transition",
            AppError::InvitationExpired => "invitation_expired",
            AppError::InvitationNotFound => "invitation_not_found",
            AppError::NotFound(_) => "not_found",
            AppError::Notifier(_) => "notifier_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            AppError::Notifier(e) => {
                tracing::error!("Notifier error: {}", e);
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.clone())
            }
            AppError::MissingActor => (StatusCode::UNAUTHORIZED, self.to_string()),
            _ => {
                let status = match self.class() {
                    ErrorClass::Validation => StatusCode::BAD_REQUEST,
                    ErrorClass::Authorization => StatusCode::FORBIDDEN,
                    ErrorClass::Conflict => StatusCode::CONFLICT,
                    ErrorClass::Expiry => StatusCode::GONE,
                    ErrorClass::NotFound => StatusCode::NOT_FOUND,
                    ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, self.to_string())
            }
        };

        let body = Json(json!({
            "error": self.code(),
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// True when a sqlx error is a UNIQUE constraint violation
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
