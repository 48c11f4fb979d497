//! Domain error taxonomy for the SHELF services and its HTTP mapping.

use serde_json::json;
use shelf_authz::Forbidden;
use shelf_db::{RequestId, RequestStatus, StoreError};
use shelf_http::AppError;
use thiserror::Error;

/// Credential failures. The messages are what a client sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("User does not exist")]
    NotFound,
    #[error("Password does not match")]
    InvalidCredential,
    #[error("User already exists")]
    AlreadyExists,
}

impl AuthError {
    /// Message used when login failures must not reveal which check failed.
    pub const GENERIC_MESSAGE: &'static str = "Invalid username or password";
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Forbidden(#[from] Forbidden),

    #[error("{0}")]
    Conflict(String),

    #[error("request {id} is already {current}")]
    InvalidTransition {
        id: RequestId,
        current: RequestStatus,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("at least one search criterion is required")]
    EmptyQuery,

    #[error("missing {missing} asset; both a pdf and an image are required")]
    MissingAsset { missing: &'static str },

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { .. } => Self::NotFound(error.to_string()),
            StoreError::Duplicate { .. } => Self::Conflict(error.to_string()),
            StoreError::StatusMismatch { id, current, .. } => {
                Self::InvalidTransition { id, current }
            }
            other => Self::Store(other),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Validation { field, message } => AppError::validation(
                vec![json!({ "field": field, "error": message })],
                format!("{field}: {message}"),
            ),
            ServiceError::Auth(e) => AppError::bad_request(e.to_string()),
            ServiceError::Forbidden(reason) => AppError::from(reason),
            ServiceError::Conflict(message) => AppError::conflict(Vec::new(), message),
            e @ ServiceError::InvalidTransition { .. } => {
                AppError::conflict_with_code("invalid_transition", e.to_string())
            }
            ServiceError::NotFound(message) => AppError::not_found(message),
            e @ ServiceError::EmptyQuery => {
                AppError::bad_request_with_code("empty_query", e.to_string())
            }
            e @ ServiceError::MissingAsset { .. } => {
                AppError::bad_request_with_code("missing_asset", e.to_string())
            }
            ServiceError::PayloadTooLarge(message) => AppError::payload_too_large(message),
            ServiceError::Store(e) => AppError::Internal(anyhow::Error::new(e)),
            ServiceError::Internal(e) => AppError::Internal(e),
        }
    }
}

/// Map an error for a route that sends anonymous visitors to the login form.
pub fn login_redirect(error: ServiceError) -> AppError {
    AppError::from(error).redirect_unauthenticated()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, response::IntoResponse};

    fn status_of(error: ServiceError) -> StatusCode {
        AppError::from(error).into_response().status()
    }

    #[test]
    fn maps_domain_errors_to_statuses() {
        assert_eq!(
            status_of(ServiceError::validation("title", "required")),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(AuthError::NotFound.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(ServiceError::EmptyQuery), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(ServiceError::MissingAsset { missing: "image" }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ServiceError::PayloadTooLarge("too big".into())),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            status_of(ServiceError::NotFound("book".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ServiceError::InvalidTransition {
                id: RequestId(7),
                current: RequestStatus::Approved,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ServiceError::Store(StoreError::Backend("down".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn store_errors_become_domain_errors() {
        assert!(matches!(
            ServiceError::from(StoreError::not_found("book", "1234")),
            ServiceError::NotFound(_)
        ));
        assert!(matches!(
            ServiceError::from(StoreError::duplicate("book", "1234")),
            ServiceError::Conflict(_)
        ));
        assert!(matches!(
            ServiceError::from(StoreError::StatusMismatch {
                id: RequestId(1),
                current: RequestStatus::Denied,
                expected: RequestStatus::Pending,
            }),
            ServiceError::InvalidTransition {
                current: RequestStatus::Denied,
                ..
            }
        ));
    }

    #[test]
    fn anonymous_denial_redirects_only_through_login_redirect() {
        let plain = AppError::from(ServiceError::Forbidden(Forbidden::Unauthenticated));
        assert_eq!(plain.into_response().status(), StatusCode::UNAUTHORIZED);

        let redirected = login_redirect(ServiceError::Forbidden(Forbidden::Unauthenticated));
        assert_eq!(redirected.into_response().status(), StatusCode::SEE_OTHER);
    }
}
