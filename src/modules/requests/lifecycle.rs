//! The book request state machine.
//!
//! ```text
//! pending ──approve──▶ approved
//!    └─────deny──────▶ denied
//! ```
//!
//! Requests start out pending. Only an administrator moves them, and only
//! out of pending; approved and denied are final. The status change itself is
//! a compare-and-set in the store, so of two racing decisions exactly one
//! wins and the other sees [`ServiceError::InvalidTransition`].

use shelf_authz::{authorize, Action, AdminId, Forbidden, SessionPrincipal, UserId};
use shelf_db::{BookRequest, CatalogStore, NewRequest, RequestFilter, RequestId, RequestStatus};

use crate::error::ServiceError;

const MAX_TITLE_LEN: usize = 200;
const MAX_LETTER_LEN: usize = 2000;

pub struct RequestLifecycle<'a> {
    catalog: &'a dyn CatalogStore,
}

impl<'a> RequestLifecycle<'a> {
    pub const fn new(catalog: &'a dyn CatalogStore) -> Self {
        Self { catalog }
    }

    /// File a new request as the signed-in user.
    pub async fn submit(
        &self,
        principal: &SessionPrincipal,
        title: &str,
        letter: &str,
    ) -> Result<BookRequest, ServiceError> {
        authorize(principal, Action::SubmitRequest, None)?;
        let user_id = signed_in_user(principal)?;

        let title = bounded("title", title, MAX_TITLE_LEN)?;
        let letter = bounded("letter", letter, MAX_LETTER_LEN)?;

        let request = self
            .catalog
            .add_request(NewRequest {
                user_id,
                title,
                letter,
            })
            .await?;

        tracing::info!(request_id = %request.id, user_id = %user_id, "book request submitted");
        Ok(request)
    }

    /// Every request, optionally narrowed to one status.
    pub async fn list(
        &self,
        principal: &SessionPrincipal,
        status: Option<RequestStatus>,
    ) -> Result<Vec<BookRequest>, ServiceError> {
        authorize(principal, Action::ListRequests, None)?;
        Ok(self
            .catalog
            .get_requests(RequestFilter {
                status,
                user_id: None,
            })
            .await?)
    }

    /// The signed-in user's own requests.
    pub async fn list_own(&self, principal: &SessionPrincipal) -> Result<Vec<BookRequest>, ServiceError> {
        authorize(principal, Action::ViewOwnRequests, None)?;
        let user_id = signed_in_user(principal)?;
        Ok(self
            .catalog
            .get_requests(RequestFilter {
                status: None,
                user_id: Some(user_id),
            })
            .await?)
    }

    /// Approve or deny a pending request.
    ///
    /// # Errors
    ///
    /// `Validation` when `status` is not final, `NotFound` for an unknown id
    /// and `InvalidTransition` when the request has already been decided.
    pub async fn decide(
        &self,
        principal: &SessionPrincipal,
        id: RequestId,
        status: RequestStatus,
    ) -> Result<BookRequest, ServiceError> {
        authorize(principal, Action::DecideRequest, None)?;
        let admin_id = signed_in_admin(principal)?;

        if !status.is_terminal() {
            return Err(ServiceError::validation(
                "status",
                "must be approved or denied",
            ));
        }

        let current = self
            .catalog
            .get_request(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("request {id} not found")))?;
        if current.status.is_terminal() {
            return Err(ServiceError::InvalidTransition {
                id,
                current: current.status,
            });
        }

        // A concurrent decision between the read above and this write
        // surfaces as StatusMismatch, which maps to InvalidTransition.
        let decided = self
            .catalog
            .update_request_status(id, RequestStatus::Pending, status, admin_id)
            .await?;

        tracing::info!(
            request_id = %id,
            status = %decided.status,
            admin_id = %admin_id,
            "book request decided"
        );
        Ok(decided)
    }
}

fn signed_in_user(principal: &SessionPrincipal) -> Result<UserId, ServiceError> {
    principal
        .identity()
        .user_id()
        .ok_or(ServiceError::Forbidden(Forbidden::NotUser))
}

fn signed_in_admin(principal: &SessionPrincipal) -> Result<AdminId, ServiceError> {
    principal
        .identity()
        .admin_id()
        .ok_or(ServiceError::Forbidden(Forbidden::NotAdmin))
}

fn bounded(field: &'static str, value: &str, max: usize) -> Result<String, ServiceError> {
    let value = value.trim();
    let len = value.chars().count();
    if len == 0 || len > max {
        return Err(ServiceError::validation(
            field,
            format!("must be between 1 and {max} characters"),
        ));
    }
    Ok(value.to_string())
}
