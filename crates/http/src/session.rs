//! Server-side sessions and the principal extractor.
//!
//! The cookie only carries the session id; the [`SessionPrincipal`] lives in
//! the session store. Expiry is checked lazily each time the principal is
//! read: an expired principal is dropped from the session and the request
//! proceeds as anonymous.

use axum::{extract::FromRequestParts, http::request::Parts};
use shelf_authz::{Identity, SessionPrincipal};
use time::Duration;
use tower_sessions::{
    cookie::SameSite, Expiry, MemoryStore, Session, SessionManagerLayer,
};

use shelf_kernel::settings::AuthSettings;

use crate::error::AppError;

/// Session key holding the serialized principal.
pub const PRINCIPAL_KEY: &str = "principal";

/// Build the session layer backed by the in-process store.
pub fn create_session_layer(auth: &AuthSettings) -> SessionManagerLayer<MemoryStore> {
    SessionManagerLayer::new(MemoryStore::default())
        .with_name(auth.cookie_name.clone())
        .with_secure(auth.secure_cookie)
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_expiry(Expiry::OnInactivity(Duration::seconds(
            auth.session_ttl_secs,
        )))
}

/// The principal of the current request. Never rejects for anonymous
/// visitors; authorization is the guard's job.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub SessionPrincipal);

impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(session) = parts.extensions.get::<Session>().cloned() else {
            return Ok(Self(SessionPrincipal::anonymous()));
        };

        Ok(Self(load_principal(&session).await?))
    }
}

/// Read the principal from `session`, discarding it if it has expired.
pub async fn load_principal(session: &Session) -> Result<SessionPrincipal, AppError> {
    match session.get::<SessionPrincipal>(PRINCIPAL_KEY).await? {
        Some(principal) if principal.is_expired() => {
            tracing::info!(
                identity = principal.identity().kind(),
                expired_at = %principal.expires_at,
                "session expired"
            );
            session.flush().await?;
            Ok(SessionPrincipal::anonymous())
        }
        Some(principal) => Ok(principal),
        None => Ok(SessionPrincipal::anonymous()),
    }
}

/// Start a fresh session for `identity`.
///
/// The session id is cycled so a pre-login id cannot be reused, and the
/// cookie is pinned to the principal's fixed expiry.
pub async fn establish_session(
    session: &Session,
    identity: Identity,
    ttl: Duration,
) -> Result<SessionPrincipal, AppError> {
    let principal = SessionPrincipal::establish(identity, ttl);

    session.cycle_id().await?;
    session.set_expiry(Some(Expiry::AtDateTime(principal.expires_at)));
    session.insert(PRINCIPAL_KEY, &principal).await?;

    tracing::info!(
        identity = principal.identity().kind(),
        name = principal.identity().name().unwrap_or_default(),
        "session established"
    );
    Ok(principal)
}

/// Destroy the session. Safe to call on an already empty session.
pub async fn terminate_session(session: &Session) -> Result<(), AppError> {
    session.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use shelf_authz::{Identity, UserId};
    use time::OffsetDateTime;

    use super::*;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn expired_principal_reads_as_anonymous_and_is_dropped() {
        let session = session();
        let principal = SessionPrincipal::establish_at(
            Identity::user(UserId(1), "alice"),
            Duration::hours(1),
            OffsetDateTime::now_utc() - Duration::hours(2),
        );
        session.insert(PRINCIPAL_KEY, &principal).await.unwrap();

        let loaded = load_principal(&session).await.unwrap();
        assert_eq!(loaded.identity(), &Identity::Anonymous);
        assert!(session
            .get::<SessionPrincipal>(PRINCIPAL_KEY)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn live_principal_is_returned() {
        let session = session();
        let principal =
            SessionPrincipal::establish(Identity::user(UserId(1), "alice"), Duration::hours(1));
        session.insert(PRINCIPAL_KEY, &principal).await.unwrap();

        let loaded = load_principal(&session).await.unwrap();
        assert_eq!(loaded.identity().name(), Some("alice"));
    }
}
