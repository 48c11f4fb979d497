use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use utoipa::ToSchema;

/// Sessions live for a fixed hour from the moment they are established.
pub const DEFAULT_SESSION_TTL: Duration = Duration::hours(1);

/// Identifier of a registered (non-admin) user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an administrator. Admin ids live in their own id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct AdminId(pub i64);

impl fmt::Display for AdminId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who is behind a session.
///
/// Users and admins are disjoint capability sets, not a hierarchy: an admin
/// never owns saved books, reviews, or requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Identity {
    Anonymous,
    User { id: UserId, name: String },
    Admin { id: AdminId, name: String },
}

impl Identity {
    pub fn user(id: UserId, name: impl Into<String>) -> Self {
        Self::User {
            id,
            name: name.into(),
        }
    }

    pub fn admin(id: AdminId, name: impl Into<String>) -> Self {
        Self::Admin {
            id,
            name: name.into(),
        }
    }

    pub const fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User { id, .. } => Some(*id),
            _ => None,
        }
    }

    pub const fn admin_id(&self) -> Option<AdminId> {
        match self {
            Self::Admin { id, .. } => Some(*id),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::User { name, .. } | Self::Admin { name, .. } => Some(name),
        }
    }

    /// Short label used in log fields.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::User { .. } => "user",
            Self::Admin { .. } => "admin",
        }
    }
}

/// The identity attached to one session together with its lifetime.
///
/// Principals are values: they are read from the session store at the start
/// of a request and handed to every component that needs them. Nothing reads
/// the identity from ambient state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SessionPrincipal {
    pub identity: Identity,
    #[schema(value_type = String)]
    pub created_at: OffsetDateTime,
    #[schema(value_type = String)]
    pub expires_at: OffsetDateTime,
}

impl SessionPrincipal {
    /// Start a session for `identity` that expires `ttl` from now.
    pub fn establish(identity: Identity, ttl: Duration) -> Self {
        Self::establish_at(identity, ttl, OffsetDateTime::now_utc())
    }

    pub fn establish_at(identity: Identity, ttl: Duration, now: OffsetDateTime) -> Self {
        Self {
            identity,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Principal used for requests without a live session.
    pub fn anonymous() -> Self {
        Self::establish(Identity::Anonymous, DEFAULT_SESSION_TTL)
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}
