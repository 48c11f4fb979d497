//! The authorization guard.
//!
//! [`authorize`] is a pure function of the principal's identity, the action,
//! and the optional owner of the target resource. Rules are evaluated in a
//! fixed precedence:
//!
//! 1. admin actions require an admin,
//! 2. user actions require a user (an admin is refused regardless of owner),
//! 3. owner-scoped user actions require the owner to match,
//! 4. everything else is public.

use serde::Serialize;
use thiserror::Error;

use crate::identity::{Identity, SessionPrincipal, UserId};

/// Something a principal may attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    BrowseCatalog,
    ViewBook,
    ViewReviews,
    Search,
    Login,
    Register,
    SaveBook,
    WriteReview,
    SubmitRequest,
    ViewSavedBooks,
    ViewOwnRequests,
    AddBook,
    UpdateBook,
    RemoveBook,
    ListRequests,
    DecideRequest,
}

/// Who an action is reserved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Public,
    User,
    Admin,
}

impl Action {
    pub const ALL: [Action; 16] = [
        Action::BrowseCatalog,
        Action::ViewBook,
        Action::ViewReviews,
        Action::Search,
        Action::Login,
        Action::Register,
        Action::SaveBook,
        Action::WriteReview,
        Action::SubmitRequest,
        Action::ViewSavedBooks,
        Action::ViewOwnRequests,
        Action::AddBook,
        Action::UpdateBook,
        Action::RemoveBook,
        Action::ListRequests,
        Action::DecideRequest,
    ];

    pub const fn scope(self) -> Scope {
        match self {
            Action::AddBook
            | Action::UpdateBook
            | Action::RemoveBook
            | Action::ListRequests
            | Action::DecideRequest => Scope::Admin,
            Action::SaveBook
            | Action::WriteReview
            | Action::SubmitRequest
            | Action::ViewSavedBooks
            | Action::ViewOwnRequests => Scope::User,
            Action::BrowseCatalog
            | Action::ViewBook
            | Action::ViewReviews
            | Action::Search
            | Action::Login
            | Action::Register => Scope::Public,
        }
    }

    /// Actions whose target belongs to a specific user.
    pub const fn is_owner_scoped(self) -> bool {
        matches!(self, Action::ViewSavedBooks | Action::ViewOwnRequests)
    }
}

/// Why the guard refused an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Forbidden {
    #[error("this action is reserved for administrators")]
    NotAdmin,
    #[error("administrators cannot perform this action")]
    NotUser,
    #[error("this resource belongs to another user")]
    NotOwner,
    #[error("you must be signed in to do that")]
    Unauthenticated,
}

impl Forbidden {
    /// Stable machine-readable code for error bodies.
    pub const fn code(self) -> &'static str {
        match self {
            Forbidden::NotAdmin => "not_admin",
            Forbidden::NotUser => "not_user",
            Forbidden::NotOwner => "not_owner",
            Forbidden::Unauthenticated => "unauthenticated",
        }
    }
}

/// Decide whether `principal` may perform `action`.
///
/// `resource_owner` is only consulted for owner-scoped actions; passing
/// `None` means the caller is acting on their own resources.
pub fn authorize(
    principal: &SessionPrincipal,
    action: Action,
    resource_owner: Option<UserId>,
) -> Result<(), Forbidden> {
    let decision = decide(principal.identity(), action, resource_owner);

    if let Err(reason) = decision {
        tracing::debug!(
            target: "shelf-authz",
            identity = principal.identity().kind(),
            action = ?action,
            reason = reason.code(),
            "authorization denied"
        );
    }

    decision
}

/// Boolean form of [`authorize`].
pub fn allow(principal: &SessionPrincipal, action: Action, resource_owner: Option<UserId>) -> bool {
    authorize(principal, action, resource_owner).is_ok()
}

fn decide(identity: &Identity, action: Action, resource_owner: Option<UserId>) -> Result<(), Forbidden> {
    match (action.scope(), identity) {
        (Scope::Public, _) => Ok(()),
        (_, Identity::Anonymous) => Err(Forbidden::Unauthenticated),
        (Scope::Admin, Identity::Admin { .. }) => Ok(()),
        (Scope::Admin, Identity::User { .. }) => Err(Forbidden::NotAdmin),
        (Scope::User, Identity::Admin { .. }) => Err(Forbidden::NotUser),
        (Scope::User, Identity::User { id, .. }) => match resource_owner {
            Some(owner) if action.is_owner_scoped() && owner != *id => Err(Forbidden::NotOwner),
            _ => Ok(()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{AdminId, DEFAULT_SESSION_TTL};

    fn principal(identity: Identity) -> SessionPrincipal {
        SessionPrincipal::establish(identity, DEFAULT_SESSION_TTL)
    }

    fn identities() -> Vec<Identity> {
        vec![
            Identity::Anonymous,
            Identity::user(UserId(1), "alice"),
            Identity::user(UserId(2), "bob"),
            Identity::admin(AdminId(1), "root"),
        ]
    }

    #[test]
    fn admin_actions_require_admin() {
        let admin = principal(Identity::admin(AdminId(1), "root"));
        let user = principal(Identity::user(UserId(1), "alice"));
        let anonymous = principal(Identity::Anonymous);

        for action in Action::ALL.into_iter().filter(|a| a.scope() == Scope::Admin) {
            assert_eq!(authorize(&admin, action, None), Ok(()));
            assert_eq!(authorize(&user, action, None), Err(Forbidden::NotAdmin));
            assert_eq!(
                authorize(&anonymous, action, None),
                Err(Forbidden::Unauthenticated)
            );
        }
    }

    #[test]
    fn admin_is_never_a_user_even_when_owner_matches() {
        let admin = principal(Identity::admin(AdminId(1), "root"));

        for action in Action::ALL.into_iter().filter(|a| a.scope() == Scope::User) {
            assert_eq!(authorize(&admin, action, None), Err(Forbidden::NotUser));
            assert_eq!(
                authorize(&admin, action, Some(UserId(1))),
                Err(Forbidden::NotUser)
            );
        }
    }

    #[test]
    fn owner_mismatch_denies_valid_user() {
        let alice = principal(Identity::user(UserId(1), "alice"));

        assert_eq!(
            authorize(&alice, Action::ViewSavedBooks, Some(UserId(1))),
            Ok(())
        );
        assert_eq!(
            authorize(&alice, Action::ViewSavedBooks, Some(UserId(2))),
            Err(Forbidden::NotOwner)
        );
        // Owner is ignored for actions that are not owner-scoped.
        assert_eq!(authorize(&alice, Action::WriteReview, Some(UserId(2))), Ok(()));
    }

    #[test]
    fn anonymous_only_gets_public_actions() {
        let anonymous = principal(Identity::Anonymous);

        for action in Action::ALL {
            let expected = if action.scope() == Scope::Public {
                Ok(())
            } else {
                Err(Forbidden::Unauthenticated)
            };
            assert_eq!(authorize(&anonymous, action, None), expected, "{action:?}");
        }
    }

    #[test]
    fn decisions_are_deterministic() {
        let owners = [None, Some(UserId(1)), Some(UserId(2))];

        for identity in identities() {
            let p = principal(identity);
            for action in Action::ALL {
                for owner in owners {
                    let first = authorize(&p, action, owner);
                    let second = authorize(&p, action, owner);
                    assert_eq!(first, second);
                    assert_eq!(allow(&p, action, owner), first.is_ok());
                }
            }
        }
    }

    #[test]
    fn forbidden_codes_are_distinct() {
        let codes = [
            Forbidden::NotAdmin.code(),
            Forbidden::NotUser.code(),
            Forbidden::NotOwner.code(),
            Forbidden::Unauthenticated.code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
