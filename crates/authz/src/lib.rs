//! Authorization primitives for SHELF.
//!
//! A request carries exactly one [`SessionPrincipal`]. Every component that
//! mutates state receives the principal explicitly and asks the guard in
//! [`guard`] whether the [`Action`] is permitted before touching a store.

pub mod guard;
pub mod identity;

pub use guard::{allow, authorize, Action, Forbidden, Scope};
pub use identity::{AdminId, Identity, SessionPrincipal, UserId, DEFAULT_SESSION_TTL};
