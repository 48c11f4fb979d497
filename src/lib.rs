//! SHELF application library
//!
//! The library catalog's feature modules (`accounts`, `books`, `search`,
//! `requests`), the services behind them, and the bootstrap that wires them
//! into the kernel.

// The OpenAPI fragments are large `json!` literals.
#![recursion_limit = "256"]

pub mod bootstrap;
pub mod error;
pub mod modules;
pub mod state;

pub use bootstrap::{build_app, run, App};
pub use error::{AuthError, ServiceError};
pub use state::AppState;
