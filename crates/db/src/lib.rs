//! Storage layer for SHELF.
//!
//! The service talks to three collaborators through traits: a
//! [`CredentialStore`] for users and admins, a [`CatalogStore`] for books and
//! everything hanging off them, and an [`AssetStore`] for uploaded files.
//! In-process implementations live in [`memory`] and [`fs`].

pub mod error;
pub mod fs;
pub mod memory;
pub mod models;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use fs::FsAssetStore;
pub use memory::{MemoryAssetStore, MemoryCatalogStore, MemoryCredentialStore};
pub use models::*;
pub use store::{AssetStore, CatalogStore, CredentialStore, StagedAsset};
