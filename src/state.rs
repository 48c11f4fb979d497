use std::sync::Arc;

use shelf_db::{
    AssetStore, CatalogStore, CredentialStore, FsAssetStore, MemoryAssetStore,
    MemoryCatalogStore, MemoryCredentialStore,
};
use shelf_kernel::settings::{AuthSettings, Settings};

use crate::modules::books::assets::IsbnLocks;

/// Shared handles every feature module routes against.
#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<dyn CredentialStore>,
    pub catalog: Arc<dyn CatalogStore>,
    pub assets: Arc<dyn AssetStore>,
    pub auth: Arc<AuthSettings>,
    pub isbn_locks: IsbnLocks,
    /// Body limit of the book upload routes.
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        catalog: Arc<dyn CatalogStore>,
        assets: Arc<dyn AssetStore>,
        auth: AuthSettings,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            credentials,
            catalog,
            assets,
            auth: Arc::new(auth),
            isbn_locks: IsbnLocks::default(),
            max_upload_bytes,
        }
    }

    /// In-process stores with assets on disk under `storage.asset_dir`.
    pub fn from_settings(settings: &Settings) -> Self {
        tracing::info!(
            asset_dir = %settings.storage.asset_dir.display(),
            "using filesystem asset store"
        );
        Self::new(
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(MemoryCatalogStore::new()),
            Arc::new(FsAssetStore::new(settings.storage.asset_dir.clone())),
            settings.auth.clone(),
            settings.storage.max_upload_bytes,
        )
    }

    /// Everything in memory.
    pub fn in_memory(settings: &Settings) -> Self {
        Self::new(
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(MemoryCatalogStore::new()),
            Arc::new(MemoryAssetStore::new()),
            settings.auth.clone(),
            settings.storage.max_upload_bytes,
        )
    }

    pub fn session_ttl(&self) -> time::Duration {
        time::Duration::seconds(self.auth.session_ttl_secs)
    }
}
