//! Filesystem-backed asset store.
//!
//! Assets live at `{root}/{kind}/{isbn}.{ext}`. Staged files are written to
//! `{root}/.staging/` and fsynced before `stage` returns; `commit` is a
//! rename into place, so readers see either the old file or the new one.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{StoreError, StoreResult};
use crate::models::AssetRef;
use crate::store::{AssetStore, StagedAsset};

const STAGING_DIR: &str = ".staging";

#[derive(Debug, Clone)]
pub struct FsAssetStore {
    root: PathBuf,
}

impl FsAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn final_path(&self, asset: &AssetRef) -> StoreResult<PathBuf> {
        let relative = Path::new(asset.as_str());
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(StoreError::Backend(format!(
                "asset name '{asset}' escapes the asset root"
            )));
        }
        Ok(self.root.join(relative))
    }

    fn staging_path(&self, token: &str) -> PathBuf {
        self.root.join(STAGING_DIR).join(token)
    }
}

#[async_trait]
impl AssetStore for FsAssetStore {
    async fn stage(&self, target: &AssetRef, bytes: Vec<u8>) -> StoreResult<StagedAsset> {
        // Validate the destination up front so commit cannot fail on it.
        self.final_path(target)?;

        let token = uuid::Uuid::new_v4().to_string();
        let path = self.staging_path(&token);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(&path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;

        tracing::debug!(
            target: "shelf-db",
            asset = %target,
            bytes = bytes.len(),
            "asset staged"
        );

        Ok(StagedAsset {
            target: target.clone(),
            token,
        })
    }

    async fn commit(&self, staged: StagedAsset) -> StoreResult<()> {
        let destination = self.final_path(&staged.target)?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::rename(self.staging_path(&staged.token), &destination).await?;
        tracing::debug!(target: "shelf-db", asset = %staged.target, "asset committed");
        Ok(())
    }

    async fn discard(&self, staged: StagedAsset) -> StoreResult<()> {
        match tokio::fs::remove_file(self.staging_path(&staged.token)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, asset: &AssetRef) -> StoreResult<()> {
        match tokio::fs::remove_file(self.final_path(asset)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn read(&self, asset: &AssetRef) -> StoreResult<Option<Vec<u8>>> {
        match tokio::fs::read(self.final_path(asset)?).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
