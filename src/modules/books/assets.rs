//! Publishing books together with their files.
//!
//! A book record and its two assets change together. New files are staged
//! first, the record is swapped in one store call, and only then are stale
//! files removed and the staged ones committed. A failed swap discards the
//! staged files and leaves the previous record and files as they were.
//!
//! Every sequence holds the per-isbn lock for the isbns it touches, so two
//! updates of the same book never interleave.

use std::collections::HashMap;
use std::sync::Arc;

use shelf_authz::{authorize, Action, AdminId, Forbidden, SessionPrincipal};
use shelf_db::{AssetRef, AssetStore, Book, CatalogStore, Isbn, StagedAsset};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::upload::{AssetPair, BookUpload};
use crate::error::ServiceError;

/// Table of per-isbn mutexes.
#[derive(Clone, Default)]
pub struct IsbnLocks {
    table: Arc<Mutex<HashMap<Isbn, Arc<Mutex<()>>>>>,
}

/// Holds the locks of one sequence until dropped.
pub struct IsbnGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl IsbnLocks {
    /// Lock every isbn in `isbns`. Locks are taken in sorted order so
    /// overlapping sequences cannot deadlock.
    pub async fn acquire(&self, isbns: &[&Isbn]) -> IsbnGuard {
        let mut keys: Vec<Isbn> = isbns.iter().map(|isbn| (*isbn).clone()).collect();
        keys.sort();
        keys.dedup();

        let mutexes: Vec<Arc<Mutex<()>>> = {
            let mut table = self.table.lock().await;
            // Drop entries nobody holds.
            table.retain(|_, mutex| Arc::strong_count(mutex) > 1);
            keys.iter()
                .map(|key| table.entry(key.clone()).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }

        IsbnGuard { _guards: guards }
    }
}

/// Adds, replaces and removes books along with their assets.
pub struct AssetPublisher<'a> {
    catalog: &'a dyn CatalogStore,
    assets: &'a dyn AssetStore,
    locks: &'a IsbnLocks,
}

struct StagedPair {
    pdf: StagedAsset,
    image: StagedAsset,
}

impl<'a> AssetPublisher<'a> {
    pub const fn new(
        catalog: &'a dyn CatalogStore,
        assets: &'a dyn AssetStore,
        locks: &'a IsbnLocks,
    ) -> Self {
        Self {
            catalog,
            assets,
            locks,
        }
    }

    /// Add a new book.
    pub async fn add(&self, principal: &SessionPrincipal, upload: BookUpload) -> Result<Book, ServiceError> {
        let admin = require_admin(principal, Action::AddBook)?;
        let (draft, files) = upload.validate()?;
        let book = draft.into_book(admin, &files);

        let _guard = self.locks.acquire(&[&book.isbn]).await;

        if self.catalog.get_book(&book.isbn).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "book '{}' already exists",
                book.isbn
            )));
        }

        let staged = self.stage(&book, files).await?;
        if let Err(e) = self.catalog.add_book(book.clone()).await {
            self.discard(staged).await;
            return Err(e.into());
        }
        self.commit(staged).await?;

        tracing::info!(isbn = %book.isbn, admin_id = %admin, "book added");
        Ok(book)
    }

    /// Replace the book at `isbn` with the uploaded one. The upload may carry
    /// a different isbn; reviews and saved links follow the book.
    pub async fn replace(
        &self,
        principal: &SessionPrincipal,
        isbn: &Isbn,
        upload: BookUpload,
    ) -> Result<Book, ServiceError> {
        let admin = require_admin(principal, Action::UpdateBook)?;
        let (draft, files) = upload.validate()?;
        let book = draft.into_book(admin, &files);

        let _guard = self.locks.acquire(&[isbn, &book.isbn]).await;

        if self.catalog.get_book(isbn).await?.is_none() {
            return Err(ServiceError::NotFound(format!("book '{isbn}' not found")));
        }

        let staged = self.stage(&book, files).await?;
        let previous = match self.catalog.replace_book(isbn, book.clone()).await {
            Ok(previous) => previous,
            Err(e) => {
                self.discard(staged).await;
                return Err(e.into());
            }
        };

        // Names the new record reuses are overwritten by the commit below.
        for stale in [&previous.pdf_asset, &previous.image_asset] {
            if stale != &book.pdf_asset && stale != &book.image_asset {
                self.remove_quietly(stale).await;
            }
        }
        self.commit(staged).await?;

        tracing::info!(
            isbn = %isbn,
            new_isbn = %book.isbn,
            admin_id = %admin,
            "book replaced"
        );
        Ok(book)
    }

    /// Remove a book, its reviews, its saved links and its files.
    pub async fn remove(&self, principal: &SessionPrincipal, isbn: &Isbn) -> Result<Book, ServiceError> {
        let admin = require_admin(principal, Action::RemoveBook)?;

        let _guard = self.locks.acquire(&[isbn]).await;

        let removed = self.catalog.remove_book(isbn).await?;
        self.remove_quietly(&removed.pdf_asset).await;
        self.remove_quietly(&removed.image_asset).await;

        tracing::info!(isbn = %isbn, admin_id = %admin, "book removed");
        Ok(removed)
    }

    async fn stage(&self, book: &Book, files: AssetPair) -> Result<StagedPair, ServiceError> {
        let pdf = self.assets.stage(&book.pdf_asset, files.pdf.bytes).await?;
        let image = match self.assets.stage(&book.image_asset, files.image.bytes).await {
            Ok(image) => image,
            Err(e) => {
                if let Err(discard_error) = self.assets.discard(pdf).await {
                    tracing::warn!(error = %discard_error, "failed to discard staged pdf");
                }
                return Err(e.into());
            }
        };
        Ok(StagedPair { pdf, image })
    }

    async fn commit(&self, staged: StagedPair) -> Result<(), ServiceError> {
        self.assets.commit(staged.pdf).await?;
        self.assets.commit(staged.image).await?;
        Ok(())
    }

    async fn discard(&self, staged: StagedPair) {
        for asset in [staged.pdf, staged.image] {
            let target = asset.target.clone();
            if let Err(e) = self.assets.discard(asset).await {
                tracing::warn!(asset = %target, error = %e, "failed to discard staged asset");
            }
        }
    }

    async fn remove_quietly(&self, asset: &AssetRef) {
        if let Err(e) = self.assets.remove(asset).await {
            tracing::warn!(asset = %asset, error = %e, "failed to remove stale asset");
        }
    }
}

fn require_admin(principal: &SessionPrincipal, action: Action) -> Result<AdminId, ServiceError> {
    authorize(principal, action, None)?;
    principal
        .identity()
        .admin_id()
        .ok_or(ServiceError::Forbidden(Forbidden::NotAdmin))
}
