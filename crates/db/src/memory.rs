//! In-process store implementations.
//!
//! Each store keeps its tables behind a single `tokio::sync::RwLock`, which
//! makes every trait method atomic. State is lost on restart.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use shelf_authz::{AdminId, UserId};
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::models::{
    AdminRecord, AssetRef, Book, BookFilter, BookRequest, Isbn, NewAdmin, NewRequest, NewReview,
    NewUser, RequestFilter, RequestId, RequestStatus, Review, ReviewId, SavedBook, UserRecord,
};
use crate::store::{AssetStore, CatalogStore, CredentialStore, StagedAsset};

#[derive(Default)]
struct Credentials {
    users: BTreeMap<UserId, UserRecord>,
    admins: BTreeMap<AdminId, AdminRecord>,
    last_user_id: i64,
    last_admin_id: i64,
}

impl Credentials {
    fn user_by_name(&self, username: &str) -> Option<&UserRecord> {
        self.users
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
    }

    fn admin_by_name(&self, username: &str) -> Option<&AdminRecord> {
        self.admins
            .values()
            .find(|a| a.username.eq_ignore_ascii_case(username))
    }

    fn name_taken(&self, username: &str) -> bool {
        self.user_by_name(username).is_some() || self.admin_by_name(username).is_some()
    }
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<Credentials>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get_user(&self, username: &str) -> StoreResult<Option<UserRecord>> {
        Ok(self.inner.read().await.user_by_name(username).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn get_admin(&self, username: &str) -> StoreResult<Option<AdminRecord>> {
        Ok(self.inner.read().await.admin_by_name(username).cloned())
    }

    async fn add_user(&self, user: NewUser) -> StoreResult<UserRecord> {
        let mut inner = self.inner.write().await;

        if inner.name_taken(&user.username) {
            return Err(StoreError::duplicate("user", &user.username));
        }
        if inner
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(StoreError::duplicate("email", &user.email));
        }

        inner.last_user_id += 1;
        let record = UserRecord {
            id: UserId(inner.last_user_id),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
        };
        inner.users.insert(record.id, record.clone());

        tracing::debug!(target: "shelf-db", user_id = %record.id, "user stored");
        Ok(record)
    }

    async fn add_admin(&self, admin: NewAdmin) -> StoreResult<AdminRecord> {
        let mut inner = self.inner.write().await;

        if inner.name_taken(&admin.username) {
            return Err(StoreError::duplicate("admin", &admin.username));
        }

        inner.last_admin_id += 1;
        let record = AdminRecord {
            id: AdminId(inner.last_admin_id),
            username: admin.username,
            password_hash: admin.password_hash,
        };
        inner.admins.insert(record.id, record.clone());

        tracing::debug!(target: "shelf-db", admin_id = %record.id, "admin stored");
        Ok(record)
    }
}

#[derive(Default)]
struct Catalog {
    books: BTreeMap<Isbn, Book>,
    reviews: BTreeMap<ReviewId, Review>,
    saved: BTreeSet<SavedBook>,
    requests: BTreeMap<RequestId, BookRequest>,
    last_review_id: i64,
    last_request_id: i64,
}

impl Catalog {
    fn require_book(&self, isbn: &Isbn) -> StoreResult<()> {
        if self.books.contains_key(isbn) {
            Ok(())
        } else {
            Err(StoreError::not_found("book", isbn))
        }
    }

    fn rekey_links(&mut self, from: &Isbn, to: &Isbn) {
        for review in self.reviews.values_mut() {
            if &review.book_isbn == from {
                review.book_isbn = to.clone();
            }
        }

        let moved: Vec<SavedBook> = self
            .saved
            .iter()
            .filter(|link| &link.book_isbn == from)
            .cloned()
            .collect();
        for link in moved {
            self.saved.remove(&link);
            self.saved.insert(SavedBook {
                user_id: link.user_id,
                book_isbn: to.clone(),
            });
        }
    }
}

#[derive(Default)]
pub struct MemoryCatalogStore {
    inner: RwLock<Catalog>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn list_books(&self) -> StoreResult<Vec<Book>> {
        Ok(self.inner.read().await.books.values().cloned().collect())
    }

    async fn get_books(&self, isbns: &[Isbn]) -> StoreResult<Vec<Book>> {
        let inner = self.inner.read().await;
        Ok(isbns
            .iter()
            .filter_map(|isbn| inner.books.get(isbn).cloned())
            .collect())
    }

    async fn get_book(&self, isbn: &Isbn) -> StoreResult<Option<Book>> {
        Ok(self.inner.read().await.books.get(isbn).cloned())
    }

    async fn search_books(&self, filter: &BookFilter) -> StoreResult<Vec<Isbn>> {
        let inner = self.inner.read().await;
        Ok(inner
            .books
            .values()
            .filter(|book| filter.matches(book))
            .map(|book| book.isbn.clone())
            .collect())
    }

    async fn search_books_by_term(&self, term: &str) -> StoreResult<Vec<Isbn>> {
        let inner = self.inner.read().await;
        Ok(inner
            .books
            .values()
            .filter(|book| book.matches_term(term))
            .map(|book| book.isbn.clone())
            .collect())
    }

    async fn add_book(&self, book: Book) -> StoreResult<Book> {
        let mut inner = self.inner.write().await;

        if inner.books.contains_key(&book.isbn) {
            return Err(StoreError::duplicate("book", &book.isbn));
        }

        inner.books.insert(book.isbn.clone(), book.clone());
        Ok(book)
    }

    async fn replace_book(&self, isbn: &Isbn, book: Book) -> StoreResult<Book> {
        let mut inner = self.inner.write().await;

        inner.require_book(isbn)?;
        if &book.isbn != isbn && inner.books.contains_key(&book.isbn) {
            return Err(StoreError::duplicate("book", &book.isbn));
        }

        let previous = inner
            .books
            .remove(isbn)
            .ok_or_else(|| StoreError::not_found("book", isbn))?;
        if &book.isbn != isbn {
            inner.rekey_links(isbn, &book.isbn);
        }
        inner.books.insert(book.isbn.clone(), book);

        Ok(previous)
    }

    async fn remove_book(&self, isbn: &Isbn) -> StoreResult<Book> {
        let mut inner = self.inner.write().await;

        let removed = inner
            .books
            .remove(isbn)
            .ok_or_else(|| StoreError::not_found("book", isbn))?;
        inner.reviews.retain(|_, review| &review.book_isbn != isbn);
        inner.saved.retain(|link| &link.book_isbn != isbn);

        Ok(removed)
    }

    async fn add_review(&self, review: NewReview) -> StoreResult<Review> {
        let mut inner = self.inner.write().await;
        inner.require_book(&review.book_isbn)?;

        inner.last_review_id += 1;
        let record = Review {
            id: ReviewId(inner.last_review_id),
            book_isbn: review.book_isbn,
            user_id: review.user_id,
            comment: review.comment,
            rating: review.rating,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.reviews.insert(record.id, record.clone());

        Ok(record)
    }

    async fn get_reviews(&self, isbn: &Isbn) -> StoreResult<Vec<Review>> {
        let inner = self.inner.read().await;
        Ok(inner
            .reviews
            .values()
            .filter(|review| &review.book_isbn == isbn)
            .cloned()
            .collect())
    }

    async fn save_book(&self, user_id: UserId, isbn: &Isbn) -> StoreResult<SavedBook> {
        let mut inner = self.inner.write().await;
        inner.require_book(isbn)?;

        let link = SavedBook {
            user_id,
            book_isbn: isbn.clone(),
        };
        inner.saved.insert(link.clone());
        Ok(link)
    }

    async fn unsave_book(&self, user_id: UserId, isbn: &Isbn) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.saved.remove(&SavedBook {
            user_id,
            book_isbn: isbn.clone(),
        }))
    }

    async fn get_saved_books(&self, user_id: UserId) -> StoreResult<Vec<Isbn>> {
        let inner = self.inner.read().await;
        Ok(inner
            .saved
            .iter()
            .filter(|link| link.user_id == user_id)
            .map(|link| link.book_isbn.clone())
            .collect())
    }

    async fn add_request(&self, request: NewRequest) -> StoreResult<BookRequest> {
        let mut inner = self.inner.write().await;

        inner.last_request_id += 1;
        let record = BookRequest {
            id: RequestId(inner.last_request_id),
            user_id: request.user_id,
            title: request.title,
            letter: request.letter,
            status: RequestStatus::Pending,
            decided_by: None,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.requests.insert(record.id, record.clone());

        Ok(record)
    }

    async fn get_request(&self, id: RequestId) -> StoreResult<Option<BookRequest>> {
        Ok(self.inner.read().await.requests.get(&id).cloned())
    }

    async fn get_requests(&self, filter: RequestFilter) -> StoreResult<Vec<BookRequest>> {
        let inner = self.inner.read().await;
        Ok(inner
            .requests
            .values()
            .filter(|request| filter.matches(request))
            .cloned()
            .collect())
    }

    async fn update_request_status(
        &self,
        id: RequestId,
        expected: RequestStatus,
        status: RequestStatus,
        decided_by: AdminId,
    ) -> StoreResult<BookRequest> {
        let mut inner = self.inner.write().await;

        let request = inner
            .requests
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("request", id))?;
        if request.status != expected {
            return Err(StoreError::StatusMismatch {
                id,
                current: request.status,
                expected,
            });
        }

        request.status = status;
        request.decided_by = Some(decided_by);
        Ok(request.clone())
    }
}

#[derive(Default)]
struct Assets {
    committed: HashMap<AssetRef, Vec<u8>>,
    staged: HashMap<String, (AssetRef, Vec<u8>)>,
}

/// Asset store that keeps every file in memory.
#[derive(Default)]
pub struct MemoryAssetStore {
    inner: RwLock<Assets>,
    next_token: AtomicU64,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of staged assets not yet committed or discarded.
    pub async fn pending_count(&self) -> usize {
        self.inner.read().await.staged.len()
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn stage(&self, target: &AssetRef, bytes: Vec<u8>) -> StoreResult<StagedAsset> {
        let token = format!("staged-{}", self.next_token.fetch_add(1, Ordering::Relaxed));
        self.inner
            .write()
            .await
            .staged
            .insert(token.clone(), (target.clone(), bytes));

        Ok(StagedAsset {
            target: target.clone(),
            token,
        })
    }

    async fn commit(&self, staged: StagedAsset) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let (target, bytes) = inner
            .staged
            .remove(&staged.token)
            .ok_or_else(|| StoreError::not_found("staged asset", &staged.token))?;
        inner.committed.insert(target, bytes);
        Ok(())
    }

    async fn discard(&self, staged: StagedAsset) -> StoreResult<()> {
        self.inner.write().await.staged.remove(&staged.token);
        Ok(())
    }

    async fn remove(&self, asset: &AssetRef) -> StoreResult<()> {
        self.inner.write().await.committed.remove(asset);
        Ok(())
    }

    async fn read(&self, asset: &AssetRef) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.inner.read().await.committed.get(asset).cloned())
    }
}
