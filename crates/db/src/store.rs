use async_trait::async_trait;
use shelf_authz::{AdminId, UserId};

use crate::error::StoreResult;
use crate::models::{
    AdminRecord, AssetRef, Book, BookFilter, BookRequest, Isbn, NewAdmin, NewRequest, NewReview,
    NewUser, RequestFilter, RequestId, RequestStatus, Review, SavedBook, UserRecord,
};

/// Persistence for user and admin credentials.
///
/// Usernames are unique across users *and* admins, compared
/// case-insensitively, so login never has to guess which record a name
/// refers to.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_user(&self, username: &str) -> StoreResult<Option<UserRecord>>;

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>>;

    async fn get_admin(&self, username: &str) -> StoreResult<Option<AdminRecord>>;

    /// Fails with `Duplicate` when the username (user or admin) or the email
    /// is already taken.
    async fn add_user(&self, user: NewUser) -> StoreResult<UserRecord>;

    /// Fails with `Duplicate` when the username (user or admin) is taken.
    async fn add_admin(&self, admin: NewAdmin) -> StoreResult<AdminRecord>;
}

/// Persistence for books, reviews, saved-book links, and requests.
///
/// Every method is atomic with respect to every other method on the same
/// store.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Every book, ordered by isbn.
    async fn list_books(&self) -> StoreResult<Vec<Book>>;

    /// Hydrate isbns into records, preserving input order. Unknown isbns are
    /// skipped.
    async fn get_books(&self, isbns: &[Isbn]) -> StoreResult<Vec<Book>>;

    async fn get_book(&self, isbn: &Isbn) -> StoreResult<Option<Book>>;

    /// Isbns of books matching every criterion in `filter`, ordered by isbn.
    async fn search_books(&self, filter: &BookFilter) -> StoreResult<Vec<Isbn>>;

    /// Isbns of books whose text fields contain `term`, ordered by isbn.
    async fn search_books_by_term(&self, term: &str) -> StoreResult<Vec<Isbn>>;

    /// Fails with `Duplicate` when the isbn is already live.
    async fn add_book(&self, book: Book) -> StoreResult<Book>;

    /// Swap the record at `isbn` for `book` in one step and return the
    /// previous record. `book.isbn` may differ from `isbn`; reviews and saved
    /// links follow the book to its new key.
    async fn replace_book(&self, isbn: &Isbn, book: Book) -> StoreResult<Book>;

    /// Remove a book together with its reviews and saved links.
    async fn remove_book(&self, isbn: &Isbn) -> StoreResult<Book>;

    async fn add_review(&self, review: NewReview) -> StoreResult<Review>;

    async fn get_reviews(&self, isbn: &Isbn) -> StoreResult<Vec<Review>>;

    /// Idempotent.
    async fn save_book(&self, user_id: UserId, isbn: &Isbn) -> StoreResult<SavedBook>;

    /// Returns whether a link was removed.
    async fn unsave_book(&self, user_id: UserId, isbn: &Isbn) -> StoreResult<bool>;

    async fn get_saved_books(&self, user_id: UserId) -> StoreResult<Vec<Isbn>>;

    async fn add_request(&self, request: NewRequest) -> StoreResult<BookRequest>;

    async fn get_request(&self, id: RequestId) -> StoreResult<Option<BookRequest>>;

    /// Requests matching `filter`, ordered by id.
    async fn get_requests(&self, filter: RequestFilter) -> StoreResult<Vec<BookRequest>>;

    /// Compare-and-set: move request `id` from `expected` to `status`,
    /// recording the deciding admin. Fails with `StatusMismatch` when the
    /// current status is not `expected`.
    async fn update_request_status(
        &self,
        id: RequestId,
        expected: RequestStatus,
        status: RequestStatus,
        decided_by: AdminId,
    ) -> StoreResult<BookRequest>;
}

/// Handle to an asset written durably under a temporary name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedAsset {
    pub target: AssetRef,
    pub token: String,
}

/// Binary storage for book PDFs and cover images.
///
/// Writes are two-phase: [`stage`](AssetStore::stage) persists the bytes
/// without making them visible, [`commit`](AssetStore::commit) publishes them
/// under their final name (replacing whatever was there), and
/// [`discard`](AssetStore::discard) throws them away.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn stage(&self, target: &AssetRef, bytes: Vec<u8>) -> StoreResult<StagedAsset>;

    async fn commit(&self, staged: StagedAsset) -> StoreResult<()>;

    async fn discard(&self, staged: StagedAsset) -> StoreResult<()>;

    /// Idempotent.
    async fn remove(&self, asset: &AssetRef) -> StoreResult<()>;

    async fn read(&self, asset: &AssetRef) -> StoreResult<Option<Vec<u8>>>;
}
