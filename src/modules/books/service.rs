use serde::Deserialize;
use shelf_authz::{authorize, Action, Forbidden, SessionPrincipal, UserId};
use shelf_db::{AssetStore, Book, CatalogStore, Isbn, NewReview, Review, SavedBook};
use utoipa::ToSchema;

use crate::error::ServiceError;

const MAX_COMMENT_LEN: usize = 2000;

/// Parse an isbn taken from a path or form.
pub fn parse_isbn(raw: &str) -> Result<Isbn, ServiceError> {
    Isbn::parse(raw).map_err(|e| ServiceError::validation("isbn", e.to_string()))
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReviewForm {
    pub comment: String,
    pub rating: i64,
}

/// Reading the catalog and the per-user actions on it.
pub struct CatalogService<'a> {
    catalog: &'a dyn CatalogStore,
    assets: &'a dyn AssetStore,
}

impl<'a> CatalogService<'a> {
    pub const fn new(catalog: &'a dyn CatalogStore, assets: &'a dyn AssetStore) -> Self {
        Self { catalog, assets }
    }

    pub async fn browse(&self, principal: &SessionPrincipal) -> Result<Vec<Book>, ServiceError> {
        authorize(principal, Action::BrowseCatalog, None)?;
        Ok(self.catalog.list_books().await?)
    }

    pub async fn book(&self, principal: &SessionPrincipal, isbn: &Isbn) -> Result<Book, ServiceError> {
        authorize(principal, Action::ViewBook, None)?;
        self.require_book(isbn).await
    }

    pub async fn reviews(
        &self,
        principal: &SessionPrincipal,
        isbn: &Isbn,
    ) -> Result<Vec<Review>, ServiceError> {
        authorize(principal, Action::ViewReviews, None)?;
        self.require_book(isbn).await?;
        Ok(self.catalog.get_reviews(isbn).await?)
    }

    pub async fn add_review(
        &self,
        principal: &SessionPrincipal,
        isbn: &Isbn,
        form: ReviewForm,
    ) -> Result<Review, ServiceError> {
        let user_id = require_user(principal, Action::WriteReview)?;

        let comment = form.comment.trim().to_string();
        if comment.is_empty() || comment.chars().count() > MAX_COMMENT_LEN {
            return Err(ServiceError::validation(
                "comment",
                format!("must be between 1 and {MAX_COMMENT_LEN} characters"),
            ));
        }
        let rating = u8::try_from(form.rating)
            .ok()
            .filter(|r| (1..=5).contains(r))
            .ok_or_else(|| ServiceError::validation("rating", "must be between 1 and 5"))?;

        let review = self
            .catalog
            .add_review(NewReview {
                book_isbn: isbn.clone(),
                user_id,
                comment,
                rating,
            })
            .await?;

        tracing::info!(isbn = %isbn, user_id = %user_id, rating, "review added");
        Ok(review)
    }

    pub async fn save(&self, principal: &SessionPrincipal, isbn: &Isbn) -> Result<SavedBook, ServiceError> {
        let user_id = require_user(principal, Action::SaveBook)?;
        Ok(self.catalog.save_book(user_id, isbn).await?)
    }

    pub async fn unsave(&self, principal: &SessionPrincipal, isbn: &Isbn) -> Result<bool, ServiceError> {
        let user_id = require_user(principal, Action::SaveBook)?;
        Ok(self.catalog.unsave_book(user_id, isbn).await?)
    }

    /// Saved books of `owner`, or of the principal when `owner` is `None`.
    pub async fn saved_books(
        &self,
        principal: &SessionPrincipal,
        owner: Option<UserId>,
    ) -> Result<Vec<Book>, ServiceError> {
        authorize(principal, Action::ViewSavedBooks, owner)?;
        let user_id = principal
            .identity()
            .user_id()
            .ok_or(ServiceError::Forbidden(Forbidden::NotUser))?;

        let isbns = self.catalog.get_saved_books(owner.unwrap_or(user_id)).await?;
        Ok(self.catalog.get_books(&isbns).await?)
    }

    /// Bytes of the book's PDF.
    pub async fn read_pdf(&self, principal: &SessionPrincipal, isbn: &Isbn) -> Result<Vec<u8>, ServiceError> {
        let book = self.book(principal, isbn).await?;
        self.assets
            .read(&book.pdf_asset)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("no pdf stored for book '{isbn}'")))
    }

    async fn require_book(&self, isbn: &Isbn) -> Result<Book, ServiceError> {
        self.catalog
            .get_book(isbn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("book '{isbn}' not found")))
    }
}

fn require_user(principal: &SessionPrincipal, action: Action) -> Result<UserId, ServiceError> {
    authorize(principal, action, None)?;
    principal
        .identity()
        .user_id()
        .ok_or(ServiceError::Forbidden(Forbidden::NotUser))
}
