//! Turns sparse search input into a [`BookFilter`] and runs it.
//!
//! Searching is two steps: the store answers with isbns, and the isbns are
//! then hydrated into records in the same order.

use serde::Deserialize;
use shelf_authz::{authorize, Action, SessionPrincipal};
use shelf_db::{Book, BookFilter, CatalogStore, DateRange, Isbn};
use utoipa::{IntoParams, ToSchema};

use crate::error::ServiceError;
use crate::modules::books::{service::parse_isbn, upload::parse_date};

/// Advanced search input. Blank fields are treated as absent.
///
/// `release_date` is either an exact `YYYY-MM-DD` date or an inclusive
/// range `FROM..TO` where either end may be left out.
#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdvancedQuery {
    pub isbn: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub publisher: Option<String>,
    pub language: Option<String>,
    pub description: Option<String>,
    pub release_date: Option<String>,
}

impl AdvancedQuery {
    /// Build the filter, rejecting input with no criteria at all.
    pub fn compose(&self) -> Result<BookFilter, ServiceError> {
        let filter = BookFilter {
            isbn: present(&self.isbn).map(|raw| parse_isbn(&raw)).transpose()?,
            title: present(&self.title),
            author: present(&self.author),
            subject: present(&self.subject),
            publisher: present(&self.publisher),
            language: present(&self.language),
            description: present(&self.description),
            release_date: present(&self.release_date)
                .map(|raw| parse_release_date(&raw))
                .transpose()?,
        };

        if filter.is_empty() {
            return Err(ServiceError::EmptyQuery);
        }
        Ok(filter)
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parse `YYYY-MM-DD`, `FROM..TO`, `FROM..` or `..TO`.
pub fn parse_release_date(raw: &str) -> Result<DateRange, ServiceError> {
    let Some((from, to)) = raw.split_once("..") else {
        return Ok(DateRange::exact(parse_date("release_date", raw)?));
    };

    let bound = |end: &str| {
        let end = end.trim();
        if end.is_empty() {
            Ok(None)
        } else {
            parse_date("release_date", end).map(Some)
        }
    };
    let range = DateRange {
        from: bound(from)?,
        to: bound(to)?,
    };

    match (range.from, range.to) {
        (None, None) => Err(ServiceError::validation(
            "release_date",
            "a range needs at least one end",
        )),
        (Some(from), Some(to)) if from > to => Err(ServiceError::validation(
            "release_date",
            "range start is after its end",
        )),
        _ => Ok(range),
    }
}

/// Term and advanced search over a [`CatalogStore`].
pub struct SearchComposer<'a> {
    catalog: &'a dyn CatalogStore,
}

impl<'a> SearchComposer<'a> {
    pub const fn new(catalog: &'a dyn CatalogStore) -> Self {
        Self { catalog }
    }

    /// Isbns of books whose title, author, description or subject contains
    /// `term`, ignoring case.
    pub async fn term_keys(&self, principal: &SessionPrincipal, term: &str) -> Result<Vec<Isbn>, ServiceError> {
        authorize(principal, Action::Search, None)?;
        let term = term.trim();
        if term.is_empty() {
            return Err(ServiceError::EmptyQuery);
        }
        Ok(self.catalog.search_books_by_term(term).await?)
    }

    /// Isbns of books matching every criterion in `query`.
    pub async fn advanced_keys(
        &self,
        principal: &SessionPrincipal,
        query: &AdvancedQuery,
    ) -> Result<Vec<Isbn>, ServiceError> {
        authorize(principal, Action::Search, None)?;
        let filter = query.compose()?;
        tracing::debug!(criteria = filter.criteria_count(), "advanced search");
        Ok(self.catalog.search_books(&filter).await?)
    }

    /// Fetch the records for `isbns`, keeping their order.
    pub async fn hydrate(&self, isbns: &[Isbn]) -> Result<Vec<Book>, ServiceError> {
        Ok(self.catalog.get_books(isbns).await?)
    }
}
