use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shelf_authz::{AdminId, UserId};
use thiserror::Error;
use time::{Date, OffsetDateTime};
use utoipa::ToSchema;

/// Longest accepted isbn after hyphens are stripped.
const MAX_ISBN_LEN: usize = 17;

/// Book key. Hyphens are stripped on parse so `978-0-13` and `978013`
/// address the same record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
#[schema(value_type = String)]
pub struct Isbn(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IsbnError {
    #[error("isbn must not be empty")]
    Empty,
    #[error("isbn is longer than {MAX_ISBN_LEN} characters")]
    TooLong,
    #[error("isbn may only contain digits, hyphens, and a trailing X")]
    InvalidCharacter,
}

impl Isbn {
    pub fn parse(raw: &str) -> Result<Self, IsbnError> {
        let compact: String = raw.trim().chars().filter(|c| *c != '-').collect();

        if compact.is_empty() {
            return Err(IsbnError::Empty);
        }
        if compact.len() > MAX_ISBN_LEN {
            return Err(IsbnError::TooLong);
        }

        let last = compact.len() - 1;
        let valid = compact.char_indices().all(|(i, c)| {
            c.is_ascii_digit() || (i == last && i > 0 && (c == 'X' || c == 'x'))
        });
        if !valid {
            return Err(IsbnError::InvalidCharacter);
        }

        Ok(Self(compact.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Isbn {
    type Err = IsbnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Isbn {
    type Error = IsbnError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Isbn> for String {
    fn from(value: Isbn) -> Self {
        value.0
    }
}

impl fmt::Display for Isbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two kinds of file attached to a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Pdf,
    Image,
}

impl AssetKind {
    /// Directory (and multipart field name) for this kind.
    pub const fn dir(self) -> &'static str {
        match self {
            AssetKind::Pdf => "pdf",
            AssetKind::Image => "image",
        }
    }
}

/// Stable name of a stored asset: `{kind}/{isbn}.{ext}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = String)]
pub struct AssetRef(String);

impl AssetRef {
    /// Derive the asset name for a book. `extension` must already be
    /// validated (lowercase ASCII alphanumerics).
    pub fn for_book(kind: AssetKind, isbn: &Isbn, extension: &str) -> Self {
        Self(format!("{}/{}.{}", kind.dir(), isbn, extension))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Book {
    pub isbn: Isbn,
    pub title: String,
    pub author: String,
    pub subject: String,
    pub publisher: String,
    pub language: String,
    pub description: String,
    pub release_date: Date,
    pub pdf_asset: AssetRef,
    pub image_asset: AssetRef,
    pub added_by: AdminId,
}

impl Book {
    /// Free-text term match over title, author, description, and subject.
    pub fn matches_term(&self, term: &str) -> bool {
        let needle = term.to_lowercase();
        [&self.title, &self.author, &self.description, &self.subject]
            .into_iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ReviewId(pub i64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Review {
    pub id: ReviewId,
    pub book_isbn: Isbn,
    pub user_id: UserId,
    pub comment: String,
    pub rating: u8,
    #[schema(value_type = String)]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReview {
    pub book_isbn: Isbn,
    pub user_id: UserId,
    pub comment: String,
    pub rating: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub struct SavedBook {
    pub user_id: UserId,
    pub book_isbn: Isbn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct RequestId(pub i64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a book request. `Approved` and `Denied` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Denied,
}

impl RequestStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::Denied)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Denied => "denied",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "denied" => Ok(RequestStatus::Denied),
            other => Err(format!("unknown request status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BookRequest {
    pub id: RequestId,
    pub user_id: UserId,
    pub title: String,
    pub letter: String,
    pub status: RequestStatus,
    pub decided_by: Option<AdminId>,
    #[schema(value_type = String)]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRequest {
    pub user_id: UserId,
    pub title: String,
    pub letter: String,
}

/// Narrowing applied when listing requests. Empty filter lists everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub user_id: Option<UserId>,
}

impl RequestFilter {
    pub fn matches(&self, request: &BookRequest) -> bool {
        self.status.map_or(true, |s| request.status == s)
            && self.user_id.map_or(true, |u| request.user_id == u)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminRecord {
    pub id: AdminId,
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAdmin {
    pub username: String,
    pub password_hash: String,
}

/// Inclusive date range; `None` leaves that end open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub from: Option<Date>,
    pub to: Option<Date>,
}

impl DateRange {
    pub const fn exact(date: Date) -> Self {
        Self {
            from: Some(date),
            to: Some(date),
        }
    }

    pub fn contains(&self, date: Date) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

/// Conjunction of optional book criteria.
///
/// `isbn` is an exact match, text fields are case-insensitive substring
/// matches, and `release_date` is an inclusive range. Absent fields impose no
/// constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
    pub isbn: Option<Isbn>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub publisher: Option<String>,
    pub language: Option<String>,
    pub description: Option<String>,
    pub release_date: Option<DateRange>,
}

impl BookFilter {
    pub fn criteria_count(&self) -> usize {
        usize::from(self.isbn.is_some())
            + [
                &self.title,
                &self.author,
                &self.subject,
                &self.publisher,
                &self.language,
                &self.description,
            ]
            .into_iter()
            .filter(|field| field.is_some())
            .count()
            + usize::from(self.release_date.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.criteria_count() == 0
    }

    pub fn matches(&self, book: &Book) -> bool {
        fn contains(haystack: &str, needle: &Option<String>) -> bool {
            needle
                .as_ref()
                .map_or(true, |n| haystack.to_lowercase().contains(&n.to_lowercase()))
        }

        self.isbn.as_ref().map_or(true, |isbn| &book.isbn == isbn)
            && contains(&book.title, &self.title)
            && contains(&book.author, &self.author)
            && contains(&book.subject, &self.subject)
            && contains(&book.publisher, &self.publisher)
            && contains(&book.language, &self.language)
            && contains(&book.description, &self.description)
            && self
                .release_date
                .map_or(true, |range| range.contains(book.release_date))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use time::macros::date;

    pub fn book(isbn: &str, title: &str, author: &str) -> Book {
        let isbn = Isbn::parse(isbn).unwrap();
        Book {
            pdf_asset: AssetRef::for_book(AssetKind::Pdf, &isbn, "pdf"),
            image_asset: AssetRef::for_book(AssetKind::Image, &isbn, "png"),
            isbn,
            title: title.to_string(),
            author: author.to_string(),
            subject: "Computing".to_string(),
            publisher: "No Starch".to_string(),
            language: "English".to_string(),
            description: "A book about systems".to_string(),
            release_date: date!(2019 - 08 - 12),
            added_by: AdminId(1),
        }
    }
}
