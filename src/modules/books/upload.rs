//! Multipart book uploads: the form fields plus the `pdf` and `image` parts.

use axum::{
    extract::{multipart::MultipartError, Multipart},
    http::StatusCode,
};
use shelf_authz::AdminId;
use shelf_db::{AssetKind, AssetRef, Book, Isbn};
use time::{macros::format_description, Date};

use crate::error::ServiceError;

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];
const MAX_TITLE_LEN: usize = 200;

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(field: &'static str, raw: &str) -> Result<Date, ServiceError> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|_| ServiceError::validation(field, "must be a date formatted as YYYY-MM-DD"))
}

/// Oversized bodies keep their own error; anything else is a malformed form.
fn body_error(error: MultipartError) -> ServiceError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::PayloadTooLarge(error.body_text())
    } else {
        ServiceError::validation("body", error.body_text())
    }
}

/// One uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadedAsset {
    /// Lower-cased extension of the client-side file name.
    pub fn extension(&self) -> Option<String> {
        let (stem, extension) = self.file_name.rsplit_once('.')?;
        if stem.is_empty() || extension.is_empty() {
            return None;
        }
        Some(extension.to_ascii_lowercase())
    }
}

/// Text fields of the book form. Every field arrives as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFields {
    pub isbn: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub publisher: Option<String>,
    pub language: Option<String>,
    pub description: Option<String>,
    pub release_date: Option<String>,
}

impl BookFields {
    fn set(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "isbn" => &mut self.isbn,
            "title" => &mut self.title,
            "author" => &mut self.author,
            "subject" => &mut self.subject,
            "publisher" => &mut self.publisher,
            "language" => &mut self.language,
            "description" => &mut self.description,
            "release_date" => &mut self.release_date,
            _ => return false,
        };
        *slot = Some(value);
        true
    }
}

/// A book form as received, before validation.
#[derive(Debug, Clone, Default)]
pub struct BookUpload {
    pub fields: BookFields,
    pub pdf: Option<UploadedAsset>,
    pub image: Option<UploadedAsset>,
}

/// A validated book form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookDraft {
    pub isbn: Isbn,
    pub title: String,
    pub author: String,
    pub subject: String,
    pub publisher: String,
    pub language: String,
    pub description: String,
    pub release_date: Date,
}

/// Both assets of a book with validated extensions.
#[derive(Debug, Clone)]
pub struct AssetPair {
    pub pdf: UploadedAsset,
    pub pdf_extension: String,
    pub image: UploadedAsset,
    pub image_extension: String,
}

impl BookUpload {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ServiceError> {
        let mut upload = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(body_error)?
        {
            let name = field.name().unwrap_or_default().to_string();

            match name.as_str() {
                "pdf" | "image" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(body_error)?;
                    // Browsers send an empty part when no file was chosen.
                    if bytes.is_empty() {
                        continue;
                    }
                    let asset = UploadedAsset {
                        file_name,
                        bytes: bytes.to_vec(),
                    };
                    if name == "pdf" {
                        upload.pdf = Some(asset);
                    } else {
                        upload.image = Some(asset);
                    }
                }
                _ => {
                    let value = field
                        .text()
                        .await
                        .map_err(body_error)?;
                    if !upload.fields.set(&name, value) {
                        tracing::debug!(field = %name, "ignoring unknown book form field");
                    }
                }
            }
        }

        Ok(upload)
    }

    /// Validate the upload. Missing assets are reported before anything
    /// else is looked at.
    pub fn validate(self) -> Result<(BookDraft, AssetPair), ServiceError> {
        let Some(pdf) = self.pdf else {
            return Err(ServiceError::MissingAsset { missing: "pdf" });
        };
        let Some(image) = self.image else {
            return Err(ServiceError::MissingAsset { missing: "image" });
        };

        let draft = validate_fields(self.fields)?;

        let pdf_extension = pdf
            .extension()
            .filter(|ext| ext == "pdf")
            .ok_or_else(|| ServiceError::validation("pdf", "must be a .pdf file"))?;
        let image_extension = image
            .extension()
            .filter(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
            .ok_or_else(|| {
                ServiceError::validation(
                    "image",
                    format!("must be one of: {}", IMAGE_EXTENSIONS.join(", ")),
                )
            })?;

        Ok((
            draft,
            AssetPair {
                pdf,
                pdf_extension,
                image,
                image_extension,
            },
        ))
    }
}

impl BookDraft {
    /// The record for this draft. Asset names derive from the isbn and the
    /// uploaded extensions.
    pub fn into_book(self, added_by: AdminId, assets: &AssetPair) -> Book {
        Book {
            pdf_asset: AssetRef::for_book(AssetKind::Pdf, &self.isbn, &assets.pdf_extension),
            image_asset: AssetRef::for_book(AssetKind::Image, &self.isbn, &assets.image_extension),
            isbn: self.isbn,
            title: self.title,
            author: self.author,
            subject: self.subject,
            publisher: self.publisher,
            language: self.language,
            description: self.description,
            release_date: self.release_date,
            added_by,
        }
    }
}

fn validate_fields(fields: BookFields) -> Result<BookDraft, ServiceError> {
    fn required(field: &'static str, value: Option<String>) -> Result<String, ServiceError> {
        match value.map(|v| v.trim().to_string()) {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(ServiceError::validation(field, "is required")),
        }
    }

    fn optional(value: Option<String>) -> String {
        value.map(|v| v.trim().to_string()).unwrap_or_default()
    }

    let isbn = required("isbn", fields.isbn)?;
    let isbn = Isbn::parse(&isbn).map_err(|e| ServiceError::validation("isbn", e.to_string()))?;

    let title = required("title", fields.title)?;
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ServiceError::validation(
            "title",
            format!("must be at most {MAX_TITLE_LEN} characters"),
        ));
    }
    let author = required("author", fields.author)?;
    let release_date = parse_date("release_date", &required("release_date", fields.release_date)?)?;

    Ok(BookDraft {
        isbn,
        title,
        author,
        subject: optional(fields.subject),
        publisher: optional(fields.publisher),
        language: optional(fields.language),
        description: optional(fields.description),
        release_date,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn asset(file_name: &str, bytes: &[u8]) -> UploadedAsset {
        UploadedAsset {
            file_name: file_name.to_string(),
            bytes: bytes.to_vec(),
        }
    }

    pub fn fields(isbn: &str, title: &str) -> BookFields {
        BookFields {
            isbn: Some(isbn.to_string()),
            title: Some(title.to_string()),
            author: Some("Jim Blandy".to_string()),
            subject: Some("Computing".to_string()),
            publisher: Some("O'Reilly".to_string()),
            language: Some("English".to_string()),
            description: Some("Systems programming".to_string()),
            release_date: Some("2021-06-15".to_string()),
        }
    }

    pub fn upload(isbn: &str, title: &str) -> BookUpload {
        BookUpload {
            fields: fields(isbn, title),
            pdf: Some(asset("book.pdf", b"%PDF-1.7 body")),
            image: Some(asset("cover.PNG", b"png bytes")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{asset, upload};
    use super::*;
    use time::macros::date;

    #[test]
    fn missing_asset_wins_over_invalid_fields() {
        let upload = BookUpload {
            fields: BookFields::default(),
            pdf: Some(asset("book.pdf", b"pdf")),
            image: None,
        };
        assert!(matches!(
            upload.validate(),
            Err(ServiceError::MissingAsset { missing: "image" })
        ));
    }

    #[test]
    fn valid_upload_produces_deterministic_asset_names() {
        let (draft, assets) = upload("978-1-4920-5259-3", "Programming Rust")
            .validate()
            .unwrap();
        assert_eq!(draft.release_date, date!(2021 - 06 - 15));

        let book = draft.into_book(AdminId(1), &assets);
        assert_eq!(book.isbn.as_str(), "9781492052593");
        assert_eq!(book.pdf_asset.as_str(), "pdf/9781492052593.pdf");
        assert_eq!(book.image_asset.as_str(), "image/9781492052593.png");
    }

    #[test]
    fn rejects_wrong_extensions() {
        let mut bad_pdf = upload("1234", "Title");
        bad_pdf.pdf = Some(asset("book.docx", b"doc"));
        assert!(matches!(
            bad_pdf.validate(),
            Err(ServiceError::Validation { field: "pdf", .. })
        ));

        let mut bad_image = upload("1234", "Title");
        bad_image.image = Some(asset("cover", b"img"));
        assert!(matches!(
            bad_image.validate(),
            Err(ServiceError::Validation { field: "image", .. })
        ));
    }

    #[test]
    fn rejects_missing_title_and_bad_date() {
        let mut no_title = upload("1234", "   ");
        no_title.fields.title = Some("   ".into());
        assert!(matches!(
            no_title.validate(),
            Err(ServiceError::Validation { field: "title", .. })
        ));

        let mut bad_date = upload("1234", "Title");
        bad_date.fields.release_date = Some("15/06/2021".into());
        assert!(matches!(
            bad_date.validate(),
            Err(ServiceError::Validation { field: "release_date", .. })
        ));
    }
}
