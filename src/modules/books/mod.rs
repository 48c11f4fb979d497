pub mod assets;
pub mod service;
pub mod upload;

use async_trait::async_trait;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Map};
use shelf_authz::{authorize, Action, Identity, UserId};
use shelf_db::{Book, Review, SavedBook};
use shelf_http::{error::AppError, CurrentPrincipal, FormOrJson};
use shelf_kernel::{InitCtx, Module};
use utoipa::ToSchema;

use self::{
    assets::AssetPublisher,
    service::{parse_isbn, CatalogService, ReviewForm},
    upload::BookUpload,
};
use super::{openapi, FormDescriptor};
use crate::{error::login_redirect, state::AppState};

const BOOK_FORM_FIELDS: [&str; 10] = [
    "isbn",
    "title",
    "author",
    "subject",
    "publisher",
    "language",
    "description",
    "release_date",
    "pdf",
    "image",
];

/// Catalog browsing, reviews, saved books and admin curation.
pub struct BooksModule {
    state: AppState,
}

impl BooksModule {
    pub const fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        let upload_limit = DefaultBodyLimit::max(self.state.max_upload_bytes);
        Router::new()
            .route("/", get(browse))
            .route("/book/{isbn}", get(show_book).delete(remove_book))
            .route("/book/{isbn}/reviews", get(list_reviews).post(add_review))
            .route("/book/{isbn}/save", post(save_book).delete(unsave_book))
            .route("/book/{isbn}/reading", get(read_book))
            .route("/saved", get(saved_books))
            .route("/users/{id}/saved", get(user_saved_books))
            .route(
                "/addbook",
                get(add_book_form).post(add_book).layer(upload_limit),
            )
            .route(
                "/updatebook/{isbn}",
                get(update_book_form).put(update_book).layer(upload_limit),
            )
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let mut schemas = Map::new();
        openapi::add_schema::<CatalogPage>(&mut schemas);
        openapi::add_schema::<Book>(&mut schemas);
        openapi::add_schema::<Review>(&mut schemas);
        openapi::add_schema::<ReviewForm>(&mut schemas);
        openapi::add_schema::<SavedBook>(&mut schemas);
        openapi::add_schema::<FormDescriptor>(&mut schemas);

        let isbn = openapi::path_param("isbn", "Book isbn; hyphens are ignored");
        let book_list = json!({ "type": "array", "items": openapi::schema_ref("Book") });
        let book_upload = json!({
            "required": true,
            "content": {
                "multipart/form-data": {
                    "schema": {
                        "type": "object",
                        "properties": {
                            "isbn": { "type": "string" },
                            "title": { "type": "string" },
                            "author": { "type": "string" },
                            "subject": { "type": "string" },
                            "publisher": { "type": "string" },
                            "language": { "type": "string" },
                            "description": { "type": "string" },
                            "release_date": { "type": "string", "format": "date" },
                            "pdf": { "type": "string", "format": "binary" },
                            "image": { "type": "string", "format": "binary" }
                        },
                        "required": ["isbn", "title", "author", "release_date", "pdf", "image"]
                    }
                }
            }
        });

        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "Browse the catalog",
                        "tags": ["Books"],
                        "responses": {
                            "200": openapi::json_response("Catalog", openapi::schema_ref("CatalogPage"))
                        }
                    }
                },
                "/book/{isbn}": {
                    "get": {
                        "summary": "Get a book",
                        "tags": ["Books"],
                        "parameters": [isbn.clone()],
                        "responses": {
                            "200": openapi::json_response("Book", openapi::schema_ref("Book")),
                            "404": openapi::error_response("Book not found")
                        }
                    },
                    "delete": {
                        "summary": "Remove a book with its reviews, saved links and files",
                        "tags": ["Books"],
                        "parameters": [isbn.clone()],
                        "responses": {
                            "204": { "description": "Removed" },
                            "403": openapi::error_response("Not an administrator"),
                            "404": openapi::error_response("Book not found")
                        }
                    }
                },
                "/book/{isbn}/reviews": {
                    "get": {
                        "summary": "Reviews of a book",
                        "tags": ["Books"],
                        "parameters": [isbn.clone()],
                        "responses": {
                            "200": openapi::json_response(
                                "Reviews",
                                json!({ "type": "array", "items": openapi::schema_ref("Review") })
                            ),
                            "404": openapi::error_response("Book not found")
                        }
                    },
                    "post": {
                        "summary": "Review a book",
                        "tags": ["Books"],
                        "parameters": [isbn.clone()],
                        "requestBody": openapi::form_body("ReviewForm"),
                        "responses": {
                            "201": openapi::json_response("Review", openapi::schema_ref("Review")),
                            "303": openapi::redirect_response("Not signed in; redirect to /login"),
                            "403": openapi::error_response("Administrators cannot review"),
                            "422": openapi::error_response("Validation error")
                        }
                    }
                },
                "/book/{isbn}/save": {
                    "post": {
                        "summary": "Save a book",
                        "tags": ["Books"],
                        "parameters": [isbn.clone()],
                        "responses": {
                            "201": openapi::json_response("Saved", openapi::schema_ref("SavedBook")),
                            "401": openapi::error_response("Not signed in"),
                            "403": openapi::error_response("Administrators cannot save books")
                        }
                    },
                    "delete": {
                        "summary": "Unsave a book",
                        "tags": ["Books"],
                        "parameters": [isbn.clone()],
                        "responses": {
                            "204": { "description": "Unsaved" },
                            "404": openapi::error_response("Book was not saved")
                        }
                    }
                },
                "/book/{isbn}/reading": {
                    "get": {
                        "summary": "Read a book",
                        "tags": ["Books"],
                        "parameters": [isbn.clone()],
                        "responses": {
                            "200": {
                                "description": "PDF",
                                "content": { "application/pdf": { "schema": { "type": "string", "format": "binary" } } }
                            },
                            "404": openapi::error_response("Book or file not found")
                        }
                    }
                },
                "/saved": {
                    "get": {
                        "summary": "My saved books",
                        "tags": ["Books"],
                        "responses": {
                            "200": openapi::json_response("Saved books", book_list.clone()),
                            "401": openapi::error_response("Not signed in"),
                            "403": openapi::error_response("Administrators have no saved books")
                        }
                    }
                },
                "/users/{id}/saved": {
                    "get": {
                        "summary": "Saved books of a user",
                        "tags": ["Books"],
                        "parameters": [openapi::path_param("id", "User id")],
                        "responses": {
                            "200": openapi::json_response("Saved books", book_list),
                            "403": openapi::error_response("Not the owner")
                        }
                    }
                },
                "/addbook": {
                    "get": {
                        "summary": "Add-book form",
                        "tags": ["Books"],
                        "responses": {
                            "200": openapi::form_descriptor_response(),
                            "403": openapi::error_response("Not an administrator")
                        }
                    },
                    "post": {
                        "summary": "Add a book",
                        "tags": ["Books"],
                        "requestBody": book_upload.clone(),
                        "responses": {
                            "201": openapi::json_response("Book", openapi::schema_ref("Book")),
                            "400": openapi::error_response("Missing pdf or image"),
                            "403": openapi::error_response("Not an administrator"),
                            "409": openapi::error_response("Isbn already in use"),
                            "413": openapi::error_response("Upload larger than storage.max_upload_bytes")
                        }
                    }
                },
                "/updatebook/{isbn}": {
                    "get": {
                        "summary": "Update-book form with current values",
                        "tags": ["Books"],
                        "parameters": [isbn.clone()],
                        "responses": {
                            "200": openapi::json_response("Book", openapi::schema_ref("Book")),
                            "403": openapi::error_response("Not an administrator"),
                            "404": openapi::error_response("Book not found")
                        }
                    },
                    "put": {
                        "summary": "Replace a book and its files",
                        "tags": ["Books"],
                        "parameters": [isbn],
                        "requestBody": book_upload,
                        "responses": {
                            "200": openapi::json_response("Book", openapi::schema_ref("Book")),
                            "400": openapi::error_response("Missing pdf or image"),
                            "403": openapi::error_response("Not an administrator"),
                            "404": openapi::error_response("Book not found"),
                            "413": openapi::error_response("Upload larger than storage.max_upload_bytes")
                        }
                    }
                }
            },
            "components": { "schemas": schemas }
        }))
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// The landing page: who is browsing and what is on the shelf.
#[derive(Debug, Serialize, ToSchema)]
pub struct CatalogPage {
    pub identity: Identity,
    pub books: Vec<Book>,
}

fn catalog(state: &AppState) -> CatalogService<'_> {
    CatalogService::new(state.catalog.as_ref(), state.assets.as_ref())
}

fn publisher(state: &AppState) -> AssetPublisher<'_> {
    AssetPublisher::new(state.catalog.as_ref(), state.assets.as_ref(), &state.isbn_locks)
}

async fn browse(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<CatalogPage>, AppError> {
    let books = catalog(&state).browse(&principal).await?;
    Ok(Json(CatalogPage {
        identity: principal.identity,
        books,
    }))
}

async fn show_book(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(isbn): Path<String>,
) -> Result<Json<Book>, AppError> {
    let isbn = parse_isbn(&isbn)?;
    Ok(Json(catalog(&state).book(&principal, &isbn).await?))
}

async fn list_reviews(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(isbn): Path<String>,
) -> Result<Json<Vec<Review>>, AppError> {
    let isbn = parse_isbn(&isbn)?;
    Ok(Json(catalog(&state).reviews(&principal, &isbn).await?))
}

async fn add_review(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(isbn): Path<String>,
    FormOrJson(form): FormOrJson<ReviewForm>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    let isbn = parse_isbn(&isbn)?;
    let review = catalog(&state)
        .add_review(&principal, &isbn, form)
        .await
        .map_err(login_redirect)?;
    Ok((StatusCode::CREATED, Json(review)))
}

async fn save_book(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(isbn): Path<String>,
) -> Result<(StatusCode, Json<SavedBook>), AppError> {
    let isbn = parse_isbn(&isbn)?;
    let saved = catalog(&state).save(&principal, &isbn).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn unsave_book(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(isbn): Path<String>,
) -> Result<StatusCode, AppError> {
    let isbn = parse_isbn(&isbn)?;
    if catalog(&state).unsave(&principal, &isbn).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("book '{isbn}' is not saved")))
    }
}

async fn read_book(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(isbn): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let isbn = parse_isbn(&isbn)?;
    let pdf = catalog(&state).read_pdf(&principal, &isbn).await?;
    Ok(([(header::CONTENT_TYPE, "application/pdf")], pdf))
}

async fn saved_books(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<Vec<Book>>, AppError> {
    Ok(Json(catalog(&state).saved_books(&principal, None).await?))
}

async fn user_saved_books(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Book>>, AppError> {
    Ok(Json(
        catalog(&state)
            .saved_books(&principal, Some(UserId(id)))
            .await?,
    ))
}

async fn add_book_form(
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<FormDescriptor>, AppError> {
    authorize(&principal, Action::AddBook, None)?;
    Ok(Json(FormDescriptor::new(
        "addbook",
        "/addbook",
        "POST",
        &BOOK_FORM_FIELDS,
    )))
}

async fn add_book(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Book>), AppError> {
    authorize(&principal, Action::AddBook, None)?;
    let upload = BookUpload::from_multipart(multipart).await?;
    let book = publisher(&state).add(&principal, upload).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

async fn update_book_form(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(isbn): Path<String>,
) -> Result<Json<Book>, AppError> {
    authorize(&principal, Action::UpdateBook, None)?;
    let isbn = parse_isbn(&isbn)?;
    Ok(Json(catalog(&state).book(&principal, &isbn).await?))
}

async fn update_book(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(isbn): Path<String>,
    multipart: Multipart,
) -> Result<Json<Book>, AppError> {
    authorize(&principal, Action::UpdateBook, None)?;
    let isbn = parse_isbn(&isbn)?;
    let upload = BookUpload::from_multipart(multipart).await?;
    Ok(Json(publisher(&state).replace(&principal, &isbn, upload).await?))
}

async fn remove_book(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(isbn): Path<String>,
) -> Result<StatusCode, AppError> {
    let isbn = parse_isbn(&isbn)?;
    publisher(&state).remove(&principal, &isbn).await?;
    Ok(StatusCode::NO_CONTENT)
}
