pub mod composer;

use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};
use shelf_db::Book;
use shelf_http::{error::AppError, CurrentPrincipal};
use shelf_kernel::{InitCtx, Module};
use utoipa::{openapi::path::ParameterIn, IntoParams, ToSchema};

use self::composer::{AdvancedQuery, SearchComposer};
use super::{openapi, FormDescriptor};
use crate::state::AppState;

/// Term and advanced catalog search.
pub struct SearchModule {
    state: AppState,
}

impl SearchModule {
    pub const fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for SearchModule {
    fn name(&self) -> &'static str {
        "search"
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/search", get(term_search).post(term_search))
            .route(
                "/advancedsearch",
                get(advanced_search_form).post(advanced_search),
            )
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let mut schemas = Map::new();
        openapi::add_schema::<SearchResults>(&mut schemas);
        openapi::add_schema::<FormDescriptor>(&mut schemas);

        let advanced_params = serde_json::to_value(AdvancedQuery::into_params(|| {
            Some(ParameterIn::Query)
        }))
        .unwrap_or_else(|_| json!([]));
        let term_search = json!({
            "summary": "Search by term",
            "tags": ["Search"],
            "parameters": [openapi::query_param("term", "Text matched against title, author, description and subject")],
            "responses": {
                "200": openapi::json_response("Matching books", openapi::schema_ref("SearchResults")),
                "303": openapi::redirect_response("Empty term; redirect to the catalog")
            }
        });

        Some(json!({
            "paths": {
                "/search": {
                    "get": term_search.clone(),
                    "post": term_search
                },
                "/advancedsearch": {
                    "get": {
                        "summary": "Advanced search form",
                        "tags": ["Search"],
                        "responses": {
                            "200": openapi::form_descriptor_response()
                        }
                    },
                    "post": {
                        "summary": "Search by any combination of book fields",
                        "tags": ["Search"],
                        "parameters": advanced_params,
                        "responses": {
                            "200": openapi::json_response("Matching books", openapi::schema_ref("SearchResults")),
                            "400": openapi::error_response("No criteria given"),
                            "422": openapi::error_response("Malformed criterion")
                        }
                    }
                }
            },
            "components": { "schemas": schemas }
        }))
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResults {
    pub books: Vec<Book>,
}

#[derive(Debug, Deserialize)]
struct TermQuery {
    term: Option<String>,
}

async fn term_search(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Query(query): Query<TermQuery>,
) -> Result<Response, AppError> {
    let term = query.term.unwrap_or_default();
    if term.trim().is_empty() {
        return Ok(Redirect::to("/").into_response());
    }

    let search = SearchComposer::new(state.catalog.as_ref());
    let isbns = search.term_keys(&principal, &term).await?;
    let books = search.hydrate(&isbns).await?;

    Ok(Json(SearchResults { books }).into_response())
}

async fn advanced_search_form() -> Json<FormDescriptor> {
    Json(FormDescriptor::new(
        "advancedsearch",
        "/advancedsearch",
        "POST",
        &[
            "isbn",
            "title",
            "author",
            "subject",
            "publisher",
            "language",
            "description",
            "release_date",
        ],
    ))
}

async fn advanced_search(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Query(query): Query<AdvancedQuery>,
) -> Result<Json<SearchResults>, AppError> {
    let search = SearchComposer::new(state.catalog.as_ref());
    let isbns = search.advanced_keys(&principal, &query).await?;
    let books = search.hydrate(&isbns).await?;

    Ok(Json(SearchResults { books }))
}
