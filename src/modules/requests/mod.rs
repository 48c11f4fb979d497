pub mod lifecycle;

use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map};
use shelf_authz::{authorize, Action};
use shelf_db::{BookRequest, RequestId, RequestStatus};
use shelf_http::{error::AppError, CurrentPrincipal, FormOrJson};
use shelf_kernel::{InitCtx, Module};
use utoipa::ToSchema;

use self::lifecycle::RequestLifecycle;
use super::openapi;
use crate::{
    error::{login_redirect, ServiceError},
    state::AppState,
};

/// Users asking for titles and admins deciding on them.
pub struct RequestsModule {
    state: AppState,
}

impl RequestsModule {
    pub const fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for RequestsModule {
    fn name(&self) -> &'static str {
        "requests"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "requests module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/request", get(own_requests).post(submit_request))
            .route("/requests", get(list_requests).put(decide_request))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let mut schemas = Map::new();
        openapi::add_schema::<BookRequest>(&mut schemas);
        openapi::add_schema::<NewRequestForm>(&mut schemas);
        openapi::add_schema::<DecisionForm>(&mut schemas);

        let request_list = json!({ "type": "array", "items": openapi::schema_ref("BookRequest") });

        Some(json!({
            "paths": {
                "/request": {
                    "get": {
                        "summary": "My book requests",
                        "tags": ["Requests"],
                        "responses": {
                            "200": openapi::json_response("Requests", request_list.clone()),
                            "303": openapi::redirect_response("Not signed in; redirect to /login"),
                            "403": openapi::error_response("Administrators cannot request books")
                        }
                    },
                    "post": {
                        "summary": "Request a book",
                        "tags": ["Requests"],
                        "requestBody": openapi::form_body("NewRequestForm"),
                        "responses": {
                            "201": openapi::json_response("Request", openapi::schema_ref("BookRequest")),
                            "303": openapi::redirect_response("Not signed in; redirect to /login"),
                            "403": openapi::error_response("Administrators cannot request books"),
                            "422": openapi::error_response("Validation error")
                        }
                    }
                },
                "/requests": {
                    "get": {
                        "summary": "All book requests",
                        "tags": ["Requests"],
                        "parameters": [openapi::query_param("status", "pending, approved or denied")],
                        "responses": {
                            "200": openapi::json_response("Requests", request_list),
                            "403": openapi::error_response("Not an administrator")
                        }
                    },
                    "put": {
                        "summary": "Approve or deny a pending request",
                        "tags": ["Requests"],
                        "requestBody": openapi::form_body("DecisionForm"),
                        "responses": {
                            "200": openapi::json_response("Request", openapi::schema_ref("BookRequest")),
                            "403": openapi::error_response("Not an administrator"),
                            "404": openapi::error_response("Unknown request"),
                            "409": openapi::error_response("Request already decided"),
                            "422": openapi::error_response("Status is not approved or denied")
                        }
                    }
                }
            },
            "components": { "schemas": schemas }
        }))
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "requests module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "requests module stopped");
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewRequestForm {
    pub title: String,
    pub letter: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DecisionForm {
    pub request_id: i64,
    /// `approved` or `denied`
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    status: Option<String>,
}

fn parse_status(raw: &str) -> Result<RequestStatus, ServiceError> {
    raw.trim()
        .parse()
        .map_err(|e: String| ServiceError::validation("status", e))
}

async fn own_requests(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<Vec<BookRequest>>, AppError> {
    let requests = RequestLifecycle::new(state.catalog.as_ref())
        .list_own(&principal)
        .await
        .map_err(login_redirect)?;
    Ok(Json(requests))
}

async fn submit_request(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    FormOrJson(form): FormOrJson<NewRequestForm>,
) -> Result<(StatusCode, Json<BookRequest>), AppError> {
    let request = RequestLifecycle::new(state.catalog.as_ref())
        .submit(&principal, &form.title, &form.letter)
        .await
        .map_err(login_redirect)?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn list_requests(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<BookRequest>>, AppError> {
    authorize(&principal, Action::ListRequests, None)?;
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(parse_status)
        .transpose()?;

    let requests = RequestLifecycle::new(state.catalog.as_ref())
        .list(&principal, status)
        .await?;
    Ok(Json(requests))
}

async fn decide_request(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    FormOrJson(form): FormOrJson<DecisionForm>,
) -> Result<Json<BookRequest>, AppError> {
    authorize(&principal, Action::DecideRequest, None)?;
    let status = parse_status(&form.status)?;
    let request = RequestLifecycle::new(state.catalog.as_ref())
        .decide(&principal, RequestId(form.request_id), status)
        .await?;
    Ok(Json(request))
}
