pub mod password;
pub mod service;

use async_trait::async_trait;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Map};
use shelf_authz::{SessionPrincipal, UserId};
use shelf_http::{
    error::AppError,
    session::{establish_session, terminate_session},
    CurrentPrincipal, FormOrJson,
};
use shelf_kernel::{InitCtx, Module};
use tower_sessions::Session;
use utoipa::ToSchema;

use self::service::{AccountService, Credentials, Registration};
use super::{openapi, FormDescriptor};
use crate::{
    error::{AuthError, ServiceError},
    state::AppState,
};

/// Registration, login, logout and the current session.
pub struct AccountsModule {
    state: AppState,
}

impl AccountsModule {
    pub const fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for AccountsModule {
    fn name(&self) -> &'static str {
        "accounts"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let created = AccountService::new(self.state.credentials.as_ref())
            .seed_admins(&ctx.settings.auth.admins)
            .await?;

        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            admins_provisioned = created,
            "accounts module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/register", get(register_form).post(register))
            .route("/login", get(login_form).post(login))
            .route("/logout", get(logout))
            .route("/session", get(current_session))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let mut schemas = Map::new();
        openapi::add_schema::<Registration>(&mut schemas);
        openapi::add_schema::<Credentials>(&mut schemas);
        openapi::add_schema::<UserView>(&mut schemas);
        openapi::add_schema::<SessionPrincipal>(&mut schemas);
        openapi::add_schema::<FormDescriptor>(&mut schemas);

        Some(json!({
            "paths": {
                "/register": {
                    "get": {
                        "summary": "Registration form",
                        "tags": ["Accounts"],
                        "responses": {
                            "200": openapi::form_descriptor_response(),
                            "303": openapi::redirect_response("Already signed in")
                        }
                    },
                    "post": {
                        "summary": "Register a user account",
                        "tags": ["Accounts"],
                        "requestBody": openapi::form_body("Registration"),
                        "responses": {
                            "201": openapi::json_response("Created user", openapi::schema_ref("UserView")),
                            "400": openapi::error_response("User already exists"),
                            "422": openapi::error_response("Validation error")
                        }
                    }
                },
                "/login": {
                    "get": {
                        "summary": "Login form",
                        "tags": ["Accounts"],
                        "responses": {
                            "200": openapi::form_descriptor_response(),
                            "303": openapi::redirect_response("Already signed in")
                        }
                    },
                    "post": {
                        "summary": "Sign in",
                        "tags": ["Accounts"],
                        "requestBody": openapi::form_body("Credentials"),
                        "responses": {
                            "303": openapi::redirect_response("Signed in; redirect to the catalog"),
                            "400": openapi::error_response("Unknown user or wrong password")
                        }
                    }
                },
                "/logout": {
                    "get": {
                        "summary": "Sign out",
                        "tags": ["Accounts"],
                        "responses": {
                            "303": openapi::redirect_response("Session destroyed")
                        }
                    }
                },
                "/session": {
                    "get": {
                        "summary": "Current principal",
                        "tags": ["Accounts"],
                        "responses": {
                            "200": openapi::json_response("Principal", openapi::schema_ref("SessionPrincipal"))
                        }
                    }
                }
            },
            "components": { "schemas": schemas }
        }))
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "accounts module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "accounts module stopped");
        Ok(())
    }
}

/// Public view of a user record.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserView {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

async fn register_form(CurrentPrincipal(principal): CurrentPrincipal) -> Response {
    if !principal.identity().is_anonymous() {
        return Redirect::to("/").into_response();
    }
    Json(FormDescriptor::new(
        "register",
        "/register",
        "POST",
        &["username", "password", "email"],
    ))
    .into_response()
}

async fn register(
    State(state): State<AppState>,
    FormOrJson(registration): FormOrJson<Registration>,
) -> Result<(StatusCode, Json<UserView>), AppError> {
    let user = AccountService::new(state.credentials.as_ref())
        .register(registration)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UserView {
            id: user.id,
            username: user.username,
            email: user.email,
        }),
    ))
}

async fn login_form(CurrentPrincipal(principal): CurrentPrincipal) -> Response {
    if !principal.identity().is_anonymous() {
        return Redirect::to("/").into_response();
    }
    Json(FormDescriptor::new(
        "login",
        "/login",
        "POST",
        &["username", "password"],
    ))
    .into_response()
}

async fn login(
    State(state): State<AppState>,
    session: Session,
    FormOrJson(credentials): FormOrJson<Credentials>,
) -> Result<Redirect, AppError> {
    let outcome = AccountService::new(state.credentials.as_ref())
        .authenticate(&credentials.username, &credentials.password)
        .await;

    let identity = match outcome {
        Ok(identity) => identity,
        Err(ServiceError::Auth(reason)) => {
            tracing::info!(username = %credentials.username, reason = %reason, "login failed");
            if state.auth.generic_login_errors {
                return Err(AppError::bad_request(AuthError::GENERIC_MESSAGE));
            }
            return Err(ServiceError::Auth(reason).into());
        }
        Err(e) => return Err(e.into()),
    };

    establish_session(&session, identity, state.session_ttl()).await?;
    Ok(Redirect::to("/"))
}

async fn logout(session: Session) -> Result<Redirect, AppError> {
    terminate_session(&session).await?;
    Ok(Redirect::to("/"))
}

async fn current_session(CurrentPrincipal(principal): CurrentPrincipal) -> Json<SessionPrincipal> {
    Json(principal)
}
