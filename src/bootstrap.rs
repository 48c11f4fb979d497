//! Application start-up: modules, router and server.

use anyhow::Context;
use axum::Router;
use shelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use crate::{modules, state::AppState};

/// A fully initialized application ready to serve.
pub struct App {
    pub router: Router,
    pub registry: ModuleRegistry,
}

/// Register, initialize and start every module against `state`, then build
/// the router.
pub async fn build_app(settings: &Settings, state: AppState) -> anyhow::Result<App> {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, &state)?;

    let ctx = InitCtx { settings };
    registry
        .init_modules(&ctx)
        .await
        .context("module initialization failed")?;
    registry
        .start_modules(&ctx)
        .await
        .context("module start-up failed")?;

    let router = shelf_http::build_router(&registry, settings);

    tracing::info!(modules = registry.len(), "shelf application assembled");
    Ok(App { router, registry })
}

/// Serve until a shutdown signal arrives, then stop every module.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    tracing::info!(
        env = ?settings.environment,
        host = %settings.server.host,
        port = settings.server.port,
        "shelf bootstrap starting"
    );

    let state = AppState::from_settings(&settings);
    let app = build_app(&settings, state).await?;

    let served = shelf_http::start_server(app.router, &settings).await;

    app.registry
        .stop_modules()
        .await
        .context("module shutdown failed")?;

    served
}
