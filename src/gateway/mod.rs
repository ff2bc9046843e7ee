pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::GatewayConfig;
use state::AppState;

/// Build the HTTP router over shared state
pub fn build_router(state: Arc<AppState>) -> Router {
    let account_routes = Router::new()
        .route(
            "/",
            post(handlers::create_account).get(handlers::list_accounts),
        )
        .route("/{id}", get(handlers::get_account))
        .route("/{id}/entries", get(handlers::list_account_entries))
        .route("/{id}/transfers", get(handlers::list_account_transfers));

    let transfer_routes = Router::new()
        .route("/", post(handlers::create_transfer))
        .route("/{id}", get(handlers::get_transfer));

    Router::new()
        .route("/api/v1/health", get(handlers::health_check))
        .nest("/api/v1/accounts", account_routes)
        .nest("/api/v1/transfers", transfer_routes)
        .with_state(state)
        // Stateless, added after with_state
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
}

/// Start HTTP Gateway server
pub async fn run_server(config: &GatewayConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        anyhow::anyhow!(
            "failed to bind to {}: {} (port {} may already be in use)",
            addr,
            e,
            config.port
        )
    })?;

    tracing::info!("Gateway listening on http://{}", addr);
    tracing::info!("API Docs: http://{}/docs", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
