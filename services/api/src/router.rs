//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, the relay WebSocket endpoint, OpenAPI
//! documentation, and the static browser client.

use crate::{
    handlers,
    models::{CloseSessionResponse, CreateSessionResponse, ErrorResponse},
    state::AppState,
    ws::ws_handler,
};

use axum::{
    Router,
    routing::{delete, get},
};
use std::{path::Path, sync::Arc};
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::create_session,
        handlers::close_session,
    ),
    components(
        schemas(CreateSessionResponse, CloseSessionResponse, ErrorResponse)
    ),
    tags(
        (name = "Realtime Relay API", description = "Session brokering for realtime voice clients")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
///
/// Static files from `public_dir` are served for any path not matched by an
/// API route, so they never shadow `/api` or `/ws`.
pub fn create_router(app_state: Arc<AppState>, public_dir: impl AsRef<Path>) -> Router {
    let api_router = Router::new()
        .route("/api/session", get(handlers::create_session))
        .route("/api/session/{id}", delete(handlers::close_session))
        .route("/ws/{session_id}", get(ws_handler))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
        .fallback_service(ServeDir::new(public_dir.as_ref()))
}
