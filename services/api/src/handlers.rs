//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests for session management.
//! It uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use relay_core::{LifecycleError, SessionId};
use std::sync::Arc;
use tracing::error;

use crate::{
    models::{CloseSessionResponse, CreateSessionResponse, ErrorResponse},
    state::AppState,
};

pub enum ApiError {
    NotFound(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: "Not found".to_string(),
                    message,
                }),
            )
                .into_response(),
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                // Only the top-level message is surfaced; our error types never
                // carry the provider key, and the chain stays in the logs.
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "Internal server error".to_string(),
                        message: err.to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// Create a new realtime session.
///
/// Mints an ephemeral provider credential and registers the session. The
/// provider payload is returned alongside the new `session_id`.
#[utoipa::path(
    get,
    path = "/api/session",
    responses(
        (status = 200, description = "Session created successfully", body = CreateSessionResponse),
        (status = 500, description = "Provider or configuration failure", body = ErrorResponse)
    )
)]
pub async fn create_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let (session_id, provider_data) = state.lifecycle.create_session().await?;
    Ok(Json(CreateSessionResponse::new(session_id, provider_data)))
}

/// Close a session.
///
/// Closing is idempotent: an already closed session still reports success.
#[utoipa::path(
    delete,
    path = "/api/session/{id}",
    responses(
        (status = 200, description = "Session closed", body = CloseSessionResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(
        ("id" = String, Path, description = "Session ID")
    )
)]
pub async fn close_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    match state.lifecycle.close_session(&SessionId::from(id)) {
        Ok(()) => Ok((StatusCode::OK, Json(CloseSessionResponse::success()))),
        Err(LifecycleError::NotFound(id)) => Err(ApiError::NotFound(format!(
            "Session with id '{}' not found",
            id
        ))),
        Err(e) => Err(e.into()),
    }
}
