mod health;
mod index;
mod sessions;

use crate::{
    blob::ImageError, server::SharedState, session::SessionError, workflow::WorkflowError,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use thiserror::Error;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(index::index))
        .route("/health", get(health::healthcheck))
        .route("/api/sessions", post(sessions::create_session))
        .route(
            "/api/sessions/:id",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route("/api/sessions/:id/image", post(sessions::upload_image))
        .route("/api/sessions/:id/submit", post(sessions::submit))
        .route("/api/sessions/:id/reset", post(sessions::reset))
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Session not found")]
    SessionNotFound,
    #[error("No `image` field in upload")]
    MissingImage,
    #[error("Invalid upload: {message}")]
    Multipart { status: StatusCode, message: String },
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::SessionNotFound => StatusCode::NOT_FOUND,
            ApiError::MissingImage => StatusCode::BAD_REQUEST,
            ApiError::Multipart { status, .. } => *status,
            ApiError::Image(ImageError::Empty) => StatusCode::BAD_REQUEST,
            ApiError::Image(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Workflow(WorkflowError::NoImage) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Workflow(_) => StatusCode::CONFLICT,
            ApiError::Session(SessionError::LimitReached(_)) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!(status = status.as_u16(), "Request rejected: {}", self);
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
