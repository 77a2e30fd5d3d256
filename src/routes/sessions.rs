use super::ApiError;
use crate::{
    blob::{ImageBlob, ImageError},
    server::SharedState,
    workflow::{PhaseSnapshot, WorkflowController},
};
use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

const IMAGE_FIELD: &str = "image";

#[derive(Serialize)]
pub struct SessionView {
    id: Uuid,
    #[serde(flatten)]
    snapshot: PhaseSnapshot,
}

impl SessionView {
    fn new(id: Uuid, controller: &WorkflowController) -> Json<Self> {
        Json(Self {
            id,
            snapshot: controller.snapshot(),
        })
    }
}

fn controller(state: &SharedState, id: &Uuid) -> Result<Arc<WorkflowController>, ApiError> {
    state.sessions.get(id).ok_or(ApiError::SessionNotFound)
}

fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::Multipart {
        status: err.status(),
        message: err.body_text(),
    }
}

#[instrument(skip(state))]
pub async fn create_session(
    State(state): State<SharedState>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let (id, controller) = state.sessions.create()?;
    Ok((StatusCode::CREATED, SessionView::new(id, &controller)))
}

pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let controller = controller(&state, &id)?;
    Ok(SessionView::new(id, &controller))
}

#[instrument(skip(state))]
pub async fn delete_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.remove(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::SessionNotFound)
    }
}

#[instrument(skip(state, multipart))]
pub async fn upload_image(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<SessionView>, ApiError> {
    let controller = controller(&state, &id)?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let content_type = field
            .content_type()
            .map(str::to_owned)
            .ok_or_else(|| ImageError::UnsupportedType("unknown".into()))?;
        let data = field.bytes().await.map_err(multipart_error)?;

        let image = ImageBlob::from_declared(data, &content_type)?;
        tracing::info!(mime = %image.mime(), bytes = image.len(), "Image uploaded");
        controller.select_image(image)?;

        return Ok(SessionView::new(id, &controller));
    }

    Err(ApiError::MissingImage)
}

/// Admits the submission synchronously, then drives it in the background.
/// The page polls the session for the outcome.
#[instrument(skip(state))]
pub async fn submit(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let controller = controller(&state, &id)?;
    let submission = controller.begin()?;

    tokio::spawn({
        let controller = controller.clone();
        async move { controller.run(submission).await }
    });

    Ok((StatusCode::ACCEPTED, SessionView::new(id, &controller)))
}

#[instrument(skip(state))]
pub async fn reset(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let controller = controller(&state, &id)?;
    controller.reset();
    Ok(SessionView::new(id, &controller))
}
