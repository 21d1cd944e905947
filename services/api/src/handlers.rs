//! Axum Handlers for the REST API
//!
//! Course generation, publishing, retrieval, and live session setup. Each
//! handler carries `utoipa` annotations for the OpenAPI document.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use foundry_core::course::parse_course;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    models::{
        CourseDetail, ErrorResponse, GeneratePayload, GenerateResponse, PublishCoursePayload,
        PublishCourseResponse, StepView, VoiceSessionResponse,
    },
    state::AppState,
};

/// Path of the live tutoring WebSocket, handed to clients by `voice_session`.
pub const TUTOR_WS_PATH: &str = "/ws/tutor";

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
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

/// Service banner.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service is up"))
)]
pub async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Foundry Course Builder API" }))
}

/// Generate a course document from a natural-language prompt.
///
/// The model's raw output is returned unmodified; publish it with
/// `POST /api/course`.
#[utoipa::path(
    post,
    path = "/api/generate",
    request_body = GeneratePayload,
    responses(
        (status = 200, description = "Generated course document", body = GenerateResponse),
        (status = 400, description = "Prompt is missing", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn generate(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GeneratePayload>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let prompt = payload.prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError::BadRequest("Prompt is required".to_string()));
    }

    info!(prompt, "Generating course");
    let content = state.course_generator.generate_course(prompt).await?;
    Ok(Json(GenerateResponse { content }))
}

/// Parse a course document and store it.
#[utoipa::path(
    post,
    path = "/api/course",
    request_body = PublishCoursePayload,
    responses(
        (status = 200, description = "Course stored", body = PublishCourseResponse),
        (status = 400, description = "Missing or unreadable course document", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn publish_course(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PublishCoursePayload>,
) -> Result<Json<PublishCourseResponse>, ApiError> {
    let raw = payload
        .course_json
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("courseJson is required".to_string()))?;

    let course = parse_course(&raw).map_err(|e| {
        warn!(error = %e, "Rejected course document");
        ApiError::BadRequest(e.to_string())
    })?;

    let course_id = state.db.store_course(&course).await?;

    Ok(Json(PublishCourseResponse {
        success: true,
        course_id,
        message: "Course created successfully".to_string(),
    }))
}

/// Get a stored course with its modules and submodules.
#[utoipa::path(
    get,
    path = "/api/course/{id}",
    responses(
        (status = 200, description = "Course details", body = CourseDetail),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Course ID")
    )
)]
pub async fn get_course(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CourseDetail>, ApiError> {
    let course = state
        .db
        .get_course(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Course with id '{}' not found", id)))?;
    Ok(Json(course))
}

/// Prepare a live tutoring session for a stored course.
///
/// The returned title and steps are meant to be sent back as the `metadata`
/// of the WebSocket `init` message.
#[utoipa::path(
    post,
    path = "/api/course/{id}/voice-session",
    responses(
        (status = 200, description = "Session parameters", body = VoiceSessionResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Course ID")
    )
)]
pub async fn voice_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<VoiceSessionResponse>, ApiError> {
    let (course_title, steps) = state
        .db
        .get_tutoring_course(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Course with id '{}' not found", id)))?;

    info!(course_id = %id, steps = steps.len(), "Prepared voice session");
    Ok(Json(VoiceSessionResponse {
        course_title,
        steps: steps.into_iter().map(StepView::from).collect(),
        ws_path: TUTOR_WS_PATH.to_string(),
    }))
}
