//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, WebSocket endpoint, and OpenAPI documentation.

use crate::{
    handlers::{self, TUTOR_WS_PATH},
    models::{
        CourseDetail, CourseRecord, ErrorResponse, GeneratePayload, GenerateResponse,
        ModuleDetail, ModuleRecord, PublishCoursePayload, PublishCourseResponse,
        QuizQuestionRecord, StepView, SubmoduleKind, SubmoduleRecord, VoiceSessionResponse,
    },
    state::AppState,
    ws::ws_handler,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::root,
        handlers::generate,
        handlers::publish_course,
        handlers::get_course,
        handlers::voice_session,
    ),
    components(
        schemas(
            GeneratePayload, GenerateResponse, PublishCoursePayload, PublishCourseResponse,
            CourseDetail, CourseRecord, ModuleDetail, ModuleRecord, SubmoduleRecord,
            SubmoduleKind, QuizQuestionRecord, VoiceSessionResponse, StepView, ErrorResponse
        )
    ),
    tags(
        (name = "Foundry API", description = "Course generation and live tutoring sessions")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/", get(handlers::root))
        .route("/api/generate", post(handlers::generate))
        .route("/api/course", post(handlers::publish_course))
        .route("/api/course/{id}", get(handlers::get_course))
        .route(
            "/api/course/{id}/voice-session",
            post(handlers::voice_session),
        )
        .route(TUTOR_WS_PATH, get(ws_handler))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
