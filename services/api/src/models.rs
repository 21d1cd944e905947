//! API and Database Models
//!
//! Row types mapped with `sqlx` and request/response bodies documented with
//! `utoipa`.

use chrono::{DateTime, Utc};
use foundry_core::Step;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// The kind of a stored submodule.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubmoduleKind {
    Instruction,
    Quiz,
}

impl SubmoduleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmoduleKind::Instruction => "instruction",
            SubmoduleKind::Quiz => "quiz",
        }
    }
}

impl fmt::Display for SubmoduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone)]
pub struct CourseRecord {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    pub title: String,
    pub summary: Option<String>,
    pub is_published: Option<bool>,
    #[schema(value_type = Option<Object>)]
    pub meta: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone)]
pub struct ModuleRecord {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    #[schema(value_type = Option<String>, format = Uuid)]
    pub course_id: Option<Uuid>,
    pub idx: i32,
    pub title: String,
    pub summary: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone)]
pub struct SubmoduleRecord {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    #[schema(value_type = Option<String>, format = Uuid)]
    pub module_id: Option<Uuid>,
    pub idx: i32,
    #[schema(example = "instruction")]
    pub kind: String,
    pub title: String,
    pub body: Option<String>,
    pub image_url: Option<String>,
}

impl SubmoduleRecord {
    pub fn is_instruction(&self) -> bool {
        self.kind == SubmoduleKind::Instruction.as_str()
    }
}

#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone)]
pub struct QuizQuestionRecord {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    #[schema(value_type = Option<String>, format = Uuid)]
    pub submodule_id: Option<Uuid>,
    pub idx: i32,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub question_type: String,
    pub prompt: String,
    #[schema(value_type = Option<Object>)]
    pub options: Option<serde_json::Value>,
    pub answer: String,
}

/// A stored module with its submodules in display order.
#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct ModuleDetail {
    #[serde(flatten)]
    pub module: ModuleRecord,
    pub submodules: Vec<SubmoduleRecord>,
    /// Questions of the module's quiz submodule, if it has one.
    pub questions: Vec<QuizQuestionRecord>,
}

/// A stored course with its full module tree.
#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: CourseRecord,
    pub modules: Vec<ModuleDetail>,
}

#[derive(Deserialize, ToSchema)]
pub struct GeneratePayload {
    #[schema(example = "Wiring a light switch")]
    pub prompt: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct GenerateResponse {
    pub content: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublishCoursePayload {
    /// The course document, optionally wrapped in markdown code fences.
    pub course_json: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PublishCourseResponse {
    pub success: bool,
    #[schema(value_type = String, format = Uuid)]
    pub course_id: Uuid,
    pub message: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct StepView {
    pub title: String,
    pub description: String,
}

impl From<Step> for StepView {
    fn from(step: Step) -> Self {
        Self {
            title: step.title,
            description: step.description,
        }
    }
}

/// Everything a client needs to open a live tutoring session on a course.
#[derive(Serialize, Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VoiceSessionResponse {
    pub course_title: String,
    pub steps: Vec<StepView>,
    #[schema(example = "/ws/tutor")]
    pub ws_path: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}
