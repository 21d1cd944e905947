//! Data Access Layer
//!
//! All PostgreSQL access goes through [`Db`]. Queries are checked at runtime
//! with `sqlx::query`/`query_as` so the crate builds without a live database.

use anyhow::{Context, Result};
use foundry_core::{Step, course::Course};
use serde_json::{Value, json};
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    CourseDetail, CourseRecord, ModuleDetail, ModuleRecord, QuizQuestionRecord, SubmoduleKind,
    SubmoduleRecord,
};

/// A wrapper around the `PgPool` to provide a clear data access interface.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Creates a new `Db` instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs all pending `sqlx` migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Stores a parsed course and its whole module tree in a single transaction.
    ///
    /// Each module gets its lessons as `instruction` submodules, followed by
    /// one `quiz` submodule (at index = lesson count) holding its questions.
    pub async fn store_course(&self, course: &Course) -> Result<Uuid> {
        let mut tx = self.pool.begin().await?;

        let course_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO courses (title, summary, meta)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&course.name)
        .bind(format!("Generated course: {}", course.name))
        .bind(course_meta(course))
        .fetch_one(&mut *tx)
        .await
        .context("Failed to create course")?;

        for (module_idx, module) in course.modules.iter().enumerate() {
            let module_id: Uuid = sqlx::query_scalar(
                r#"
                INSERT INTO modules (course_id, idx, title, summary)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                "#,
            )
            .bind(course_id)
            .bind(module_idx as i32)
            .bind(&module.title)
            .bind(format!("Module {}: {}", module_idx + 1, module.title))
            .fetch_one(&mut *tx)
            .await?;

            for (sub_idx, sub) in module.sub_modules.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO submodules (module_id, idx, kind, title, body, image_url)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    "#,
                )
                .bind(module_id)
                .bind(sub_idx as i32)
                .bind(SubmoduleKind::Instruction.as_str())
                .bind(&sub.title)
                .bind(&sub.content.text)
                .bind(sub.content.ai_generated_image.as_deref())
                .execute(&mut *tx)
                .await?;
            }

            let Some(quiz) = module.quiz.as_ref().filter(|q| !q.questions.is_empty()) else {
                continue;
            };

            let quiz_id: Uuid = sqlx::query_scalar(
                r#"
                INSERT INTO submodules (module_id, idx, kind, title, body)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id
                "#,
            )
            .bind(module_id)
            .bind(module.sub_modules.len() as i32)
            .bind(SubmoduleKind::Quiz.as_str())
            .bind(format!("Quiz: {}", module.title))
            .bind(format!("Quiz for {}", module.title))
            .fetch_one(&mut *tx)
            .await?;

            for (q_idx, question) in quiz.questions.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO quiz_questions (submodule_id, idx, type, prompt, options, answer)
                    VALUES ($1, $2, 'multiple_choice', $3, $4, $5)
                    "#,
                )
                .bind(quiz_id)
                .bind(q_idx as i32)
                .bind(&question.question)
                .bind(json!(question.options))
                .bind(question.correct_answer.to_string())
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        info!(%course_id, course = %course.name, modules = course.modules.len(), "Stored course");
        Ok(course_id)
    }

    /// Retrieves a stored course with its modules, submodules, and quiz questions.
    pub async fn get_course(&self, course_id: Uuid) -> Result<Option<CourseDetail>> {
        let course = sqlx::query_as::<_, CourseRecord>(
            r#"
            SELECT id, title, summary, is_published, meta, created_at, updated_at
            FROM courses
            WHERE id = $1
            "#,
        )
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(course) = course else {
            return Ok(None);
        };

        let modules = sqlx::query_as::<_, ModuleRecord>(
            r#"
            SELECT id, course_id, idx, title, summary
            FROM modules
            WHERE course_id = $1
            ORDER BY idx ASC
            "#,
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        let mut details = Vec::with_capacity(modules.len());
        for module in modules {
            let submodules = sqlx::query_as::<_, SubmoduleRecord>(
                r#"
                SELECT id, module_id, idx, kind, title, body, image_url
                FROM submodules
                WHERE module_id = $1
                ORDER BY idx ASC
                "#,
            )
            .bind(module.id)
            .fetch_all(&self.pool)
            .await?;

            let questions = sqlx::query_as::<_, QuizQuestionRecord>(
                r#"
                SELECT q.id, q.submodule_id, q.idx, q.type, q.prompt, q.options, q.answer
                FROM quiz_questions q
                JOIN submodules s ON s.id = q.submodule_id
                WHERE s.module_id = $1
                ORDER BY q.idx ASC
                "#,
            )
            .bind(module.id)
            .fetch_all(&self.pool)
            .await?;

            details.push(ModuleDetail {
                module,
                submodules,
                questions,
            });
        }

        debug!(%course_id, modules = details.len(), "Loaded course");
        Ok(Some(CourseDetail {
            course,
            modules: details,
        }))
    }

    /// Loads the title and tutoring steps for a stored course.
    pub async fn get_tutoring_course(&self, course_id: Uuid) -> Result<Option<(String, Vec<Step>)>> {
        let Some(detail) = self.get_course(course_id).await? else {
            return Ok(None);
        };
        let steps = tutoring_steps(&detail);
        Ok(Some((detail.course.title, steps)))
    }
}

/// Course-level metadata stored alongside the course row.
pub fn course_meta(course: &Course) -> Value {
    json!({ "tutoringSteps": course.tutoring_steps() })
}

/// Steps recorded in a course's metadata, if any.
pub fn steps_from_meta(meta: Option<&Value>) -> Option<Vec<Step>> {
    let steps = meta?.get("tutoringSteps")?.clone();
    serde_json::from_value::<Vec<Step>>(steps)
        .ok()
        .filter(|s| !s.is_empty())
}

/// Tutoring steps for a stored course: the recorded steps when present,
/// otherwise one step per instruction submodule in module order.
pub fn tutoring_steps(detail: &CourseDetail) -> Vec<Step> {
    if let Some(steps) = steps_from_meta(detail.course.meta.as_ref()) {
        return steps;
    }
    detail
        .modules
        .iter()
        .flat_map(|m| m.submodules.iter())
        .filter(|s| s.is_instruction())
        .map(|s| Step::new(&s.title, s.body.clone().unwrap_or_default()))
        .collect()
}
