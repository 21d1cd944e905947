//! Course Generation Service
//!
//! Turns a natural-language topic into a course document by prompting a chat
//! model. The model's raw text is returned as-is; cleaning and parsing live in
//! [`crate::course`].

use crate::course::{Course, parse_course};
use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::info;

/// Defines the contract for any service that can draft a course.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CourseGenerator: Send + Sync {
    /// Returns the model's raw course document for `prompt`.
    async fn generate_course(&self, prompt: &str) -> Result<String>;
}

/// Generates a course and parses the result.
pub async fn generate_course_document(
    generator: &dyn CourseGenerator,
    prompt: &str,
) -> Result<Course> {
    let raw = generator.generate_course(prompt).await?;
    let course = parse_course(&raw).context("Model returned an unreadable course document")?;
    info!(course = %course.name, modules = course.modules.len(), "Generated course");
    Ok(course)
}

/// A `CourseGenerator` backed by an OpenAI-compatible chat completion API.
pub struct LLMCourseGenerator {
    client: Client<OpenAIConfig>,
    model: String,
    prompts: HashMap<String, String>,
}

impl LLMCourseGenerator {
    /// Creates a new LLM-based course generator.
    ///
    /// `prompts` must contain a `"generate_course"` template. A `{topic}`
    /// placeholder in the template is replaced by the user's prompt; without
    /// one, the prompt is appended.
    pub fn new(config: OpenAIConfig, model: String, prompts: HashMap<String, String>) -> Self {
        Self {
            client: Client::with_config(config),
            model,
            prompts,
        }
    }
}

/// Fills the generation template with the user's prompt.
pub fn render_course_prompt(template: &str, prompt: &str) -> String {
    if template.contains("{topic}") {
        template.replace("{topic}", prompt)
    } else {
        format!("{}{}", template, prompt)
    }
}

#[async_trait]
impl CourseGenerator for LLMCourseGenerator {
    async fn generate_course(&self, prompt: &str) -> Result<String> {
        let template = self
            .prompts
            .get("generate_course")
            .context("Missing prompt template: 'generate_course'")?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestUserMessageArgs::default()
                    .content(render_course_prompt(template, prompt))
                    .build()?
                    .into(),
            ])
            .build()?;

        let response = self.client.chat().create(request).await?;

        let answer = response
            .choices
            .first()
            .context("No response choice from LLM")?
            .message
            .content
            .clone()
            .context("No content in LLM response")?;

        Ok(answer)
    }
}

/// A fixed, fenced course document about `topic`, shaped like real model output.
pub fn sample_course_document(topic: &str) -> String {
    let course = serde_json::json!({
        "id": "mock-course",
        "name": format!("Introduction to {}", topic),
        "learningObjectives": ["Understand the basics", "Work safely"],
        "modules": [{
            "id": "getting-started",
            "title": "Getting Started",
            "isSafetyCheck": true,
            "subModules": [
                {"id": "overview", "title": "Overview", "content": {"text": format!("What {} is about.", topic)}},
                {"id": "tools", "title": "Tools", "content": {"text": "The tools you will need."}},
                {"id": "safety", "title": "Safety", "content": {"text": "How to stay safe."}}
            ],
            "quiz": {
                "id": "getting-started-quiz",
                "questions": [
                    {"id": "q1", "question": "What comes first?", "options": ["Safety", "Speed", "Style", "Luck"], "correctAnswer": 0}
                ]
            }
        }],
        "finalAssessment": {
            "title": format!("Hands-on {}", topic),
            "description": "Complete the task with guidance.",
            "arInstructions": ["Prepare your workspace", "Do the task", "Check your work"],
            "metaRayBansIntegration": true
        }
    });
    format!("```json\n{}\n```", course)
}

/// A deterministic `CourseGenerator` for local development without an API key.
pub struct StaticCourseGenerator;

#[async_trait]
impl CourseGenerator for StaticCourseGenerator {
    async fn generate_course(&self, prompt: &str) -> Result<String> {
        Ok(sample_course_document(prompt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[test]
    fn test_render_prompt_with_placeholder() {
        assert_eq!(
            render_course_prompt("Create a course about: {topic}.", "knitting"),
            "Create a course about: knitting."
        );
    }

    #[test]
    fn test_render_prompt_appends_without_placeholder() {
        assert_eq!(
            render_course_prompt("Create a course about: ", "knitting"),
            "Create a course about: knitting"
        );
    }

    #[tokio::test]
    async fn test_generate_course_document_parses_fenced_output() {
        let mut generator = MockCourseGenerator::new();
        generator
            .expect_generate_course()
            .with(eq("welding"))
            .times(1)
            .returning(|p| Ok(sample_course_document(p)));

        let course = generate_course_document(&generator, "welding").await.unwrap();

        assert_eq!(course.name, "Introduction to welding");
        assert_eq!(course.tutoring_steps().len(), 3);
    }

    #[tokio::test]
    async fn test_generate_course_document_rejects_prose() {
        let mut generator = MockCourseGenerator::new();
        generator
            .expect_generate_course()
            .returning(|_| Ok("Sorry, I can't help with that.".to_string()));

        let err = generate_course_document(&generator, "anything").await.unwrap_err();

        assert!(err.to_string().contains("unreadable course document"));
    }
}
