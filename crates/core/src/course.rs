//! Course Document Model
//!
//! The structure of a generated course as produced by the course-generation
//! prompt: modules of three lessons each, a quiz per module, and a final
//! hands-on assessment guided through smart glasses.

use crate::steps::Step;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum CourseError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    pub modules: Vec<Module>,
    #[serde(default)]
    pub final_assessment: Option<FinalAssessment>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub is_safety_check: bool,
    pub sub_modules: Vec<SubModule>,
    #[serde(default)]
    pub quiz: Option<Quiz>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubModule {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    pub content: SubModuleContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubModuleContent {
    pub text: String,
    #[serde(default)]
    pub ai_generated_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(default)]
    pub id: Option<String>,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: Answer,
}

/// The model is asked for an option index but sometimes writes prose instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Index(u64),
    Text(String),
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Index(i) => write!(f, "{}", i),
            Answer::Text(t) => write!(f, "{}", t),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalAssessment {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ar_instructions: Vec<String>,
    #[serde(default)]
    pub meta_ray_bans_integration: bool,
}

impl Course {
    /// Steps for a live tutoring session on this course.
    ///
    /// The final assessment's AR instructions are the hands-on task, so they
    /// are used when present. Otherwise every lesson becomes a step.
    pub fn tutoring_steps(&self) -> Vec<Step> {
        if let Some(assessment) = &self.final_assessment {
            if !assessment.ar_instructions.is_empty() {
                return assessment
                    .ar_instructions
                    .iter()
                    .enumerate()
                    .map(|(i, instruction)| Step::new(format!("Step {}", i + 1), instruction))
                    .collect();
            }
        }
        self.modules
            .iter()
            .flat_map(|m| m.sub_modules.iter())
            .map(|s| Step::new(&s.title, &s.content.text))
            .collect()
    }
}

/// Strips markdown code fences the model tends to wrap its JSON in.
pub fn clean_course_json(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

pub fn parse_course(raw: &str) -> Result<Course, CourseError> {
    let cleaned = clean_course_json(raw);
    Ok(serde_json::from_str(&cleaned)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const COURSE: &str = r#"{
      "id": "home-electrical-basics",
      "name": "Home Electrical Basics",
      "learningObjectives": ["Work safely", "Identify wires", "Replace a switch", "Test circuits"],
      "modules": [
        {
          "id": "safety-first",
          "title": "Safety First",
          "isSafetyCheck": true,
          "subModules": [
            {"id": "breakers", "title": "Breakers", "content": {"text": "Find the breaker.", "aiGeneratedImage": "https://example.com/a.png"}},
            {"id": "testers", "title": "Voltage Testers", "content": {"text": "Use a tester."}}
          ],
          "quiz": {
            "id": "safety-quiz",
            "questions": [
              {"id": "q1", "question": "First step?", "options": ["Cut power", "Pull wires", "Call", "Nothing"], "correctAnswer": 0}
            ]
          }
        },
        {
          "id": "switches",
          "title": "Switches",
          "subModules": [
            {"id": "single-pole", "title": "Single Pole", "content": {"text": "Two terminals."}}
          ]
        }
      ],
      "finalAssessment": {
        "title": "Replace a switch",
        "description": "Swap a switch with glasses on.",
        "arInstructions": ["Cut power", "Remove plate"],
        "metaRayBansIntegration": true
      },
      "createdAt": "2024-01-01T00:00:00.000Z"
    }"#;

    #[test]
    fn test_clean_strips_fences() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(clean_course_json(raw), "{\"a\": 1}");
        assert_eq!(clean_course_json("```\n[]\n```"), "[]");
        assert_eq!(clean_course_json("{}"), "{}");
    }

    #[test]
    fn test_parse_fenced_course() {
        let course = parse_course(&format!("```json\n{}\n```", COURSE)).unwrap();

        assert_eq!(course.name, "Home Electrical Basics");
        assert_eq!(course.modules.len(), 2);
        assert!(course.modules[0].is_safety_check);
        assert!(!course.modules[1].is_safety_check);
        assert!(course.modules[1].quiz.is_none());
        assert_eq!(
            course.modules[0].quiz.as_ref().unwrap().questions[0].correct_answer,
            Answer::Index(0)
        );
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let err = parse_course("```json\n{\"name\": \n```").unwrap_err();
        assert!(err.to_string().starts_with("Invalid JSON:"));
    }

    #[test]
    fn test_answer_accepts_prose() {
        let q: Question = serde_json::from_str(
            r#"{"question": "?", "options": ["a", "b"], "correctAnswer": "b, because a is unsafe"}"#,
        )
        .unwrap();
        assert_eq!(q.correct_answer.to_string(), "b, because a is unsafe");
        assert_eq!(Answer::Index(2).to_string(), "2");
    }

    #[test]
    fn test_tutoring_steps_prefer_ar_instructions() {
        let course = parse_course(COURSE).unwrap();
        let steps = course.tutoring_steps();

        assert_eq!(
            steps,
            vec![Step::new("Step 1", "Cut power"), Step::new("Step 2", "Remove plate")]
        );
    }

    #[test]
    fn test_tutoring_steps_fall_back_to_lessons() {
        let mut course = parse_course(COURSE).unwrap();
        course.final_assessment = None;
        let titles: Vec<String> = course.tutoring_steps().into_iter().map(|s| s.title).collect();

        assert_eq!(titles, vec!["Breakers", "Voltage Testers", "Single Pole"]);
    }
}
