//! Scripted utterances the tutor sends through the conversational channel.

use crate::steps::{Step, StepCatalog};

/// The phrase the judgment prompt asks for when a step is done.
pub const COMPLETION_PHRASE: &str = "Awesome, step complete";

/// Orientation instructions: who the tutor is, the full step list, and a
/// request for a three-sentence overview.
pub fn orientation(course_title: &str, catalog: &StepCatalog) -> String {
    let steps_json =
        serde_json::to_string_pretty(catalog).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"You are a live teaching assistant helping a user complete a task in real time.
The user is wearing glasses with a video feed, so you are seeing what they are seeing.
You are teaching: "{course_title}"

Here are the steps for this task:
{steps_json}

You should:
- Encourage or guide the user verbally.
- If they are on the wrong step or doing something dangerous, correct them.
- Keep responses short and conversational (1-2 sentences).
- Rely heavily on images. Every time the user says something, double check it against the video feed.
- You may skip the image check only when the user confirms they have completed a step.

Start by explaining what you are teaching them and give a general rundown of all the steps in 3 total sentences."#
    )
}

/// Introduces a step to the user.
pub fn step_introduction(step: &Step) -> String {
    format!(
        "Please introduce the current step: '{}'. {}",
        step.title, step.description
    )
}

/// Asks the model to judge, from the live video feed, whether the step is done.
///
/// `step_number` is 1-indexed.
pub fn judgment_request(step_number: usize, step: &Step) -> String {
    format!(
        r#"I am currently on step {step_number}: "{title}".
Assume that the video feed is exactly what I am seeing from my perspective.
You must use the video feed as evidence when deciding whether I have finished this step.

If I am done, respond clearly with "{COMPLETION_PHRASE}".
If not, encourage me briefly (e.g., 'Almost there, make sure you tighten the screws.').
If I am doing something unsafe, warn me."#,
        title = step.title,
    )
}

/// Sent when a judgment flags the user as doing something wrong or unsafe.
pub fn safety_warning() -> String {
    "I am doing something wrong or dangerous. Warn me.".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{StepStatus, classify};

    #[test]
    fn test_orientation_lists_title_and_every_step() {
        let catalog = StepCatalog::from_steps(vec![
            Step::new("Mix", "Combine flour and water."),
            Step::new("Knead", "Knead for ten minutes."),
        ]);
        let prompt = orientation("Bread basics", &catalog);

        assert!(prompt.contains("\"Bread basics\""));
        assert!(prompt.contains("\"title\": \"Mix\""));
        assert!(prompt.contains("\"description\": \"Knead for ten minutes.\""));
        assert!(prompt.contains("3 total sentences"));
    }

    #[test]
    fn test_judgment_request_is_one_indexed_and_names_the_feed() {
        let step = Step::new("Turn off power", "Flip the breaker.");
        let prompt = judgment_request(1, &step);

        assert!(prompt.starts_with("I am currently on step 1: \"Turn off power\"."));
        assert!(prompt.contains("video feed"));
        assert!(prompt.contains(COMPLETION_PHRASE));
    }

    #[test]
    fn test_completion_phrase_classifies_as_complete() {
        assert_eq!(classify(COMPLETION_PHRASE), StepStatus::Complete);
    }

    #[test]
    fn test_step_introduction_includes_description() {
        let step = Step::new("Knead", "Knead for ten minutes.");
        assert_eq!(
            step_introduction(&step),
            "Please introduce the current step: 'Knead'. Knead for ten minutes."
        );
    }
}
