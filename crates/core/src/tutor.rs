//! Tutoring Loop
//!
//! Drives one live tutoring session: orients the user, introduces the first
//! step, then periodically asks the realtime model whether the current step is
//! done, classifies the answer, and moves the session forward.
//!
//! The loop is cooperative and strictly sequential. It never has more than one
//! request in flight, so the `SessionState` it owns is never touched
//! concurrently.

use crate::{
    cancel::CancelSignal,
    channel::{ChannelError, ConversationChannel, Prompt, Reply},
    evaluator::{StepStatus, classify},
    prompts,
    session::{PreconditionError, SessionState},
    steps::{Step, StepCatalog},
};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Timing and failure budget for a tutoring session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TutorConfig {
    /// Fixed delay between the end of one check and the start of the next.
    pub interval: Duration,
    /// How long to wait for the model to answer a single prompt.
    pub reply_timeout: Duration,
    /// Consecutive failed checks tolerated before the session is ended.
    pub max_consecutive_failures: u32,
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            reply_timeout: Duration::from_secs(30),
            max_consecutive_failures: 3,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
}

/// How a session ended, when it ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Every step in the catalog was completed.
    Completed,
    /// The host cancelled the session or tore down the channel.
    Cancelled,
}

/// The model's judgment for one check, and its classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Judgment {
    pub raw_text: String,
    pub status: StepStatus,
}

impl Judgment {
    pub fn from_reply(reply: &Reply) -> Self {
        let raw_text = reply.final_text().to_string();
        let status = classify(&raw_text);
        Self { raw_text, status }
    }
}

/// Published to the host after every completed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Zero-based index of the step that was judged.
    pub step_index: usize,
    pub step_title: String,
    pub judgment: Judgment,
    /// Cursor after the transition was applied.
    pub cursor: usize,
    pub total_steps: usize,
    pub done: bool,
}

pub struct TutoringLoop<C> {
    course_title: String,
    state: SessionState,
    channel: C,
    config: TutorConfig,
    cancel: CancelSignal,
    reports: Option<mpsc::Sender<TickReport>>,
    /// Set while the current step has not been introduced yet.
    intro_owed: bool,
}

impl<C: ConversationChannel> TutoringLoop<C> {
    pub fn new(
        course_title: impl Into<String>,
        catalog: StepCatalog,
        channel: C,
        config: TutorConfig,
        cancel: CancelSignal,
    ) -> Self {
        Self {
            course_title: course_title.into(),
            state: SessionState::new(Arc::new(catalog)),
            channel,
            config,
            cancel,
            reports: None,
            intro_owed: false,
        }
    }

    /// Publishes a `TickReport` on `tx` after every check.
    pub fn with_reports(mut self, tx: mpsc::Sender<TickReport>) -> Self {
        self.reports = Some(tx);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn course_title(&self) -> &str {
        &self.course_title
    }

    /// Runs the whole session: orientation, then checks until done or cancelled.
    pub async fn run(&mut self) -> Result<SessionOutcome, TutorError> {
        info!(
            course = %self.course_title,
            steps = self.state.catalog().len(),
            "Starting tutoring session"
        );
        match self.on_enter().await {
            Ok(SessionOutcome::Completed) => {}
            Ok(SessionOutcome::Cancelled) | Err(TutorError::Channel(ChannelError::Closed)) => {
                info!("Tutoring session ended before the first check");
                return Ok(SessionOutcome::Cancelled);
            }
            Err(e) => return Err(e),
        }
        self.periodic_check().await
    }

    /// Speaks the orientation and introduces the first step.
    ///
    /// Returns `Completed` when both utterances went out, `Cancelled` if the
    /// session was stopped or the channel went away first.
    pub async fn on_enter(&mut self) -> Result<SessionOutcome, TutorError> {
        debug!("Generating orientation");
        let orientation = prompts::orientation(&self.course_title, self.state.catalog());
        if self.speak(Prompt::Instructions(orientation)).await?.is_none() {
            return Ok(SessionOutcome::Cancelled);
        }

        if let Some(step) = self.state.current_step().cloned() {
            debug!(step = %step.title, "Introducing first step");
            if !self.introduce(&step).await? {
                return Ok(SessionOutcome::Cancelled);
            }
        }
        Ok(SessionOutcome::Completed)
    }

    /// Checks progress on a fixed cadence until every step is complete.
    ///
    /// A failed check is logged and retried after the interval. Once
    /// `max_consecutive_failures` checks in a row have failed the session ends
    /// with the last channel error.
    pub async fn periodic_check(&mut self) -> Result<SessionOutcome, TutorError> {
        let mut failures = 0u32;

        while !self.state.is_done() {
            if self.cancel.is_cancelled() {
                info!("Tutoring session cancelled");
                return Ok(SessionOutcome::Cancelled);
            }

            match self.tick().await {
                Ok(Some(_)) => failures = 0,
                Ok(None) => {
                    info!("Tutoring session cancelled");
                    return Ok(SessionOutcome::Cancelled);
                }
                Err(TutorError::Channel(ChannelError::Closed)) => {
                    info!("Conversation channel closed; ending tutoring session");
                    return Ok(SessionOutcome::Cancelled);
                }
                Err(TutorError::Channel(e)) => {
                    failures += 1;
                    warn!(
                        error = %e,
                        failures,
                        max = self.config.max_consecutive_failures,
                        "Progress check failed"
                    );
                    if failures >= self.config.max_consecutive_failures {
                        error!("Too many failed progress checks; ending tutoring session");
                        return Err(e.into());
                    }
                }
                Err(e) => return Err(e),
            }

            if self.state.is_done() {
                break;
            }
            if !self.pause().await {
                info!("Tutoring session cancelled");
                return Ok(SessionOutcome::Cancelled);
            }
        }

        info!(course = %self.course_title, "All steps complete");
        Ok(SessionOutcome::Completed)
    }

    /// One check: ask, classify, transition, report, follow up.
    ///
    /// The report goes out as soon as the transition is applied. A failed
    /// follow-up utterance is logged and does not fail the check; a step
    /// introduction that did not go out is sent before the next judgment.
    ///
    /// Returns `None` if the session was cancelled part-way through.
    async fn tick(&mut self) -> Result<Option<TickReport>, TutorError> {
        let step_index = self.state.cursor();
        let step = self
            .state
            .current_step()
            .cloned()
            .ok_or(PreconditionError {
                cursor: step_index,
                len: self.state.catalog().len(),
            })?;

        if self.intro_owed {
            debug!(step = %step.title, "Re-sending step introduction");
            if !self.introduce(&step).await? {
                return Ok(None);
            }
        }

        let request = prompts::judgment_request(step_index + 1, &step);
        let Some(reply) = self.speak(Prompt::UserInput(request)).await? else {
            return Ok(None);
        };

        let judgment = Judgment::from_reply(&reply);
        let status = judgment.status;
        self.state.record_status(status);
        info!(
            step_index,
            step_title = %step.title,
            %status,
            "Step judgment"
        );
        debug!(raw_text = %judgment.raw_text, "Judgment response");

        if status == StepStatus::Complete {
            self.state.advance()?;
        }

        let report = TickReport {
            step_index,
            step_title: step.title,
            judgment,
            cursor: self.state.cursor(),
            total_steps: self.state.catalog().len(),
            done: self.state.is_done(),
        };
        self.publish(report.clone()).await;

        let follow_up = match status {
            StepStatus::Complete => match self.state.current_step().cloned() {
                Some(next) => self.introduce(&next).await,
                None => Ok(true),
            },
            StepStatus::NeedsAttention => self
                .speak(Prompt::UserInput(prompts::safety_warning()))
                .await
                .map(|reply| reply.is_some())
                .map_err(TutorError::from),
            StepStatus::InProgress => Ok(true),
        };

        match follow_up {
            Ok(true) => {}
            Ok(false) => return Ok(None),
            Err(TutorError::Channel(ChannelError::Closed)) => {
                return Err(ChannelError::Closed.into());
            }
            Err(e) => warn!(error = %e, %status, "Follow-up utterance failed"),
        }
        Ok(Some(report))
    }

    /// Introduces `step`. Until that succeeds the introduction stays owed.
    async fn introduce(&mut self, step: &Step) -> Result<bool, TutorError> {
        self.intro_owed = true;
        let prompt = Prompt::Instructions(prompts::step_introduction(step));
        let spoken = self.speak(prompt).await?.is_some();
        if spoken {
            self.intro_owed = false;
        }
        Ok(spoken)
    }

    /// Sends a prompt and waits for the reply, bounded by the reply timeout.
    ///
    /// Returns `None` if the session is cancelled before or while waiting.
    async fn speak(&self, prompt: Prompt) -> Result<Option<Reply>, ChannelError> {
        if self.cancel.is_cancelled() {
            return Ok(None);
        }

        let request = tokio::time::timeout(self.config.reply_timeout, self.channel.send(prompt));
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(None),
            result = request => result,
        };

        if self.cancel.is_cancelled() {
            return Ok(None);
        }
        match result {
            Ok(reply) => reply.map(Some),
            Err(_) => Err(ChannelError::Timeout(self.config.reply_timeout)),
        }
    }

    /// Waits one interval. Returns `false` if cancelled while waiting.
    async fn pause(&self) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.config.interval) => !self.cancel.is_cancelled(),
        }
    }

    async fn publish(&self, report: TickReport) {
        if let Some(tx) = &self.reports {
            if tx.send(report).await.is_err() {
                warn!("Failed to publish tick report: receiver dropped.");
            }
        }
    }
}
