use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tokio::time::MissedTickBehavior;

use crate::core::config::SessionSettings;
use crate::core::time::{format_instant, Clock};
use crate::countdown::{self, CountdownState};
use crate::draft::{AnswerDraft, DraftStore};
use crate::gateway::{GatewayError, TestGateway};
use crate::model::{Submission, SubmissionAttempt, TestDetail, TestWindow};
use crate::ticker::CountdownTicker;

/// Lifecycle of one student's pass through one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Before the scheduled start; no answer editing.
    Waiting,
    /// Inside the test window; answers accepted, draft autosaved.
    InProgress,
    /// A submission is in flight; edits and further submits are rejected.
    Submitting,
    /// Terminal. The attempt has been persisted.
    Submitted,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("test not found")]
    TestNotFound,
    #[error("this test has already been submitted")]
    AlreadySubmitted,
    #[error("the test has not started yet")]
    NotStarted,
    #[error("a submission is already in flight")]
    SubmissionInFlight,
    #[error("submission failed: {0}")]
    SubmissionFailed(GatewayError),
    #[error("the countdown ticker stopped unexpectedly")]
    TickerStopped,
    #[error(transparent)]
    Gateway(GatewayError),
}

/// What a tick did to the session.
#[derive(Debug)]
pub enum TickOutcome {
    /// No transition; the countdown state for display.
    Running(CountdownState),
    /// The waiting room ended and the test is now editable.
    Started,
    /// The deadline passed and the attempt was submitted.
    AutoSubmitted(Submission),
}

/// Orchestrates one test session: countdown-driven phase transitions, draft
/// persistence, and at-most-once submission dispatch. All ambient access goes
/// through the injected clock, draft store, and gateway.
pub struct TestSessionController {
    clock: Arc<dyn Clock>,
    drafts: Arc<dyn DraftStore>,
    gateway: Arc<dyn TestGateway>,
    settings: SessionSettings,
    student_id: String,
    test: TestDetail,
    window: TestWindow,
    phase: Phase,
    draft: AnswerDraft,
    submit_in_flight: bool,
}

impl std::fmt::Debug for TestSessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestSessionController")
            .field("student_id", &self.student_id)
            .field("phase", &self.phase)
            .field("submit_in_flight", &self.submit_in_flight)
            .finish_non_exhaustive()
    }
}

impl TestSessionController {
    /// Open a session for `student_id` on `test_id`. Fails terminally when
    /// the test is unknown or the student has already submitted it. Skips the
    /// waiting room when the scheduled start has already passed.
    pub async fn start(
        clock: Arc<dyn Clock>,
        drafts: Arc<dyn DraftStore>,
        gateway: Arc<dyn TestGateway>,
        settings: SessionSettings,
        student_id: impl Into<String>,
        test_id: &str,
    ) -> Result<Self, SessionError> {
        let student_id = student_id.into();

        let test = gateway
            .fetch_test(test_id)
            .await
            .map_err(SessionError::Gateway)?
            .ok_or(SessionError::TestNotFound)?;

        let existing = gateway
            .get_submission(&student_id, test_id)
            .await
            .map_err(SessionError::Gateway)?;
        if existing.is_some() {
            return Err(SessionError::AlreadySubmitted);
        }

        let window = test.window();
        let mut session = Self {
            clock,
            drafts,
            gateway,
            settings,
            student_id,
            test,
            window,
            phase: Phase::Waiting,
            draft: AnswerDraft::new(),
            submit_in_flight: false,
        };

        if session.clock.now() >= session.window.start {
            session.enter_in_progress().await;
        } else {
            tracing::debug!(
                test_id = %session.test.schedule.id,
                start = %format_instant(session.window.start),
                "Entering waiting room"
            );
        }

        Ok(session)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    pub fn test(&self) -> &TestDetail {
        &self.test
    }

    pub fn window(&self) -> TestWindow {
        self.window
    }

    pub fn answers(&self) -> &AnswerDraft {
        &self.draft
    }

    /// Countdown against the phase's target: the start while waiting, the
    /// deadline while in progress, none once submitted.
    pub fn countdown(&self) -> CountdownState {
        countdown::remaining(self.current_target(), self.clock.now())
    }

    /// Record one answer, overwriting any prior value for the question.
    pub fn set_answer(
        &mut self,
        question_id: &str,
        value: impl Into<String>,
    ) -> Result<(), SessionError> {
        match self.phase {
            Phase::Waiting => Err(SessionError::NotStarted),
            Phase::Submitting => Err(SessionError::SubmissionInFlight),
            Phase::Submitted => Err(SessionError::AlreadySubmitted),
            Phase::InProgress => {
                self.draft.set(question_id, value);
                Ok(())
            }
        }
    }

    /// Persist the draft if it holds any answers. Called on the autosave
    /// interval rather than per keystroke; a hard crash loses at most one
    /// interval of edits.
    pub async fn autosave(&self) {
        if self.phase != Phase::InProgress || self.draft.is_empty() {
            return;
        }
        if let Err(err) =
            self.drafts.save(&self.student_id, &self.test.schedule.id, &self.draft).await
        {
            tracing::warn!(error = %err, test_id = %self.test.schedule.id, "Failed to save draft");
        }
    }

    /// Advance the phase machine against a fresh clock reading.
    pub async fn handle_tick(&mut self) -> Result<TickOutcome, SessionError> {
        match self.phase {
            Phase::Waiting => {
                let state = self.countdown();
                if state.is_expired() {
                    self.enter_in_progress().await;
                    Ok(TickOutcome::Started)
                } else {
                    Ok(TickOutcome::Running(state))
                }
            }
            Phase::InProgress => {
                let state = self.countdown();
                if state.is_expired() {
                    tracing::info!(
                        test_id = %self.test.schedule.id,
                        "Time is up; submitting automatically"
                    );
                    let submission = self.submit().await?;
                    Ok(TickOutcome::AutoSubmitted(submission))
                } else {
                    Ok(TickOutcome::Running(state))
                }
            }
            Phase::Submitting => Ok(TickOutcome::Running(self.countdown())),
            Phase::Submitted => Ok(TickOutcome::Running(CountdownState::none())),
        }
    }

    /// Dispatch the submission. Manual submits and the deadline auto-submit
    /// share this path and are not distinguished in the payload. On failure
    /// the session drops back to an editable state with the draft intact, and
    /// the caller may retry.
    pub async fn submit(&mut self) -> Result<Submission, SessionError> {
        match self.phase {
            Phase::Waiting => return Err(SessionError::NotStarted),
            Phase::Submitted => return Err(SessionError::AlreadySubmitted),
            Phase::Submitting => return Err(SessionError::SubmissionInFlight),
            Phase::InProgress => {}
        }
        if self.submit_in_flight {
            return Err(SessionError::SubmissionInFlight);
        }
        self.submit_in_flight = true;
        self.phase = Phase::Submitting;

        let attempt = SubmissionAttempt {
            test_id: self.test.schedule.id.clone(),
            student_id: self.student_id.clone(),
            answers: self.draft.clone(),
        };
        let result = self.gateway.submit(attempt).await;
        self.submit_in_flight = false;

        match result {
            Ok(submission) => {
                self.phase = Phase::Submitted;
                if let Err(err) =
                    self.drafts.clear(&self.student_id, &self.test.schedule.id).await
                {
                    tracing::warn!(error = %err, "Failed to clear draft after submission");
                }
                tracing::info!(
                    test_id = %self.test.schedule.id,
                    score = submission.score,
                    "Submission accepted"
                );
                Ok(submission)
            }
            Err(GatewayError::AlreadySubmitted) => {
                // Another session beat us to it; nothing left to retry.
                self.phase = Phase::Submitted;
                Err(SessionError::AlreadySubmitted)
            }
            Err(err) => {
                self.phase = Phase::InProgress;
                tracing::error!(
                    error = %err,
                    test_id = %self.test.schedule.id,
                    "Submission failed; answers kept for retry"
                );
                Err(SessionError::SubmissionFailed(err))
            }
        }
    }

    /// Drive the session to completion: tick the countdown, autosave the
    /// draft, transition out of the waiting room, and auto-submit at the
    /// deadline. The ticker is always stopped before returning. On a failed
    /// auto-submit the controller stays editable so the caller can surface
    /// the error and retry.
    pub async fn run(&mut self) -> Result<Submission, SessionError> {
        if self.phase == Phase::Submitted {
            return Err(SessionError::AlreadySubmitted);
        }

        let mut ticker = CountdownTicker::start(
            self.clock.clone(),
            self.current_target(),
            self.settings.tick_interval(),
        );
        let mut updates = ticker.subscribe();

        let mut autosave = tokio::time::interval(self.settings.autosave_interval());
        autosave.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let result = loop {
            // Evaluate against the clock first: the session may begin with
            // the start (or even the deadline) already passed, in which case
            // the suppressed ticker never wakes us.
            match self.handle_tick().await {
                Ok(TickOutcome::AutoSubmitted(submission)) => break Ok(submission),
                Ok(TickOutcome::Started) => {
                    ticker.retarget(self.current_target());
                    continue;
                }
                Ok(TickOutcome::Running(_)) => {}
                Err(err) => break Err(err),
            }

            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        break Err(SessionError::TickerStopped);
                    }
                }
                _ = autosave.tick() => self.autosave().await,
            }
        };

        ticker.stop().await;
        result
    }

    async fn enter_in_progress(&mut self) {
        if let Some(saved) = self.drafts.load(&self.student_id, &self.test.schedule.id).await {
            tracing::debug!(
                test_id = %self.test.schedule.id,
                answers = saved.len(),
                "Restored saved draft"
            );
            self.draft = saved;
        }
        self.phase = Phase::InProgress;
        tracing::debug!(test_id = %self.test.schedule.id, "Test started");
    }

    fn current_target(&self) -> Option<OffsetDateTime> {
        match self.phase {
            Phase::Waiting => Some(self.window.start),
            Phase::InProgress | Phase::Submitting => Some(self.window.end),
            Phase::Submitted => None,
        }
    }
}
