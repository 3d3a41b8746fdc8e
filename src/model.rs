use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use validator::Validate;

use crate::draft::AnswerDraft;

/// Scheduling metadata for one test. Immutable once a session has begun; the
/// session holds a read-only copy for its whole lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TestSchedule {
    pub id: String,
    pub class_id: String,
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[validate(range(min = 1, message = "duration_minutes must be positive"))]
    pub duration_minutes: u32,
}

/// The interval a test is open for. Derived once per session; `end` is the
/// sole authority for auto-submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestWindow {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl TestWindow {
    pub fn for_schedule(schedule: &TestSchedule) -> Self {
        let start = schedule.start_time;
        Self { start, end: start + Duration::minutes(i64::from(schedule.duration_minutes)) }
    }

    pub fn contains(&self, now: OffsetDateTime) -> bool {
        now >= self.start && now < self.end
    }

    pub fn status_at(&self, now: OffsetDateTime) -> TestStatus {
        if now < self.start {
            TestStatus::Upcoming
        } else if now < self.end {
            TestStatus::Ongoing
        } else {
            TestStatus::Finished
        }
    }
}

/// Dashboard label for a test relative to the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Upcoming,
    Ongoing,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum QuestionKind {
    MultipleChoice { options: Vec<ChoiceOption>, correct_option_id: String },
    Essay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl Question {
    pub fn is_choice(&self) -> bool {
        matches!(self.kind, QuestionKind::MultipleChoice { .. })
    }

    /// The stored correct option for choice questions; essays have none.
    pub fn correct_option_id(&self) -> Option<&str> {
        match &self.kind {
            QuestionKind::MultipleChoice { correct_option_id, .. } => Some(correct_option_id),
            QuestionKind::Essay => None,
        }
    }
}

/// A schedule together with its ordered questions, as returned by the test
/// lookup interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestDetail {
    pub schedule: TestSchedule,
    pub questions: Vec<Question>,
}

impl TestDetail {
    pub fn window(&self) -> TestWindow {
        TestWindow::for_schedule(&self.schedule)
    }
}

/// Snapshot handed to the submission gateway. Built exactly once per dispatch;
/// a manual retry after a failure builds a fresh one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionAttempt {
    pub test_id: String,
    pub student_id: String,
    pub answers: AnswerDraft,
}

/// A persisted, scored attempt as the gateway returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub test_id: String,
    pub student_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
    pub score: f64,
    pub answers: AnswerDraft,
}
