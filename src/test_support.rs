//! Shared fixtures for the crate's tests: deterministic clocks, a recording
//! gateway, and canned tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

use crate::core::time::Clock;
use crate::gateway::{GatewayError, MemoryGateway, TestGateway};
use crate::model::{
    ChoiceOption, Question, QuestionKind, Submission, SubmissionAttempt, TestDetail, TestSchedule,
};

pub const STUDENT: &str = "student-1";

pub fn base_instant() -> OffsetDateTime {
    datetime!(2026-03-01 09:00 UTC)
}

/// Clock that only moves when a test tells it to.
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Arc<Self> {
        Arc::new(Self { now: Mutex::new(start) })
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock lock");
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().expect("clock lock")
    }
}

/// Clock that tracks the tokio runtime's virtual time, for `start_paused`
/// tests where timers auto-advance.
pub struct TokioClock {
    base: OffsetDateTime,
    started: tokio::time::Instant,
}

impl TokioClock {
    pub fn new(base: OffsetDateTime) -> Arc<Self> {
        Arc::new(Self { base, started: tokio::time::Instant::now() })
    }
}

impl Clock for TokioClock {
    fn now(&self) -> OffsetDateTime {
        self.base + self.started.elapsed()
    }
}

pub fn choice_question(id: &str, correct: &str) -> Question {
    Question {
        id: id.to_string(),
        text: format!("question {id}"),
        kind: QuestionKind::MultipleChoice {
            options: vec![
                ChoiceOption { id: correct.to_string(), text: format!("option {correct}") },
                ChoiceOption { id: "X".to_string(), text: "distractor".to_string() },
            ],
            correct_option_id: correct.to_string(),
        },
    }
}

pub fn essay_question(id: &str) -> Question {
    Question { id: id.to_string(), text: format!("question {id}"), kind: QuestionKind::Essay }
}

pub fn schedule(test_id: &str, start: OffsetDateTime, duration_minutes: u32) -> TestSchedule {
    TestSchedule {
        id: test_id.to_string(),
        class_id: "class-1".to_string(),
        title: "Midterm".to_string(),
        start_time: start,
        duration_minutes,
    }
}

/// A 45-minute test with three choice questions (q1/A1, q2/B2, q3/C3).
pub fn three_choice_test(test_id: &str, start: OffsetDateTime) -> TestDetail {
    TestDetail {
        schedule: schedule(test_id, start, 45),
        questions: vec![
            choice_question("q1", "A1"),
            choice_question("q2", "B2"),
            choice_question("q3", "C3"),
        ],
    }
}

/// Gateway wrapper that counts submit calls and can fail the next one, for
/// exercising retry behavior.
pub struct RecordingGateway {
    inner: MemoryGateway,
    submit_calls: AtomicUsize,
    fail_next: AtomicBool,
}

impl RecordingGateway {
    pub fn new(clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryGateway::new(clock),
            submit_calls: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
        })
    }

    pub fn insert_test(&self, test: TestDetail) {
        self.inner.insert_test(test).expect("valid fixture test");
    }

    pub fn fail_next_submit(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn submits(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TestGateway for RecordingGateway {
    async fn fetch_test(&self, test_id: &str) -> Result<Option<TestDetail>, GatewayError> {
        self.inner.fetch_test(test_id).await
    }

    async fn submit(&self, attempt: SubmissionAttempt) -> Result<Submission, GatewayError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("injected failure".to_string()));
        }
        self.inner.submit(attempt).await
    }

    async fn get_submission(
        &self,
        student_id: &str,
        test_id: &str,
    ) -> Result<Option<Submission>, GatewayError> {
        self.inner.get_submission(student_id, test_id).await
    }

    async fn list_submissions(&self, student_id: &str) -> Result<Vec<Submission>, GatewayError> {
        self.inner.list_submissions(student_id).await
    }
}
