use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::core::time::Clock;
use crate::model::{Submission, SubmissionAttempt, TestDetail};
use crate::scoring;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("test not found")]
    TestNotFound,
    #[error("a submission already exists for this test")]
    AlreadySubmitted,
    #[error("invalid test: {0}")]
    InvalidTest(String),
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

/// Seam to the backing platform that stores tests and graded submissions.
/// Submissions are dispatched at most once per session instance and never
/// retried automatically; retries are an explicit caller decision.
#[async_trait]
pub trait TestGateway: Send + Sync {
    async fn fetch_test(&self, test_id: &str) -> Result<Option<TestDetail>, GatewayError>;

    /// Persists and scores a finished attempt.
    async fn submit(&self, attempt: SubmissionAttempt) -> Result<Submission, GatewayError>;

    /// Existing submission for a (student, test) pair, used to keep a student
    /// from re-entering a completed test.
    async fn get_submission(
        &self,
        student_id: &str,
        test_id: &str,
    ) -> Result<Option<Submission>, GatewayError>;

    /// All submissions of one student, most recent first.
    async fn list_submissions(&self, student_id: &str) -> Result<Vec<Submission>, GatewayError>;
}

/// Reference gateway holding tests and submissions in memory. Scores choice
/// questions on submit and enforces one submission per (student, test) pair.
pub struct MemoryGateway {
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    tests: HashMap<String, TestDetail>,
    submissions: HashMap<(String, String), Submission>,
}

impl MemoryGateway {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, inner: Mutex::new(Inner::default()) }
    }

    pub fn insert_test(&self, test: TestDetail) -> Result<(), GatewayError> {
        test.schedule.validate().map_err(|err| GatewayError::InvalidTest(err.to_string()))?;

        let mut inner = self.inner.lock().expect("gateway lock");
        inner.tests.insert(test.schedule.id.clone(), test);
        Ok(())
    }

    pub fn submission_count(&self) -> usize {
        self.inner.lock().expect("gateway lock").submissions.len()
    }
}

#[async_trait]
impl TestGateway for MemoryGateway {
    async fn fetch_test(&self, test_id: &str) -> Result<Option<TestDetail>, GatewayError> {
        let inner = self.inner.lock().expect("gateway lock");
        Ok(inner.tests.get(test_id).cloned())
    }

    async fn submit(&self, attempt: SubmissionAttempt) -> Result<Submission, GatewayError> {
        let mut inner = self.inner.lock().expect("gateway lock");

        let test = inner.tests.get(&attempt.test_id).ok_or(GatewayError::TestNotFound)?;
        let key = (attempt.student_id.clone(), attempt.test_id.clone());
        if inner.submissions.contains_key(&key) {
            return Err(GatewayError::AlreadySubmitted);
        }

        let score = scoring::auto_score(&test.questions, &attempt.answers);
        let submission = Submission {
            id: Uuid::new_v4().to_string(),
            test_id: attempt.test_id,
            student_id: attempt.student_id,
            submitted_at: self.clock.now(),
            score,
            answers: attempt.answers,
        };

        tracing::debug!(
            test_id = %submission.test_id,
            student_id = %submission.student_id,
            score = submission.score,
            "Stored graded submission"
        );
        inner.submissions.insert(key, submission.clone());
        Ok(submission)
    }

    async fn get_submission(
        &self,
        student_id: &str,
        test_id: &str,
    ) -> Result<Option<Submission>, GatewayError> {
        let inner = self.inner.lock().expect("gateway lock");
        Ok(inner.submissions.get(&(student_id.to_string(), test_id.to_string())).cloned())
    }

    async fn list_submissions(&self, student_id: &str) -> Result<Vec<Submission>, GatewayError> {
        let inner = self.inner.lock().expect("gateway lock");
        let mut submissions: Vec<Submission> = inner
            .submissions
            .values()
            .filter(|submission| submission.student_id == student_id)
            .cloned()
            .collect();
        submissions.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(submissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    use crate::draft::AnswerDraft;
    use crate::test_support::{base_instant, three_choice_test, ManualClock, STUDENT};

    fn attempt(test_id: &str, answers: AnswerDraft) -> SubmissionAttempt {
        SubmissionAttempt {
            test_id: test_id.to_string(),
            student_id: STUDENT.to_string(),
            answers,
        }
    }

    #[tokio::test]
    async fn submit_scores_and_persists() {
        let clock = ManualClock::new(base_instant());
        let gateway = MemoryGateway::new(clock.clone());
        gateway.insert_test(three_choice_test("t1", base_instant())).expect("insert test");

        let answers: AnswerDraft = [
            ("q1".to_string(), "A1".to_string()),
            ("q2".to_string(), "X".to_string()),
            ("q3".to_string(), "C3".to_string()),
        ]
        .into_iter()
        .collect();

        let submission = gateway.submit(attempt("t1", answers)).await.expect("submit");
        assert!((submission.score - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(submission.submitted_at, base_instant());

        let fetched =
            gateway.get_submission(STUDENT, "t1").await.expect("lookup").expect("present");
        assert_eq!(fetched.id, submission.id);
    }

    #[tokio::test]
    async fn duplicate_submission_is_rejected() {
        let clock = ManualClock::new(base_instant());
        let gateway = MemoryGateway::new(clock);
        gateway.insert_test(three_choice_test("t1", base_instant())).expect("insert test");

        gateway.submit(attempt("t1", AnswerDraft::new())).await.expect("first submit");
        let err = gateway.submit(attempt("t1", AnswerDraft::new())).await.unwrap_err();
        assert!(matches!(err, GatewayError::AlreadySubmitted));
        assert_eq!(gateway.submission_count(), 1);
    }

    #[tokio::test]
    async fn submit_for_unknown_test_fails() {
        let clock = ManualClock::new(base_instant());
        let gateway = MemoryGateway::new(clock);

        let err = gateway.submit(attempt("ghost", AnswerDraft::new())).await.unwrap_err();
        assert!(matches!(err, GatewayError::TestNotFound));
        assert!(gateway.fetch_test("ghost").await.expect("fetch").is_none());
    }

    #[tokio::test]
    async fn insert_rejects_invalid_schedule() {
        let clock = ManualClock::new(base_instant());
        let gateway = MemoryGateway::new(clock);

        let mut test = three_choice_test("t1", base_instant());
        test.schedule.duration_minutes = 0;
        let err = gateway.insert_test(test).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidTest(_)));
    }

    #[tokio::test]
    async fn list_submissions_is_most_recent_first() {
        let clock = ManualClock::new(base_instant());
        let gateway = MemoryGateway::new(clock.clone());
        gateway.insert_test(three_choice_test("t1", base_instant())).expect("insert");
        gateway.insert_test(three_choice_test("t2", base_instant())).expect("insert");

        gateway.submit(attempt("t1", AnswerDraft::new())).await.expect("submit t1");
        clock.advance(Duration::minutes(10));
        gateway.submit(attempt("t2", AnswerDraft::new())).await.expect("submit t2");

        let submissions = gateway.list_submissions(STUDENT).await.expect("list");
        assert_eq!(submissions.len(), 2);
        assert_eq!(submissions[0].test_id, "t2");
        assert_eq!(submissions[1].test_id, "t1");

        assert!(gateway.list_submissions("someone-else").await.expect("list").is_empty());
    }
}
