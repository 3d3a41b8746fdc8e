pub mod core;
pub mod countdown;
pub mod draft;
pub mod gateway;
pub mod model;
pub mod scoring;
pub mod session;
pub mod ticker;

#[cfg(test)]
mod test_support;

pub use crate::core::config::{ConfigError, Settings};
pub use crate::core::time::{Clock, SystemClock};
pub use crate::countdown::{ClockParts, CountdownPhase, CountdownState};
pub use crate::draft::{AnswerDraft, DraftStore, FsDraftStore, MemoryDraftStore};
pub use crate::gateway::{GatewayError, MemoryGateway, TestGateway};
pub use crate::model::{
    ChoiceOption, Question, QuestionKind, Submission, SubmissionAttempt, TestDetail, TestSchedule,
    TestStatus, TestWindow,
};
pub use crate::session::{Phase, SessionError, TestSessionController, TickOutcome};
pub use crate::ticker::CountdownTicker;
