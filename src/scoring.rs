use crate::draft::AnswerDraft;
use crate::model::Question;

/// Automatic score for a set of answers, normalized to 0-100: one point per
/// choice question whose selected option id equals the stored correct option
/// id. Essay questions are graded out of band and contribute nothing here.
///
/// A test with no choice questions scores 100 for any submission, matching the
/// platform's existing behavior.
pub fn auto_score(questions: &[Question], answers: &AnswerDraft) -> f64 {
    let mut choice_count = 0u32;
    let mut earned = 0u32;

    for question in questions {
        let Some(correct) = question.correct_option_id() else {
            continue;
        };
        choice_count += 1;
        if answers.get(&question.id) == Some(correct) {
            earned += 1;
        }
    }

    if choice_count == 0 {
        return 100.0;
    }

    f64::from(earned) / f64::from(choice_count) * 100.0
}
