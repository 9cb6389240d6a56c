//! Score aggregation over a full answer set.

use serde::{Deserialize, Serialize};

use crate::band::{band_for_score, Band, BandTable};
use crate::matcher::Matcher;
use crate::model::{AnswerKey, AnswerKind, AnswerSet, CanonicalAnswer, Question};

/// How one question was scored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub question_id: String,
    pub kind: AnswerKind,
    /// What the learner wrote; composite parts are joined with "; ".
    pub given: Option<String>,
    /// The accepted answer, rendered for display.
    pub expected: String,
    pub correct: bool,
}

/// Aggregate result of scoring an answer set against a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub correct: u32,
    pub total: u32,
    /// `round(100 * correct / total)`; 0 when the key is empty.
    pub percentage: u32,
    /// One entry per question, in key order.
    pub outcomes: Vec<QuestionOutcome>,
    /// Answer-set ids that do not belong to the key.
    #[serde(default)]
    pub ignored: Vec<String>,
}

impl ScoreResult {
    /// Band for this result using `table`.
    pub fn band(&self, table: &BandTable) -> Band {
        band_for_score(self.correct, self.total, table)
    }

    /// Outcomes the learner got wrong (including unanswered ones).
    pub fn incorrect(&self) -> impl Iterator<Item = &QuestionOutcome> {
        self.outcomes.iter().filter(|o| !o.correct)
    }
}

/// Integer percentage, rounded half away from zero.
pub fn percentage(correct: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (100.0 * f64::from(correct) / f64::from(total)).round() as u32
}

/// Score `answers` against `key` with the default tolerance.
pub fn compute_score(answers: &AnswerSet, key: &AnswerKey) -> ScoreResult {
    compute_score_with(&Matcher::default(), answers, key)
}

/// Score `answers` against `key` with an explicit matcher.
///
/// Every question in the key is scored exactly once; unanswered questions
/// are incorrect. Answers for ids the key does not know are skipped.
pub fn compute_score_with(matcher: &Matcher, answers: &AnswerSet, key: &AnswerKey) -> ScoreResult {
    let outcomes: Vec<QuestionOutcome> = key
        .questions
        .iter()
        .map(|q| QuestionOutcome {
            question_id: q.id.clone(),
            kind: q.kind,
            given: given_answer(q, answers),
            expected: q.answer.to_string(),
            correct: matcher.match_question(q, answers),
        })
        .collect();

    let ignored: Vec<String> = answers
        .iter()
        .filter(|(id, _)| !key.is_known_id(id))
        .map(|(id, _)| id.to_string())
        .collect();

    let correct = outcomes.iter().filter(|o| o.correct).count() as u32;
    let total = outcomes.len() as u32;

    ScoreResult {
        correct,
        total,
        percentage: percentage(correct, total),
        outcomes,
        ignored,
    }
}

fn given_answer(question: &Question, answers: &AnswerSet) -> Option<String> {
    match &question.answer {
        CanonicalAnswer::Composite(parts) => {
            if parts.iter().all(|p| answers.get(&p.id).is_none()) {
                return None;
            }
            let rendered: Vec<String> = parts
                .iter()
                .map(|p| format!("{}: {}", p.id, answers.get(&p.id).unwrap_or("-")))
                .collect();
            Some(rendered.join("; "))
        }
        _ => answers.get(&question.id).map(str::to_string),
    }
}
