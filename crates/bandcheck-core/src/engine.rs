//! Practice pipeline orchestrator.
//!
//! Scores submitted tests and runs speaking recordings through
//! transcription, evaluation, and persistence. Collaborator failures are
//! logged and folded into the returned report; no flow ever fails.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::band::{Band, BandTable};
use crate::error::CollaboratorError;
use crate::feedback::{parse_evaluation, EvaluationOutcome};
use crate::matcher::Matcher;
use crate::model::{AnswerKey, AnswerSet, TestModule};
use crate::scoring::{compute_score_with, ScoreResult};
use crate::traits::{
    AudioClip, EvaluationRequest, Evaluator, SaveOutcome, ScoreRecord, ScoreStore, Transcriber,
};

/// Shown in place of the transcript when transcription fails.
pub const TRANSCRIPTION_FAILED: &str = "Transcription failed. Please try again.";

/// A scored and (attempted-to-be) persisted test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub test_id: String,
    pub module: TestModule,
    pub result: ScoreResult,
    pub band: Band,
    pub time_taken_secs: u64,
    pub saved: SaveOutcome,
}

/// One speaking answer to evaluate.
#[derive(Debug, Clone)]
pub struct SpeakingSubmission {
    pub topic: String,
    pub clip: AudioClip,
    pub duration_secs: u32,
}

/// Everything the learner sees after a speaking attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakingReport {
    pub topic: String,
    /// The transcript, or [`TRANSCRIPTION_FAILED`].
    pub transcript: String,
    pub transcription_failed: bool,
    pub outcome: EvaluationOutcome,
    pub saved: SaveOutcome,
}

/// The practice pipeline.
pub struct PracticeEngine {
    transcriber: Arc<dyn Transcriber>,
    evaluator: Arc<dyn Evaluator>,
    store: Arc<dyn ScoreStore>,
    matcher: Matcher,
    band_table: Option<BandTable>,
}

impl PracticeEngine {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        evaluator: Arc<dyn Evaluator>,
        store: Arc<dyn ScoreStore>,
    ) -> Self {
        Self {
            transcriber,
            evaluator,
            store,
            matcher: Matcher::default(),
            band_table: None,
        }
    }

    /// Use a non-default matcher for all submissions.
    pub fn with_matcher(mut self, matcher: Matcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Use one band table regardless of the key's module.
    pub fn with_band_table(mut self, table: BandTable) -> Self {
        self.band_table = Some(table);
        self
    }

    /// Score `answers` against `key` and persist the result.
    ///
    /// A failed save is logged and reported in [`Submission::saved`]; the
    /// score is returned regardless.
    pub async fn submit_test(
        &self,
        key: &AnswerKey,
        answers: &AnswerSet,
        time_taken: Duration,
    ) -> Submission {
        let result = compute_score_with(&self.matcher, answers, key);
        for id in &result.ignored {
            tracing::debug!("ignoring answer for unknown question '{id}' in {}", key.id);
        }

        let band = match &self.band_table {
            Some(table) => result.band(table),
            None => result.band(&BandTable::for_module(key.module)),
        };
        tracing::info!(
            "{}: {}/{} ({}%), band {}",
            key.id,
            result.correct,
            result.total,
            result.percentage,
            band
        );

        let record = ScoreRecord {
            test_id: key.id.clone(),
            score: result.correct,
            total_questions: result.total,
            percentage: result.percentage,
            band,
            time_taken_seconds: time_taken.as_secs(),
            answers: answers.snapshot(),
            submitted_at: Utc::now(),
        };
        let saved = self.save(&record).await;

        Submission {
            test_id: key.id.clone(),
            module: key.module,
            result,
            band,
            time_taken_secs: time_taken.as_secs(),
            saved,
        }
    }

    /// Transcribe, evaluate, and persist one speaking answer.
    pub async fn evaluate_speaking(&self, submission: &SpeakingSubmission) -> SpeakingReport {
        let transcript = self.transcribe(&submission.clip).await;

        let outcome = match &transcript {
            Some(text) => {
                let request =
                    EvaluationRequest::new(&submission.topic, text, submission.duration_secs);
                self.evaluate(&request).await
            }
            None => EvaluationOutcome::Unavailable("no transcript to evaluate".into()),
        };

        let mut answers = BTreeMap::new();
        answers.insert("topic".to_string(), submission.topic.clone());
        if let Some(text) = &transcript {
            answers.insert("transcript".to_string(), text.clone());
        }
        let record = ScoreRecord {
            test_id: format!("speaking:{}", slug(&submission.topic)),
            score: 0,
            total_questions: 0,
            percentage: 0,
            band: outcome.band().unwrap_or(Band::MIN),
            time_taken_seconds: u64::from(submission.duration_secs),
            answers,
            submitted_at: Utc::now(),
        };
        let saved = self.save(&record).await;

        SpeakingReport {
            topic: submission.topic.clone(),
            transcription_failed: transcript.is_none(),
            transcript: transcript.unwrap_or_else(|| TRANSCRIPTION_FAILED.to_string()),
            outcome,
            saved,
        }
    }

    async fn transcribe(&self, clip: &AudioClip) -> Option<String> {
        if clip.is_empty() {
            tracing::warn!("empty recording, skipping transcription");
            return None;
        }

        let start = Instant::now();
        match self.transcriber.transcribe(clip).await {
            Ok(text) if text.trim().is_empty() => {
                tracing::warn!("{} returned an empty transcript", self.transcriber.name());
                None
            }
            Ok(text) => {
                tracing::debug!(
                    "transcribed {} bytes in {}ms",
                    clip.bytes.len(),
                    start.elapsed().as_millis()
                );
                Some(text.trim().to_string())
            }
            Err(e) => {
                log_failure("transcription", self.transcriber.name(), &e);
                None
            }
        }
    }

    async fn evaluate(&self, request: &EvaluationRequest) -> EvaluationOutcome {
        match self.evaluator.evaluate(request).await {
            Ok(response) => parse_evaluation(&response),
            Err(e) => {
                log_failure("evaluation", self.evaluator.name(), &e);
                EvaluationOutcome::Unavailable(format!("{e:#}"))
            }
        }
    }

    async fn save(&self, record: &ScoreRecord) -> SaveOutcome {
        let result = self.store.save(record).await;
        if let Err(e) = &result {
            log_failure("saving score", self.store.name(), e);
        }
        SaveOutcome::from(result)
    }
}

/// Permanent collaborator errors (bad key, garbage response) are logged
/// louder than transient ones.
fn log_failure(step: &str, backend: &str, e: &anyhow::Error) {
    match e.downcast_ref::<CollaboratorError>() {
        Some(ce) if !ce.is_permanent() => tracing::warn!("{step} via {backend} failed: {e:#}"),
        _ => tracing::error!("{step} via {backend} failed: {e:#}"),
    }
}

fn slug(topic: &str) -> String {
    let mut out = String::new();
    for c in topic.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_string()
}
