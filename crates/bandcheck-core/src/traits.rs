//! Collaborator contracts for transcription, evaluation, and persistence.
//!
//! These async traits are implemented by the `bandcheck-providers` crate.
//! The practice pipeline only ever sees them behind `Arc<dyn _>`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::band::Band;

// ---------------------------------------------------------------------------
// Transcription
// ---------------------------------------------------------------------------

/// Turns recorded speech into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Human-readable backend name (e.g. "whisper").
    fn name(&self) -> &str;

    /// Transcribe one recording.
    async fn transcribe(&self, clip: &AudioClip) -> anyhow::Result<String>;
}

/// A recorded answer, as bytes plus enough metadata to upload it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    /// File name sent with the upload (e.g. "answer.webm").
    pub file_name: String,
    /// MIME type (e.g. "audio/webm").
    pub mime_type: String,
}

impl AudioClip {
    pub fn new(bytes: Vec<u8>, file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        let mime_type = mime_for(&file_name).to_string();
        Self {
            bytes,
            file_name,
            mime_type,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn mime_for(file_name: &str) -> &'static str {
    let ext = file_name.rsplit('.').next().unwrap_or_default().to_lowercase();
    match ext.as_str() {
        "webm" => "audio/webm",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "m4a" | "mp4" => "audio/mp4",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Grades a speaking transcript. Returns the evaluator's raw text.
#[async_trait]
pub trait Evaluator: Send + Sync {
    fn name(&self) -> &str;

    async fn evaluate(&self, request: &EvaluationRequest) -> anyhow::Result<String>;
}

/// What the evaluator is asked to grade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    /// The cue-card topic or question the learner answered.
    pub topic: String,
    pub transcript: String,
    /// Recording length in seconds.
    pub duration_secs: u32,
    /// Full prompt text, built by [`build_evaluation_prompt`].
    pub prompt: String,
}

impl EvaluationRequest {
    pub fn new(topic: impl Into<String>, transcript: impl Into<String>, duration_secs: u32) -> Self {
        let topic = topic.into();
        let transcript = transcript.into();
        let prompt = build_evaluation_prompt(&topic, &transcript, duration_secs);
        Self {
            topic,
            transcript,
            duration_secs,
            prompt,
        }
    }
}

/// System prompt sent ahead of every evaluation.
pub const EVALUATOR_SYSTEM_PROMPT: &str = "You are an experienced IELTS speaking examiner. \
Assess candidates strictly against the public IELTS speaking band descriptors and reply with JSON only.";

/// Build the grading prompt for one transcript.
pub fn build_evaluation_prompt(topic: &str, transcript: &str, duration_secs: u32) -> String {
    format!(
        "Evaluate this IELTS speaking response.\n\n\
         Topic: {topic}\n\
         Speaking time: {duration_secs} seconds\n\n\
         Transcript:\n{transcript}\n\n\
         Respond with a JSON object with these fields:\n\
         - \"overall_band\": number from 0 to 9 in steps of 0.5\n\
         - \"fluency_coherence\", \"lexical_resource\", \"grammatical_range\", \"pronunciation\": bands for each criterion\n\
         - \"feedback\": two or three sentences of overall feedback\n\
         - \"strengths\": list of strings\n\
         - \"improvements\": list of strings"
    )
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Persists finished attempts.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    fn name(&self) -> &str;

    async fn save(&self, record: &ScoreRecord) -> anyhow::Result<()>;
}

/// The persisted shape of one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub test_id: String,
    pub score: u32,
    pub total_questions: u32,
    pub percentage: u32,
    pub band: Band,
    pub time_taken_seconds: u64,
    /// Raw answers as submitted.
    #[serde(default)]
    pub answers: BTreeMap<String, String>,
    pub submitted_at: DateTime<Utc>,
}

/// Whether a save went through. Failures are reported here, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveOutcome {
    pub fn saved() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

impl From<anyhow::Result<()>> for SaveOutcome {
    fn from(result: anyhow::Result<()>) -> Self {
        match result {
            Ok(()) => SaveOutcome::saved(),
            Err(e) => SaveOutcome::failed(format!("{e:#}")),
        }
    }
}
