//! Mock collaborators for testing.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use bandcheck_core::traits::{
    AudioClip, EvaluationRequest, Evaluator, ScoreRecord, ScoreStore, Transcriber,
};

/// Default evaluation returned by [`MockEvaluator`].
pub const SAMPLE_EVALUATION: &str = r#"{"overall_band": 6.5, "fluency_coherence": 6.5, "lexical_resource": 6.5, "grammatical_range": 6, "pronunciation": 7, "feedback": "Relevant answer with some hesitation.", "strengths": ["topic vocabulary"], "improvements": ["extend answers with examples"]}"#;

/// A transcriber that returns a fixed transcript, or fails every call.
pub struct MockTranscriber {
    reply: Result<String, String>,
    call_count: AtomicU32,
}

impl MockTranscriber {
    pub fn with_transcript(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            call_count: AtomicU32::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            call_count: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    fn name(&self) -> &str {
        "mock"
    }

    async fn transcribe(&self, _clip: &AudioClip) -> anyhow::Result<String> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.reply.clone().map_err(|e| anyhow::anyhow!(e))
    }
}

/// An evaluator that returns a canned response, or fails every call.
pub struct MockEvaluator {
    reply: Result<String, String>,
    call_count: AtomicU32,
    last_request: Mutex<Option<EvaluationRequest>>,
}

impl MockEvaluator {
    pub fn with_fixed_response(response: &str) -> Self {
        Self {
            reply: Ok(response.to_string()),
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<EvaluationRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for MockEvaluator {
    fn default() -> Self {
        Self::with_fixed_response(SAMPLE_EVALUATION)
    }
}

#[async_trait]
impl Evaluator for MockEvaluator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn evaluate(&self, request: &EvaluationRequest) -> anyhow::Result<String> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_request.lock().unwrap_or_else(|e| e.into_inner()) = Some(request.clone());
        self.reply.clone().map_err(|e| anyhow::anyhow!(e))
    }
}

/// A store that keeps records in memory.
#[derive(Default)]
pub struct MockStore {
    fail_with: Option<String>,
    records: Mutex<Vec<ScoreRecord>>,
}

impl MockStore {
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn records(&self) -> Vec<ScoreRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ScoreStore for MockStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn save(&self, record: &ScoreRecord) -> anyhow::Result<()> {
        if let Some(message) = &self.fail_with {
            anyhow::bail!("{message}");
        }
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }
}
