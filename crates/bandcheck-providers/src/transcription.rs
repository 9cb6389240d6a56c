//! Whisper-compatible speech-to-text over `/v1/audio/transcriptions`.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::instrument;

use bandcheck_core::error::CollaboratorError;
use bandcheck_core::traits::{AudioClip, Transcriber};

use crate::http::{build_client, check_status, send_error};
use crate::openai::DEFAULT_BASE_URL;

const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_MODEL: &str = "whisper-1";

/// Uploads recordings to an OpenAI-compatible transcription endpoint.
pub struct WhisperTranscriber {
    api_key: String,
    base_url: String,
    model: String,
    /// ISO-639-1 hint; IELTS answers are in English.
    language: Option<String>,
    client: reqwest::Client,
}

impl WhisperTranscriber {
    pub fn new(
        api_key: &str,
        base_url: Option<String>,
        model: Option<String>,
        language: Option<String>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            language,
            client: build_client(DEFAULT_TIMEOUT_SECS)?,
        })
    }
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    fn name(&self) -> &str {
        "whisper"
    }

    #[instrument(skip(self, clip), fields(model = %self.model, bytes = clip.bytes.len()))]
    async fn transcribe(&self, clip: &AudioClip) -> anyhow::Result<String> {
        let part = Part::bytes(clip.bytes.clone())
            .file_name(clip.file_name.clone())
            .mime_str(&clip.mime_type)
            .with_context(|| format!("invalid MIME type: {}", clip.mime_type))?;

        let mut form = Form::new()
            .text("model", self.model.clone())
            .text("response_format", "json")
            .part("file", part);
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let response = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| send_error(e, DEFAULT_TIMEOUT_SECS))?;
        let response = check_status(response).await?;

        let body: TranscriptionResponse = response.json().await.map_err(|e| {
            CollaboratorError::InvalidResponse(format!("failed to parse transcription: {e}"))
        })?;

        Ok(body.text)
    }
}
