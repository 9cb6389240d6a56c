//! OpenAI-compatible chat-completions evaluator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use bandcheck_core::error::CollaboratorError;
use bandcheck_core::traits::{EvaluationRequest, Evaluator, EVALUATOR_SYSTEM_PROMPT};

use crate::http::{build_client, check_status, send_error};

pub(crate) const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Grades transcripts with an OpenAI-compatible chat model.
pub struct OpenAiEvaluator {
    api_key: String,
    base_url: String,
    model: String,
    temperature: f64,
    org_id: Option<String>,
    client: reqwest::Client,
}

impl OpenAiEvaluator {
    pub fn new(
        api_key: &str,
        base_url: Option<String>,
        model: Option<String>,
        org_id: Option<String>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: 0.0,
            org_id,
            client: build_client(DEFAULT_TIMEOUT_SECS)?,
        })
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    temperature: f64,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl Evaluator for OpenAiEvaluator {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(skip(self, request), fields(model = %self.model, topic = %request.topic))]
    async fn evaluate(&self, request: &EvaluationRequest) -> anyhow::Result<String> {
        let body = ChatRequest {
            model: self.model.clone(),
            temperature: self.temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: EVALUATOR_SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: request.prompt.clone(),
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let mut req = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json");

        if let Some(org) = &self.org_id {
            req = req.header("OpenAI-Organization", org);
        }

        let response = req
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(e, DEFAULT_TIMEOUT_SECS))?;
        let response = check_status(response).await?;

        let api_response: ChatResponse = response.json().await.map_err(|e| {
            CollaboratorError::InvalidResponse(format!("failed to parse response: {e}"))
        })?;

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| CollaboratorError::InvalidResponse("empty completion".into()))?;

        tracing::debug!("evaluation response: {} chars", content.len());
        Ok(content)
    }
}
