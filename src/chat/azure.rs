// Azure OpenAI adapter
// POST {endpoint}/openai/deployments/{deployment}/chat/completions?api-version=...
// Authenticates with the `api-key` header; the deployment stands in for the model.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::chat::provider::ChatAdapter;
use crate::config::AzureSettings;
use crate::types::{AppError, AppResult, LLMMessage, LLMRequest, LLMResponse, TokenUsage};

pub struct AzureAdapter {
    client: Client,
    settings: AzureSettings,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct AzureChatRequest<'a> {
    messages: &'a [LLMMessage],
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<AzureResponseFormat<'a>>,
}

#[derive(Serialize)]
struct AzureResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'a str,
}

#[derive(Deserialize)]
struct AzureChatResponse {
    choices: Vec<AzureChoice>,
    #[serde(default)]
    usage: Option<AzureUsage>,
}

#[derive(Deserialize)]
struct AzureChoice {
    message: AzureResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct AzureResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct AzureUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Deserialize)]
struct AzureErrorResponse {
    error: AzureError,
}

#[derive(Deserialize)]
struct AzureError {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

impl AzureAdapter {
    pub fn new(settings: AzureSettings, timeout_secs: u64) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            settings,
            timeout_secs,
        })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.deployment
        )
    }
}

#[async_trait]
impl ChatAdapter for AzureAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        let body = AzureChatRequest {
            messages: &request.messages,
            model: &request.model,
            max_completion_tokens: request.max_completion_tokens,
            temperature: request.temperature,
            response_format: request
                .response_format
                .as_deref()
                .map(|format_type| AzureResponseFormat { format_type }),
        };

        let response = self
            .client
            .post(self.completions_url())
            .query(&[("api-version", self.settings.api_version.as_str())])
            .header("api-key", &self.settings.key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::LLMTimeout(self.timeout_secs)
                } else {
                    AppError::LLMTransport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if let Ok(parsed) = serde_json::from_str::<AzureErrorResponse>(&error_text) {
                return Err(AppError::LLMStatus(format!(
                    "{}: {} (code: {})",
                    status,
                    parsed.error.message,
                    parsed.error.code.unwrap_or_default()
                )));
            }
            return Err(AppError::LLMStatus(format!("{}: {}", status, error_text)));
        }

        let parsed: AzureChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::LLMPayload(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::LLMPayload("response contained no choices".to_string()))?;

        Ok(LLMResponse {
            content: choice.message.content,
            finish_reason: choice.finish_reason,
            usage: parsed.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }
}
