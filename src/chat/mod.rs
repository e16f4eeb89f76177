//! Chat query dispatch
//!
//! [`ChatService::query`] never fails: every problem (missing prompt,
//! unconfigured backend, transport error, bad payload) comes back as the
//! text that ends up in the panel.

pub mod azure;
pub mod provider;
pub mod response;

pub use provider::ChatAdapter;
pub use response::{format_answer, full_system_prompt, parse_answer, render_answer, ChatAnswer};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::{ChatConfig, Config};
use crate::texts;
use crate::types::{AppError, LLMMessage, LLMRequest};

#[derive(Clone)]
pub struct ChatService {
    adapter: Option<Arc<dyn ChatAdapter>>,
    model: String,
    config: ChatConfig,
    unavailable: Option<String>,
    permits: Arc<Semaphore>,
}

impl ChatService {
    pub fn from_config(config: &Config) -> Self {
        let built = config.azure.clone().map(|settings| {
            let model = settings.deployment.clone();
            azure::AzureAdapter::new(settings, config.chat.timeout_secs).map(|a| (a, model))
        });

        match built {
            Some(Ok((adapter, model))) => Self::with_adapter(Arc::new(adapter), model, config.chat.clone()),
            Some(Err(e)) => {
                error!(error = %e, "Chat backend could not be initialised");
                Self::unavailable(e.to_string(), config.chat.clone())
            }
            None => {
                let notice = config
                    .azure_notice
                    .clone()
                    .unwrap_or_else(|| "Chat backend not configured".to_string());
                warn!(%notice, "Running without chat backend");
                Self::unavailable(notice, config.chat.clone())
            }
        }
    }

    pub fn with_adapter(adapter: Arc<dyn ChatAdapter>, model: impl Into<String>, config: ChatConfig) -> Self {
        Self {
            adapter: Some(adapter),
            model: model.into(),
            permits: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
            config,
            unavailable: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>, config: ChatConfig) -> Self {
        Self {
            adapter: None,
            model: String::new(),
            permits: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
            config,
            unavailable: Some(reason.into()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.adapter.is_some()
    }

    /// Base system message for a session: dry-run notice, session override, or the configured default.
    pub fn base_system_message<'a>(&'a self, session_override: Option<&'a str>) -> &'a str {
        if self.config.dry_run {
            texts::CHAT_DRY_RUN_INFO
        } else {
            session_override.unwrap_or(&self.config.system_message)
        }
    }

    pub fn system_prompt(&self, session_override: Option<&str>) -> String {
        full_system_prompt(self.base_system_message(session_override))
    }

    /// Send one panel's input and return the text to display.
    pub async fn query(&self, prompt: &str, session_override: Option<&str>) -> String {
        if prompt.trim().is_empty() {
            warn!("{}", texts::CHAT_NO_PROMPT);
            return texts::CHAT_NO_PROMPT.to_string();
        }
        let Some(adapter) = &self.adapter else {
            let reason = self.unavailable.as_deref().unwrap_or("not configured");
            return format!("Chat backend unavailable: {}", reason);
        };

        let request = LLMRequest {
            model: self.model.clone(),
            messages: vec![
                LLMMessage::system(self.system_prompt(session_override)),
                LLMMessage::user(prompt),
            ],
            max_completion_tokens: Some(self.config.max_completion_tokens),
            temperature: Some(self.config.temperature),
            response_format: Some(self.config.response_format.clone()),
        };

        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(e) => return format!("Unexpected error occurred while querying the chat endpoint: {}", e),
        };
        info!(model = %self.model, prompt_chars = prompt.chars().count(), "Querying chat endpoint");

        let secs = self.config.timeout_secs;
        let result = match tokio::time::timeout(Duration::from_secs(secs), adapter.create_chat_completion(&request)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::LLMTimeout(secs)),
        };

        match result {
            Ok(response) => {
                if let Some(usage) = &response.usage {
                    info!(total_tokens = usage.total_tokens, "Chat endpoint answered");
                }
                render_answer(response.content.as_deref())
            }
            Err(e) => {
                error!(error = %e, "Chat query failed");
                e.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AzureSettings;
    use crate::types::{AppResult, LLMResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedAdapter {
        reply: Option<String>,
        delay: Duration,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        seen: Mutex<Vec<LLMRequest>>,
    }

    impl ScriptedAdapter {
        fn new(reply: Option<&str>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_string),
                delay,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatAdapter for ScriptedAdapter {
        async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
            self.seen.lock().unwrap().push(request.clone());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(LLMResponse {
                content: self.reply.clone(),
                finish_reason: Some("stop".into()),
                usage: None,
            })
        }
    }

    const VALID: &str = r#"{"Abstract": "A", "Description": "D", "Sources": ["https://a.io/"]}"#;

    fn chat_config() -> ChatConfig {
        ChatConfig {
            system_message: "Default prompt.".into(),
            ..ChatConfig::default()
        }
    }

    #[tokio::test]
    async fn test_valid_answer_is_formatted() {
        let adapter = ScriptedAdapter::new(Some(VALID), Duration::ZERO);
        let service = ChatService::with_adapter(adapter.clone(), "dep", chat_config());
        let out = service.query("What is A?", Some("Session prompt.")).await;
        assert_eq!(out, "Abstract:\nA\nDescription:\nD\nSources:\n- https://a.io/");

        let seen = adapter.seen.lock().unwrap();
        assert_eq!(seen[0].model, "dep");
        assert_eq!(seen[0].messages[1], LLMMessage::user("What is A?"));
        assert!(seen[0].messages[0].content.starts_with("Session prompt."));
        assert_eq!(seen[0].response_format.as_deref(), Some("json_object"));
    }

    #[tokio::test]
    async fn test_invalid_payload_surfaces_validation_error() {
        let adapter = ScriptedAdapter::new(Some(r#"{"invalid_field": "x"}"#), Duration::ZERO);
        let service = ChatService::with_adapter(adapter, "dep", chat_config());
        let out = service.query("q", None).await;
        assert!(out.starts_with("Error validating model response"));
    }

    #[tokio::test]
    async fn test_empty_prompt_skips_endpoint() {
        let adapter = ScriptedAdapter::new(Some(VALID), Duration::ZERO);
        let service = ChatService::with_adapter(adapter.clone(), "dep", chat_config());
        assert_eq!(service.query("   ", None).await, texts::CHAT_NO_PROMPT);
        assert!(adapter.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_backend_returns_notice() {
        let service = ChatService::unavailable("AZURE_ENDPOINT must be set", chat_config());
        assert!(!service.is_configured());
        let out = service.query("q", None).await;
        assert_eq!(out, "Chat backend unavailable: AZURE_ENDPOINT must be set");
    }

    #[tokio::test]
    async fn test_dry_run_replaces_system_message() {
        let config = ChatConfig {
            dry_run: true,
            ..chat_config()
        };
        let adapter = ScriptedAdapter::new(Some(VALID), Duration::ZERO);
        let service = ChatService::with_adapter(adapter.clone(), "dep", config);
        service.query("q", Some("ignored")).await;
        let seen = adapter.seen.lock().unwrap();
        assert!(seen[0].messages[0].content.starts_with(texts::CHAT_DRY_RUN_INFO));
    }

    #[tokio::test]
    async fn test_timeout_becomes_text() {
        let config = ChatConfig {
            timeout_secs: 1,
            ..chat_config()
        };
        let adapter = ScriptedAdapter::new(Some(VALID), Duration::from_secs(5));
        let service = ChatService::with_adapter(adapter, "dep", config);
        let out = service.query("q", None).await;
        assert_eq!(out, AppError::LLMTimeout(1).to_string());
    }

    #[tokio::test]
    async fn test_concurrency_ceiling() {
        let config = ChatConfig {
            max_concurrency: 2,
            ..chat_config()
        };
        let adapter = ScriptedAdapter::new(Some(VALID), Duration::from_millis(50));
        let service = ChatService::with_adapter(adapter.clone(), "dep", config);

        let calls = (0..8).map(|i| {
            let service = service.clone();
            async move { service.query(&format!("q{}", i), None).await }
        });
        let outputs = futures::future::join_all(calls).await;

        assert_eq!(outputs.len(), 8);
        assert!(adapter.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(adapter.seen.lock().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_from_config_against_mock_endpoint() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/openai/deployments/dep/chat/completions")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"{\"invalid_field\": \"x\"}"}}]}"#)
            .create_async()
            .await;

        let mut config = crate::config::Config::from_source(|_| None).unwrap();
        config.azure = Some(AzureSettings {
            endpoint: server.url(),
            key: "0123456789".into(),
            api_version: crate::config::DEFAULT_API_VERSION.into(),
            model_names: vec!["gpt-4.1".into()],
            deployment: "dep".into(),
        });
        let service = ChatService::from_config(&config);
        assert!(service.is_configured());
        assert!(service.query("q", None).await.starts_with("Error validating model response"));
    }
}
