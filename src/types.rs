// Type definitions shared across the chat, export and HTTP layers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMRequest {
    pub model: String,
    pub messages: Vec<LLMMessage>,
    pub max_completion_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// OpenAI-style `response_format.type`, e.g. "json_object"
    pub response_format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LLMMessage {
    pub role: String, // "user", "assistant", "system"
    pub content: String,
}

impl LLMMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMResponse {
    /// `None` when the endpoint answered without a message body
    pub content: Option<String>,
    pub finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("HTTP error occurred while querying the chat endpoint: {0}")]
    LLMStatus(String),

    #[error("Request error occurred while querying the chat endpoint: {0}")]
    LLMTransport(String),

    #[error("Chat endpoint did not answer within {0} seconds")]
    LLMTimeout(u64),

    #[error("Chat endpoint returned an unreadable payload: {0}")]
    LLMPayload(String),

    #[error("Invalid session id: {0}")]
    InvalidSession(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Export(#[from] crate::export::ExportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidSession(_) | AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::LLMStatus(_) | AppError::LLMTransport(_) | AppError::LLMPayload(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::LLMTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Export(
                crate::export::ExportError::EmptyDocument | crate::export::ExportError::UnknownFormat(_),
            ) => StatusCode::BAD_REQUEST,
            AppError::Export(_) | AppError::Io(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::warn!(error = %self, "Request rejected");
        }
        let body = serde_json::json!({
            "error": status.canonical_reason().unwrap_or("error"),
            "details": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
