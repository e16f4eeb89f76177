// Structured answer expected from the chat endpoint

use reqwest::Url;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::texts;

/// The only payload shape accepted from the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ChatAnswer {
    /// A brief summary of the answer.
    #[serde(rename = "Abstract")]
    pub summary: String,
    /// A detailed description of the answer.
    #[serde(rename = "Description")]
    pub description: String,
    /// URLs of the sources related to the answer.
    #[serde(rename = "Sources")]
    pub sources: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AnswerError {
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("Sources.{index}: {value:?} is not a valid http(s) URL")]
    InvalidSource { index: usize, value: String },
}

/// Parse and check a raw model payload. Source URLs come back normalized.
pub fn parse_answer(raw: &str) -> Result<ChatAnswer, AnswerError> {
    let mut answer: ChatAnswer = serde_json::from_str(raw)?;
    for (index, source) in answer.sources.iter_mut().enumerate() {
        let url = Url::parse(source)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
            .ok_or_else(|| AnswerError::InvalidSource {
                index,
                value: source.clone(),
            })?;
        *source = url.to_string();
    }
    Ok(answer)
}

/// Flat key/value rendering shown in the panel; lists become `- ` lines.
pub fn format_answer(answer: &ChatAnswer) -> String {
    let sources: Vec<String> = answer.sources.iter().map(|s| format!("- {}", s)).collect();
    [
        "Abstract:",
        answer.summary.as_str(),
        "Description:",
        answer.description.as_str(),
        "Sources:",
        sources.join("\n").as_str(),
    ]
    .join("\n")
}

/// Turn whatever the endpoint sent into panel text.
pub fn render_answer(content: Option<&str>) -> String {
    let Some(raw) = content else {
        return "Chat endpoint returned no message content. Nothing to validate.".to_string();
    };
    match parse_answer(raw) {
        Ok(answer) => format_answer(&answer),
        Err(e) => {
            let msg = format!("Error validating model response: {}", e);
            error!("{}", msg);
            msg
        }
    }
}

/// System prompt sent with every query: the base text plus the answer schema.
pub fn full_system_prompt(base: &str) -> String {
    let schema = schema_for!(ChatAnswer);
    let schema_pretty = serde_json::to_string_pretty(&schema).unwrap_or_default();
    format!("{}{}{}", base, texts::CHAT_SCHEMA_ANNOUNCE, schema_pretty)
}
