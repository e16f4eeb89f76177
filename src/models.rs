use std::path::PathBuf;
use std::sync::Arc;

use crate::chat::ChatService;
use crate::config::Config;
use crate::export::Exporter;
use crate::files::PreviewTable;
use crate::groups::{GroupId, GroupState};
use crate::session::{SessionId, SessionState, SessionStore, SessionWorkspace};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: SessionStore,
    pub chat: ChatService,
    pub exporter: Exporter,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let chat = ChatService::from_config(&config);
        Self::with_chat(config, chat)
    }

    pub fn with_chat(config: Config, chat: ChatService) -> Self {
        Self {
            exporter: Exporter::new(config.export.clone()),
            sessions: SessionStore::new(&config.sessions),
            config: Arc::new(config),
            chat,
        }
    }

    pub fn workspace(&self, id: &SessionId) -> SessionWorkspace {
        SessionWorkspace::new(id.clone(), &self.config.paths)
    }

    /// First entry of the output tail: the last upload, or the bundled sample.
    pub fn document_source(&self, session: &SessionState) -> PathBuf {
        session
            .last_uploaded_file
            .clone()
            .unwrap_or_else(|| self.config.paths.sample_csv.clone())
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub chat_backend: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionResponse {
    pub session_id: SessionId,
    pub has_headers: bool,
    pub max_groups: usize,
    pub groups: Vec<GroupState>,
    pub last_uploaded_file: Option<String>,
    pub document: Option<String>,
    /// Configuration problem shown once, e.g. a missing chat backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl SessionResponse {
    pub fn from_state(id: SessionId, state: &SessionState, notice: Option<String>) -> Self {
        Self {
            session_id: id,
            has_headers: state.has_headers,
            max_groups: state.groups.max_groups(),
            groups: state.groups.iter().cloned().collect(),
            last_uploaded_file: state
                .last_uploaded_file
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string()),
            document: state.document.clone(),
            notice,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct UploadResponse {
    pub preview: PreviewTable,
    pub groups: Vec<GroupState>,
    pub files: Vec<String>,
    pub has_headers: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct GroupsResponse {
    pub groups: Vec<GroupState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct UpdateGroupRequest {
    pub header: Option<String>,
    pub input: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CollapseResponse {
    pub id: GroupId,
    pub collapsed: bool,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct SubmitRequest {
    /// Latest text from the browser; falls back to the stored input.
    #[serde(default)]
    pub input: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SubmitResponse {
    pub id: GroupId,
    pub output: String,
    /// `false` when the group was removed while the query ran.
    pub stored: bool,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct SystemPromptRequest {
    pub system_prompt: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SystemPromptResponse {
    pub system_prompt: String,
    /// What is actually sent: base prompt plus the answer schema.
    pub full_prompt: String,
    pub dry_run: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DocumentBody {
    pub markdown: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RenderedDocument {
    pub html: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct FlatOutputRequest {
    pub values: Vec<serde_json::Value>,
}

impl FlatOutputRequest {
    /// Numbers (the leading counts) and strings are both accepted.
    pub fn into_strings(self) -> Vec<String> {
        self.values
            .into_iter()
            .map(|value| match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect()
    }
}
