use std::env;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use validator::{Validate, ValidationError};

use crate::texts;

/// Models the deployment is allowed to name in `AZURE_MODEL_NAME`.
pub const VALID_MODELS: [&str; 4] = ["gpt-4.5", "gpt-4.1", "gpt-4.1-nano", "gpt-4.1-mini"];

pub const DEFAULT_API_VERSION: &str = "2024-12-01-preview";

/// `YYYY-MM-DD` with an optional `-preview` suffix.
static API_VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}(-preview)?$").expect("api version pattern compiles"));

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub paths: PathsConfig,
    pub upload: UploadConfig,
    pub chat: ChatConfig,
    pub export: ExportConfig,
    pub sessions: SessionConfig,
    /// `None` puts the app in degraded mode: every chat submission fails with a message.
    pub azure: Option<AzureSettings>,
    /// Shown once to the user when `azure` could not be loaded.
    pub azure_notice: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
    pub corp_name: String,
}

#[derive(Debug, Clone)]
pub struct PathsConfig {
    pub root: PathBuf,
    pub uploads: PathBuf,
    pub downloads: PathBuf,
    pub logs: PathBuf,
    pub sample_csv: PathBuf,
    pub templates: PathBuf,
}

impl PathsConfig {
    pub fn from_root(root: impl Into<PathBuf>, logs: Option<PathBuf>) -> Self {
        let root = root.into();
        let assets = root.join("assets");
        Self {
            uploads: root.join("uploads"),
            downloads: root.join("downloads"),
            logs: logs.unwrap_or_else(|| root.join("logs")),
            sample_csv: assets.join("datasets").join("chat_upload_sample.csv"),
            templates: assets.join("templates"),
            root,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_file_size: u64,
    pub allowed_extensions: Vec<String>,
    pub max_rows: usize,
    pub max_groups: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            allowed_extensions: [".csv", ".tsv", ".xlsx", ".txt"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_rows: 500,
            max_groups: 10,
        }
    }
}

/// Bounds on the in-memory session store.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sessions untouched for longer than this are dropped.
    pub idle_ttl_secs: u64,
    /// The least recently used session is evicted beyond this count.
    pub max_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: 4 * 60 * 60,
            max_sessions: 1000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub system_message: String,
    pub dry_run: bool,
    pub max_completion_tokens: u32,
    pub temperature: f32,
    pub response_format: String,
    pub timeout_secs: u64,
    pub max_concurrency: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_message: texts::DEFAULT_SYSTEM_MESSAGE.to_string(),
            dry_run: false,
            max_completion_tokens: 800,
            temperature: 0.7,
            response_format: "json_object".to_string(),
            timeout_secs: 60,
            max_concurrency: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub pandoc_path: PathBuf,
    pub html_template: PathBuf,
    pub css: PathBuf,
    pub docx_reference: PathBuf,
    pub pdf_engine: String,
    pub download_prefix: String,
    pub timeout_secs: u64,
}

impl ExportConfig {
    pub fn with_templates(templates: &Path) -> Self {
        Self {
            pandoc_path: PathBuf::from("pandoc"),
            html_template: templates.join("template.html.tpl"),
            css: templates.join("template.html.css"),
            docx_reference: templates.join("template.docx"),
            pdf_engine: "pdflatex".to_string(),
            download_prefix: "Output_".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Azure OpenAI connection settings.
#[derive(Debug, Clone, Validate)]
pub struct AzureSettings {
    #[validate(url)]
    pub endpoint: String,
    #[validate(length(min = 10))]
    pub key: String,
    #[validate(regex(path = *API_VERSION_RE))]
    pub api_version: String,
    #[validate(custom(function = "validate_model_names"))]
    pub model_names: Vec<String>,
    #[validate(length(min = 1))]
    pub deployment: String,
}

impl AzureSettings {
    pub fn from_source<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = get("AZURE_ENDPOINT").ok_or(ConfigError::Missing("AZURE_ENDPOINT"))?;
        let settings = Self {
            // Some hosting panels store the scheme colon escaped
            endpoint: endpoint.replace(r"\x3a", ":"),
            key: get("AZURE_KEY").ok_or(ConfigError::Missing("AZURE_KEY"))?,
            api_version: get("AZURE_API_VERSION")
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            model_names: get("AZURE_MODEL_NAME")
                .unwrap_or_else(|| "gpt-4.1".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            deployment: get("AZURE_DEPLOYMENT").ok_or(ConfigError::Missing("AZURE_DEPLOYMENT"))?,
        };
        settings.validate()?;
        Ok(settings)
    }
}

fn validate_model_names(names: &[String]) -> Result<(), ValidationError> {
    if names.is_empty() {
        return Err(ValidationError::new("model_name_missing"));
    }
    match names.iter().find(|n| !VALID_MODELS.contains(&n.as_str())) {
        Some(_) => Err(ValidationError::new("model_name_unknown")),
        None => Ok(()),
    }
}

fn parse_var<T, F>(get: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

impl Config {
    /// Load `.env`, then read the environment. `overrides` (e.g. CLI flags)
    /// wins for every key it answers.
    pub fn from_env<F>(overrides: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        dotenvy::dotenv().ok();
        Self::from_source(|key| overrides(key).or_else(|| env::var(key).ok()))
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_source<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let root = get("SYS_ROOT_PATH").unwrap_or_else(|| ".".to_string());
        let paths = PathsConfig::from_root(root, get("SYS_LOG_PATH").map(PathBuf::from));

        let upload_defaults = UploadConfig::default();
        let chat_defaults = ChatConfig::default();
        let session_defaults = SessionConfig::default();
        let mut export = ExportConfig::with_templates(&paths.templates);
        if let Some(pandoc) = get("PANDOC_PATH") {
            export.pandoc_path = PathBuf::from(pandoc);
        }
        if let Some(engine) = get("PDF_ENGINE") {
            export.pdf_engine = engine;
        }
        export.timeout_secs = parse_var(&get, "EXPORT_TIMEOUT_SECS", export.timeout_secs)?;

        let (azure, azure_notice) = match AzureSettings::from_source(&get) {
            Ok(settings) => (Some(settings), None),
            Err(e) => (None, Some(format!("Chat backend not configured: {}", e))),
        };

        Ok(Self {
            server: ServerConfig {
                port: parse_var(&get, "PORT", 8000)?,
                host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                cors_allowed_origins: get("ALLOWED_ORIGINS")
                    .unwrap_or_else(|| "http://localhost:8000".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
                corp_name: get("CORP_NAME").unwrap_or_else(|| "MYCORP".to_string()),
            },
            paths,
            upload: UploadConfig {
                max_file_size: parse_var(&get, "UPLOAD_MAX_FILE_SIZE", upload_defaults.max_file_size)?,
                max_rows: parse_var(&get, "UPLOAD_MAX_ROWS", upload_defaults.max_rows)?,
                max_groups: parse_var(&get, "MAX_DYN_GROUPS", upload_defaults.max_groups)?,
                ..upload_defaults
            },
            chat: ChatConfig {
                system_message: get("CHAT_SYSTEM_MESSAGE").unwrap_or(chat_defaults.system_message),
                dry_run: parse_var(&get, "CHAT_DRY_RUN", false)?,
                timeout_secs: parse_var(&get, "CHAT_TIMEOUT_SECS", chat_defaults.timeout_secs)?,
                max_concurrency: parse_var(&get, "CHAT_MAX_CONCURRENCY", chat_defaults.max_concurrency)?
                    .max(1),
                ..chat_defaults
            },
            export,
            sessions: SessionConfig {
                idle_ttl_secs: parse_var(&get, "SESSION_IDLE_TTL_SECS", session_defaults.idle_ttl_secs)?,
                max_sessions: parse_var(&get, "MAX_SESSIONS", session_defaults.max_sessions)?.max(1),
            },
            azure,
            azure_notice,
        })
    }
}
