//! Per-browser sessions
//!
//! A session is identified by a random 16-byte token rendered as 32 lowercase
//! hex characters. The id doubles as the name of the session's upload and
//! download directories, so [`SessionId`] only admits that exact shape.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::{PathsConfig, SessionConfig};
use crate::groups::GroupArena;

const SESSION_ID_BYTES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        let bytes: [u8; SESSION_ID_BYTES] = rand::random();
        Self(hex::encode(bytes))
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let well_formed = raw.len() == SESSION_ID_BYTES * 2
            && raw.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        well_formed.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading characters used in log lines and download names.
    pub fn short(&self) -> &str {
        &self.0[..6]
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Isolated on-disk directories of one session.
#[derive(Debug, Clone)]
pub struct SessionWorkspace {
    pub id: SessionId,
    pub upload_dir: PathBuf,
    pub download_dir: PathBuf,
}

impl SessionWorkspace {
    pub fn new(id: SessionId, paths: &PathsConfig) -> Self {
        Self {
            upload_dir: paths.uploads.join(id.as_str()),
            download_dir: paths.downloads.join(id.as_str()),
            id,
        }
    }

    pub async fn ensure_upload_dir(&self) -> std::io::Result<&Path> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        Ok(&self.upload_dir)
    }

    pub async fn ensure_download_dir(&self) -> std::io::Result<&Path> {
        tokio::fs::create_dir_all(&self.download_dir).await?;
        Ok(&self.download_dir)
    }

    /// `Output_<first 6 chars of id>.<ext>` inside the download dir.
    pub fn download_path(&self, prefix: &str, ext: &str) -> PathBuf {
        self.download_dir
            .join(format!("{}{}.{}", prefix, self.id.short(), ext))
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub has_headers: bool,
    pub groups: GroupArena,
    pub last_uploaded_file: Option<PathBuf>,
    /// Overrides the configured system message for this session only.
    pub system_prompt: Option<String>,
    /// Last assembled (or user-edited) Markdown document.
    pub document: Option<String>,
}

impl SessionState {
    pub fn new(max_groups: usize) -> Self {
        let mut groups = GroupArena::new(max_groups);
        groups.resize(1);
        Self {
            has_headers: false,
            groups,
            last_uploaded_file: None,
            system_prompt: None,
            document: None,
        }
    }
}

struct Entry {
    state: SessionState,
    last_seen: Instant,
}

/// In-memory sessions, bounded by an idle timeout and a maximum count.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<SessionId, Entry>>>,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            inner: Arc::default(),
            idle_ttl: Duration::from_secs(config.idle_ttl_secs),
            max_sessions: config.max_sessions.max(1),
        }
    }

    /// Create a session, first dropping idle ones and, if still full, the
    /// least recently used.
    pub async fn create(&self, max_groups: usize) -> SessionId {
        let id = SessionId::generate();
        let mut guard = self.inner.write().await;

        let before = guard.len();
        guard.retain(|_, entry| entry.last_seen.elapsed() <= self.idle_ttl);
        let expired = before - guard.len();
        if expired > 0 {
            info!(expired, "Dropped idle sessions");
        }
        while guard.len() >= self.max_sessions {
            let oldest = guard
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(id, _)| id.clone());
            let Some(oldest) = oldest else { break };
            guard.remove(&oldest);
            info!(session = %oldest.short(), "Session limit reached, evicted least recently used");
        }

        guard.insert(
            id.clone(),
            Entry {
                state: SessionState::new(max_groups),
                last_seen: Instant::now(),
            },
        );
        id
    }

    pub async fn get(&self, id: &SessionId) -> Option<SessionState> {
        self.update(id, |s| s.clone()).await
    }

    /// Run `f` against the session; `None` if the session is unknown or expired.
    pub async fn update<R>(&self, id: &SessionId, f: impl FnOnce(&mut SessionState) -> R) -> Option<R> {
        let mut guard = self.inner.write().await;
        if guard.get(id).is_some_and(|entry| entry.last_seen.elapsed() > self.idle_ttl) {
            guard.remove(id);
            debug!(session = %id.short(), "Session expired");
            return None;
        }
        let entry = guard.get_mut(id)?;
        entry.last_seen = Instant::now();
        Some(f(&mut entry.state))
    }
}
