//! API Routes
//!
//! - `/` - Single-page front-end
//! - `/api/health` - Health check
//! - `/api/sessions` - Session lifecycle, headers flag, system prompt
//! - `/api/sessions/{id}/upload`, `/sample` - File upload and preview
//! - `/api/sessions/{id}/groups` - Dynamic panels and chat submission
//! - `/api/sessions/{id}/output`, `/document`, `/api/output` - Document assembly
//! - `/api/sessions/{id}/export/{format}` - HTML/PDF/DOCX/CSV downloads

pub mod export;
pub mod files;
pub mod groups;
pub mod health;
pub mod output;
pub mod sessions;
pub mod ui;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::cors_layer;
use crate::models::AppState;
use crate::session::{SessionId, SessionState};
use crate::types::{AppError, AppResult};

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let cors = cors_layer(&state.config.server.cors_allowed_origins);

    let api_router = Router::new()
        .merge(sessions::router(state.clone()))
        .merge(files::router(state.clone()))
        .merge(groups::router(state.clone()))
        .merge(output::router(state.clone()))
        .merge(export::router(state.clone()))
        .merge(health::router(state));

    Router::new()
        .merge(api_router)
        .merge(ui::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub(crate) fn parse_session_id(raw: &str) -> AppResult<SessionId> {
    SessionId::parse(raw).ok_or_else(|| AppError::InvalidSession(raw.to_string()))
}

pub(crate) async fn load_session(state: &AppState, id: &SessionId) -> AppResult<SessionState> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("session {}", id.short())))
}

/// Apply `f` to a stored session, 404 if it does not exist.
pub(crate) async fn with_session<R>(
    state: &AppState,
    id: &SessionId,
    f: impl FnOnce(&mut SessionState) -> R,
) -> AppResult<R> {
    state
        .sessions
        .update(id, f)
        .await
        .ok_or_else(|| AppError::NotFound(format!("session {}", id.short())))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::chat::ChatService;
    use crate::config::Config;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::collections::HashMap;
    use tower::ServiceExt;

    pub const BOUNDARY: &str = "chat-mvp-test-boundary";

    pub struct TestApp {
        pub state: AppState,
        pub dir: tempfile::TempDir,
    }

    pub fn test_config(dir: &tempfile::TempDir) -> Config {
        let root = dir.path().to_string_lossy().to_string();
        let vars: HashMap<&str, String> = [("SYS_ROOT_PATH", root), ("MAX_DYN_GROUPS", "3".to_string())]
            .into_iter()
            .collect();
        Config::from_source(|k| vars.get(k).cloned()).unwrap()
    }

    pub fn test_app() -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(test_config(&dir));
        TestApp { state, dir }
    }

    pub fn test_app_with_chat(chat: impl FnOnce(&Config) -> ChatService) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let chat = chat(&config);
        TestApp {
            state: AppState::with_chat(config, chat),
            dir,
        }
    }

    pub async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = create_router(app.state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
    }

    pub fn multipart_request(uri: &str, files: &[(&str, &str)]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, text) in files {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    name
                )
                .as_bytes(),
            );
            body.extend_from_slice(text.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(body))
            .unwrap()
    }

    pub async fn new_session(app: &TestApp) -> String {
        let (status, json) = send(app, empty_request("POST", "/api/sessions")).await;
        assert_eq!(status, StatusCode::OK);
        json["session_id"].as_str().unwrap().to_string()
    }
}
