use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::info;

use crate::files::build_preview;
use crate::models::{
    AppState, SessionResponse, SystemPromptRequest, SystemPromptResponse, UploadResponse,
};
use crate::routes::files::seed_from_preview;
use crate::routes::{load_session, parse_session_id, with_session};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(get_session))
        .route("/api/sessions/{id}/headers/toggle", post(toggle_headers))
        .route(
            "/api/sessions/{id}/system-prompt",
            get(get_system_prompt).put(put_system_prompt),
        )
        .with_state(state)
}

async fn create_session(State(state): State<AppState>) -> AppResult<Json<SessionResponse>> {
    let id = state.sessions.create(state.config.upload.max_groups).await;
    info!(session = %id.short(), "Session created");
    let session = load_session(&state, &id).await?;
    Ok(Json(SessionResponse::from_state(
        id,
        &session,
        state.config.azure_notice.clone(),
    )))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<SessionResponse>> {
    let id = parse_session_id(&id)?;
    let session = load_session(&state, &id).await?;
    Ok(Json(SessionResponse::from_state(id, &session, None)))
}

/// Flip the header flag and re-preview the last upload with it.
async fn toggle_headers(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<UploadResponse>> {
    let id = parse_session_id(&id)?;
    let (has_headers, last_file) = with_session(&state, &id, |s| {
        s.has_headers = !s.has_headers;
        (s.has_headers, s.last_uploaded_file.clone())
    })
    .await?;
    info!(session = %id.short(), has_headers, "Toggled header row");

    let Some(path) = last_file else {
        let session = load_session(&state, &id).await?;
        return Ok(Json(UploadResponse {
            preview: Default::default(),
            groups: session.groups.iter().cloned().collect(),
            files: Vec::new(),
            has_headers,
            message: None,
        }));
    };

    let limits = state.config.upload.clone();
    let files = vec![path.clone()];
    let preview = tokio::task::spawn_blocking(move || build_preview(&files, has_headers, &limits))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let groups = with_session(&state, &id, |s| seed_from_preview(s, &preview)).await?;
    Ok(Json(UploadResponse {
        preview: preview.table,
        groups,
        files: path
            .file_name()
            .map(|n| vec![n.to_string_lossy().to_string()])
            .unwrap_or_default(),
        has_headers,
        message: None,
    }))
}

async fn get_system_prompt(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<SystemPromptResponse>> {
    let id = parse_session_id(&id)?;
    let session = load_session(&state, &id).await?;
    Ok(Json(prompt_response(&state, session.system_prompt.as_deref())))
}

async fn put_system_prompt(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SystemPromptRequest>,
) -> AppResult<Json<SystemPromptResponse>> {
    let id = parse_session_id(&id)?;
    let prompt = body.system_prompt;
    let stored = prompt.clone();
    with_session(&state, &id, move |s| {
        s.system_prompt = if stored.trim().is_empty() { None } else { Some(stored) };
    })
    .await?;
    info!(session = %id.short(), chars = prompt.chars().count(), "System prompt updated");

    let session = load_session(&state, &id).await?;
    Ok(Json(prompt_response(&state, session.system_prompt.as_deref())))
}

fn prompt_response(state: &AppState, session_prompt: Option<&str>) -> SystemPromptResponse {
    SystemPromptResponse {
        system_prompt: state.chat.base_system_message(session_prompt).to_string(),
        full_prompt: state.chat.system_prompt(session_prompt),
        dry_run: state.config.chat.dry_run,
    }
}
