use std::path::PathBuf;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    routing::post,
    Json, Router,
};
use tracing::{info, warn};

use crate::files::{self, build_preview, FilePreview, IncomingFile, PreviewTable};
use crate::groups::GroupState;
use crate::models::{AppState, UploadResponse};
use crate::routes::{load_session, parse_session_id, with_session};
use crate::session::{SessionId, SessionState};
use crate::texts;
use crate::types::{AppError, AppResult};

/// Multipart overhead allowed on top of the per-file limit.
const MULTIPART_SLACK: usize = 1024 * 1024;
const MAX_FILES_PER_UPLOAD: usize = 5;

pub fn router(state: AppState) -> Router {
    let body_limit = (state.config.upload.max_file_size as usize)
        .saturating_mul(MAX_FILES_PER_UPLOAD)
        .saturating_add(MULTIPART_SLACK);

    Router::new()
        .route("/api/sessions/{id}/upload", post(upload_files))
        .route("/api/sessions/{id}/sample", post(load_sample))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Replace the session's groups with ones seeded from the preview columns.
pub(crate) fn seed_from_preview(session: &mut SessionState, preview: &FilePreview) -> Vec<GroupState> {
    session
        .groups
        .seed(&preview.first_column, &preview.second_column);
    if session.groups.is_empty() {
        session.groups.resize(1);
    }
    session.groups.iter().cloned().collect()
}

async fn upload_files(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let id = parse_session_id(&id)?;
    load_session(&state, &id).await?;

    let mut incoming = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidRequest(format!("malformed multipart body: {}", e)))?
    {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidRequest(format!("cannot read {}: {}", name, e)))?;
        incoming.push(IncomingFile {
            name,
            bytes: bytes.to_vec(),
        });
    }
    info!(session = %id.short(), count = incoming.len(), "Upload received");

    let workspace = state.workspace(&id);
    let saved = files::store_files(&workspace, incoming, &state.config.upload).await?;
    preview_and_seed(&state, &id, saved).await.map(Json)
}

async fn load_sample(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<UploadResponse>> {
    let id = parse_session_id(&id)?;
    load_session(&state, &id).await?;

    let sample = &state.config.paths.sample_csv;
    if !tokio::fs::try_exists(sample).await? {
        return Err(AppError::NotFound(format!("sample dataset {}", sample.display())));
    }
    let workspace = state.workspace(&id);
    let saved = files::import_local_file(&workspace, sample, &state.config.upload).await?;
    info!(session = %id.short(), "Sample dataset loaded");
    preview_and_seed(&state, &id, saved).await.map(Json)
}

async fn preview_and_seed(state: &AppState, id: &SessionId, saved: Vec<PathBuf>) -> AppResult<UploadResponse> {
    let session = load_session(state, id).await?;
    let has_headers = session.has_headers;

    if saved.is_empty() {
        warn!(session = %id.short(), "No valid files in upload");
        return Ok(UploadResponse {
            preview: PreviewTable {
                headers: Vec::new(),
                rows: vec![vec![texts::PREVIEW_NO_VALID_FILES.to_string()]],
            },
            groups: session.groups.iter().cloned().collect(),
            files: Vec::new(),
            has_headers,
            message: Some(texts::UPLOAD_REJECTED.to_string()),
        });
    }

    let limits = state.config.upload.clone();
    let to_preview = saved.clone();
    let preview = tokio::task::spawn_blocking(move || build_preview(&to_preview, has_headers, &limits))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let last = saved[0].clone();
    let groups = with_session(state, id, |s| {
        s.last_uploaded_file = Some(last);
        s.document = None;
        seed_from_preview(s, &preview)
    })
    .await?;

    Ok(UploadResponse {
        preview: preview.table,
        groups,
        files: saved
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .collect(),
        has_headers,
        message: None,
    })
}
