use axum::{
    extract::{Path, State},
    routing::{post, put},
    Json, Router,
};
use tracing::info;

use crate::models::{AppState, DocumentBody, FlatOutputRequest, RenderedDocument};
use crate::output::{decode_flat, render_output, render_preview_html, OutputRequest};
use crate::routes::{load_session, parse_session_id, with_session};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions/{id}/output", post(generate_output))
        .route("/api/sessions/{id}/document", put(save_document))
        .route("/api/output", post(assemble_output))
        .route("/api/output/flat", post(assemble_flat_output))
        .route("/api/output/render", post(render_document))
        .with_state(state)
}

/// Assemble the session's panels into Markdown and keep it as the editable document.
async fn generate_output(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DocumentBody>> {
    let id = parse_session_id(&id)?;
    let session = load_session(&state, &id).await?;
    let source = state.document_source(&session).to_string_lossy().to_string();
    let request = OutputRequest::from_groups(&session.groups, vec![source]);
    let markdown = render_output(&request, &state.config.server.corp_name);

    let stored = markdown.clone();
    with_session(&state, &id, move |s| s.document = Some(stored)).await?;
    info!(session = %id.short(), sections = session.groups.len(), "Output generated");
    Ok(Json(DocumentBody { markdown }))
}

async fn save_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<DocumentBody>,
) -> AppResult<Json<DocumentBody>> {
    let id = parse_session_id(&id)?;
    let markdown = body.markdown;
    let stored = markdown.clone();
    with_session(&state, &id, move |s| s.document = Some(stored)).await?;
    Ok(Json(DocumentBody { markdown }))
}

async fn assemble_output(
    State(state): State<AppState>,
    Json(request): Json<OutputRequest>,
) -> Json<DocumentBody> {
    Json(DocumentBody {
        markdown: render_output(&request, &state.config.server.corp_name),
    })
}

/// Markdown to HTML for the preview pane next to the editor.
async fn render_document(Json(body): Json<DocumentBody>) -> Json<RenderedDocument> {
    Json(RenderedDocument {
        html: render_preview_html(&body.markdown),
    })
}

/// Compatibility endpoint for the flat `[n, n, n, ...values]` argument list.
async fn assemble_flat_output(
    State(state): State<AppState>,
    Json(body): Json<FlatOutputRequest>,
) -> AppResult<Json<DocumentBody>> {
    let request = decode_flat(&body.into_strings()).map_err(|e| AppError::InvalidRequest(e.to_string()))?;
    Ok(Json(DocumentBody {
        markdown: render_output(&request, &state.config.server.corp_name),
    }))
}
