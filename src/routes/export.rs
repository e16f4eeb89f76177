use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::info;

use crate::export::ExportFormat;
use crate::models::AppState;
use crate::output::{render_output, OutputRequest};
use crate::routes::{load_session, parse_session_id};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions/{id}/export/{format}", get(export_document))
        .with_state(state)
}

/// Convert the session's document and stream the file back as an attachment.
///
/// The stored document is used when present so manual edits survive; otherwise
/// a fresh one is assembled from the current panels.
async fn export_document(
    State(state): State<AppState>,
    Path((id, format)): Path<(String, String)>,
) -> AppResult<Response> {
    let id = parse_session_id(&id)?;
    let format: ExportFormat = format.parse()?;
    let session = load_session(&state, &id).await?;

    let source = state.document_source(&session).to_string_lossy().to_string();
    let results = OutputRequest::from_groups(&session.groups, vec![source]);
    let markdown = match session.document {
        Some(doc) => doc,
        None => render_output(&results, &state.config.server.corp_name),
    };

    let workspace = state.workspace(&id);
    let path = state.exporter.export(format, &workspace, &markdown, &results).await?;
    let bytes = tokio::fs::read(&path).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| AppError::Internal(format!("export path has no file name: {}", path.display())))?;
    let content_type = mime_guess::from_path(&path).first_or_octet_stream();
    info!(session = %id.short(), file = %file_name, size = bytes.len(), "Serving export");

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::routes::create_router;
    use crate::routes::test_support::*;

    #[tokio::test]
    async fn test_csv_export_download() {
        let app = test_app();
        let id = new_session(&app).await;
        send(
            &app,
            json_request(
                "PUT",
                &format!("/api/sessions/{}/groups/0", id),
                json!({"header": "Capital", "input": "France?"}),
            ),
        )
        .await;

        let response = create_router(app.state.clone())
            .oneshot(empty_request("GET", &format!("/api/sessions/{}/export/CSV", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let disposition = response.headers()["content-disposition"].to_str().unwrap().to_string();
        assert_eq!(disposition, format!("attachment; filename=\"Output_{}.csv\"", &id[..6]));
        assert!(response.headers()["content-type"].to_str().unwrap().starts_with("text/csv"));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["Header,Input Value,Output Value", "Capital,France?,"]);
    }

    #[tokio::test]
    async fn test_unknown_format_is_rejected() {
        let app = test_app();
        let id = new_session(&app).await;
        let (status, _) = send(&app, empty_request("GET", &format!("/api/sessions/{}/export/odt", id))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_empty_document_is_rejected() {
        let app = test_app();
        let id = new_session(&app).await;
        send(
            &app,
            json_request("PUT", &format!("/api/sessions/{}/document", id), json!({"markdown": "  "})),
        )
        .await;
        let (status, json) = send(&app, empty_request("GET", &format!("/api/sessions/{}/export/html", id))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["details"].as_str().unwrap().contains("no Markdown content"));
    }
}
