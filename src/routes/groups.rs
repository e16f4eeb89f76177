use axum::{
    extract::{Path, State},
    routing::{post, put},
    Json, Router,
};
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::groups::{GroupError, GroupId, GroupState};
use crate::models::{
    AppState, CollapseResponse, GroupsResponse, SubmitRequest, SubmitResponse, UpdateGroupRequest,
};
use crate::routes::{parse_session_id, with_session};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions/{id}/groups", post(add_group).delete(remove_group))
        .route("/api/sessions/{id}/groups/{gid}", put(update_group))
        .route("/api/sessions/{id}/groups/{gid}/collapse", post(toggle_collapse))
        .route("/api/sessions/{id}/groups/{gid}/submit", post(submit_group))
        .route("/api/sessions/{id}/submit-all", post(submit_all))
        .with_state(state)
}

fn unknown_group(err: GroupError) -> AppError {
    AppError::NotFound(err.to_string())
}

async fn add_group(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<GroupsResponse>> {
    let id = parse_session_id(&id)?;
    let (added, groups) = with_session(&state, &id, |s| {
        let added = s.groups.add();
        (added, s.groups.iter().cloned().collect::<Vec<_>>())
    })
    .await?;

    let notice = match added {
        Ok(gid) => {
            info!(session = %id.short(), group = %gid, "Added text group");
            Some("Added a new text group!".to_string())
        }
        Err(e) => {
            warn!(session = %id.short(), error = %e, "Group limit reached");
            Some(e.to_string())
        }
    };
    Ok(Json(GroupsResponse { groups, notice }))
}

async fn remove_group(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<GroupsResponse>> {
    let id = parse_session_id(&id)?;
    let groups = with_session(&state, &id, |s| {
        s.groups.remove_last();
        s.groups.iter().cloned().collect()
    })
    .await?;
    info!(session = %id.short(), "Removed the last text group");
    Ok(Json(GroupsResponse {
        groups,
        notice: Some("Removed the last text group.".to_string()),
    }))
}

async fn update_group(
    State(state): State<AppState>,
    Path((id, gid)): Path<(String, u64)>,
    Json(body): Json<UpdateGroupRequest>,
) -> AppResult<Json<GroupsResponse>> {
    let id = parse_session_id(&id)?;
    let gid = GroupId(gid);
    let groups = with_session(&state, &id, |s| -> Result<Vec<GroupState>, GroupError> {
        let group = s.groups.get_mut(gid).ok_or(GroupError::Unknown(gid))?;
        if let Some(header) = body.header {
            group.header = header;
        }
        if let Some(input) = body.input {
            group.input = input;
        }
        Ok(s.groups.iter().cloned().collect())
    })
    .await?
    .map_err(unknown_group)?;
    Ok(Json(GroupsResponse { groups, notice: None }))
}

async fn toggle_collapse(
    State(state): State<AppState>,
    Path((id, gid)): Path<(String, u64)>,
) -> AppResult<Json<CollapseResponse>> {
    let id = parse_session_id(&id)?;
    let gid = GroupId(gid);
    let collapsed = with_session(&state, &id, |s| s.groups.toggle_collapse(gid))
        .await?
        .map_err(unknown_group)?;
    Ok(Json(CollapseResponse { id: gid, collapsed }))
}

/// Send one panel's input to the chat endpoint and store the answer.
async fn submit_group(
    State(state): State<AppState>,
    Path((id, gid)): Path<(String, u64)>,
    Json(body): Json<SubmitRequest>,
) -> AppResult<Json<SubmitResponse>> {
    let id = parse_session_id(&id)?;
    let gid = GroupId(gid);

    let (input, system_prompt) = with_session(&state, &id, |s| -> Result<_, GroupError> {
        let prompt = s.system_prompt.clone();
        let group = s.groups.get_mut(gid).ok_or(GroupError::Unknown(gid))?;
        if let Some(input) = body.input {
            group.input = input;
        }
        Ok((group.input.clone(), prompt))
    })
    .await?
    .map_err(unknown_group)?;

    info!(session = %id.short(), group = %gid, "Submitting group");
    let output = state.chat.query(&input, system_prompt.as_deref()).await;

    let stored = with_session(&state, &id, |s| s.groups.set_output(gid, output.clone())).await?;
    if !stored {
        debug!(session = %id.short(), group = %gid, "Group removed before answer arrived");
    }
    Ok(Json(SubmitResponse { id: gid, output, stored }))
}

/// Submit every panel at once; the chat service bounds concurrency.
async fn submit_all(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<GroupsResponse>> {
    let id = parse_session_id(&id)?;
    let (pending, system_prompt) = with_session(&state, &id, |s| {
        let pending: Vec<(GroupId, String)> = s.groups.iter().map(|g| (g.id, g.input.clone())).collect();
        (pending, s.system_prompt.clone())
    })
    .await?;
    info!(session = %id.short(), count = pending.len(), "Submitting all groups");

    let chat = &state.chat;
    let prompt = system_prompt.as_deref();
    let answers = join_all(pending.into_iter().map(|(gid, input)| async move {
        (gid, chat.query(&input, prompt).await)
    }))
    .await;

    let groups = with_session(&state, &id, |s| {
        for (gid, output) in answers {
            s.groups.set_output(gid, output);
        }
        s.groups.iter().cloned().collect()
    })
    .await?;
    Ok(Json(GroupsResponse { groups, notice: None }))
}
