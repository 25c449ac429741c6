//! Route handlers for `/api/jira`.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::error::ServerError;
use crate::api::{ApiError, Credentials, FieldMap, JiraClient, Project, Sprint, Story, StoryDetail};
use crate::session::{SessionId, SessionRegistry};

/// Header carrying the session id returned by `POST /connect`.
pub const SESSION_HEADER: &str = "x-session-id";

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
    /// Check the field map against the tracker on connect.
    pub verify_fields_on_connect: bool,
}

/// Body of `POST /connect`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    pub base_url: Option<String>,
    pub email: Option<String>,
    pub token: Option<String>,
    /// Overrides the configured acceptance criteria field for this session.
    pub acceptance_criteria_field: Option<String>,
}

/// Body of a successful `POST /connect` or `DELETE /connect`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

#[derive(Debug, Deserialize)]
pub struct StoriesQuery {
    pub sprint: Option<String>,
}

#[instrument(skip_all)]
pub async fn connect(
    State(state): State<AppState>,
    payload: Result<Json<ConnectRequest>, JsonRejection>,
) -> Result<Json<ConnectResponse>, ServerError> {
    let Json(request) = payload?;
    let credentials = Credentials::new(
        request.base_url.unwrap_or_default(),
        request.email.unwrap_or_default(),
        request.token.unwrap_or_default(),
    );
    let fields = request
        .acceptance_criteria_field
        .filter(|f| !f.trim().is_empty())
        .map(FieldMap::with_acceptance_criteria);

    let client = state.sessions.build_client(&credentials, fields)?;
    if state.verify_fields_on_connect {
        client.verify_field_map().await?;
    }
    let session_id = state.sessions.insert(client).await;

    Ok(Json(ConnectResponse {
        success: true,
        message: "Connected to Jira successfully".to_string(),
        session_id: Some(session_id),
    }))
}

#[instrument(skip_all)]
pub async fn disconnect(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ConnectResponse>, ServerError> {
    let id = session_id(&headers)?;
    if !state.sessions.disconnect(&id).await {
        return Err(ApiError::NotConnected.into());
    }

    Ok(Json(ConnectResponse {
        success: true,
        message: "Disconnected from Jira".to_string(),
        session_id: None,
    }))
}

pub async fn projects(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Project>>, ServerError> {
    let client = session_client(&state, &headers).await?;
    Ok(Json(client.list_projects().await?))
}

pub async fn sprints(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(project_key): Path<String>,
) -> Result<Json<Vec<Sprint>>, ServerError> {
    let client = session_client(&state, &headers).await?;
    Ok(Json(client.list_sprints(&project_key).await?))
}

pub async fn stories(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<StoriesQuery>,
) -> Result<Json<Vec<Story>>, ServerError> {
    let client = session_client(&state, &headers).await?;
    let sprint = query
        .sprint
        .filter(|s| !s.trim().is_empty())
        .ok_or(ServerError::MissingParameter("Sprint ID is required"))?;
    Ok(Json(client.list_stories(&sprint).await?))
}

pub async fn story(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<StoryDetail>, ServerError> {
    let client = session_client(&state, &headers).await?;
    Ok(Json(client.get_story_details(&id).await?))
}

/// Read the session id header. Absent or malformed means not connected.
fn session_id(headers: &HeaderMap) -> Result<SessionId, ServerError> {
    let raw = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::NotConnected)?;
    Ok(raw.parse::<SessionId>()?)
}

async fn session_client(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Arc<JiraClient>, ServerError> {
    let id = session_id(headers)?;
    debug!(session = %id, "Resolving session");
    Ok(state.sessions.client(&id).await?)
}
