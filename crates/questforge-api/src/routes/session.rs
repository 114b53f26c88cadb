//! Session lifecycle and turn routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Json, Router, routing::get, routing::post};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use questforge_core::campaign::{CampaignDefinition, OpeningScene};
use questforge_core::session::SessionSnapshot;
use questforge_engine::{StateDiff, TurnResult};

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST / (create session).
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// Caller-chosen session id; generated when omitted.
    pub session_id: Option<Uuid>,
    /// The immutable campaign definition.
    pub definition: CampaignDefinition,
    /// The opening scene committed with it.
    pub opening: OpeningScene,
}

/// Response body for POST / (create session).
#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    /// The new session's id.
    pub session_id: Uuid,
    /// The session at version 1.
    pub snapshot: SessionSnapshot,
}

/// Request body for join/leave.
#[derive(Debug, Deserialize)]
pub struct MembershipRequest {
    /// The member joining or leaving.
    pub member_id: Uuid,
}

/// Request body for POST /{id}/action.
#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    /// The acting member.
    pub member_id: Uuid,
    /// The raw action text.
    pub action: String,
}

/// Query parameters for GET /{id}/diff.
#[derive(Debug, Deserialize)]
pub struct DiffQuery {
    /// The version the caller last observed.
    pub from_version: u64,
}

/// POST /
#[instrument(skip(state, request))]
async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    let session_id = request.session_id.unwrap_or_else(Uuid::new_v4);
    info!(%session_id, "handling create_session");

    let snapshot = state
        .engine
        .create_session(session_id, request.definition, request.opening)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id,
            snapshot,
        }),
    ))
}

/// POST /{id}/join
#[instrument(skip(state, request), fields(member_id = %request.member_id))]
async fn join(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<MembershipRequest>,
) -> StatusCode {
    state.engine.join(session_id, request.member_id).await;
    StatusCode::NO_CONTENT
}

/// POST /{id}/leave
#[instrument(skip(state, request), fields(member_id = %request.member_id))]
async fn leave(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<MembershipRequest>,
) -> StatusCode {
    state.engine.leave(session_id, request.member_id).await;
    StatusCode::NO_CONTENT
}

/// GET /{id}/snapshot
#[instrument(skip(state))]
async fn snapshot(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let snapshot = state.engine.get_snapshot(session_id).await?;
    Ok(Json(snapshot))
}

/// GET /{id}/diff?from_version=N
#[instrument(skip(state))]
async fn diff(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<DiffQuery>,
) -> Result<Json<StateDiff>, ApiError> {
    let diff = state
        .engine
        .request_diff(session_id, query.from_version)
        .await?;
    Ok(Json(diff))
}

/// POST /{id}/action
#[instrument(skip(state, request), fields(member_id = %request.member_id))]
async fn action(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<ActionRequest>,
) -> Result<Json<TurnResult>, ApiError> {
    let result = state
        .engine
        .submit_action(session_id, request.member_id, request.action)
        .await?;
    Ok(Json(result))
}

/// Returns the router for the session engine.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_session))
        .route("/{id}/join", post(join))
        .route("/{id}/leave", post(leave))
        .route("/{id}/snapshot", get(snapshot))
        .route("/{id}/diff", get(diff))
        .route("/{id}/action", post(action))
}
