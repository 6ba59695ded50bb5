//! Poll endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use chrono::{DateTime, FixedOffset};
use kiezpoll_common::{AppError, AppResult};
use kiezpoll_core::{CreatePollInput, PollResults, PollWithOptions, TargetedPoll, VoteOutcome};
use kiezpoll_db::entities::{poll, poll_option};
use serde::{Deserialize, Serialize};

use crate::{
    extractors::{AdminUser, AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::{ApiResponse, Created},
};

/// Poll list entry.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSummary {
    pub id: String,
    pub question: String,
    pub target_option_ids: Vec<String>,
    pub created_at: DateTime<FixedOffset>,
}

impl From<TargetedPoll> for PollSummary {
    fn from(p: TargetedPoll) -> Self {
        Self {
            id: p.poll.id,
            question: p.poll.question,
            target_option_ids: p.target_option_ids,
            created_at: p.poll.created_at,
        }
    }
}

/// Visible polls for the caller.
async fn list_polls(
    MaybeAuthUser(maybe_user): MaybeAuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<PollSummary>>> {
    let user_id = maybe_user.map(|u| u.id);
    let polls = state
        .visibility_service
        .visible_polls(user_id.as_deref())
        .await?;

    Ok(ApiResponse::ok(polls.into_iter().map(PollSummary::from).collect()))
}

/// Create a poll.
async fn create_poll(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Json(req): Json<CreatePollInput>,
) -> AppResult<Created<PollWithOptions>> {
    let created = state.poll_service.create_poll(req).await?;
    tracing::info!(admin_id = %admin.id, poll_id = %created.poll.id, "Poll created via API");
    Ok(Created(created))
}

/// Poll detail.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollDetail {
    pub poll: poll::Model,
    pub options: Vec<poll_option::Model>,
    pub target_option_ids: Vec<String>,
    /// Option the caller currently votes for.
    pub my_vote: Option<String>,
}

/// A single poll with its options. Hidden polls are only shown to admins.
async fn show_poll(
    MaybeAuthUser(maybe_user): MaybeAuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> AppResult<ApiResponse<PollDetail>> {
    let poll = state.poll_service.get_poll(&poll_id).await?;
    let is_admin = maybe_user.as_ref().is_some_and(|u| u.is_admin);
    if !poll.is_visible && !is_admin {
        return Err(AppError::PollNotFound(poll_id));
    }

    let options = state.poll_service.ensure_options(&poll_id).await?;
    let target_option_ids = state.poll_service.get_targets(&poll_id).await?;
    let my_vote = match &maybe_user {
        Some(user) => state.vote_ledger.user_vote(&user.id, &poll_id).await?,
        None => None,
    };

    Ok(ApiResponse::ok(PollDetail {
        poll,
        options,
        target_option_ids,
        my_vote,
    }))
}

/// Results with percentages.
async fn results(
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> AppResult<ApiResponse<PollResults>> {
    let results = state.vote_ledger.results(&poll_id).await?;
    Ok(ApiResponse::ok(results))
}

/// Vote request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub option_id: String,
}

/// Vote response.
#[derive(Serialize)]
pub struct VoteResponse {
    pub outcome: VoteOutcome,
    pub results: PollResults,
}

/// Cast or change the caller's vote.
async fn vote(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    Json(req): Json<VoteRequest>,
) -> AppResult<ApiResponse<VoteResponse>> {
    let outcome = state
        .vote_ledger
        .cast_vote(&user.id, &poll_id, &req.option_id)
        .await?;
    let results = state.vote_ledger.results(&poll_id).await?;

    Ok(ApiResponse::ok(VoteResponse { outcome, results }))
}

/// Visibility request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityRequest {
    pub is_visible: bool,
}

/// Show or hide a poll.
async fn set_visibility(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    Json(req): Json<VisibilityRequest>,
) -> AppResult<ApiResponse<poll::Model>> {
    let poll = state
        .poll_service
        .set_visibility(&poll_id, req.is_visible)
        .await?;
    Ok(ApiResponse::ok(poll))
}

/// Targets request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetsRequest {
    pub option_ids: Vec<String>,
}

/// Replace a poll's target options.
async fn set_targets(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    Json(req): Json<TargetsRequest>,
) -> AppResult<ApiResponse<Vec<String>>> {
    let targets = state
        .poll_service
        .set_targets(&poll_id, &req.option_ids)
        .await?;
    Ok(ApiResponse::ok(targets))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_polls).post(create_poll))
        .route("/{id}", get(show_poll))
        .route("/{id}/results", get(results))
        .route("/{id}/vote", post(vote))
        .route("/{id}/visibility", post(set_visibility))
        .route("/{id}/targets", put(set_targets))
}
