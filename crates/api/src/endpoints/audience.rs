//! Audience catalogue and membership endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use kiezpoll_common::AppResult;
use kiezpoll_core::{CategoryWithOptions, MembershipView};
use kiezpoll_db::entities::{audience_category, audience_option, user_membership};
use serde::{Deserialize, Serialize};

use crate::{
    extractors::{AdminUser, AuthUser},
    middleware::AppState,
    response::{ApiResponse, Created},
};

/// All categories with their options.
async fn list_categories(
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<CategoryWithOptions>>> {
    let categories = state.audience_service.list_categories().await?;
    Ok(ApiResponse::ok(categories))
}

/// Name body for catalogue creation.
#[derive(Debug, Deserialize)]
pub struct NameRequest {
    pub name: String,
}

/// Add a category.
async fn create_category(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Json(req): Json<NameRequest>,
) -> AppResult<Created<audience_category::Model>> {
    let category = state.audience_service.create_category(&req.name).await?;
    Ok(Created(category))
}

/// Add an option to a category.
async fn create_option(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(category_id): Path<String>,
    Json(req): Json<NameRequest>,
) -> AppResult<Created<audience_option::Model>> {
    let option = state
        .audience_service
        .create_option(&category_id, &req.name)
        .await?;
    Ok(Created(option))
}

/// The caller's memberships.
async fn list_memberships(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<MembershipView>>> {
    let memberships = state.membership_service.get_memberships(&user.id).await?;
    Ok(ApiResponse::ok(memberships))
}

/// Membership selection body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetMembershipRequest {
    pub option_id: String,
}

/// Pick an option, replacing any earlier pick in the same category.
async fn set_membership(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<SetMembershipRequest>,
) -> AppResult<ApiResponse<user_membership::Model>> {
    let membership = state
        .membership_service
        .set_membership(&user.id, &req.option_id)
        .await?;
    Ok(ApiResponse::ok(membership))
}

/// Postal code body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostalCodeRequest {
    pub postal_code: String,
}

/// Store a postal code and derive a membership from it.
async fn set_postal_code(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<PostalCodeRequest>,
) -> AppResult<ApiResponse<Option<audience_option::Model>>> {
    let assigned = state
        .user_service
        .update_postal_code(&user.id, &req.postal_code)
        .await?;
    Ok(ApiResponse::ok(assigned))
}

/// Completeness response.
#[derive(Serialize)]
pub struct CompletenessResponse {
    pub complete: bool,
    pub missing: Vec<String>,
}

/// Which required categories the caller still lacks.
async fn completeness(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<CompletenessResponse>> {
    let missing = state
        .eligibility_service
        .missing_categories(&user.id)
        .await?;
    Ok(ApiResponse::ok(CompletenessResponse {
        complete: missing.is_empty(),
        missing,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/{id}/options", post(create_option))
        .route("/memberships", get(list_memberships).post(set_membership))
        .route("/postal", post(set_postal_code))
        .route("/completeness", get(completeness))
}
