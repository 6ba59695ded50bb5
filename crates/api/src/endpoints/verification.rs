//! Email verification endpoints.

use axum::{Json, Router, extract::State, routing::post};
use kiezpoll_common::AppResult;
use kiezpoll_core::CodeRequest;
use serde::{Deserialize, Serialize};

use crate::{middleware::AppState, response::ApiResponse};

/// Code request body.
#[derive(Debug, Deserialize)]
pub struct RequestCodeRequest {
    pub email: String,
}

/// Send a verification code to an address that has no account yet.
async fn request_code(
    State(state): State<AppState>,
    Json(req): Json<RequestCodeRequest>,
) -> AppResult<ApiResponse<CodeRequest>> {
    let outcome = state.verification_service.request_code(&req.email).await?;
    Ok(ApiResponse::ok(outcome))
}

/// Code check body.
#[derive(Debug, Deserialize)]
pub struct CheckCodeRequest {
    pub email: String,
    pub code: String,
}

/// Code check response.
#[derive(Serialize)]
pub struct CheckCodeResponse {
    pub verified: bool,
}

/// Consume a verification code.
async fn check_code(
    State(state): State<AppState>,
    Json(req): Json<CheckCodeRequest>,
) -> AppResult<ApiResponse<CheckCodeResponse>> {
    let verified = state
        .verification_service
        .check_code(&req.email, &req.code)
        .await?;
    Ok(ApiResponse::ok(CheckCodeResponse { verified }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/request", post(request_code))
        .route("/check", post(check_code))
}
