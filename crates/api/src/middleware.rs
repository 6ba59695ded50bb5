//! API middleware.

#![allow(missing_docs)]

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use kiezpoll_core::{
    AudienceService, EligibilityService, MembershipService, PollService, UserService,
    VerificationService, VisibilityService, VoteLedger,
};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub verification_service: VerificationService,
    pub audience_service: AudienceService,
    pub membership_service: MembershipService,
    pub eligibility_service: EligibilityService,
    pub visibility_service: VisibilityService,
    pub poll_service: PollService,
    pub vote_ledger: VoteLedger,
}

/// Authentication middleware.
///
/// A valid `Authorization: Bearer` token attaches the user to the request.
/// Anything else leaves the request anonymous.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string);

    if let Some(token) = token {
        match state.user_service.authenticate_by_token(&token).await {
            Ok(user) => {
                req.extensions_mut().insert(user);
            }
            Err(e) => tracing::debug!(error = %e, "Ignoring invalid bearer token"),
        }
    }

    next.run(req).await
}
