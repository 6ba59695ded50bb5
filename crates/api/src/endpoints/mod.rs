//! API endpoints.

mod audience;
mod auth;
mod polls;
mod verification;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/verification", verification::router())
        .nest("/audience", audience::router())
        .nest("/polls", polls::router())
}
