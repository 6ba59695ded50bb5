//! HTTP API layer for kiezpoll.
//!
//! - **Endpoints**: registration, email verification, audience memberships,
//!   polls and voting
//! - **Extractors**: authenticated, optional and admin callers
//! - **Middleware**: bearer token authentication
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::AppState;
