//! kiezpoll server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, middleware};
use kiezpoll_api::{AppState, router as api_router};
use kiezpoll_common::Config;
use kiezpoll_core::{
    AudienceService, EligibilityService, EmailService, GeoLookupService, MembershipService,
    PollService, PostalImportService, UserService, VerificationService, VisibilityService,
    VoteLedger,
};
use kiezpoll_db::repositories::{
    AudienceRepository, EmailVerificationRepository, MembershipRepository, PollOptionRepository,
    PollRepository, PostalMappingRepository, UserRepository, VoteRepository,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// Load the district table if configured. Failures are logged; lookups then
/// fall through to the national dataset.
async fn seed_districts(config: &Config, import: &PostalImportService) {
    let result = match (&config.geo.district_csv_path, config.geo.seed_sample_districts) {
        (Some(path), _) => import.import_csv(path, false).await,
        (None, true) => import.import_sample().await,
        (None, false) => return,
    };

    match result {
        Ok(summary) => info!(
            rows = summary.rows,
            created = summary.created,
            updated = summary.updated,
            "District table loaded"
        ),
        Err(e) => tracing::warn!(error = %e, "District table import failed"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kiezpoll=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting kiezpoll server...");

    // Load configuration
    let config = Config::load()?;

    let db = Arc::new(kiezpoll_db::init(&config).await?);
    info!("Connected to database");

    info!("Running database migrations...");
    kiezpoll_db::migrate(&db).await?;
    info!("Migrations completed");

    // Initialize repositories
    let user_repo = UserRepository::new(Arc::clone(&db));
    let audience_repo = AudienceRepository::new(Arc::clone(&db));
    let membership_repo = MembershipRepository::new(Arc::clone(&db));
    let postal_repo = PostalMappingRepository::new(Arc::clone(&db));
    let poll_repo = PollRepository::new(Arc::clone(&db));
    let option_repo = PollOptionRepository::new(Arc::clone(&db));
    let vote_repo = VoteRepository::new(Arc::clone(&db));
    let code_repo = EmailVerificationRepository::new(Arc::clone(&db));

    let import_service = PostalImportService::new(postal_repo.clone(), audience_repo.clone());
    seed_districts(&config, &import_service).await;

    // Initialize services
    let geo = GeoLookupService::with_default_chain(
        postal_repo,
        audience_repo.clone(),
        config.geo.national_dataset_path.clone(),
    );
    let membership_service =
        MembershipService::new(membership_repo.clone(), audience_repo.clone(), geo);
    let eligibility_service = EligibilityService::new(
        poll_repo.clone(),
        membership_repo.clone(),
        audience_repo.clone(),
    );
    let poll_service = PollService::new(poll_repo.clone(), option_repo, audience_repo.clone());
    let email_service = EmailService::from_settings(config.email.as_ref())?;

    let state = AppState {
        user_service: UserService::new(user_repo.clone(), membership_service.clone()),
        verification_service: VerificationService::new(
            code_repo,
            user_repo,
            email_service,
            config.verification.code_ttl_minutes,
        ),
        audience_service: AudienceService::new(audience_repo),
        membership_service,
        visibility_service: VisibilityService::new(
            poll_repo,
            membership_repo,
            eligibility_service.clone(),
        ),
        vote_ledger: VoteLedger::new(vote_repo, poll_service.clone(), eligibility_service.clone()),
        eligibility_service,
        poll_service,
    };

    // Build router
    let app = Router::new()
        .nest("/api", api_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            kiezpoll_api::middleware::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
