use axum::{
    extract::Request,
    middleware,
    routing::{get, post, put},
    Router,
};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;

use crate::handlers::{
    family_handlers::{
        create_family, get_family_display, get_member_locations, get_members, leave_family,
    },
    invitation_handlers::{accept_invitation, create_invitation, get_invitations},
    location_handlers::{get_latest_location, report_location},
    sync_handlers::get_sync_data,
};
use hearth_shared::store::sqlite::SqliteTrackerStore;
use hearth_shared::store::{StoreError, TrackerStore};

// Import shared auth middleware
use hearth_shared::auth::auth_middleware;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Creates a router backed by the default SQLite store.
pub async fn create_router() -> Result<Router, StoreError> {
    info!("Creating router with SQLite store");

    let store = Arc::new(SqliteTrackerStore::new().await?);

    // Optional path prefix for deployments that mount the API under a root.
    let prefix = std::env::var("API_ROOT").unwrap_or_default();
    info!("Using API route prefix: '{}'", prefix);

    Ok(create_router_with_store(store, &prefix))
}

/// Creates a router with a given store implementation
pub fn create_router_with_store<S>(store: Arc<S>, prefix: &str) -> Router
where
    S: TrackerStore + 'static,
{
    info!("Setting up API routes with prefix: '{}'", prefix);

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Logging middleware to trace all requests
    async fn logging_middleware(
        req: Request,
        next: axum::middleware::Next,
    ) -> impl axum::response::IntoResponse {
        info!(
            "Router received request: method={}, uri={}",
            req.method(),
            req.uri()
        );
        next.run(req).await
    }

    // Authenticated mobile API
    let mobile_routes = Router::new()
        .route("/mobile/sync", get(get_sync_data))
        .route("/mobile/families", post(create_family))
        .route(
            "/mobile/families/:family_id/members",
            get(get_members).delete(leave_family),
        )
        .route(
            "/mobile/families/:family_id/members/locations",
            get(get_member_locations),
        )
        .route(
            "/mobile/invitations",
            get(get_invitations).post(create_invitation),
        )
        .route("/mobile/invitations/:invitation_id", put(accept_invitation))
        .route("/mobile/locations", post(report_location))
        .route("/mobile/locations/latest", get(get_latest_location))
        .layer(middleware::from_fn(auth_middleware))
        .with_state(store.clone());

    // Public kiosk view (no auth by design)
    let display_routes = Router::new()
        .route("/display/families/:code", get(get_family_display))
        .with_state(store);

    // Merge all API routes; bound request execution time so a slow query
    // cannot hold a connection open indefinitely.
    let api_routes = mobile_routes
        .merge(display_routes)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT));

    let router = if prefix.is_empty() {
        // For tests or when no prefix is needed, don't nest the routes
        api_routes
            .layer(cors)
            .layer(middleware::from_fn(logging_middleware))
    } else {
        // For production, nest the routes under the prefix
        Router::new()
            .nest(prefix, api_routes)
            .layer(cors)
            .layer(middleware::from_fn(logging_middleware))
    };

    // Add a fallback handler for 404s
    router.fallback(|req: Request| async move {
        warn!("No route matched for: {} {}", req.method(), req.uri());
        (
            axum::http::StatusCode::NOT_FOUND,
            "The requested resource was not found".to_string(),
        )
    })
}
