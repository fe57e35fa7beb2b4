use axum::{middleware, Router};
use std::sync::Arc;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

use crate::auth::middleware::VerifierHandle;
use crate::comments;
use crate::contacts;
use crate::notifications::routes as notification_routes;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Inject the identity verifier into request extensions so the Identity
/// extractor can find it.
async fn inject_verifier(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut()
        .insert(VerifierHandle(state.verifier.clone()));
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Rate limiting on contact-request creation: 5 per minute per IP.
    // Uses PeerIpKeyExtractor which reads from ConnectInfo<SocketAddr>.
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(12) // 1 token every 12 seconds = 5 per minute
            .burst_size(5)
            .finish()
            .expect("Failed to build governor config"),
    );
    let governor_limiter = governor_config.limiter().clone();

    // Background task to clean up rate limiter state
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            governor_limiter.retain_recent();
        }
    });

    let contact_create_routes = Router::new()
        .route("/api/contact", axum::routing::post(contacts::create))
        .layer(GovernorLayer {
            config: governor_config,
        });

    let api_routes = Router::new()
        .route(
            "/api/notifications",
            axum::routing::get(notification_routes::list),
        )
        .route(
            "/api/notifications/{id}/read",
            axum::routing::patch(notification_routes::mark_read),
        )
        .route(
            "/api/notifications/{id}",
            axum::routing::delete(notification_routes::delete),
        )
        .route("/api/comments", axum::routing::post(comments::create))
        .route(
            "/api/comments/{publication_id}",
            axum::routing::get(comments::list_for_publication),
        )
        .route(
            "/api/contact/{id}",
            axum::routing::patch(contacts::respond),
        );

    Router::new()
        .route("/ws", axum::routing::get(ws_handler::ws_upgrade))
        .merge(api_routes)
        .merge(contact_create_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_verifier,
        ))
        .with_state(state)
}
