//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use vanlink_auth::JwtValidator;
use vanlink_control::ControlPlane;

use crate::handlers::{health, internal, invites, links, ratings};
use crate::state::GatewayState;

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Relationship (authenticated)
/// - `POST /v1/invites` - Driver invites a student by email
/// - `POST /v1/invites/accept` - Student accepts an invite
/// - `POST /v1/links/unlink-as-student` - Student leaves their driver
/// - `POST /v1/links/unlink-student` - Driver removes a student
///
/// ## Ratings (authenticated)
/// - `POST /v1/ratings` - Student rates a driver
///
/// ## Internal (network-restricted)
/// - `PUT /internal/accounts/:account_id` - Upsert an account
/// - `PUT /internal/routes/:route_id` - Upsert a route
/// - `POST /internal/chats/:chat_id` - Create a chat
/// - `GET /internal/health` - Internal health check
pub fn create_router<C, V>(state: GatewayState<C, V>) -> Router
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout = state.config.request_timeout();

    let state = Arc::new(state);

    Router::new()
        // Health (public)
        .route("/health", get(health::health::<C, V>))
        // Relationship
        .route("/v1/invites", post(invites::send_invite::<C, V>))
        .route("/v1/invites/accept", post(invites::accept_invite::<C, V>))
        .route(
            "/v1/links/unlink-as-student",
            post(links::unlink_as_student::<C, V>),
        )
        .route(
            "/v1/links/unlink-student",
            post(links::unlink_student::<C, V>),
        )
        // Ratings
        .route("/v1/ratings", post(ratings::rate_driver::<C, V>))
        // Internal
        .route(
            "/internal/accounts/:account_id",
            put(internal::put_account::<C, V>),
        )
        .route("/internal/routes/:route_id", put(internal::put_route::<C, V>))
        .route(
            "/internal/chats/:chat_id",
            post(internal::create_chat::<C, V>),
        )
        .route("/internal/health", get(internal::internal_health))
        // Middleware, outermost first
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(TimeoutLayer::new(request_timeout))
                .layer(RequestBodyLimitLayer::new(max_body_bytes)),
        )
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
