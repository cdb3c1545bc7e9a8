//! Public health check.
//!
//! Reports the service version and whether the store answers reads.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use vanlink_auth::JwtValidator;
use vanlink_control::ControlPlane;

use crate::state::GatewayState;

/// Service name reported by the health check.
pub const SERVICE_NAME: &str = "vanlink-gateway";

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` or `unhealthy`.
    pub status: &'static str,
    /// Service name.
    pub service: &'static str,
    /// Service version.
    pub version: &'static str,
    /// `ok` or `unavailable`.
    pub store: &'static str,
}

/// Health check handler.
///
/// GET /health
///
/// Returns 200 when the store is readable and 503 otherwise. No
/// authentication is required.
pub async fn health<C, V>(State(state): State<Arc<GatewayState<C, V>>>) -> impl IntoResponse
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    let (status_code, status, store) = match state.control.check_store().await {
        Ok(()) => (StatusCode::OK, "healthy", "ok"),
        Err(e) => {
            tracing::error!(error = %e, "Store health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", "unavailable")
        }
    };

    let response = HealthResponse {
        status,
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        store,
    };

    (status_code, Json(response))
}
