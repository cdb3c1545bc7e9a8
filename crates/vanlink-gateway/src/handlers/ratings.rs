//! Rating endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use vanlink_auth::JwtValidator;
use vanlink_control::{ControlPlane, RateDriverRequest, RatingSummary};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::ValidJson;
use crate::state::GatewayState;

/// Rate a driver and return the driver's new aggregate.
///
/// POST /v1/ratings
///
/// # Errors
///
/// Returns `invalid-argument` for scores outside 1 to 5, `failed-precondition`
/// when rating oneself, and `not-found` for an unknown driver.
pub async fn rate_driver<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    user: AuthUser,
    ValidJson(body): ValidJson<RateDriverRequest>,
) -> Result<Json<RatingSummary>, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    let summary = state.control.rate_driver(&user.account_id, body).await?;
    Ok(Json(summary))
}
