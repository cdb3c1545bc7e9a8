//! Invite endpoints.
//!
//! A driver invites a student by email; the student accepts the invite.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use vanlink_auth::JwtValidator;
use vanlink_control::{AcceptInviteRequest, ControlPlane, InviteRequest, OperationOutcome};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::ValidJson;
use crate::state::GatewayState;

/// Send an invite to the student registered under an email.
///
/// POST /v1/invites
///
/// # Errors
///
/// Returns `not-found` if no student matches the email and `already-exists`
/// if the pair is linked or an invite is open.
pub async fn send_invite<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    user: AuthUser,
    ValidJson(body): ValidJson<InviteRequest>,
) -> Result<Json<OperationOutcome>, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.control.send_invite(&user.account_id, body).await?;
    Ok(Json(OperationOutcome::ok("Invite sent to the student.")))
}

/// Accept a driver's invite.
///
/// POST /v1/invites/accept
///
/// # Errors
///
/// Returns `not-found`, `permission-denied`, or `failed-precondition`.
pub async fn accept_invite<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    user: AuthUser,
    ValidJson(body): ValidJson<AcceptInviteRequest>,
) -> Result<Json<OperationOutcome>, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state.control.accept_invite(&user.account_id, body).await?;
    Ok(Json(OperationOutcome::ok("Invite accepted.")))
}
