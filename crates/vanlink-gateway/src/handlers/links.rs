//! Unlink endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use vanlink_auth::JwtValidator;
use vanlink_control::{ControlPlane, OperationOutcome, UnlinkStudentRequest};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::ValidJson;
use crate::state::GatewayState;

/// The calling student leaves their driver.
///
/// POST /v1/links/unlink-as-student
///
/// # Errors
///
/// Returns `not-found` if the caller has no student record.
pub async fn unlink_as_student<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    user: AuthUser,
) -> Result<Json<OperationOutcome>, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    let outcome = state.control.unlink_as_student(&user.account_id).await?;
    Ok(Json(outcome.into()))
}

/// The calling driver removes one of their students.
///
/// POST /v1/links/unlink-student
///
/// # Errors
///
/// Returns `invalid-argument` for a malformed body.
pub async fn unlink_student<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    user: AuthUser,
    ValidJson(body): ValidJson<UnlinkStudentRequest>,
) -> Result<Json<OperationOutcome>, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    state
        .control
        .unlink_student_as_driver(&user.account_id, body)
        .await?;
    Ok(Json(OperationOutcome::ok("Student unlinked.")))
}
