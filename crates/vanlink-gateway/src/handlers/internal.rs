//! Internal endpoints for trusted writers.
//!
//! Account, route, and chat records are owned by flows outside the
//! relationship workflow (sign-up, trip management, chat). Those flows write
//! through these endpoints so that the dispatcher observes every change.
//!
//! These endpoints carry no caller authentication. They must only be
//! reachable from inside the deployment network; a network policy in front
//! of the gateway enforces that.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vanlink_auth::JwtValidator;
use vanlink_control::ControlPlane;
use vanlink_core::{AccountId, ChatId, CoreError, PushToken, RouteId};
use vanlink_store::{Account, AccountRole, Chat, ChatMessage, Route, RouteStatus};

use crate::error::ApiError;
use crate::extract::ValidJson;
use crate::state::GatewayState;

/// Body of `PUT /internal/accounts/:account_id`.
#[derive(Debug, Deserialize)]
pub struct AccountBody {
    /// Account role.
    pub role: AccountRole,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Push token.
    #[serde(default)]
    pub push_token: Option<PushToken>,
}

/// Body of `PUT /internal/routes/:route_id`.
#[derive(Debug, Deserialize)]
pub struct RouteBody {
    /// Route name.
    #[serde(default)]
    pub name: Option<String>,
    /// Route status.
    pub status: RouteStatus,
    /// Riders of the route.
    #[serde(default)]
    pub student_ids: Vec<AccountId>,
    /// Scheduled start.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    /// Driver of the route.
    #[serde(default)]
    pub driver_id: Option<AccountId>,
}

/// Body of `POST /internal/chats/:chat_id`.
#[derive(Debug, Deserialize)]
pub struct ChatBody {
    /// Chat status.
    pub status: String,
    /// Participant account IDs.
    #[serde(default)]
    pub participants: Vec<AccountId>,
    /// The most recent message.
    #[serde(default)]
    pub last_message: Option<ChatMessage>,
}

/// Response of the route write.
#[derive(Debug, Serialize)]
pub struct RouteWritten {
    /// The route as stored.
    pub route: Route,
    /// Whether the route existed before this write.
    pub replaced: bool,
}

/// Insert or replace an account.
///
/// # Errors
///
/// Returns `invalid-argument` for a malformed account ID.
pub async fn put_account<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    Path(account_id): Path<String>,
    ValidJson(body): ValidJson<AccountBody>,
) -> Result<Json<Account>, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    let account_id = AccountId::new(account_id).map_err(CoreError::from)?;

    let account = Account {
        account_id,
        role: body.role,
        email: body.email,
        display_name: body.display_name,
        push_token: body.push_token,
        updated_at: Utc::now(),
    };

    let account = state.control.upsert_account(account).await?;
    Ok(Json(account))
}

/// Insert or replace a route.
///
/// # Errors
///
/// Returns `invalid-argument` for a malformed route ID.
pub async fn put_route<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    Path(route_id): Path<String>,
    ValidJson(body): ValidJson<RouteBody>,
) -> Result<Json<RouteWritten>, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    let route_id = RouteId::new(route_id).map_err(CoreError::from)?;

    let route = Route {
        route_id,
        name: body.name,
        status: body.status,
        student_ids: body.student_ids,
        start_time: body.start_time,
        driver_id: body.driver_id,
    };

    let previous = state.control.record_route(route.clone()).await?;
    Ok(Json(RouteWritten {
        route,
        replaced: previous.is_some(),
    }))
}

/// Create a chat.
///
/// # Errors
///
/// Returns `already-exists` if the chat ID is taken.
pub async fn create_chat<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    Path(chat_id): Path<String>,
    ValidJson(body): ValidJson<ChatBody>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    let chat_id = ChatId::new(chat_id).map_err(CoreError::from)?;

    let chat = Chat {
        chat_id,
        status: body.status,
        participants: body.participants,
        last_message: body.last_message,
        created_at: Utc::now(),
    };

    let chat = state.control.record_chat(chat).await?;
    Ok((StatusCode::CREATED, Json(chat)))
}

/// Internal health check.
pub async fn internal_health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
