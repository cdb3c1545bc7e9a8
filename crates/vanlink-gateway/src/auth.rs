//! Authentication extractor.
//!
//! This module provides the `AuthUser` extractor that validates ID tokens
//! and extracts the caller's identity from requests.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use vanlink_auth::{AuthError, JwtValidator, ValidatedClaims};
use vanlink_control::ControlPlane;
use vanlink_core::AccountId;

use crate::error::ApiError;
use crate::state::GatewayState;

/// An authenticated caller extracted from an ID token.
///
/// This extractor validates the `Authorization: Bearer <token>` header
/// and provides access to the caller's account ID.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The caller's account ID.
    pub account_id: AccountId,
}

impl AuthUser {
    /// Create an `AuthUser` from validated claims.
    #[must_use]
    pub fn from_claims(claims: &ValidatedClaims) -> Self {
        Self {
            account_id: claims.account_id.clone(),
        }
    }
}

/// Extract the bearer token from request headers.
fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)
}

impl<C, V> FromRequestParts<Arc<GatewayState<C, V>>> for AuthUser
where
    C: ControlPlane + 'static,
    V: JwtValidator + 'static,
{
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<GatewayState<C, V>>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Self, Self::Rejection>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let token = bearer_token(parts)?;
            let claims = state.jwt_validator.validate(token).await?;
            Ok(AuthUser::from_claims(&claims))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use chrono::{Duration, Utc};

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/v1/invites");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn auth_user_from_claims() {
        let claims = ValidatedClaims {
            account_id: AccountId::new("driver-uid").unwrap(),
            email: Some("driver@example.com".to_string()),
            email_verified: true,
            expires_at: Utc::now() + Duration::hours(1),
        };

        let user = AuthUser::from_claims(&claims);
        assert_eq!(user.account_id.as_str(), "driver-uid");
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token(&parts_with(Some("Bearer abc"))).unwrap(), "abc");
        assert!(matches!(
            bearer_token(&parts_with(None)),
            Err(AuthError::MissingToken)
        ));
        assert!(bearer_token(&parts_with(Some("Basic abc"))).is_err());
        assert!(bearer_token(&parts_with(Some("Bearer   "))).is_err());
    }
}
