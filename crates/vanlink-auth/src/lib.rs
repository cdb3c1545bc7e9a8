//! ID token authentication for vanlink.
//!
//! Every caller-facing operation requires a verified caller. This crate
//! resolves a bearer ID token to the caller's account ID:
//!
//! - JWKS (JSON Web Key Set) fetching and caching
//! - RS256 (identity-provider default) and Ed25519 (`EdDSA`) signatures
//! - Issuer, audience, and expiry validation
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │   Gateway        │────▶│   JwtValidator   │
//! │   (HTTP)         │     │   (trait)        │
//! └──────────────────┘     └────────┬─────────┘
//!                                   │
//!                          ┌────────▼─────────┐
//!                          │  JwksValidator   │
//!                          └────────┬─────────┘
//!                                   │
//!                          ┌────────▼─────────┐
//!                          │  JwksProvider    │
//!                          │  (key cache)     │
//!                          └────────┬─────────┘
//!                                   │ HTTPS
//!                          ┌────────▼─────────┐
//!                          │ Identity provider│
//!                          │ JWKS endpoint    │
//!                          └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use vanlink_auth::{AuthConfig, JwksValidator, JwtValidator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let validator = JwksValidator::new(AuthConfig::for_project("vanlink-prod"));
//!
//! let token = "eyJhbGciOiJSUzI1NiIsImtpZCI6Ii4uLiJ9...";
//! let claims = validator.validate(token).await?;
//! println!("Caller: {}", claims.account_id);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod jwks;
pub mod jwt;

pub use error::{AuthError, Result};
pub use jwt::{JwksValidator, JwtValidator, ValidatedClaims};

#[cfg(any(test, feature = "test-utils"))]
pub use jwt::MockJwtValidator;

/// Default JWKS endpoint of the hosted identity provider.
pub const DEFAULT_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Issuer prefix; the project ID is appended.
pub const ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// Configuration for ID token validation.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Expected JWT issuer (`iss` claim).
    pub issuer: String,
    /// Expected JWT audience (`aud` claim).
    pub audience: String,
    /// JWKS endpoint URL.
    pub jwks_url: String,
    /// How often to refresh the JWKS cache, in seconds.
    pub jwks_refresh_seconds: u64,
}

impl AuthConfig {
    /// Build the configuration for a hosted identity-provider project.
    #[must_use]
    pub fn for_project(project_id: &str) -> Self {
        Self {
            issuer: format!("{ISSUER_PREFIX}{project_id}"),
            audience: project_id.to_string(),
            jwks_url: DEFAULT_JWKS_URL.to_string(),
            jwks_refresh_seconds: 3600,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// - `AUTH_PROJECT_ID` (default `vanlink-dev`)
    /// - `AUTH_JWKS_URL` overrides the JWKS endpoint
    /// - `AUTH_ISSUER` overrides the issuer
    /// - `AUTH_JWKS_REFRESH_SECONDS` (default 3600)
    #[must_use]
    pub fn from_env() -> Self {
        let project_id =
            std::env::var("AUTH_PROJECT_ID").unwrap_or_else(|_| "vanlink-dev".to_string());
        let mut config = Self::for_project(&project_id);

        if let Ok(url) = std::env::var("AUTH_JWKS_URL") {
            config.jwks_url = url;
        }
        if let Ok(issuer) = std::env::var("AUTH_ISSUER") {
            config.issuer = issuer;
        }
        if let Some(secs) = std::env::var("AUTH_JWKS_REFRESH_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.jwks_refresh_seconds = secs;
        }
        config
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::for_project("vanlink-dev")
    }
}
