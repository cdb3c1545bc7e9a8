//! HTTP gateway for the vanlink driver/student platform.
//!
//! This crate provides the public-facing API of the relationship workflow.
//! It handles:
//!
//! - ID token authentication of every caller-facing operation
//! - REST endpoints for invites, unlinking, and ratings
//! - Internal write endpoints for accounts, routes, and chats
//! - Request validation and error mapping
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Mobile clients                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ HTTPS
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     vanlink-gateway                         │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │   Auth      │ │   Router    │ │  Internal writes    │    │
//! │  │  Extractor  │ │  + Handlers │ │  (network-only)     │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┼──────────────┐
//!               ▼              ▼              ▼
//!        ┌──────────┐   ┌──────────┐   ┌──────────────┐
//!        │ Control  │   │  Auth    │   │ Notification │
//!        │ Plane    │   │ (JWT)    │   │ Dispatcher   │
//!        └──────────┘   └──────────┘   └──────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vanlink_gateway::{GatewayConfig, GatewayState, create_router};
//! use vanlink_control::ControlPlaneService;
//! use vanlink_auth::{JwksValidator, AuthConfig};
//! use vanlink_store::RocksStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(RocksStore::open("/tmp/vanlink")?);
//! let control = Arc::new(ControlPlaneService::with_defaults(store));
//! let jwt_validator = Arc::new(JwksValidator::new(AuthConfig::default()));
//!
//! let state = GatewayState::new(control, jwt_validator, GatewayConfig::default());
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::GatewayConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::GatewayState;

pub use auth::AuthUser;
pub use extract::ValidJson;
