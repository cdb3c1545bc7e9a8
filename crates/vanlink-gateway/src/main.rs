//! vanlink gateway
//!
//! Entry point of the service. Serves the HTTP API and runs the
//! notification dispatcher alongside it against the same store.
//!
//! # Dev Mode
//!
//! Build with `--features dev-mode` to use a mock ID token validator that
//! doesn't require network access to the identity provider.
//! Use tokens in format: `test-token:<account-id>`

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "dev-mode")]
use vanlink_auth::MockJwtValidator;
#[cfg(not(feature = "dev-mode"))]
use vanlink_auth::{AuthConfig, JwksValidator};
use vanlink_control::ControlPlaneService;
use vanlink_gateway::{create_router, GatewayConfig, GatewayState};
use vanlink_notify::{HttpPushTransport, NotificationDispatcher, NotifyConfig};
use vanlink_store::{RocksStore, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,vanlink=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting vanlink gateway");

    let gateway_config = GatewayConfig::from_env();
    let notify_config = NotifyConfig::from_env();

    tracing::info!(
        listen_addr = %gateway_config.listen_addr,
        data_dir = %gateway_config.data_dir,
        push_endpoint = %notify_config.push_endpoint,
        "Gateway configuration loaded"
    );

    tracing::info!(path = %gateway_config.data_dir, "Opening RocksDB store");
    let store = Arc::new(RocksStore::open(&gateway_config.data_dir)?);

    // Subscribe before anything can write.
    let events = store.subscribe();

    let transport = Arc::new(HttpPushTransport::new(&notify_config)?);
    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::clone(&store),
        transport,
        notify_config,
    ));
    tokio::spawn(Arc::clone(&dispatcher).run_event_loop(events));
    tokio::spawn(dispatcher.run_schedule());
    tracing::info!("Notification dispatcher started");

    let control = Arc::new(ControlPlaneService::with_defaults(store));

    #[cfg(feature = "dev-mode")]
    let jwt_validator = {
        tracing::warn!("DEV MODE ENABLED - using mock ID token validator");
        tracing::warn!("Use tokens in format: test-token:<account-id>");
        Arc::new(MockJwtValidator)
    };

    #[cfg(not(feature = "dev-mode"))]
    let jwt_validator = Arc::new(JwksValidator::new(AuthConfig::from_env()));
    tracing::info!("ID token validator initialized");

    let listen_addr = gateway_config.listen_addr.clone();
    let state = GatewayState::new(control, jwt_validator, gateway_config);
    let app = create_router(state);

    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
