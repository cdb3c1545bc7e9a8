//! Push notification dispatcher for vanlink.
//!
//! This crate turns store changes and a periodic schedule into push
//! notifications:
//!
//! - Route started: students of a route are told the van is on its way
//! - Chat inquiry: the driver is told a student wants to talk
//! - Proximity: students of routes starting in 10 to 15 minutes are warned
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   ChangeEvent    ┌──────────────────────────┐
//! │      Store       │─────────────────▶│  NotificationDispatcher  │
//! │    (RocksDB)     │◀─────────────────│  (event loop, schedule)  │
//! └──────────────────┘  account/route   └────────────┬─────────────┘
//!                         lookups                    │
//!                                           ┌────────▼─────────┐
//!                                           │  PushTransport   │
//!                                           │  (trait)         │
//!                                           └────────┬─────────┘
//!                                                    │ HTTPS
//!                                           ┌────────▼─────────┐
//!                                           │  Push service    │
//!                                           └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vanlink_notify::{HttpPushTransport, NotificationDispatcher, NotifyConfig};
//! use vanlink_store::{RocksStore, Store};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(RocksStore::open("/tmp/vanlink")?);
//! let config = NotifyConfig::from_env();
//! let transport = Arc::new(HttpPushTransport::new(&config)?);
//!
//! let dispatcher = Arc::new(NotificationDispatcher::new(Arc::clone(&store), transport, config));
//! tokio::spawn(Arc::clone(&dispatcher).run_event_loop(store.subscribe()));
//! tokio::spawn(dispatcher.run_schedule());
//! # Ok(())
//! # }
//! ```
//!
//! # Testing
//!
//! Enable the `test-utils` feature and use [`MockPushTransport`] to record
//! sends in memory.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod dispatcher;
pub mod error;
pub mod messages;
pub mod transport;
pub mod types;

pub use dispatcher::NotificationDispatcher;
pub use error::{NotifyError, Result};
pub use transport::{HttpPushTransport, PushTransport};
pub use types::{DispatchReport, NotifyConfig, PushPayload, TokenOutcome};

#[cfg(any(test, feature = "test-utils"))]
pub use transport::mock::{MockPushTransport, SentBatch};
