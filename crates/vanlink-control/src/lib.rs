//! Control plane for the vanlink driver/student relationship.
//!
//! This crate provides the business logic behind every caller-facing
//! operation: inviting a student, accepting an invite, unlinking from either
//! side, and rating a driver.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Gateway (HTTP)                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ControlPlaneService                      │
//! │  ┌──────────────┐ ┌─────────────┐ ┌─────────────────────┐   │
//! │  │ Relationship │ │   Rating    │ │    Lifecycle        │   │
//! │  │  Workflow    │ │  Aggregator │ │    State Machine    │   │
//! │  └──────────────┘ └─────────────┘ └─────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                       ┌──────────────┐
//!                       │    Store     │
//!                       │  (RocksDB)   │
//!                       └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use vanlink_control::{ControlPlane, ControlPlaneService, InviteRequest};
//! use vanlink_core::AccountId;
//! use vanlink_store::RocksStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(RocksStore::open("/tmp/vanlink")?);
//! let control = ControlPlaneService::with_defaults(store);
//!
//! let driver_id = AccountId::new("driver-uid")?;
//! let contract = control
//!     .send_invite(&driver_id, InviteRequest::new("aluno@example.com"))
//!     .await?;
//!
//! println!("Invite sent: {}", contract.contract_id);
//! # Ok(())
//! # }
//! ```
//!
//! # Link State Machine
//!
//! - `Unlinked` → `InvitePending` (driver invites)
//! - `InvitePending` → `Linked` (student accepts)
//! - `Linked` → `Unlinked` (either side unlinks)
//!
//! See the [`lifecycle`] module for transition validation helpers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod lifecycle;
pub mod rating;
pub mod relationship;
pub mod service;
pub mod types;

pub use error::{ControlError, ErrorKind, Result};
pub use lifecycle::LinkState;
pub use service::{ControlPlane, ControlPlaneService};
pub use types::{
    AcceptInviteRequest, ControlConfig, InviteRequest, OperationOutcome, RateDriverRequest,
    RatingSummary, UnlinkOutcome, UnlinkStudentRequest,
};
