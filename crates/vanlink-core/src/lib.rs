//! Core types and utilities for vanlink.
//!
//! This crate provides the foundational types shared by every vanlink crate:
//!
//! - **Identifiers**: Strongly-typed IDs for accounts, contracts, routes, and chats
//! - **Push tokens**: Device tokens with a log-safe fingerprint
//! - **Error types**: Common error definitions shared across crates
//!
//! # Example
//!
//! ```
//! use vanlink_core::{AccountId, ContractId, PushToken};
//!
//! let driver = AccountId::new("driver-uid-1").unwrap();
//! let contract = ContractId::generate();
//! let token = PushToken::new("device-token");
//!
//! assert_eq!(driver.as_str(), "driver-uid-1");
//! assert_eq!(token.fingerprint().len(), 12);
//! # let _ = contract;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod token;

pub use error::{CoreError, Result};
pub use ids::{AccountId, ChatId, ContractId, IdError, RouteId};
pub use token::PushToken;
