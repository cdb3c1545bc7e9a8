//! HTTP request handlers.
//!
//! This module contains all the endpoint handlers for the gateway API.

pub mod health;
pub mod internal;
pub mod invites;
pub mod links;
pub mod ratings;
