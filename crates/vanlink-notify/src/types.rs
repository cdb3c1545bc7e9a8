//! Types for the notify crate.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use vanlink_core::PushToken;

use crate::error::{NotifyError, Result};

/// A notification to deliver to a set of devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPayload {
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub body: String,
    /// Sound hint for the device.
    pub sound: String,
    /// Data delivered to the app alongside the notification.
    pub data: BTreeMap<String, String>,
}

impl PushPayload {
    /// Create a payload with the default sound and no data.
    #[must_use]
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            sound: "default".to_string(),
            data: BTreeMap::new(),
        }
    }

    /// Add a data entry.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// Delivery result for a single device token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenOutcome {
    /// The token the notification was sent to.
    pub token: PushToken,
    /// The delivery error, if any.
    pub error: Option<String>,
}

impl TokenOutcome {
    /// A successful delivery.
    #[must_use]
    pub const fn delivered(token: PushToken) -> Self {
        Self { token, error: None }
    }

    /// A failed delivery.
    #[must_use]
    pub fn failed(token: PushToken, error: impl Into<String>) -> Self {
        Self {
            token,
            error: Some(error.into()),
        }
    }

    /// Whether the notification was delivered.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Tokens the notification was delivered to.
    pub success_count: usize,
    /// Tokens the notification could not be delivered to.
    pub failure_count: usize,
}

impl DispatchReport {
    /// Count the outcomes of a dispatch.
    #[must_use]
    pub fn from_outcomes(outcomes: &[TokenOutcome]) -> Self {
        let success_count = outcomes.iter().filter(|o| o.is_success()).count();
        Self {
            success_count,
            failure_count: outcomes.len() - success_count,
        }
    }

    /// A dispatch where every token failed.
    #[must_use]
    pub const fn all_failed(count: usize) -> Self {
        Self {
            success_count: 0,
            failure_count: count,
        }
    }
}

/// Configuration for the notification dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// URL of the push service send endpoint.
    pub push_endpoint: String,
    /// Server key sent as a bearer token to the push service.
    pub push_server_key: Option<String>,
    /// Seconds between proximity scans.
    pub proximity_interval_seconds: u64,
    /// Start of the proximity window, in minutes from now.
    pub window_start_minutes: i64,
    /// End of the proximity window (exclusive), in minutes from now.
    pub window_end_minutes: i64,
    /// Timeout for push service requests, in seconds.
    pub request_timeout_seconds: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            push_endpoint: "http://localhost:8090/v1/send".to_string(),
            push_server_key: None,
            proximity_interval_seconds: 300,
            window_start_minutes: 10,
            window_end_minutes: 15,
            request_timeout_seconds: 10,
        }
    }
}

impl NotifyConfig {
    /// Load configuration from environment variables.
    ///
    /// Supported environment variables:
    /// - `PUSH_ENDPOINT`: URL of the push service send endpoint
    /// - `PUSH_SERVER_KEY`: Bearer key for the push service
    /// - `PROXIMITY_INTERVAL_SECONDS`: Seconds between proximity scans
    /// - `PROXIMITY_WINDOW_START_MINUTES`: Start of the proximity window
    /// - `PROXIMITY_WINDOW_END_MINUTES`: End of the proximity window
    /// - `PUSH_TIMEOUT_SECONDS`: Push request timeout
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PUSH_ENDPOINT") {
            config.push_endpoint = val;
        }
        if let Ok(val) = std::env::var("PUSH_SERVER_KEY") {
            if !val.is_empty() {
                config.push_server_key = Some(val);
            }
        }
        if let Ok(val) = std::env::var("PROXIMITY_INTERVAL_SECONDS") {
            if let Ok(n) = val.parse() {
                config.proximity_interval_seconds = n;
            }
        }
        if let Ok(val) = std::env::var("PROXIMITY_WINDOW_START_MINUTES") {
            if let Ok(n) = val.parse() {
                config.window_start_minutes = n;
            }
        }
        if let Ok(val) = std::env::var("PROXIMITY_WINDOW_END_MINUTES") {
            if let Ok(n) = val.parse() {
                config.window_end_minutes = n;
            }
        }
        if let Ok(val) = std::env::var("PUSH_TIMEOUT_SECONDS") {
            if let Ok(n) = val.parse() {
                config.request_timeout_seconds = n;
            }
        }

        config
    }

    /// Interval between proximity scans.
    #[must_use]
    pub const fn proximity_interval(&self) -> Duration {
        Duration::from_secs(self.proximity_interval_seconds)
    }

    /// Push request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// The proximity window `[now + start, now + end)`.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Config` if either bound falls outside the
    /// representable time range or the window is empty.
    pub fn proximity_window(&self, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let offset = |minutes: i64| {
            TimeDelta::try_minutes(minutes)
                .and_then(|delta| now.checked_add_signed(delta))
                .ok_or_else(|| {
                    NotifyError::Config(format!(
                        "proximity window offset out of range: {minutes} minutes"
                    ))
                })
        };

        let from = offset(self.window_start_minutes)?;
        let until = offset(self.window_end_minutes)?;
        if until <= from {
            return Err(NotifyError::Config(format!(
                "proximity window is empty: {} to {} minutes",
                self.window_start_minutes, self.window_end_minutes
            )));
        }
        Ok((from, until))
    }
}
