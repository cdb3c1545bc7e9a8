//! Push service transport.
//!
//! A single call delivers one payload to many device tokens and reports a
//! per-token outcome, so one bad token never fails its siblings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use vanlink_core::PushToken;

use crate::error::{NotifyError, Result};
use crate::types::{NotifyConfig, PushPayload, TokenOutcome};

/// Longest response body kept in a [`NotifyError::Rejected`].
const MAX_ERROR_BODY: usize = 512;

/// Trait for delivering push notifications.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Send a payload to every token.
    ///
    /// Returns one outcome per token, in the same order.
    ///
    /// # Errors
    ///
    /// Returns an error if the push service could not be reached or rejected
    /// the whole request.
    async fn send(&self, tokens: &[PushToken], payload: &PushPayload) -> Result<Vec<TokenOutcome>>;
}

#[derive(Serialize)]
struct SendRequest<'a> {
    tokens: Vec<&'a str>,
    notification: NotificationBody<'a>,
    sound: &'a str,
    data: &'a BTreeMap<String, String>,
}

#[derive(Serialize)]
struct NotificationBody<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    results: Vec<SendResult>,
}

#[derive(Deserialize)]
struct SendResult {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP push transport.
///
/// POSTs a JSON multicast request to the configured endpoint, authenticated
/// with the server key as a bearer token.
pub struct HttpPushTransport {
    endpoint: String,
    server_key: Option<String>,
    client: reqwest::Client,
}

impl HttpPushTransport {
    /// Create a transport from the notify configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &NotifyConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| NotifyError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            endpoint: config.push_endpoint.clone(),
            server_key: config.push_server_key.clone(),
            client,
        })
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn send(&self, tokens: &[PushToken], payload: &PushPayload) -> Result<Vec<TokenOutcome>> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let request = SendRequest {
            tokens: tokens.iter().map(PushToken::as_str).collect(),
            notification: NotificationBody {
                title: &payload.title,
                body: &payload.body,
            },
            sound: &payload.sound,
            data: &payload.data,
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.server_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SendResponse = response
            .json()
            .await
            .map_err(|e| NotifyError::InvalidResponse(e.to_string()))?;

        if parsed.results.len() != tokens.len() {
            return Err(NotifyError::InvalidResponse(format!(
                "expected {} results, got {}",
                tokens.len(),
                parsed.results.len()
            )));
        }

        debug!(tokens = tokens.len(), "Push request accepted");

        Ok(tokens
            .iter()
            .zip(parsed.results)
            .map(|(token, result)| {
                if result.success {
                    TokenOutcome::delivered(token.clone())
                } else {
                    TokenOutcome::failed(
                        token.clone(),
                        result.error.unwrap_or_else(|| "unknown error".to_string()),
                    )
                }
            })
            .collect())
    }
}

/// A mock transport for testing without a push service.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashSet;

    /// A recorded call to [`PushTransport::send`].
    #[derive(Debug, Clone)]
    pub struct SentBatch {
        /// Tokens the payload was sent to.
        pub tokens: Vec<PushToken>,
        /// The payload.
        pub payload: PushPayload,
    }

    /// A mock transport that records every batch in memory.
    #[derive(Default)]
    pub struct MockPushTransport {
        sent: Mutex<Vec<SentBatch>>,
        rejected_tokens: Mutex<HashSet<String>>,
        unavailable: Mutex<bool>,
    }

    impl MockPushTransport {
        /// Create a new mock transport.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Make deliveries to this token fail.
        pub fn reject_token(&self, token: &str) {
            self.rejected_tokens.lock().insert(token.to_string());
        }

        /// Make every send fail as if the push service were down.
        pub fn set_unavailable(&self, unavailable: bool) {
            *self.unavailable.lock() = unavailable;
        }

        /// Get all recorded batches.
        #[must_use]
        pub fn sent(&self) -> Vec<SentBatch> {
            self.sent.lock().clone()
        }

        /// Get the number of recorded batches.
        #[must_use]
        pub fn batch_count(&self) -> usize {
            self.sent.lock().len()
        }
    }

    #[async_trait]
    impl PushTransport for MockPushTransport {
        async fn send(
            &self,
            tokens: &[PushToken],
            payload: &PushPayload,
        ) -> Result<Vec<TokenOutcome>> {
            if *self.unavailable.lock() {
                return Err(NotifyError::Transport("push service unavailable".to_string()));
            }

            self.sent.lock().push(SentBatch {
                tokens: tokens.to_vec(),
                payload: payload.clone(),
            });

            let rejected = self.rejected_tokens.lock();
            Ok(tokens
                .iter()
                .map(|t| {
                    if rejected.contains(t.as_str()) {
                        TokenOutcome::failed(t.clone(), "registration-token-not-registered")
                    } else {
                        TokenOutcome::delivered(t.clone())
                    }
                })
                .collect())
        }
    }
}
