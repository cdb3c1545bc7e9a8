//! Device push tokens.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of hex characters kept from the token digest.
const FINGERPRINT_LEN: usize = 12;

/// An opaque device token used to address push notifications.
///
/// The raw value is never printed by `Debug`; logs should use
/// [`PushToken::fingerprint`].
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PushToken(String);

impl PushToken {
    /// Wrap a raw device token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Return the raw token for handing to the transport.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the token carries no characters after trimming.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Short blake3 fingerprint suitable for logs.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = blake3::hash(self.0.as_bytes());
        let mut hex = hex::encode(digest.as_bytes());
        hex.truncate(FINGERPRINT_LEN);
        hex
    }
}

impl fmt::Debug for PushToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PushToken({})", self.fingerprint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_short() {
        let token = PushToken::new("abc");
        assert_eq!(token.fingerprint(), PushToken::new("abc").fingerprint());
        assert_eq!(token.fingerprint().len(), FINGERPRINT_LEN);
        assert_ne!(token.fingerprint(), PushToken::new("abd").fingerprint());
    }

    #[test]
    fn debug_hides_raw_value() {
        let token = PushToken::new("very-secret-device-token");
        let printed = format!("{token:?}");
        assert!(!printed.contains("very-secret"));
    }

    #[test]
    fn blank_tokens() {
        assert!(PushToken::new("  ").is_blank());
        assert!(!PushToken::new("t").is_blank());
    }
}
