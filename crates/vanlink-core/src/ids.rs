//! Core identifier types for vanlink.
//!
//! Account, route, and chat IDs are opaque document keys issued elsewhere
//! (the identity provider or the trip-management flows), so they are stored
//! as validated strings. Contract IDs are generated here as UUID v4.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest document key accepted for string identifiers.
pub const MAX_ID_LEN: usize = 128;

fn validate_key(s: &str) -> Result<(), IdError> {
    if s.trim().is_empty() {
        return Err(IdError::Empty);
    }
    if s.len() > MAX_ID_LEN {
        return Err(IdError::TooLong {
            max: MAX_ID_LEN,
            got: s.len(),
        });
    }
    if s.contains('/') || s.chars().any(char::is_control) {
        return Err(IdError::InvalidCharacter);
    }
    Ok(())
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier, validating it as a document key.
            ///
            /// # Errors
            ///
            /// Returns an error if the key is empty, too long, or contains `/`
            /// or control characters.
            pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
                let value = value.into();
                validate_key(&value)?;
                Ok(Self(value))
            }

            /// Return the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Return the bytes of the identifier.
            #[must_use]
            pub fn as_bytes(&self) -> &[u8] {
                self.0.as_bytes()
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                self.0.as_bytes()
            }
        }
    };
}

string_id!(
    /// An account identifier as issued by the identity provider.
    ///
    /// Drivers and students share this ID space; the driver and student
    /// records are keyed by the owning account's ID.
    AccountId
);

string_id!(
    /// A route document identifier.
    RouteId
);

string_id!(
    /// A chat document identifier.
    ChatId
);

/// A 16-byte contract identifier based on UUID v4.
///
/// Contract IDs are randomly generated when an invite is created.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContractId(uuid::Uuid);

impl ContractId {
    /// Create a new `ContractId` from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Generate a new random `ContractId`.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Return the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// Return the bytes of the UUID.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl FromStr for ContractId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = uuid::Uuid::parse_str(s).map_err(|_| IdError::InvalidUuid)?;
        Ok(Self(uuid))
    }
}

impl fmt::Debug for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContractId({})", self.0)
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ContractId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ContractId> for String {
    fn from(id: ContractId) -> Self {
        id.0.to_string()
    }
}

impl AsRef<[u8]> for ContractId {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The identifier is empty or whitespace.
    #[error("identifier is empty")]
    Empty,

    /// The identifier exceeds the maximum key length.
    #[error("identifier too long: max {max} bytes, got {got}")]
    TooLong {
        /// The maximum number of bytes.
        max: usize,
        /// The actual number of bytes.
        got: usize,
    },

    /// The identifier contains a path separator or control character.
    #[error("identifier contains an invalid character")]
    InvalidCharacter,

    /// The input is not a valid UUID.
    #[error("invalid UUID format")]
    InvalidUuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_accepts_provider_uids() {
        let id = AccountId::new("Xy3kP9qLmN0aBcDeFgHiJkLmNoP2").unwrap();
        assert_eq!(id.as_str(), "Xy3kP9qLmN0aBcDeFgHiJkLmNoP2");
        assert_eq!(id.to_string(), "Xy3kP9qLmN0aBcDeFgHiJkLmNoP2");
    }

    #[test]
    fn account_id_rejects_empty() {
        assert_eq!(AccountId::new(""), Err(IdError::Empty));
        assert_eq!(AccountId::new("   "), Err(IdError::Empty));
    }

    #[test]
    fn account_id_rejects_path_separator() {
        assert_eq!(
            AccountId::new("drivers/abc"),
            Err(IdError::InvalidCharacter)
        );
    }

    #[test]
    fn account_id_rejects_overlong() {
        let long = "a".repeat(MAX_ID_LEN + 1);
        assert!(matches!(
            AccountId::new(long),
            Err(IdError::TooLong { .. })
        ));
    }

    #[test]
    fn route_id_serde_json() {
        let id = RouteId::new("route-7").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"route-7\"");
        let parsed: RouteId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn chat_id_serde_rejects_invalid() {
        let parsed: Result<ChatId, _> = serde_json::from_str("\"\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn contract_id_roundtrip() {
        let id = ContractId::generate();
        let parsed = ContractId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn contract_id_invalid_uuid() {
        let result = ContractId::from_str("not-a-uuid");
        assert!(matches!(result, Err(IdError::InvalidUuid)));
    }

    #[test]
    fn contract_id_serde_json() {
        let id = ContractId::generate();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: ContractId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn account_ids_order_lexicographically() {
        let a = AccountId::new("a").unwrap();
        let b = AccountId::new("b").unwrap();
        assert!(a < b);
    }
}
