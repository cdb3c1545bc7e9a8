//! Key encoding utilities for `RocksDB`.
//!
//! String identifiers never contain control characters, so `0x00` is used as
//! the separator between composite key parts. All index keys are laid out to
//! support prefix or range scans.

use chrono::{DateTime, Utc};
use vanlink_core::{AccountId, ContractId, RouteId};

const SEP: u8 = 0x00;

fn joined(parts: &[&[u8]]) -> Vec<u8> {
    let len = parts.iter().map(|p| p.len() + 1).sum();
    let mut key = Vec::with_capacity(len);
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            key.push(SEP);
        }
        key.extend_from_slice(part);
    }
    key
}

/// Encode a primary key for a string-identified record.
#[must_use]
pub fn id_key(id: &impl AsRef<[u8]>) -> Vec<u8> {
    id.as_ref().to_vec()
}

/// Encode a contract key (just the UUID bytes).
#[must_use]
pub fn contract_key(contract_id: &ContractId) -> Vec<u8> {
    contract_id.as_bytes().to_vec()
}

/// Encode an email index key: `email || 0x00 || account_id`.
#[must_use]
pub fn email_key(email: &str, account_id: &AccountId) -> Vec<u8> {
    joined(&[email.as_bytes(), account_id.as_bytes()])
}

/// Encode an email prefix for scanning every record with that exact email.
#[must_use]
pub fn email_prefix(email: &str) -> Vec<u8> {
    let mut key = email.as_bytes().to_vec();
    key.push(SEP);
    key
}

/// Extract the account ID that follows an email prefix.
///
/// Returns `None` if the key is not valid UTF-8 or not a valid ID.
#[must_use]
pub fn extract_account_id(key: &[u8], prefix_len: usize) -> Option<AccountId> {
    let tail = key.get(prefix_len..)?;
    let s = std::str::from_utf8(tail).ok()?;
    AccountId::new(s).ok()
}

/// Encode the pair key: `driver_id || 0x00 || student_id`.
///
/// Used both as the rating key and as the contract guard key for the pair.
#[must_use]
pub fn pair_key(driver_id: &AccountId, student_id: &AccountId) -> Vec<u8> {
    joined(&[driver_id.as_bytes(), student_id.as_bytes()])
}

/// Encode a pair prefix for scanning all contracts between two accounts.
#[must_use]
pub fn pair_prefix(driver_id: &AccountId, student_id: &AccountId) -> Vec<u8> {
    let mut key = pair_key(driver_id, student_id);
    key.push(SEP);
    key
}

/// Encode a pair-contract index key: `driver_id || 0x00 || student_id || 0x00 || contract_id`.
#[must_use]
pub fn pair_contract_key(
    driver_id: &AccountId,
    student_id: &AccountId,
    contract_id: &ContractId,
) -> Vec<u8> {
    let mut key = pair_prefix(driver_id, student_id);
    key.extend_from_slice(contract_id.as_bytes());
    key
}

/// Extract the contract ID from the tail of a pair-contract key.
#[must_use]
pub fn extract_contract_id(key: &[u8]) -> Option<ContractId> {
    let start = key.len().checked_sub(16)?;
    let bytes: [u8; 16] = key[start..].try_into().ok()?;
    Some(ContractId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

/// Encode a driver prefix for scanning every rating of a driver.
#[must_use]
pub fn rating_prefix(driver_id: &AccountId) -> Vec<u8> {
    let mut key = driver_id.as_bytes().to_vec();
    key.push(SEP);
    key
}

/// Order-preserving encoding of a timestamp as milliseconds since the epoch.
#[must_use]
pub fn encode_millis(at: DateTime<Utc>) -> [u8; 8] {
    let raw = u64::from_be_bytes(at.timestamp_millis().to_be_bytes());
    (raw ^ (1 << 63)).to_be_bytes()
}

/// Encode the status prefix of the route start index.
#[must_use]
pub fn route_status_prefix(status: &str) -> Vec<u8> {
    let mut key = status.as_bytes().to_vec();
    key.push(SEP);
    key
}

/// Encode a scan bound of the route start index: `status || 0x00 || start_millis`.
#[must_use]
pub fn route_start_bound(status: &str, at: DateTime<Utc>) -> Vec<u8> {
    let mut key = route_status_prefix(status);
    key.extend_from_slice(&encode_millis(at));
    key
}

/// Encode a route start index key: `status || 0x00 || start_millis || route_id`.
#[must_use]
pub fn route_start_key(status: &str, at: DateTime<Utc>, route_id: &RouteId) -> Vec<u8> {
    let mut key = route_start_bound(status, at);
    key.extend_from_slice(route_id.as_bytes());
    key
}

/// Extract the route ID from a route start index key for `status`.
#[must_use]
pub fn extract_route_id(key: &[u8], status: &str) -> Option<RouteId> {
    let tail = key.get(status.len() + 1 + 8..)?;
    let s = std::str::from_utf8(tail).ok()?;
    RouteId::new(s).ok()
}
