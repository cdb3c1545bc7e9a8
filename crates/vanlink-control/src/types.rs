//! Request and response types for control plane operations.

use serde::{Deserialize, Serialize};
use vanlink_core::{AccountId, ContractId};

use crate::error::{ControlError, Result};

/// Longest accepted email address.
pub const MAX_EMAIL_LEN: usize = 254;

/// Configuration for the control plane service.
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// Longest accepted rating comment, in characters.
    pub max_comment_chars: usize,
    /// Lowest accepted rating score.
    pub min_score: f64,
    /// Highest accepted rating score.
    pub max_score: f64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            max_comment_chars: 1000,
            min_score: 1.0,
            max_score: 5.0,
        }
    }
}

/// Request to invite a student by email.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequest {
    /// The student's email address.
    pub email: String,
}

impl InviteRequest {
    /// Create an invite request.
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }

    /// Return the trimmed email, or an error if it is not a plausible address.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidArgument` for empty or malformed emails.
    pub fn validated_email(&self) -> Result<&str> {
        let email = self.email.trim();
        if email.is_empty() {
            return Err(ControlError::InvalidArgument(
                "email is required".to_string(),
            ));
        }
        if email.len() > MAX_EMAIL_LEN {
            return Err(ControlError::InvalidArgument(format!(
                "email exceeds {MAX_EMAIL_LEN} characters"
            )));
        }
        if email.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ControlError::InvalidArgument(
                "email must not contain whitespace".to_string(),
            ));
        }
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
                Ok(email)
            }
            _ => Err(ControlError::InvalidArgument(
                "email is not a valid address".to_string(),
            )),
        }
    }
}

/// Request to accept a driver's invite.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInviteRequest {
    /// The invite to accept.
    pub contract_id: ContractId,
    /// The driver who sent the invite.
    pub driver_id: AccountId,
}

/// Request from a driver to unlink one of their students.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlinkStudentRequest {
    /// The student to unlink.
    pub student_id: AccountId,
}

/// Request to rate a driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateDriverRequest {
    /// The driver being rated.
    pub driver_id: AccountId,
    /// Score from 1 to 5.
    pub score: f64,
    /// Optional free-text comment.
    #[serde(default)]
    pub comment: Option<String>,
}

/// Aggregate rating of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    /// Mean score.
    pub average: f64,
    /// Number of ratings.
    pub count: u32,
}

/// Generic success response of a relationship operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    /// Always true; failures are reported as errors.
    pub success: bool,
    /// Human-readable message.
    pub message: String,
}

impl OperationOutcome {
    /// Create a successful outcome with a message.
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Result of a student unlinking themself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlinkOutcome {
    /// The student had no driver; nothing changed.
    AlreadyUnlinked,
    /// The student was unlinked from this driver.
    Unlinked {
        /// The former driver.
        driver_id: AccountId,
    },
}

impl From<UnlinkOutcome> for OperationOutcome {
    fn from(outcome: UnlinkOutcome) -> Self {
        match outcome {
            UnlinkOutcome::AlreadyUnlinked => Self::ok("You are already unlinked."),
            UnlinkOutcome::Unlinked { .. } => Self::ok("You have been unlinked from your driver."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_trimmed() {
        let request = InviteRequest::new("  aluno@x.com \n");
        assert_eq!(request.validated_email().unwrap(), "aluno@x.com");
    }

    #[test]
    fn malformed_emails_are_rejected() {
        for email in ["", "   ", "no-at-sign", "@x.com", "aluno@", "a b@x.com", "a@b@c"] {
            let err = InviteRequest::new(email).validated_email().unwrap_err();
            assert!(
                matches!(err, ControlError::InvalidArgument(_)),
                "expected rejection for {email:?}"
            );
        }
    }

    #[test]
    fn overlong_email_is_rejected() {
        let email = format!("{}@x.com", "a".repeat(MAX_EMAIL_LEN));
        assert!(InviteRequest::new(email).validated_email().is_err());
    }

    #[test]
    fn requests_use_camel_case() {
        let request: AcceptInviteRequest = serde_json::from_value(serde_json::json!({
            "contractId": "6f1c2a9e-4b7d-4c1e-9a55-0c8e1f2d3b4a",
            "driverId": "driver-1"
        }))
        .unwrap();
        assert_eq!(request.driver_id.as_str(), "driver-1");

        let request: RateDriverRequest =
            serde_json::from_value(serde_json::json!({"driverId": "d", "score": 4})).unwrap();
        assert!((request.score - 4.0).abs() < f64::EPSILON);
        assert!(request.comment.is_none());
    }

    #[test]
    fn non_numeric_score_fails_to_parse() {
        let result: std::result::Result<RateDriverRequest, _> =
            serde_json::from_value(serde_json::json!({"driverId": "d", "score": "five"}));
        assert!(result.is_err());
    }

    #[test]
    fn unlink_outcome_messages() {
        let outcome = OperationOutcome::from(UnlinkOutcome::AlreadyUnlinked);
        assert!(outcome.success);
        assert_eq!(outcome.message, "You are already unlinked.");
    }
}
