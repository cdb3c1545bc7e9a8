//! Domain types stored in the database.
//!
//! Drivers, students, contracts, and ratings are owned by the relationship
//! workflow. Routes and chats are written by external trip-management flows
//! and only observed here.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vanlink_core::{AccountId, ChatId, ContractId, PushToken, RouteId};

/// Role recorded on a generic account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    /// A student who rides with a driver.
    Student,
    /// A van driver.
    Driver,
    /// Any other role (administrators, guardians).
    #[serde(other)]
    Other,
}

/// A generic account record.
///
/// Used for email lookup, push-token lookup, and display names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Identity-provider account ID.
    pub account_id: AccountId,
    /// Account role.
    pub role: AccountRole,
    /// Email address as registered.
    #[serde(default)]
    pub email: Option<String>,
    /// Human-readable name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Device token for push notifications.
    #[serde(default)]
    pub push_token: Option<PushToken>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Return the push token if one is registered and non-blank.
    #[must_use]
    pub fn usable_push_token(&self) -> Option<&PushToken> {
        self.push_token.as_ref().filter(|t| !t.is_blank())
    }
}

/// A driver record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    /// Driver ID (same as the driver's account ID).
    pub driver_id: AccountId,
    /// Students currently linked to this driver.
    #[serde(default)]
    pub student_ids: BTreeSet<AccountId>,
    /// Mean of all rating scores, once any rating exists.
    #[serde(default)]
    pub rating_average: Option<f64>,
    /// Number of ratings included in the average.
    #[serde(default)]
    pub rating_count: u32,
    /// When the rating aggregate was last recomputed.
    #[serde(default)]
    pub rating_updated_at: Option<DateTime<Utc>>,
}

impl Driver {
    /// Create an empty driver record.
    #[must_use]
    pub fn new(driver_id: AccountId) -> Self {
        Self {
            driver_id,
            student_ids: BTreeSet::new(),
            rating_average: None,
            rating_count: 0,
            rating_updated_at: None,
        }
    }
}

/// A student record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// Student ID.
    pub student_id: AccountId,
    /// The driver this student is linked to, if any.
    #[serde(default)]
    pub driver_id: Option<AccountId>,
    /// Email address (legacy lookup path).
    #[serde(default)]
    pub email: Option<String>,
}

impl Student {
    /// Create an unlinked student record.
    #[must_use]
    pub fn new(student_id: AccountId) -> Self {
        Self {
            student_id,
            driver_id: None,
            email: None,
        }
    }
}

/// A driver/student relationship record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    /// Unique identifier for the contract.
    pub contract_id: ContractId,
    /// The driver side of the relationship.
    pub driver_id: AccountId,
    /// The student side of the relationship.
    pub student_id: AccountId,
    /// Current status.
    pub status: ContractStatus,
    /// When the contract was requested.
    pub created_at: DateTime<Utc>,
    /// When the contract was approved.
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
}

/// Status of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    /// Requested by the student, awaiting the driver.
    Pending,
    /// Invited by the driver, awaiting the student.
    DriverInvite,
    /// Accepted; the pair is linked.
    Approved,
}

impl ContractStatus {
    /// Whether the contract is still awaiting a decision.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::DriverInvite)
    }
}

/// A rating given by one student to one driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    /// The rated driver.
    pub driver_id: AccountId,
    /// The rating student.
    pub student_id: AccountId,
    /// Score in `1.0..=5.0`.
    pub score: f64,
    /// Free-text comment, possibly empty.
    #[serde(default)]
    pub comment: String,
    /// When the rating was last written.
    pub updated_at: DateTime<Utc>,
}

/// Status of a route as written by the trip-management flows.
///
/// Unknown values are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RouteStatus {
    /// Scheduled, not yet started.
    Planned,
    /// The driver has started the route.
    InProgress,
    /// The route has finished.
    Finished,
    /// The route was cancelled.
    Cancelled,
    /// Any other status string.
    Other(String),
}

impl RouteStatus {
    /// Return the stored string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Planned => "planejada",
            Self::InProgress => "emAndamento",
            Self::Finished => "finalizada",
            Self::Cancelled => "cancelada",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for RouteStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "planejada" => Self::Planned,
            "emAndamento" => Self::InProgress,
            "finalizada" => Self::Finished,
            "cancelada" => Self::Cancelled,
            _ => Self::Other(value),
        }
    }
}

impl From<RouteStatus> for String {
    fn from(status: RouteStatus) -> Self {
        match status {
            RouteStatus::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for RouteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A route record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Route ID.
    pub route_id: RouteId,
    /// Human-readable name.
    #[serde(default)]
    pub name: Option<String>,
    /// Current status.
    pub status: RouteStatus,
    /// Students riding this route, in pickup order.
    #[serde(default)]
    pub student_ids: Vec<AccountId>,
    /// Scheduled start time.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    /// The driver running the route.
    #[serde(default)]
    pub driver_id: Option<AccountId>,
}

/// The last message of a chat, as far as the dispatcher cares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Account that sent the message.
    #[serde(default)]
    pub sender_id: Option<AccountId>,
    /// Message text.
    #[serde(default)]
    pub text: String,
}

/// A chat record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    /// Chat ID.
    pub chat_id: ChatId,
    /// Chat status (`inquiry` for a new request).
    pub status: String,
    /// Participant account IDs.
    #[serde(default)]
    pub participants: Vec<AccountId>,
    /// The most recent message.
    #[serde(default)]
    pub last_message: Option<ChatMessage>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Status value of a chat that is a new conversation request.
pub const CHAT_STATUS_INQUIRY: &str = "inquiry";

impl Chat {
    /// Whether this chat is a new conversation request.
    #[must_use]
    pub fn is_inquiry(&self) -> bool {
        self.status == CHAT_STATUS_INQUIRY
    }
}
