//! Error types for the control plane.
//!
//! Every error maps onto one of seven caller-visible kinds (see [`ErrorKind`]).
//! Storage failures and anything else unexpected are reported as
//! [`ErrorKind::Unknown`].

use std::fmt;

use thiserror::Error;
use vanlink_core::{AccountId, ContractId};
use vanlink_store::ContractStatus;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Caller-visible error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No verified caller.
    Unauthenticated,
    /// Malformed or out-of-range input.
    InvalidArgument,
    /// A referenced record does not exist.
    NotFound,
    /// The relationship or record already exists.
    AlreadyExists,
    /// The caller is not a party to the record.
    PermissionDenied,
    /// The record is not in a state that allows the operation.
    FailedPrecondition,
    /// Anything unexpected.
    Unknown,
}

impl ErrorKind {
    /// Wire code for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::InvalidArgument => "invalid-argument",
            Self::NotFound => "not-found",
            Self::AlreadyExists => "already-exists",
            Self::PermissionDenied => "permission-denied",
            Self::FailedPrecondition => "failed-precondition",
            Self::Unknown => "unknown",
        }
    }

    /// HTTP status code for this kind.
    #[must_use]
    pub const fn http_status_code(self) -> u16 {
        match self {
            Self::Unauthenticated => 401,
            Self::InvalidArgument => 400,
            Self::NotFound => 404,
            Self::AlreadyExists => 409,
            Self::PermissionDenied => 403,
            Self::FailedPrecondition => 412,
            Self::Unknown => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur in control plane operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Input failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No student account matches the email.
    #[error("no student found with email {0}")]
    StudentNotFound(String),

    /// The student record does not exist.
    #[error("student not found: {0}")]
    StudentRecordNotFound(AccountId),

    /// The driver record does not exist.
    #[error("driver not found: {0}")]
    DriverNotFound(AccountId),

    /// The contract does not exist.
    #[error("invite not found: {0}")]
    ContractNotFound(ContractId),

    /// The student is already linked to the driver.
    #[error("student {student_id} is already linked to driver {driver_id}")]
    AlreadyLinked {
        /// The driver.
        driver_id: AccountId,
        /// The student.
        student_id: AccountId,
    },

    /// An invite or request for the pair is still open.
    #[error("an invite or request between {driver_id} and {student_id} already exists")]
    InviteAlreadyPending {
        /// The driver.
        driver_id: AccountId,
        /// The student.
        student_id: AccountId,
    },

    /// The chat already exists.
    #[error("chat already exists")]
    ChatAlreadyExists,

    /// The caller is not a party to the contract.
    #[error("caller {caller} cannot accept invite {contract_id}")]
    NotContractParty {
        /// The caller.
        caller: AccountId,
        /// The contract.
        contract_id: ContractId,
    },

    /// The contract is not in a state that can be accepted.
    #[error("invite {contract_id} was already processed (status {status:?})")]
    InvalidContractState {
        /// The contract.
        contract_id: ContractId,
        /// The current status.
        status: ContractStatus,
    },

    /// A driver tried to invite their own account.
    #[error("cannot invite yourself")]
    SelfInvite,

    /// A caller tried to rate themself.
    #[error("cannot rate yourself")]
    SelfRating,

    /// Storage layer error.
    #[error("storage error: {0}")]
    Store(#[from] vanlink_store::StoreError),

}

impl ControlError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::StudentNotFound(_)
            | Self::StudentRecordNotFound(_)
            | Self::DriverNotFound(_)
            | Self::ContractNotFound(_) => ErrorKind::NotFound,
            Self::AlreadyLinked { .. } | Self::InviteAlreadyPending { .. } | Self::ChatAlreadyExists => {
                ErrorKind::AlreadyExists
            }
            Self::NotContractParty { .. } => ErrorKind::PermissionDenied,
            Self::InvalidContractState { .. } | Self::SelfInvite | Self::SelfRating => {
                ErrorKind::FailedPrecondition
            }
            Self::Store(_) => ErrorKind::Unknown,
        }
    }

    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        self.kind().http_status_code()
    }

    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Store(vanlink_store::StoreError::Conflict { .. }))
    }
}
