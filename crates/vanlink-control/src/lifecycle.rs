//! Driver/student link state machine.
//!
//! A pair of accounts moves through:
//!
//! ```text
//!            invite              accept
//!   Unlinked ──────▶ InvitePending ──────▶ Linked
//!      ▲                                     │
//!      └─────────────── unlink ──────────────┘
//! ```
//!
//! Contract status transitions follow the same machine: a `driver_invite`
//! or `pending` contract may become `approved`, and an `approved` contract is
//! deleted on unlink.

use vanlink_core::AccountId;
use vanlink_store::{Contract, ContractStatus, Driver};

use crate::error::{ControlError, Result};

/// Link state of a driver/student pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No relationship.
    Unlinked,
    /// An invite or request is awaiting a decision.
    InvitePending,
    /// The student rides with the driver.
    Linked,
}

/// Derive the link state of a pair from the driver record and the pair's contracts.
#[must_use]
pub fn link_state(driver: Option<&Driver>, student_id: &AccountId, contracts: &[Contract]) -> LinkState {
    if driver.is_some_and(|d| d.student_ids.contains(student_id)) {
        LinkState::Linked
    } else if contracts.iter().any(|c| c.status.is_active()) {
        LinkState::InvitePending
    } else {
        LinkState::Unlinked
    }
}

/// Check if a contract status transition is valid.
#[must_use]
pub const fn is_valid_transition(from: ContractStatus, to: ContractStatus) -> bool {
    matches!(
        (from, to),
        (
            ContractStatus::Pending | ContractStatus::DriverInvite,
            ContractStatus::Approved
        )
    )
}

/// Validate a contract status transition.
///
/// # Errors
///
/// Returns `ControlError::InvalidContractState` if the transition is not allowed.
pub fn validate_transition(contract: &Contract, to: ContractStatus) -> Result<()> {
    if is_valid_transition(contract.status, to) {
        Ok(())
    } else {
        Err(ControlError::InvalidContractState {
            contract_id: contract.contract_id,
            status: contract.status,
        })
    }
}

/// Validate that a student may accept this contract.
///
/// Only driver invites are accepted by the student; requests the student
/// made themself wait for the driver.
///
/// # Errors
///
/// Returns `ControlError::InvalidContractState` if the contract is not a
/// driver invite.
pub fn validate_acceptance(contract: &Contract) -> Result<()> {
    if contract.status != ContractStatus::DriverInvite {
        return Err(ControlError::InvalidContractState {
            contract_id: contract.contract_id,
            status: contract.status,
        });
    }
    validate_transition(contract, ContractStatus::Approved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vanlink_core::ContractId;

    fn id(s: &str) -> AccountId {
        AccountId::new(s).unwrap()
    }

    fn contract(status: ContractStatus) -> Contract {
        Contract {
            contract_id: ContractId::generate(),
            driver_id: id("driver"),
            student_id: id("student"),
            status,
            created_at: Utc::now(),
            approved_at: None,
        }
    }

    #[test]
    fn valid_transitions() {
        assert!(is_valid_transition(
            ContractStatus::DriverInvite,
            ContractStatus::Approved
        ));
        assert!(is_valid_transition(
            ContractStatus::Pending,
            ContractStatus::Approved
        ));
    }

    #[test]
    fn invalid_transitions() {
        assert!(!is_valid_transition(
            ContractStatus::Approved,
            ContractStatus::Approved
        ));
        assert!(!is_valid_transition(
            ContractStatus::Approved,
            ContractStatus::Pending
        ));
        assert!(!is_valid_transition(
            ContractStatus::DriverInvite,
            ContractStatus::Pending
        ));
    }

    #[test]
    fn acceptance_requires_driver_invite() {
        assert!(validate_acceptance(&contract(ContractStatus::DriverInvite)).is_ok());

        let err = validate_acceptance(&contract(ContractStatus::Approved)).unwrap_err();
        assert!(matches!(
            err,
            ControlError::InvalidContractState {
                status: ContractStatus::Approved,
                ..
            }
        ));
        assert!(validate_acceptance(&contract(ContractStatus::Pending)).is_err());
    }

    #[test]
    fn link_state_from_records() {
        let student = id("student");
        let mut driver = Driver::new(id("driver"));

        assert_eq!(link_state(None, &student, &[]), LinkState::Unlinked);
        assert_eq!(
            link_state(Some(&driver), &student, &[contract(ContractStatus::Approved)]),
            LinkState::Unlinked
        );
        assert_eq!(
            link_state(Some(&driver), &student, &[contract(ContractStatus::Pending)]),
            LinkState::InvitePending
        );

        driver.student_ids.insert(student.clone());
        assert_eq!(link_state(Some(&driver), &student, &[]), LinkState::Linked);
    }
}
