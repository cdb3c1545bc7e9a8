//! Driver/student relationship operations.
//!
//! Every mutation runs inside a single store transaction so the link is
//! always recorded on both sides or on neither. Each transaction reads the
//! pair's contracts through the pair guard key, so concurrent operations on
//! the same pair conflict and are retried against fresh state.

use chrono::Utc;
use vanlink_core::{AccountId, ContractId};
use vanlink_store::{AccountRole, Contract, ContractStatus, Driver, Store, Student, Transaction};

use crate::error::{ControlError, Result};
use crate::lifecycle::{self, LinkState};
use crate::types::UnlinkOutcome;

/// Resolve an email address to a student account ID.
///
/// Lookup order: student accounts by exact email, then by the lower-cased
/// email if it differs, then the legacy student records by exact email.
///
/// # Errors
///
/// Returns an error if a database operation fails.
pub fn resolve_student_by_email<S: Store>(store: &S, email: &str) -> Result<Option<AccountId>> {
    if let Some(account) = store.find_account_by_email(email, AccountRole::Student)? {
        return Ok(Some(account.account_id));
    }

    let lowered = email.to_lowercase();
    if lowered != email {
        if let Some(account) = store.find_account_by_email(&lowered, AccountRole::Student)? {
            return Ok(Some(account.account_id));
        }
    }

    Ok(store.find_student_by_email(email)?.map(|s| s.student_id))
}

/// Create a driver invite for the student registered under `email`.
///
/// # Errors
///
/// Returns an error if:
/// - No student matches the email
/// - The email belongs to the driver
/// - The pair is already linked or has an open invite
pub fn send_invite<S: Store>(store: &S, driver_id: &AccountId, email: &str) -> Result<Contract> {
    let student_id = resolve_student_by_email(store, email)?
        .ok_or_else(|| ControlError::StudentNotFound(email.to_string()))?;

    if student_id == *driver_id {
        return Err(ControlError::SelfInvite);
    }

    store.run_transaction(|txn| {
        let driver = txn.get_driver(driver_id)?;
        let contracts = txn.contracts_for_pair(driver_id, &student_id)?;

        match lifecycle::link_state(driver.as_ref(), &student_id, &contracts) {
            LinkState::Linked => {
                return Err(ControlError::AlreadyLinked {
                    driver_id: driver_id.clone(),
                    student_id: student_id.clone(),
                })
            }
            LinkState::InvitePending => {
                return Err(ControlError::InviteAlreadyPending {
                    driver_id: driver_id.clone(),
                    student_id: student_id.clone(),
                })
            }
            LinkState::Unlinked => {}
        }

        let contract = Contract {
            contract_id: ContractId::generate(),
            driver_id: driver_id.clone(),
            student_id: student_id.clone(),
            status: ContractStatus::DriverInvite,
            created_at: Utc::now(),
            approved_at: None,
        };
        txn.put_contract(&contract)?;
        Ok(contract)
    })
}

/// Accept a driver invite on behalf of the student.
///
/// Approves the contract and records the link on both the driver and the
/// student. If the student was linked to another driver, that link is
/// dissolved in the same transaction.
///
/// # Errors
///
/// Returns an error if:
/// - The contract is not found
/// - The caller or the supplied driver are not the contract's parties
/// - The contract is not an open driver invite
pub fn accept_invite<S: Store>(
    store: &S,
    student_id: &AccountId,
    contract_id: &ContractId,
    driver_id: &AccountId,
) -> Result<Contract> {
    store.run_transaction(|txn| {
        let mut contract = txn
            .get_contract(contract_id)?
            .ok_or(ControlError::ContractNotFound(*contract_id))?;

        if contract.student_id != *student_id || contract.driver_id != *driver_id {
            return Err(ControlError::NotContractParty {
                caller: student_id.clone(),
                contract_id: *contract_id,
            });
        }

        lifecycle::validate_acceptance(&contract)?;

        let mut student = txn
            .get_student(student_id)?
            .unwrap_or_else(|| Student::new(student_id.clone()));

        if let Some(previous) = student.driver_id.as_ref().filter(|d| *d != driver_id) {
            detach(txn, previous, student_id)?;
        }

        let mut driver = txn
            .get_driver(driver_id)?
            .unwrap_or_else(|| Driver::new(driver_id.clone()));

        contract.status = ContractStatus::Approved;
        contract.approved_at = Some(Utc::now());
        driver.student_ids.insert(student_id.clone());
        student.driver_id = Some(driver_id.clone());

        txn.put_contract(&contract)?;
        txn.put_driver(&driver)?;
        txn.put_student(&student)?;
        Ok(contract)
    })
}

/// Unlink the calling student from their driver.
///
/// # Errors
///
/// Returns `ControlError::StudentRecordNotFound` if the student has no record.
pub fn unlink_as_student<S: Store>(store: &S, student_id: &AccountId) -> Result<UnlinkOutcome> {
    store.run_transaction(|txn| {
        let mut student = txn
            .get_student(student_id)?
            .ok_or_else(|| ControlError::StudentRecordNotFound(student_id.clone()))?;

        let Some(driver_id) = student.driver_id.take() else {
            return Ok(UnlinkOutcome::AlreadyUnlinked);
        };

        detach(txn, &driver_id, student_id)?;
        txn.put_student(&student)?;
        Ok(UnlinkOutcome::Unlinked { driver_id })
    })
}

/// Remove a student from the calling driver.
///
/// The student's own link is cleared only if it points at this driver.
/// Unlinking a student who is not linked succeeds without changes.
///
/// # Errors
///
/// Returns an error if a database operation fails.
pub fn unlink_student_as_driver<S: Store>(
    store: &S,
    driver_id: &AccountId,
    student_id: &AccountId,
) -> Result<()> {
    store.run_transaction(|txn| {
        detach(txn, driver_id, student_id)?;

        if let Some(mut student) = txn.get_student(student_id)? {
            if student.driver_id.as_ref() == Some(driver_id) {
                student.driver_id = None;
                txn.put_student(&student)?;
            }
        }
        Ok(())
    })
}

/// Remove the driver side of a link and delete the pair's approved contracts.
fn detach(txn: &dyn Transaction, driver_id: &AccountId, student_id: &AccountId) -> Result<()> {
    if let Some(mut driver) = txn.get_driver(driver_id)? {
        if driver.student_ids.remove(student_id) {
            txn.put_driver(&driver)?;
        }
    }

    for contract in txn.contracts_for_pair(driver_id, student_id)? {
        if contract.status == ContractStatus::Approved {
            txn.delete_contract(&contract)?;
        }
    }
    Ok(())
}
