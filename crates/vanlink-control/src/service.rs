//! Control plane service implementation.
//!
//! This module provides the `ControlPlane` trait and `ControlPlaneService` implementation
//! that coordinates the relationship workflow and rating aggregation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use vanlink_core::AccountId;
use vanlink_store::{
    Account, AccountRole, Chat, Contract, Driver, Route, Store, StoreError, Student,
};

use crate::error::{ControlError, ErrorKind, Result};
use crate::rating;
use crate::relationship;
use crate::types::{
    AcceptInviteRequest, ControlConfig, InviteRequest, RateDriverRequest, RatingSummary,
    UnlinkOutcome, UnlinkStudentRequest,
};

/// Trait defining the control plane operations.
///
/// Every caller-facing operation takes the verified caller's account ID as
/// its first argument.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    // =========================================================================
    // Relationship Operations
    // =========================================================================

    /// Invite the student registered under an email (caller is the driver).
    ///
    /// # Errors
    ///
    /// Returns `ControlError::StudentNotFound` if no student matches the email.
    /// Returns `ControlError::AlreadyLinked` or `ControlError::InviteAlreadyPending`
    /// if the pair is linked or already has an open invite.
    async fn send_invite(&self, driver_id: &AccountId, request: InviteRequest) -> Result<Contract>;

    /// Accept a driver's invite (caller is the student).
    ///
    /// # Errors
    ///
    /// Returns `ControlError::ContractNotFound`, `ControlError::NotContractParty`,
    /// or `ControlError::InvalidContractState`.
    async fn accept_invite(
        &self,
        student_id: &AccountId,
        request: AcceptInviteRequest,
    ) -> Result<Contract>;

    /// Unlink the calling student from their driver.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::StudentRecordNotFound` if the student has no record.
    async fn unlink_as_student(&self, student_id: &AccountId) -> Result<UnlinkOutcome>;

    /// Unlink a student from the calling driver.
    async fn unlink_student_as_driver(
        &self,
        driver_id: &AccountId,
        request: UnlinkStudentRequest,
    ) -> Result<()>;

    // =========================================================================
    // Rating Operations
    // =========================================================================

    /// Rate a driver (caller is the student) and return the new aggregate.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidArgument` for bad scores or comments,
    /// `ControlError::SelfRating`, or `ControlError::DriverNotFound`.
    async fn rate_driver(
        &self,
        student_id: &AccountId,
        request: RateDriverRequest,
    ) -> Result<RatingSummary>;

    // =========================================================================
    // Operational
    // =========================================================================

    /// Insert or replace an account record.
    ///
    /// Student accounts also get a student record, created if absent and
    /// with its email kept in sync. Driver accounts get a driver record if
    /// they have none, so they can be rated before their first link.
    async fn upsert_account(&self, account: Account) -> Result<Account>;

    /// Insert or replace a route, returning the previous version.
    async fn record_route(&self, route: Route) -> Result<Option<Route>>;

    /// Create a chat.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::ChatAlreadyExists` if the chat ID is taken.
    async fn record_chat(&self, chat: Chat) -> Result<Chat>;

    /// Check that the store can serve reads.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Store` if it cannot.
    async fn check_store(&self) -> Result<()>;
}

/// The main control plane service implementation.
pub struct ControlPlaneService<S: Store> {
    store: Arc<S>,
    config: ControlConfig,
}

impl<S: Store> ControlPlaneService<S> {
    /// Create a new control plane service.
    #[must_use]
    pub fn new(store: Arc<S>, config: ControlConfig) -> Self {
        Self { store, config }
    }

    /// Create with default configuration.
    #[must_use]
    pub fn with_defaults(store: Arc<S>) -> Self {
        Self::new(store, ControlConfig::default())
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &ControlConfig {
        &self.config
    }
}

/// Log a failed operation at the level its kind deserves.
fn log_failure<T>(operation: &'static str, caller: &AccountId, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        if e.kind() == ErrorKind::Unknown {
            tracing::error!(operation, caller = %caller, error = %e, "Operation failed");
        } else {
            tracing::debug!(operation, caller = %caller, kind = %e.kind(), error = %e, "Operation rejected");
        }
    }
    result
}

#[async_trait]
impl<S: Store + 'static> ControlPlane for ControlPlaneService<S> {
    async fn send_invite(&self, driver_id: &AccountId, request: InviteRequest) -> Result<Contract> {
        let result = request
            .validated_email()
            .and_then(|email| relationship::send_invite(self.store.as_ref(), driver_id, email));
        let contract = log_failure("send_invite", driver_id, result)?;

        tracing::info!(
            contract_id = %contract.contract_id,
            driver_id = %contract.driver_id,
            student_id = %contract.student_id,
            "Sent invite"
        );

        Ok(contract)
    }

    async fn accept_invite(
        &self,
        student_id: &AccountId,
        request: AcceptInviteRequest,
    ) -> Result<Contract> {
        let result = relationship::accept_invite(
            self.store.as_ref(),
            student_id,
            &request.contract_id,
            &request.driver_id,
        );
        let contract = log_failure("accept_invite", student_id, result)?;

        tracing::info!(
            contract_id = %contract.contract_id,
            driver_id = %contract.driver_id,
            student_id = %contract.student_id,
            "Accepted invite"
        );

        Ok(contract)
    }

    async fn unlink_as_student(&self, student_id: &AccountId) -> Result<UnlinkOutcome> {
        let result = relationship::unlink_as_student(self.store.as_ref(), student_id);
        let outcome = log_failure("unlink_as_student", student_id, result)?;

        match &outcome {
            UnlinkOutcome::Unlinked { driver_id } => {
                tracing::info!(student_id = %student_id, driver_id = %driver_id, "Student unlinked");
            }
            UnlinkOutcome::AlreadyUnlinked => {
                tracing::debug!(student_id = %student_id, "Student already unlinked");
            }
        }

        Ok(outcome)
    }

    async fn unlink_student_as_driver(
        &self,
        driver_id: &AccountId,
        request: UnlinkStudentRequest,
    ) -> Result<()> {
        let result =
            relationship::unlink_student_as_driver(self.store.as_ref(), driver_id, &request.student_id);
        log_failure("unlink_student_as_driver", driver_id, result)?;

        tracing::info!(
            driver_id = %driver_id,
            student_id = %request.student_id,
            "Driver unlinked student"
        );

        Ok(())
    }

    async fn rate_driver(
        &self,
        student_id: &AccountId,
        request: RateDriverRequest,
    ) -> Result<RatingSummary> {
        let result = rating::rate_driver(self.store.as_ref(), &self.config, student_id, &request);
        let summary = log_failure("rate_driver", student_id, result)?;

        tracing::info!(
            driver_id = %request.driver_id,
            student_id = %student_id,
            average = summary.average,
            count = summary.count,
            "Rated driver"
        );

        Ok(summary)
    }

    async fn upsert_account(&self, mut account: Account) -> Result<Account> {
        account.updated_at = Utc::now();
        self.store.put_account(&account)?;

        match account.role {
            AccountRole::Student => self.store.run_transaction(|txn| {
                let existing = txn.get_student(&account.account_id)?;
                let created = existing.is_none();
                let mut student =
                    existing.unwrap_or_else(|| Student::new(account.account_id.clone()));
                if created || student.email != account.email {
                    student.email.clone_from(&account.email);
                    txn.put_student(&student)?;
                }
                Ok::<_, ControlError>(())
            })?,
            // Linked students and the rating aggregate belong to the existing record.
            AccountRole::Driver => self.store.run_transaction(|txn| {
                if txn.get_driver(&account.account_id)?.is_none() {
                    txn.put_driver(&Driver::new(account.account_id.clone()))?;
                }
                Ok::<_, ControlError>(())
            })?,
            AccountRole::Other => {}
        }

        tracing::debug!(account_id = %account.account_id, role = ?account.role, "Upserted account");
        Ok(account)
    }

    async fn record_route(&self, route: Route) -> Result<Option<Route>> {
        let previous = self.store.put_route(&route)?;
        tracing::debug!(route_id = %route.route_id, status = %route.status, "Recorded route");
        Ok(previous)
    }

    async fn record_chat(&self, chat: Chat) -> Result<Chat> {
        self.store.create_chat(&chat).map_err(|e| match e {
            StoreError::AlreadyExists => ControlError::ChatAlreadyExists,
            other => other.into(),
        })?;
        tracing::debug!(chat_id = %chat.chat_id, status = %chat.status, "Recorded chat");
        Ok(chat)
    }

    async fn check_store(&self) -> Result<()> {
        self.store.ping()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vanlink_core::{ChatId, PushToken, RouteId};
    use vanlink_store::{ChangeEvent, ContractStatus, RocksStore, RouteStatus};

    fn id(s: &str) -> AccountId {
        AccountId::new(s).unwrap()
    }

    fn create_test_service() -> (ControlPlaneService<RocksStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        (ControlPlaneService::with_defaults(store), dir)
    }

    fn student_account(student: &str, email: &str) -> Account {
        Account {
            account_id: id(student),
            role: AccountRole::Student,
            email: Some(email.to_string()),
            display_name: Some("Maria".to_string()),
            push_token: Some(PushToken::new("tok-1")),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn invite_accept_unlink_flow() {
        let (service, _dir) = create_test_service();
        service
            .upsert_account(student_account("student-1", "aluno@x.com"))
            .await
            .unwrap();

        let invite = service
            .send_invite(&id("driver-1"), InviteRequest::new(" aluno@x.com "))
            .await
            .unwrap();
        assert_eq!(invite.status, ContractStatus::DriverInvite);

        let accepted = service
            .accept_invite(
                &id("student-1"),
                AcceptInviteRequest {
                    contract_id: invite.contract_id,
                    driver_id: id("driver-1"),
                },
            )
            .await
            .unwrap();
        assert_eq!(accepted.status, ContractStatus::Approved);

        service
            .unlink_student_as_driver(
                &id("driver-1"),
                UnlinkStudentRequest {
                    student_id: id("student-1"),
                },
            )
            .await
            .unwrap();

        let outcome = service.unlink_as_student(&id("student-1")).await.unwrap();
        assert_eq!(outcome, UnlinkOutcome::AlreadyUnlinked);
    }

    #[tokio::test]
    async fn malformed_email_is_invalid_argument() {
        let (service, _dir) = create_test_service();
        let err = service
            .send_invite(&id("driver-1"), InviteRequest::new("not-an-email"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn rate_driver_through_service() {
        let (service, _dir) = create_test_service();
        service.store().put_driver(&Driver::new(id("driver-1"))).unwrap();

        let summary = service
            .rate_driver(
                &id("student-1"),
                RateDriverRequest {
                    driver_id: id("driver-1"),
                    score: 4.0,
                    comment: Some("ok".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(summary.count, 1);
        assert!((summary.average - 4.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn student_account_creates_student_record() {
        let (service, _dir) = create_test_service();
        service
            .upsert_account(student_account("student-1", "aluno@x.com"))
            .await
            .unwrap();

        let student = service.store().get_student(&id("student-1")).unwrap().unwrap();
        assert_eq!(student.email.as_deref(), Some("aluno@x.com"));
        assert_eq!(student.driver_id, None);

        let mut driver_account = student_account("driver-1", "motorista@x.com");
        driver_account.role = AccountRole::Driver;
        service.upsert_account(driver_account).await.unwrap();
        assert!(service.store().get_student(&id("driver-1")).unwrap().is_none());
    }

    #[tokio::test]
    async fn store_check_passes_on_open_store() {
        let (service, _dir) = create_test_service();
        service.check_store().await.unwrap();
    }

    #[tokio::test]
    async fn registered_driver_can_be_rated() {
        let (service, _dir) = create_test_service();
        let mut driver_account = student_account("driver-1", "motorista@x.com");
        driver_account.role = AccountRole::Driver;
        service.upsert_account(driver_account.clone()).await.unwrap();

        let driver = service.store().get_driver(&id("driver-1")).unwrap().unwrap();
        assert!(driver.student_ids.is_empty());
        assert_eq!(driver.rating_count, 0);

        let summary = service
            .rate_driver(
                &id("student-1"),
                RateDriverRequest {
                    driver_id: id("driver-1"),
                    score: 5.0,
                    comment: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(summary.count, 1);

        // Re-registering keeps the aggregate.
        service.upsert_account(driver_account).await.unwrap();
        let driver = service.store().get_driver(&id("driver-1")).unwrap().unwrap();
        assert_eq!(driver.rating_count, 1);
    }

    #[tokio::test]
    async fn record_route_publishes_change() {
        let (service, _dir) = create_test_service();
        let mut events = service.store().subscribe();

        let route = Route {
            route_id: RouteId::new("route-1").unwrap(),
            name: Some("Manhã".to_string()),
            status: RouteStatus::Planned,
            student_ids: vec![id("student-1")],
            start_time: None,
            driver_id: Some(id("driver-1")),
        };
        assert!(service.record_route(route.clone()).await.unwrap().is_none());

        let mut started = route.clone();
        started.status = RouteStatus::InProgress;
        let previous = service.record_route(started).await.unwrap();
        assert_eq!(previous.map(|r| r.status), Some(RouteStatus::Planned));

        let first = events.recv().await.unwrap();
        assert!(matches!(first, ChangeEvent::RouteWritten { before: None, .. }));
    }

    #[tokio::test]
    async fn duplicate_chat_already_exists() {
        let (service, _dir) = create_test_service();
        let chat = Chat {
            chat_id: ChatId::new("chat-1").unwrap(),
            status: "inquiry".to_string(),
            participants: vec![id("student-1"), id("driver-1")],
            last_message: None,
            created_at: Utc::now(),
        };

        service.record_chat(chat.clone()).await.unwrap();
        let err = service.record_chat(chat).await.unwrap_err();
        assert!(matches!(err, ControlError::ChatAlreadyExists));
        assert_eq!(err.http_status_code(), 409);
    }
}
