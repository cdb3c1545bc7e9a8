//! `RocksDB` storage layer for vanlink.
//!
//! This crate provides persistent storage for accounts, drivers, students,
//! contracts, ratings, routes, and chats using a `RocksDB` optimistic
//! transaction database with column families for indexing.
//!
//! # Architecture
//!
//! See [`schema::cf`] for the column families. Multi-record updates run inside
//! [`Store::run_transaction`], which retries the closure when the commit loses
//! a write conflict. Route and chat writes are published on a broadcast
//! channel obtained from [`Store::subscribe`].
//!
//! # Example
//!
//! ```no_run
//! use vanlink_store::{RocksStore, Store, StoreError};
//! use vanlink_core::AccountId;
//!
//! let store = RocksStore::open("/tmp/vanlink-db").unwrap();
//! let driver_id = AccountId::new("driver-1").unwrap();
//!
//! let linked = store
//!     .run_transaction(|txn| {
//!         Ok::<_, StoreError>(txn.get_driver(&driver_id)?.map(|d| d.student_ids.len()))
//!     })
//!     .unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod events;
pub mod keys;
pub mod rocks;
pub mod schema;
pub mod types;

pub use error::{Result, StoreError};
pub use events::ChangeEvent;
pub use rocks::{RocksStore, StoreOptions};
pub use types::{
    Account, AccountRole, Chat, ChatMessage, Contract, ContractStatus, Driver, Rating, Route,
    RouteStatus, Student, CHAT_STATUS_INQUIRY,
};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use vanlink_core::{AccountId, ChatId, ContractId, RouteId};

/// Reads and writes available inside a transaction.
///
/// Every read registers the key for conflict detection: if another
/// transaction commits a write to any key read here before this transaction
/// commits, the commit fails and the closure is run again.
pub trait Transaction {
    /// Read a driver record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_driver(&self, driver_id: &AccountId) -> Result<Option<Driver>>;

    /// Write a driver record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_driver(&self, driver: &Driver) -> Result<()>;

    /// Read a student record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_student(&self, student_id: &AccountId) -> Result<Option<Student>>;

    /// Write a student record, maintaining the email index.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_student(&self, student: &Student) -> Result<()>;

    /// Read a contract record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_contract(&self, contract_id: &ContractId) -> Result<Option<Contract>>;

    /// Write a contract record, maintaining the pair index and guard key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_contract(&self, contract: &Contract) -> Result<()>;

    /// Delete a contract record, maintaining the pair index and guard key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn delete_contract(&self, contract: &Contract) -> Result<()>;

    /// List every contract between a driver and a student.
    ///
    /// Reads the pair guard key, so any concurrent contract mutation for the
    /// same pair causes a conflict.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn contracts_for_pair(
        &self,
        driver_id: &AccountId,
        student_id: &AccountId,
    ) -> Result<Vec<Contract>>;
}

/// The storage trait defining all database operations.
pub trait Store: Send + Sync {
    // =========================================================================
    // Account Operations
    // =========================================================================

    /// Insert or update an account record, maintaining the email index.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_account(&self, account: &Account) -> Result<()>;

    /// Get an account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>>;

    /// Find the first account with exactly this email and role.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_account_by_email(&self, email: &str, role: AccountRole) -> Result<Option<Account>>;

    // =========================================================================
    // Driver / Student Operations
    // =========================================================================

    /// Get a driver by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_driver(&self, driver_id: &AccountId) -> Result<Option<Driver>>;

    /// Insert or replace a driver record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_driver(&self, driver: &Driver) -> Result<()>;

    /// Get a student by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_student(&self, student_id: &AccountId) -> Result<Option<Student>>;

    /// Insert or replace a student record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_student(&self, student: &Student) -> Result<()>;

    /// Find the first student record with exactly this email.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_student_by_email(&self, email: &str) -> Result<Option<Student>>;

    // =========================================================================
    // Contract Operations
    // =========================================================================

    /// Get a contract by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_contract(&self, contract_id: &ContractId) -> Result<Option<Contract>>;

    /// List every contract between a driver and a student.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_contracts_for_pair(
        &self,
        driver_id: &AccountId,
        student_id: &AccountId,
    ) -> Result<Vec<Contract>>;

    // =========================================================================
    // Rating Operations
    // =========================================================================

    /// Insert or overwrite the rating keyed by (driver, student).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_rating(&self, rating: &Rating) -> Result<()>;

    /// List all ratings of a driver.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_ratings_for_driver(&self, driver_id: &AccountId) -> Result<Vec<Rating>>;

    /// Update only the rating aggregate fields of a driver.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the driver doesn't exist.
    fn update_driver_rating(
        &self,
        driver_id: &AccountId,
        average: f64,
        count: u32,
        at: DateTime<Utc>,
    ) -> Result<()>;

    // =========================================================================
    // Route / Chat Operations
    // =========================================================================

    /// Insert or update a route and publish a [`ChangeEvent::RouteWritten`].
    ///
    /// Returns the previous version of the route.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_route(&self, route: &Route) -> Result<Option<Route>>;

    /// Get a route by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_route(&self, route_id: &RouteId) -> Result<Option<Route>>;

    /// List routes with `status` whose start time is in `[from, until)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_routes_starting_between(
        &self,
        status: &RouteStatus,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Route>>;

    /// Create a chat and publish a [`ChangeEvent::ChatCreated`].
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` if the chat already exists.
    fn create_chat(&self, chat: &Chat) -> Result<()>;

    /// Get a chat by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_chat(&self, chat_id: &ChatId) -> Result<Option<Chat>>;

    // =========================================================================
    // Transactions and Change Feed
    // =========================================================================

    /// Run `f` inside a snapshot-isolated transaction and commit it.
    ///
    /// The closure may run more than once if the commit loses a write
    /// conflict, so it must not have side effects outside the transaction.
    /// Returning `Err` from the closure rolls the transaction back.
    ///
    /// # Errors
    ///
    /// Returns the closure's error, or `StoreError::Conflict` if every attempt
    /// lost a conflict.
    fn run_transaction<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnMut(&dyn Transaction) -> std::result::Result<T, E>,
        E: From<StoreError>;

    /// Subscribe to the change feed.
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;

    /// Check that every column family is open and a read succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot serve reads.
    fn ping(&self) -> Result<()>;
}
