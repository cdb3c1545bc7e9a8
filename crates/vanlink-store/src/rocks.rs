//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait on
//! top of an optimistic transaction database. Every mutation, single-record
//! ones included, goes through a transaction so that index maintenance and
//! conflict detection are uniform.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, Direction, ErrorKind, IteratorMode, MultiThreaded,
    OptimisticTransactionDB, OptimisticTransactionOptions, Options, WriteOptions,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use vanlink_core::{AccountId, ChatId, ContractId, RouteId};

use crate::error::{Result, StoreError};
use crate::events::{ChangeEvent, DEFAULT_EVENT_CAPACITY};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::types::{Account, AccountRole, Chat, Contract, Driver, Rating, Route, RouteStatus, Student};
use crate::{Store, Transaction};

type Db = OptimisticTransactionDB<MultiThreaded>;

/// Default number of commit attempts before a transaction gives up.
pub const DEFAULT_MAX_TRANSACTION_ATTEMPTS: u32 = 16;

/// Tuning options for [`RocksStore`].
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// Commit attempts before `StoreError::Conflict` is returned.
    pub max_transaction_attempts: u32,
    /// Capacity of the change-feed channel.
    pub event_capacity: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_transaction_attempts: DEFAULT_MAX_TRANSACTION_ATTEMPTS,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

fn db_err(e: rocksdb::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

/// Serialize a value using CBOR.
fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

/// Deserialize a value from CBOR.
fn deserialize<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<Db>,
    events: broadcast::Sender<ChangeEvent>,
    max_attempts: u32,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, StoreOptions::default())
    }

    /// Open or create a database with explicit options.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open_with<P: AsRef<Path>>(path: P, options: StoreOptions) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = Db::open_cf_descriptors(&opts, path, cf_descriptors).map_err(db_err)?;
        let (events, _) = broadcast::channel(options.event_capacity.max(1));

        Ok(Self {
            db: Arc::new(db),
            events,
            max_attempts: options.max_transaction_attempts.max(1),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Point read outside of any transaction.
    fn get<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(db_err)?
            .map(|data| deserialize(&data))
            .transpose()
    }

    /// Collect the keys of `cf_name` starting with `prefix`.
    fn scan_keys(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<Box<[u8]>>> {
        let cf = self.cf(cf_name)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));

        let mut found = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(db_err)?;

            // Stop if we're past the prefix
            if !key.starts_with(prefix) {
                break;
            }
            found.push(key);
        }
        Ok(found)
    }

    /// Run `f` in a transaction, retrying when the commit loses a conflict.
    fn transact<T, E, F>(&self, mut f: F) -> std::result::Result<T, E>
    where
        F: FnMut(&RocksTransaction<'_>) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let write_opts = WriteOptions::default();
        let mut txn_opts = OptimisticTransactionOptions::new();
        txn_opts.set_snapshot(true);

        for attempt in 1..=self.max_attempts {
            let scope = RocksTransaction {
                store: self,
                txn: self.db.transaction_opt(&write_opts, &txn_opts),
            };
            let value = f(&scope)?;

            match scope.txn.commit() {
                Ok(()) => return Ok(value),
                Err(e) if matches!(e.kind(), ErrorKind::Busy | ErrorKind::TryAgain) => {
                    tracing::debug!(attempt, error = %e, "Transaction conflict, retrying");
                }
                Err(e) => return Err(db_err(e).into()),
            }
        }

        tracing::warn!(
            attempts = self.max_attempts,
            "Transaction abandoned after repeated conflicts"
        );
        Err(StoreError::Conflict {
            attempts: self.max_attempts,
        }
        .into())
    }

    fn publish(&self, event: ChangeEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("No change feed subscribers");
        }
    }
}

/// A live transaction handed to closures run by [`RocksStore`].
pub struct RocksTransaction<'a> {
    store: &'a RocksStore,
    txn: rocksdb::Transaction<'a, Db>,
}

impl RocksTransaction<'_> {
    /// Read a record and register the key for conflict detection.
    fn read<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.store.cf(cf_name)?;
        self.txn
            .get_for_update_cf(&cf, key, true)
            .map_err(db_err)?
            .map(|data| deserialize(&data))
            .transpose()
    }

    fn write<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        self.write_raw(cf_name, key, &serialize(value)?)
    }

    fn write_raw(&self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let cf = self.store.cf(cf_name)?;
        self.txn.put_cf(&cf, key, value).map_err(db_err)
    }

    fn delete(&self, cf_name: &str, key: &[u8]) -> Result<()> {
        let cf = self.store.cf(cf_name)?;
        self.txn.delete_cf(&cf, key).map_err(db_err)
    }

    /// Collect keys with `prefix` as seen by this transaction.
    fn scan_keys(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<Box<[u8]>>> {
        let cf = self.store.cf(cf_name)?;
        let iter = self
            .txn
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));

        let mut found = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(db_err)?;
            if !key.starts_with(prefix) {
                break;
            }
            found.push(key);
        }
        Ok(found)
    }

    /// Rewrite the pair guard key so concurrent readers of the pair conflict.
    fn bump_pair(&self, driver_id: &AccountId, student_id: &AccountId) -> Result<()> {
        let key = keys::pair_key(driver_id, student_id);
        self.write_raw(cf::CONTRACT_PAIRS, &key, uuid::Uuid::new_v4().as_bytes())
    }

    /// Move an email index entry from `old` to `new`.
    fn reindex_email(
        &self,
        cf_name: &str,
        id: &AccountId,
        old: Option<&str>,
        new: Option<&str>,
    ) -> Result<()> {
        if old == new {
            return Ok(());
        }
        if let Some(old) = old {
            self.delete(cf_name, &keys::email_key(old, id))?;
        }
        if let Some(new) = new {
            self.write_raw(cf_name, &keys::email_key(new, id), &[])?;
        }
        Ok(())
    }
}

impl Transaction for RocksTransaction<'_> {
    fn get_driver(&self, driver_id: &AccountId) -> Result<Option<Driver>> {
        self.read(cf::DRIVERS, &keys::id_key(driver_id))
    }

    fn put_driver(&self, driver: &Driver) -> Result<()> {
        self.write(cf::DRIVERS, &keys::id_key(&driver.driver_id), driver)
    }

    fn get_student(&self, student_id: &AccountId) -> Result<Option<Student>> {
        self.read(cf::STUDENTS, &keys::id_key(student_id))
    }

    fn put_student(&self, student: &Student) -> Result<()> {
        let key = keys::id_key(&student.student_id);
        let old: Option<Student> = self.read(cf::STUDENTS, &key)?;
        self.reindex_email(
            cf::STUDENTS_BY_EMAIL,
            &student.student_id,
            old.as_ref().and_then(|s| s.email.as_deref()),
            student.email.as_deref(),
        )?;
        self.write(cf::STUDENTS, &key, student)
    }

    fn get_contract(&self, contract_id: &ContractId) -> Result<Option<Contract>> {
        self.read(cf::CONTRACTS, &keys::contract_key(contract_id))
    }

    fn put_contract(&self, contract: &Contract) -> Result<()> {
        let pair_key =
            keys::pair_contract_key(&contract.driver_id, &contract.student_id, &contract.contract_id);
        self.write(cf::CONTRACTS, &keys::contract_key(&contract.contract_id), contract)?;
        self.write_raw(cf::CONTRACTS_BY_PAIR, &pair_key, &[])?;
        self.bump_pair(&contract.driver_id, &contract.student_id)
    }

    fn delete_contract(&self, contract: &Contract) -> Result<()> {
        let pair_key =
            keys::pair_contract_key(&contract.driver_id, &contract.student_id, &contract.contract_id);
        self.delete(cf::CONTRACTS, &keys::contract_key(&contract.contract_id))?;
        self.delete(cf::CONTRACTS_BY_PAIR, &pair_key)?;
        self.bump_pair(&contract.driver_id, &contract.student_id)
    }

    fn contracts_for_pair(
        &self,
        driver_id: &AccountId,
        student_id: &AccountId,
    ) -> Result<Vec<Contract>> {
        let _guard: Option<Vec<u8>> = {
            let cf = self.store.cf(cf::CONTRACT_PAIRS)?;
            self.txn
                .get_for_update_cf(&cf, keys::pair_key(driver_id, student_id), true)
                .map_err(db_err)?
        };

        let mut contracts = Vec::new();
        for key in self.scan_keys(cf::CONTRACTS_BY_PAIR, &keys::pair_prefix(driver_id, student_id))? {
            let Some(contract_id) = keys::extract_contract_id(&key) else {
                continue;
            };
            if let Some(contract) = self.get_contract(&contract_id)? {
                contracts.push(contract);
            }
        }
        Ok(contracts)
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Account Operations
    // =========================================================================

    fn put_account(&self, account: &Account) -> Result<()> {
        let key = keys::id_key(&account.account_id);
        self.transact(|txn| {
            let old: Option<Account> = txn.read(cf::ACCOUNTS, &key)?;
            txn.reindex_email(
                cf::ACCOUNTS_BY_EMAIL,
                &account.account_id,
                old.as_ref().and_then(|a| a.email.as_deref()),
                account.email.as_deref(),
            )?;
            txn.write(cf::ACCOUNTS, &key, account)
        })
    }

    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>> {
        self.get(cf::ACCOUNTS, &keys::id_key(account_id))
    }

    fn find_account_by_email(&self, email: &str, role: AccountRole) -> Result<Option<Account>> {
        let prefix = keys::email_prefix(email);
        for key in self.scan_keys(cf::ACCOUNTS_BY_EMAIL, &prefix)? {
            let Some(account_id) = keys::extract_account_id(&key, prefix.len()) else {
                continue;
            };
            if let Some(account) = self.get_account(&account_id)? {
                if account.role == role {
                    return Ok(Some(account));
                }
            }
        }
        Ok(None)
    }

    // =========================================================================
    // Driver / Student Operations
    // =========================================================================

    fn get_driver(&self, driver_id: &AccountId) -> Result<Option<Driver>> {
        self.get(cf::DRIVERS, &keys::id_key(driver_id))
    }

    fn put_driver(&self, driver: &Driver) -> Result<()> {
        self.transact(|txn| Transaction::put_driver(txn, driver))
    }

    fn get_student(&self, student_id: &AccountId) -> Result<Option<Student>> {
        self.get(cf::STUDENTS, &keys::id_key(student_id))
    }

    fn put_student(&self, student: &Student) -> Result<()> {
        self.transact(|txn| Transaction::put_student(txn, student))
    }

    fn find_student_by_email(&self, email: &str) -> Result<Option<Student>> {
        let prefix = keys::email_prefix(email);
        for key in self.scan_keys(cf::STUDENTS_BY_EMAIL, &prefix)? {
            let Some(student_id) = keys::extract_account_id(&key, prefix.len()) else {
                continue;
            };
            if let Some(student) = self.get_student(&student_id)? {
                return Ok(Some(student));
            }
        }
        Ok(None)
    }

    // =========================================================================
    // Contract Operations
    // =========================================================================

    fn get_contract(&self, contract_id: &ContractId) -> Result<Option<Contract>> {
        self.get(cf::CONTRACTS, &keys::contract_key(contract_id))
    }

    fn list_contracts_for_pair(
        &self,
        driver_id: &AccountId,
        student_id: &AccountId,
    ) -> Result<Vec<Contract>> {
        let prefix = keys::pair_prefix(driver_id, student_id);
        let mut contracts = Vec::new();
        for key in self.scan_keys(cf::CONTRACTS_BY_PAIR, &prefix)? {
            let Some(contract_id) = keys::extract_contract_id(&key) else {
                continue;
            };
            if let Some(contract) = self.get_contract(&contract_id)? {
                contracts.push(contract);
            }
        }
        Ok(contracts)
    }

    // =========================================================================
    // Rating Operations
    // =========================================================================

    fn put_rating(&self, rating: &Rating) -> Result<()> {
        let key = keys::pair_key(&rating.driver_id, &rating.student_id);
        self.transact(|txn| txn.write(cf::RATINGS, &key, rating))
    }

    fn list_ratings_for_driver(&self, driver_id: &AccountId) -> Result<Vec<Rating>> {
        let cf = self.cf(cf::RATINGS)?;
        let prefix = keys::rating_prefix(driver_id);
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&prefix, Direction::Forward));

        let mut ratings = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(db_err)?;
            if !key.starts_with(&prefix) {
                break;
            }
            ratings.push(deserialize(&value)?);
        }
        Ok(ratings)
    }

    fn update_driver_rating(
        &self,
        driver_id: &AccountId,
        average: f64,
        count: u32,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.transact(|txn| {
            let mut driver = Transaction::get_driver(txn, driver_id)?.ok_or(StoreError::NotFound)?;
            driver.rating_average = Some(average);
            driver.rating_count = count;
            driver.rating_updated_at = Some(at);
            Transaction::put_driver(txn, &driver)
        })
    }

    // =========================================================================
    // Route / Chat Operations
    // =========================================================================

    fn put_route(&self, route: &Route) -> Result<Option<Route>> {
        let key = keys::id_key(&route.route_id);
        let before = self.transact(|txn| {
            let before: Option<Route> = txn.read(cf::ROUTES, &key)?;

            if let Some(old) = &before {
                if let Some(start) = old.start_time {
                    let old_key = keys::route_start_key(old.status.as_str(), start, &old.route_id);
                    txn.delete(cf::ROUTES_BY_STATUS_START, &old_key)?;
                }
            }
            if let Some(start) = route.start_time {
                let new_key = keys::route_start_key(route.status.as_str(), start, &route.route_id);
                txn.write_raw(cf::ROUTES_BY_STATUS_START, &new_key, &[])?;
            }

            txn.write(cf::ROUTES, &key, route)?;
            Ok::<_, StoreError>(before)
        })?;

        self.publish(ChangeEvent::RouteWritten {
            route_id: route.route_id.clone(),
            before: before.clone(),
            after: route.clone(),
        });
        Ok(before)
    }

    fn get_route(&self, route_id: &RouteId) -> Result<Option<Route>> {
        self.get(cf::ROUTES, &keys::id_key(route_id))
    }

    fn list_routes_starting_between(
        &self,
        status: &RouteStatus,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Route>> {
        let cf = self.cf(cf::ROUTES_BY_STATUS_START)?;
        let lower = keys::route_start_bound(status.as_str(), from);
        let upper = keys::route_start_bound(status.as_str(), until);
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&lower, Direction::Forward));

        let mut routes = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(db_err)?;
            if key.as_ref() >= upper.as_slice() {
                break;
            }
            let Some(route_id) = keys::extract_route_id(&key, status.as_str()) else {
                continue;
            };
            if let Some(route) = self.get_route(&route_id)? {
                routes.push(route);
            }
        }
        Ok(routes)
    }

    fn create_chat(&self, chat: &Chat) -> Result<()> {
        let key = keys::id_key(&chat.chat_id);
        self.transact(|txn| {
            if txn.read::<Chat>(cf::CHATS, &key)?.is_some() {
                return Err(StoreError::AlreadyExists);
            }
            txn.write(cf::CHATS, &key, chat)
        })?;

        self.publish(ChangeEvent::ChatCreated {
            chat_id: chat.chat_id.clone(),
            chat: chat.clone(),
        });
        Ok(())
    }

    fn get_chat(&self, chat_id: &ChatId) -> Result<Option<Chat>> {
        self.get(cf::CHATS, &keys::id_key(chat_id))
    }

    // =========================================================================
    // Transactions and Change Feed
    // =========================================================================

    fn run_transaction<T, E, F>(&self, mut f: F) -> std::result::Result<T, E>
    where
        F: FnMut(&dyn Transaction) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        self.transact(|txn| f(txn))
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    fn ping(&self) -> Result<()> {
        for name in all_column_families() {
            self.cf(name)?;
        }
        let accounts = self.cf(cf::ACCOUNTS)?;
        self.db.get_cf(&accounts, b"").map_err(db_err)?;
        Ok(())
    }
}
