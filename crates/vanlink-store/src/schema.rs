//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Generic account records, keyed by `account_id`.
    pub const ACCOUNTS: &str = "accounts";

    /// Index: accounts by email, keyed by `email || 0x00 || account_id`.
    pub const ACCOUNTS_BY_EMAIL: &str = "accounts_by_email";

    /// Driver records, keyed by `driver_id`.
    pub const DRIVERS: &str = "drivers";

    /// Student records, keyed by `student_id`.
    pub const STUDENTS: &str = "students";

    /// Index: students by email, keyed by `email || 0x00 || student_id`.
    pub const STUDENTS_BY_EMAIL: &str = "students_by_email";

    /// Contract records, keyed by `contract_id`.
    pub const CONTRACTS: &str = "contracts";

    /// Index: contracts by pair, keyed by `driver_id || 0x00 || student_id || 0x00 || contract_id`.
    pub const CONTRACTS_BY_PAIR: &str = "contracts_by_pair";

    /// Per-pair guard keys, rewritten on every contract mutation for that pair.
    pub const CONTRACT_PAIRS: &str = "contract_pairs";

    /// Rating records, keyed by `driver_id || 0x00 || student_id`.
    pub const RATINGS: &str = "ratings";

    /// Route records, keyed by `route_id`.
    pub const ROUTES: &str = "routes";

    /// Index: routes by status and start time, keyed by
    /// `status || 0x00 || start_millis || route_id`.
    pub const ROUTES_BY_STATUS_START: &str = "routes_by_status_start";

    /// Chat records, keyed by `chat_id`.
    pub const CHATS: &str = "chats";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::ACCOUNTS,
        cf::ACCOUNTS_BY_EMAIL,
        cf::DRIVERS,
        cf::STUDENTS,
        cf::STUDENTS_BY_EMAIL,
        cf::CONTRACTS,
        cf::CONTRACTS_BY_PAIR,
        cf::CONTRACT_PAIRS,
        cf::RATINGS,
        cf::ROUTES,
        cf::ROUTES_BY_STATUS_START,
        cf::CHATS,
    ]
}
