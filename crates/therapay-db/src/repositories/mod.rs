//! Repository implementations
//!
//! PostgreSQL-backed implementations of the repository traits defined in
//! therapay-core.

pub mod call_repo;
pub mod ledger_repo;
pub mod user_repo;
pub mod withdrawal_repo;

pub use call_repo::PgCallRepository;
pub use ledger_repo::PgLedgerRepository;
pub use user_repo::PgUserRepository;
pub use withdrawal_repo::PgWithdrawalRepository;
