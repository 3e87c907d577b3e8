//! Therapay Database Layer
//!
//! This crate provides PostgreSQL database access and repository
//! implementations for the Therapay reconciliation engine. It includes:
//!
//! - Connection pool management with sqlx
//! - Repository implementations for users, calls, the ledger, and withdrawals
//! - Transaction support for atomic billing operations

pub mod pool;
pub mod repositories;

pub use pool::create_pool;
pub use repositories::*;

// Re-export commonly used types
pub use sqlx::{PgPool, Postgres, Transaction};
pub use therapay_core::{AppError, AppResult};
