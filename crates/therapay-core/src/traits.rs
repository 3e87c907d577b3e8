//! Common traits for repositories and services
//!
//! Defines abstractions for database access, caching, and the remote
//! call-control collaborator.

use crate::error::AppError;
use crate::models::{CallRecord, LedgerEntry, UserAccount, WithdrawalRequest};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

/// User repository trait
///
/// The identity store consumed by the resolver: lookup by internal id or by
/// the opaque identifier the communication platform assigns.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find user by internal id
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserAccount>, AppError>;

    /// Find user by platform identifier
    async fn find_by_platform_id(&self, platform_id: &str)
        -> Result<Option<UserAccount>, AppError>;

    /// Create a new user account
    async fn create(&self, user: &UserAccount) -> Result<UserAccount, AppError>;
}

/// Call record repository trait
///
/// Read side only. Creation, status transitions, and billing marks are
/// written by the lifecycle engine and reconciler inside their own
/// transactions, not through this trait.
#[async_trait]
pub trait CallRepository: Send + Sync {
    /// Find call record by composite platform cid
    async fn find_by_cid(&self, call_cid: &str) -> Result<Option<CallRecord>, AppError>;

    /// List records where the user participated, newest first
    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<CallRecord>, i64), AppError>;
}

/// Ledger repository trait (read side; entries are appended transactionally)
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// List entries for a user, newest first
    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<LedgerEntry>, i64), AppError>;

    /// List entries linked to a call
    async fn list_for_call(&self, call_cid: &str) -> Result<Vec<LedgerEntry>, AppError>;
}

/// Withdrawal repository trait (read side)
#[async_trait]
pub trait WithdrawalRepository: Send + Sync {
    /// Find withdrawal by id
    async fn find_by_id(&self, id: Uuid) -> Result<Option<WithdrawalRequest>, AppError>;

    /// List withdrawals for a therapist, newest first
    async fn list_for_therapist(
        &self,
        therapist_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<WithdrawalRequest>, i64), AppError>;
}

/// Cache service trait
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Get value from cache
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError>;

    /// Set value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), AppError>;

    /// Delete value from cache
    async fn delete(&self, key: &str) -> Result<bool, AppError>;

    /// Check if key exists
    async fn exists(&self, key: &str) -> Result<bool, AppError>;
}

/// Remote call control trait
///
/// The communication-platform collaborator used to tear down a session when
/// a two-party call ends early. Best-effort: callers log failures and never
/// roll back local state over them.
#[async_trait]
pub trait CallControl: Send + Sync {
    /// End the remote session identified by call type and id
    async fn end_call(&self, call_type: &str, call_id: &str) -> Result<(), AppError>;
}

/// Pagination parameters
#[derive(Debug, Clone, Default)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 1000),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize)]
pub struct PaginationMeta {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl PaginationMeta {
    pub fn new(total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = if per_page > 0 {
            (total + per_page - 1) / per_page
        } else {
            0
        };

        Self {
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination() {
        let p = Pagination::new(1, 10);
        assert_eq!(p.offset(), 0);
        assert_eq!(p.limit(), 10);

        let p = Pagination::new(3, 20);
        assert_eq!(p.offset(), 40);
        assert_eq!(p.limit(), 20);
    }

    #[test]
    fn test_pagination_bounds() {
        let p = Pagination::new(0, 10); // page 0 becomes 1
        assert_eq!(p.page, 1);

        let p = Pagination::new(1, 2000); // per_page capped at 1000
        assert_eq!(p.per_page, 1000);
    }

    #[test]
    fn test_pagination_meta() {
        let meta = PaginationMeta::new(95, 1, 10);
        assert_eq!(meta.total_pages, 10);

        let meta = PaginationMeta::new(101, 1, 10);
        assert_eq!(meta.total_pages, 11);
    }
}
