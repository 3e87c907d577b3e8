//! Ledger repository implementation
//!
//! Read-side queries over the append-only ledger. Entries are inserted by
//! the reconciler and wallet services inside their own transactions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use therapay_core::{
    models::{LedgerEntry, LedgerKind},
    traits::LedgerRepository,
    AppError, AppResult,
};
use tracing::{debug, error, instrument};
use uuid::Uuid;

/// PostgreSQL implementation of LedgerRepository
pub struct PgLedgerRepository {
    pool: PgPool,
}

impl PgLedgerRepository {
    /// Create a new ledger repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const LEDGER_COLUMNS: &str = r#"
    id, user_id, kind, amount, description,
    related_call_cid, related_withdrawal_id, payment_ref,
    balance_before, balance_after, created_at
"#;

#[async_trait]
impl LedgerRepository for PgLedgerRepository {
    #[instrument(skip(self))]
    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<LedgerEntry>, i64)> {
        debug!(
            "Listing ledger entries for user {} limit {} offset {}",
            user_id, limit, offset
        );

        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ledger_entries WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error counting ledger entries: {}", e);
                AppError::Database(format!("Failed to count ledger entries: {}", e))
            })?;

        let rows = sqlx::query_as::<sqlx::Postgres, LedgerRow>(&format!(
            r#"
            SELECT {LEDGER_COLUMNS}
            FROM ledger_entries
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error fetching ledger entries: {}", e);
            AppError::Database(format!("Failed to fetch ledger entries: {}", e))
        })?;

        Ok((rows.into_iter().map(Into::into).collect(), total.0))
    }

    #[instrument(skip(self))]
    async fn list_for_call(&self, call_cid: &str) -> AppResult<Vec<LedgerEntry>> {
        debug!("Listing ledger entries for call {}", call_cid);

        let rows = sqlx::query_as::<sqlx::Postgres, LedgerRow>(&format!(
            r#"
            SELECT {LEDGER_COLUMNS}
            FROM ledger_entries
            WHERE related_call_cid = $1
            ORDER BY id
            "#
        ))
        .bind(call_cid)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error fetching ledger entries for call: {}", e);
            AppError::Database(format!("Failed to fetch ledger entries: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct LedgerRow {
    id: i64,
    user_id: Uuid,
    kind: String,
    amount: Decimal,
    description: Option<String>,
    related_call_cid: Option<String>,
    related_withdrawal_id: Option<Uuid>,
    payment_ref: Option<String>,
    balance_before: Decimal,
    balance_after: Decimal,
    created_at: DateTime<Utc>,
}

impl From<LedgerRow> for LedgerEntry {
    fn from(row: LedgerRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            kind: LedgerKind::from_str(&row.kind).unwrap_or(LedgerKind::CreditPurchase),
            amount: row.amount,
            description: row.description,
            related_call_cid: row.related_call_cid,
            related_withdrawal_id: row.related_withdrawal_id,
            payment_ref: row.payment_ref,
            balance_before: row.balance_before,
            balance_after: row.balance_after,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_list_for_unknown_call() {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/therapay".to_string());
        let pool = crate::create_pool(&database_url, Some(2)).await.unwrap();
        let repo = PgLedgerRepository::new(pool);

        let entries = repo.list_for_call("default:no-such-call").await.unwrap();
        assert!(entries.is_empty());
    }
}
