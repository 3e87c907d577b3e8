//! Withdrawal repository implementation
//!
//! Read-side queries over payout requests. Status transitions and the
//! accompanying ledger entries are written by the wallet service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use therapay_core::{
    models::{WithdrawalRequest, WithdrawalStatus},
    traits::WithdrawalRepository,
    AppError, AppResult,
};
use tracing::{debug, error, instrument};
use uuid::Uuid;

/// PostgreSQL implementation of WithdrawalRepository
pub struct PgWithdrawalRepository {
    pool: PgPool,
}

impl PgWithdrawalRepository {
    /// Create a new withdrawal repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const WITHDRAWAL_COLUMNS: &str = r#"
    id, therapist_id, amount, payout_address, status,
    rejection_reason, processed_at, created_at, updated_at
"#;

#[async_trait]
impl WithdrawalRepository for PgWithdrawalRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<WithdrawalRequest>> {
        debug!("Finding withdrawal by id: {}", id);

        let result = sqlx::query_as::<sqlx::Postgres, WithdrawalRow>(&format!(
            "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawal_requests WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding withdrawal {}: {}", id, e);
            AppError::Database(format!("Failed to find withdrawal: {}", e))
        })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn list_for_therapist(
        &self,
        therapist_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<WithdrawalRequest>, i64)> {
        debug!(
            "Listing withdrawals for therapist {} limit {} offset {}",
            therapist_id, limit, offset
        );

        let total: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM withdrawal_requests WHERE therapist_id = $1")
                .bind(therapist_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    error!("Database error counting withdrawals: {}", e);
                    AppError::Database(format!("Failed to count withdrawals: {}", e))
                })?;

        let rows = sqlx::query_as::<sqlx::Postgres, WithdrawalRow>(&format!(
            r#"
            SELECT {WITHDRAWAL_COLUMNS}
            FROM withdrawal_requests
            WHERE therapist_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(therapist_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error fetching withdrawals: {}", e);
            AppError::Database(format!("Failed to fetch withdrawals: {}", e))
        })?;

        Ok((rows.into_iter().map(Into::into).collect(), total.0))
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct WithdrawalRow {
    id: Uuid,
    therapist_id: Uuid,
    amount: Decimal,
    payout_address: String,
    status: String,
    rejection_reason: Option<String>,
    processed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<WithdrawalRow> for WithdrawalRequest {
    fn from(row: WithdrawalRow) -> Self {
        Self {
            id: row.id,
            therapist_id: row.therapist_id,
            amount: row.amount,
            payout_address: row.payout_address,
            status: WithdrawalStatus::from_str(&row.status).unwrap_or(WithdrawalStatus::Pending),
            rejection_reason: row.rejection_reason,
            processed_at: row.processed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
