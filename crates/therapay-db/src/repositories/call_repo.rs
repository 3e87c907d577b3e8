//! Call record repository implementation
//!
//! Read-side queries keyed on the platform's composite call identifier.
//! Creation, lifecycle transitions, and billing marks go through the
//! services' own transactions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use therapay_core::{
    models::{CallRecord, CallStatus},
    traits::CallRepository,
    AppError, AppResult,
};
use tracing::{debug, error, instrument};
use uuid::Uuid;

/// PostgreSQL implementation of CallRepository
pub struct PgCallRepository {
    pool: PgPool,
}

impl PgCallRepository {
    /// Create a new call repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const CALL_COLUMNS: &str = r#"
    id, call_cid, client_id, therapist_id, status,
    start_time, end_time, duration_minutes,
    rate_per_minute, client_debited, therapist_credited,
    created_at, updated_at
"#;

#[async_trait]
impl CallRepository for PgCallRepository {
    #[instrument(skip(self))]
    async fn find_by_cid(&self, call_cid: &str) -> AppResult<Option<CallRecord>> {
        debug!("Finding call record by cid: {}", call_cid);

        let result = sqlx::query_as::<sqlx::Postgres, CallRow>(&format!(
            "SELECT {CALL_COLUMNS} FROM call_records WHERE call_cid = $1"
        ))
        .bind(call_cid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding call {}: {}", call_cid, e);
            AppError::Database(format!("Failed to find call record: {}", e))
        })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<CallRecord>, i64)> {
        debug!(
            "Listing call records for user {} limit {} offset {}",
            user_id, limit, offset
        );

        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM call_records WHERE client_id = $1 OR therapist_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error counting call records: {}", e);
            AppError::Database(format!("Failed to count call records: {}", e))
        })?;

        let rows = sqlx::query_as::<sqlx::Postgres, CallRow>(&format!(
            r#"
            SELECT {CALL_COLUMNS}
            FROM call_records
            WHERE client_id = $1 OR therapist_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error fetching call records: {}", e);
            AppError::Database(format!("Failed to fetch call records: {}", e))
        })?;

        Ok((rows.into_iter().map(Into::into).collect(), total.0))
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct CallRow {
    id: i64,
    call_cid: String,
    client_id: Uuid,
    therapist_id: Uuid,
    status: String,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    duration_minutes: Option<i32>,
    rate_per_minute: Option<Decimal>,
    client_debited: Option<Decimal>,
    therapist_credited: Option<Decimal>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CallRow> for CallRecord {
    fn from(row: CallRow) -> Self {
        Self {
            id: row.id,
            call_cid: row.call_cid,
            client_id: row.client_id,
            therapist_id: row.therapist_id,
            status: CallStatus::from_str(&row.status).unwrap_or(CallStatus::Initiated),
            start_time: row.start_time,
            end_time: row.end_time,
            duration_minutes: row.duration_minutes,
            rate_per_minute: row.rate_per_minute,
            client_debited: row.client_debited,
            therapist_credited: row.therapist_credited,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_find_by_cid_unknown_call() {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/therapay".to_string());
        let pool = crate::create_pool(&database_url, Some(2)).await.unwrap();
        let repo = PgCallRepository::new(pool);

        let result = repo
            .find_by_cid(&format!("default:{}", Uuid::new_v4()))
            .await;
        assert!(matches!(result, Ok(None)));
    }
}
