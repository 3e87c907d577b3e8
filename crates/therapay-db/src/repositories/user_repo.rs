//! User repository implementation
//!
//! PostgreSQL-backed storage for user accounts with lookups by internal id
//! and by the communication platform's opaque identifier.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use therapay_core::{
    models::{UserAccount, UserRole},
    traits::UserRepository,
    AppError, AppResult,
};
use tracing::{debug, error, instrument};
use uuid::Uuid;

/// PostgreSQL implementation of UserRepository
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = r#"
    id, email, platform_id, role,
    credit_balance, earning_balance,
    is_available, rate_per_minute, payout_address,
    created_at, updated_at
"#;

#[async_trait]
impl UserRepository for PgUserRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<UserAccount>> {
        debug!("Finding user by id: {}", id);

        let result = sqlx::query_as::<sqlx::Postgres, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding user {}: {}", id, e);
            AppError::Database(format!("Failed to find user: {}", e))
        })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_by_platform_id(&self, platform_id: &str) -> AppResult<Option<UserAccount>> {
        debug!("Finding user by platform id: {}", platform_id);

        let result = sqlx::query_as::<sqlx::Postgres, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE platform_id = $1"
        ))
        .bind(platform_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding user by platform id: {}", e);
            AppError::Database(format!("Failed to find user: {}", e))
        })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self, user))]
    async fn create(&self, user: &UserAccount) -> AppResult<UserAccount> {
        debug!("Creating user: {}", user.email);

        let row = sqlx::query_as::<sqlx::Postgres, UserRow>(&format!(
            r#"
            INSERT INTO users (
                id, email, platform_id, role,
                credit_balance, earning_balance,
                is_available, rate_per_minute, payout_address
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.platform_id)
        .bind(user.role.to_string())
        .bind(user.credit_balance)
        .bind(user.earning_balance)
        .bind(user.is_available)
        .bind(user.rate_per_minute)
        .bind(&user.payout_address)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error creating user: {}", e);
            if e.to_string().contains("unique constraint") {
                AppError::AlreadyExists(format!("User {} already exists", user.email))
            } else {
                AppError::Database(format!("Failed to create user: {}", e))
            }
        })?;

        Ok(row.into())
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    platform_id: String,
    role: String,
    credit_balance: Decimal,
    earning_balance: Decimal,
    is_available: bool,
    rate_per_minute: Option<Decimal>,
    payout_address: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for UserAccount {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            platform_id: row.platform_id,
            role: UserRole::from_str(&row.role).unwrap_or(UserRole::Client),
            credit_balance: row.credit_balance,
            earning_balance: row.earning_balance,
            is_available: row.is_available,
            rate_per_minute: row.rate_per_minute,
            payout_address: row.payout_address,
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
    async fn test_find_missing_user() {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/therapay".to_string());
        let pool = crate::create_pool(&database_url, Some(2)).await.unwrap();
        let repo = PgUserRepository::new(pool);

        let result = repo.find_by_platform_id("no-such-platform-id").await;
        assert!(matches!(result, Ok(None)));
    }
}
