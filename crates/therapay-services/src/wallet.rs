//! Wallet service
//!
//! Credit purchases for clients and the payout lifecycle for therapists.
//! Every balance mutation happens under a row lock and writes a ledger entry
//! with before/after snapshots in the same transaction.
//!
//! Withdrawals lock the amount out of the earning balance at request time;
//! processing only flips status, and rejection refunds the locked amount.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use therapay_core::{
    models::{LedgerKind, UserRole, WithdrawalRequest, WithdrawalStatus},
    AppError, AppResult,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Wallet service
pub struct WalletService {
    pool: PgPool,
    min_withdrawal: Decimal,
}

impl WalletService {
    /// Create a new wallet service
    pub fn new(pool: PgPool, min_withdrawal: Decimal) -> Self {
        Self {
            pool,
            min_withdrawal,
        }
    }

    /// Credit a client's balance after a purchase
    ///
    /// Returns the new credit balance.
    #[instrument(skip(self))]
    pub async fn top_up(
        &self,
        user_id: Uuid,
        amount: Decimal,
        payment_ref: Option<String>,
    ) -> AppResult<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(AppError::InvalidInput(
                "Top-up amount must be positive".to_string(),
            ));
        }

        let mut tx = self.begin().await?;

        let user = Self::lock_user(&mut tx, user_id).await?;
        if user.role != UserRole::Client.to_string() {
            return Err(AppError::Validation(
                "Only clients can purchase credits".to_string(),
            ));
        }

        let new_balance = user.credit_balance + amount;

        sqlx::query(
            r#"
            UPDATE users
            SET credit_balance = credit_balance + $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to credit user {}: {}", user_id, e);
            AppError::Database(format!("Failed to credit user: {}", e))
        })?;

        Self::insert_ledger_entry(
            &mut tx,
            user_id,
            LedgerKind::CreditPurchase,
            amount,
            user.credit_balance,
            "Credit purchase".to_string(),
            None,
            payment_ref,
        )
        .await?;

        self.commit(tx).await?;

        info!(
            "Topped up user {} by {}: new balance {}",
            user_id, amount, new_balance
        );
        Ok(new_balance)
    }

    /// Open a withdrawal request, locking the amount out of the earning balance
    #[instrument(skip(self))]
    pub async fn request_withdrawal(
        &self,
        therapist_id: Uuid,
        amount: Decimal,
    ) -> AppResult<WithdrawalRequest> {
        if amount < self.min_withdrawal {
            return Err(AppError::InvalidInput(format!(
                "Minimum withdrawal amount is {}",
                self.min_withdrawal
            )));
        }

        let mut tx = self.begin().await?;

        let user = Self::lock_user(&mut tx, therapist_id).await?;
        if user.role != UserRole::Therapist.to_string() {
            return Err(AppError::Validation(
                "Only therapists can request withdrawals".to_string(),
            ));
        }

        let payout_address = user
            .payout_address
            .ok_or_else(|| AppError::PayoutAddressMissing(therapist_id.to_string()))?;

        if user.earning_balance < amount {
            warn!(
                "Insufficient earnings for withdrawal by {}: required {}, available {}",
                therapist_id, amount, user.earning_balance
            );
            return Err(AppError::InsufficientBalance {
                required: amount.to_string(),
                available: user.earning_balance.to_string(),
            });
        }

        sqlx::query(
            r#"
            UPDATE users
            SET earning_balance = earning_balance - $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(therapist_id)
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to lock earnings for {}: {}", therapist_id, e);
            AppError::Database(format!("Failed to lock earnings: {}", e))
        })?;

        let request = WithdrawalRequest::new(therapist_id, amount, payout_address);

        sqlx::query(
            r#"
            INSERT INTO withdrawal_requests (
                id, therapist_id, amount, payout_address, status
            )
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(request.id)
        .bind(request.therapist_id)
        .bind(request.amount)
        .bind(&request.payout_address)
        .bind(request.status.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to create withdrawal request: {}", e);
            AppError::Database(format!("Failed to create withdrawal request: {}", e))
        })?;

        Self::insert_ledger_entry(
            &mut tx,
            therapist_id,
            LedgerKind::WithdrawalRequest,
            -amount,
            user.earning_balance,
            "Withdrawal requested".to_string(),
            Some(request.id),
            None,
        )
        .await?;

        self.commit(tx).await?;

        info!(
            "Withdrawal {} requested by {} for {}",
            request.id, therapist_id, amount
        );
        Ok(request)
    }

    /// Mark a pending withdrawal as paid out
    #[instrument(skip(self))]
    pub async fn process_withdrawal(
        &self,
        withdrawal_id: Uuid,
        payment_ref: Option<String>,
    ) -> AppResult<WithdrawalRequest> {
        let mut tx = self.begin().await?;

        let row = Self::lock_withdrawal(&mut tx, withdrawal_id).await?;
        let status =
            WithdrawalStatus::from_str(&row.status).unwrap_or(WithdrawalStatus::Pending);
        if status != WithdrawalStatus::Pending {
            return Err(AppError::WithdrawalNotPending(withdrawal_id.to_string()));
        }

        let processed_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE withdrawal_requests
            SET status = $2,
                processed_at = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(withdrawal_id)
        .bind(WithdrawalStatus::Processed.to_string())
        .bind(processed_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to process withdrawal {}: {}", withdrawal_id, e);
            AppError::Database(format!("Failed to process withdrawal: {}", e))
        })?;

        // Amount already left the balance at request time; this entry only
        // records the payout event
        let user = Self::lock_user(&mut tx, row.therapist_id).await?;
        Self::insert_ledger_entry(
            &mut tx,
            row.therapist_id,
            LedgerKind::WithdrawalProcessed,
            Decimal::ZERO,
            user.earning_balance,
            "Withdrawal processed".to_string(),
            Some(withdrawal_id),
            payment_ref,
        )
        .await?;

        self.commit(tx).await?;

        info!("Withdrawal {} processed", withdrawal_id);

        Ok(WithdrawalRequest {
            id: row.id,
            therapist_id: row.therapist_id,
            amount: row.amount,
            payout_address: row.payout_address,
            status: WithdrawalStatus::Processed,
            rejection_reason: None,
            processed_at: Some(processed_at),
            created_at: row.created_at,
            updated_at: processed_at,
        })
    }

    /// Reject a pending withdrawal and refund the locked amount
    #[instrument(skip(self))]
    pub async fn reject_withdrawal(
        &self,
        withdrawal_id: Uuid,
        reason: String,
    ) -> AppResult<WithdrawalRequest> {
        let mut tx = self.begin().await?;

        let row = Self::lock_withdrawal(&mut tx, withdrawal_id).await?;
        let status =
            WithdrawalStatus::from_str(&row.status).unwrap_or(WithdrawalStatus::Pending);
        if status != WithdrawalStatus::Pending {
            return Err(AppError::WithdrawalNotPending(withdrawal_id.to_string()));
        }

        let processed_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE withdrawal_requests
            SET status = $2,
                rejection_reason = $3,
                processed_at = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(withdrawal_id)
        .bind(WithdrawalStatus::Rejected.to_string())
        .bind(&reason)
        .bind(processed_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to reject withdrawal {}: {}", withdrawal_id, e);
            AppError::Database(format!("Failed to reject withdrawal: {}", e))
        })?;

        let user = Self::lock_user(&mut tx, row.therapist_id).await?;

        sqlx::query(
            r#"
            UPDATE users
            SET earning_balance = earning_balance + $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(row.therapist_id)
        .bind(row.amount)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to refund earnings for {}: {}", row.therapist_id, e);
            AppError::Database(format!("Failed to refund earnings: {}", e))
        })?;

        Self::insert_ledger_entry(
            &mut tx,
            row.therapist_id,
            LedgerKind::WithdrawalRejected,
            row.amount,
            user.earning_balance,
            format!("Withdrawal rejected: {}", reason),
            Some(withdrawal_id),
            None,
        )
        .await?;

        self.commit(tx).await?;

        info!("Withdrawal {} rejected and refunded", withdrawal_id);

        Ok(WithdrawalRequest {
            id: row.id,
            therapist_id: row.therapist_id,
            amount: row.amount,
            payout_address: row.payout_address,
            status: WithdrawalStatus::Rejected,
            rejection_reason: Some(reason),
            processed_at: Some(processed_at),
            created_at: row.created_at,
            updated_at: processed_at,
        })
    }

    async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })
    }

    async fn commit(&self, tx: Transaction<'static, Postgres>) -> AppResult<()> {
        tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })
    }

    async fn lock_user(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
    ) -> AppResult<WalletUserRow> {
        sqlx::query_as::<sqlx::Postgres, WalletUserRow>(
            r#"
            SELECT id, role, credit_balance, earning_balance, payout_address
            FROM users
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| {
            error!("Failed to lock user {}: {}", user_id, e);
            AppError::Database(format!("Failed to lock user: {}", e))
        })?
        .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))
    }

    async fn lock_withdrawal(
        tx: &mut Transaction<'_, Postgres>,
        withdrawal_id: Uuid,
    ) -> AppResult<WithdrawalRow> {
        sqlx::query_as::<sqlx::Postgres, WithdrawalRow>(
            r#"
            SELECT id, therapist_id, amount, payout_address, status, created_at
            FROM withdrawal_requests
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(withdrawal_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| {
            error!("Failed to lock withdrawal {}: {}", withdrawal_id, e);
            AppError::Database(format!("Failed to lock withdrawal: {}", e))
        })?
        .ok_or_else(|| AppError::WithdrawalNotFound(withdrawal_id.to_string()))
    }

    #[allow(clippy::too_many_arguments)]
    async fn insert_ledger_entry(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        kind: LedgerKind,
        amount: Decimal,
        balance_before: Decimal,
        description: String,
        withdrawal_id: Option<Uuid>,
        payment_ref: Option<String>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ledger_entries (
                user_id, kind, amount, description,
                related_withdrawal_id, payment_ref,
                balance_before, balance_after
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user_id)
        .bind(kind.to_string())
        .bind(amount)
        .bind(description)
        .bind(withdrawal_id)
        .bind(payment_ref)
        .bind(balance_before)
        .bind(balance_before + amount)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            error!("Failed to write ledger entry for {}: {}", user_id, e);
            AppError::Database(format!("Failed to write ledger entry: {}", e))
        })?;

        Ok(())
    }
}

/// Helper struct for the locked user row
#[derive(Debug, sqlx::FromRow)]
struct WalletUserRow {
    #[allow(dead_code)]
    id: Uuid,
    role: String,
    credit_balance: Decimal,
    earning_balance: Decimal,
    payout_address: Option<String>,
}

/// Helper struct for the locked withdrawal row
#[derive(Debug, sqlx::FromRow)]
struct WithdrawalRow {
    id: Uuid,
    therapist_id: Uuid,
    amount: Decimal,
    payout_address: String,
    status: String,
    created_at: chrono::DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn service() -> WalletService {
        WalletService::new(
            PgPool::connect_lazy("postgresql://localhost/therapay").unwrap(),
            dec!(1.00),
        )
    }

    #[tokio::test]
    async fn test_top_up_rejects_non_positive_amount() {
        let wallet = service();
        let result = wallet.top_up(Uuid::new_v4(), dec!(0), None).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));

        let result = wallet.top_up(Uuid::new_v4(), dec!(-5.00), None).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_withdrawal_rejects_amount_below_minimum() {
        let wallet = service();
        let result = wallet.request_withdrawal(Uuid::new_v4(), dec!(0.50)).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
