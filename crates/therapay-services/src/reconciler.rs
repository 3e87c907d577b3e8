//! Billing reconciler
//!
//! Settles a completed call exactly once: debits the client's credit balance,
//! credits the therapist's earning balance (minus the platform fee), writes
//! the paired ledger entries, and stamps the amounts onto the call record.
//! All of it happens in one transaction.
//!
//! The at-most-once guard is the `client_debited` column: it is NULL until
//! reconciliation commits, and the row is checked under a `FOR UPDATE` lock,
//! so concurrent completion events cannot double-bill.
//!
//! An insufficient client balance is an outcome, not an error: the call stays
//! completed with NULL billing marks, and the next replayed terminal event
//! re-enters reconciliation once the client has topped up.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use therapay_core::{
    models::{CallStatus, LedgerKind},
    AppError, AppResult,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::constants::DEFAULT_RATE_PER_MINUTE;

/// Outcome of a reconciliation attempt
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Balances moved and ledger entries written
    Applied {
        client_debited: Decimal,
        therapist_credited: Decimal,
    },
    /// A previous attempt already settled this call
    AlreadyReconciled,
    /// Zero billable minutes; marked settled with no money movement
    NothingToBill,
    /// Client cannot cover the charge; left unsettled so a later replay
    /// can retry the billing
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },
}

/// Billing reconciler
pub struct BillingReconciler {
    pool: PgPool,
    /// Percentage of the gross amount retained by the platform
    fee_percent: Decimal,
}

impl BillingReconciler {
    /// Create a new reconciler
    pub fn new(pool: PgPool, fee_percent: Decimal) -> Self {
        Self { pool, fee_percent }
    }

    /// Reconcile billing for a completed call
    ///
    /// Idempotent: safe to call any number of times for the same cid.
    #[instrument(skip(self))]
    pub async fn reconcile_call(&self, call_cid: &str) -> AppResult<ReconcileOutcome> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })?;

        // Lock the call row first; user rows are locked after, in uuid order
        let call = sqlx::query_as::<sqlx::Postgres, BillableCallRow>(
            r#"
            SELECT id, call_cid, client_id, therapist_id, status,
                   duration_minutes, rate_per_minute, client_debited
            FROM call_records
            WHERE call_cid = $1
            FOR UPDATE
            "#,
        )
        .bind(call_cid)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to lock call record {}: {}", call_cid, e);
            AppError::Database(format!("Failed to lock call record: {}", e))
        })?
        .ok_or_else(|| AppError::CallNotFound(call_cid.to_string()))?;

        if call.client_debited.is_some() {
            info!("Call {} already reconciled, skipping", call_cid);
            return Ok(ReconcileOutcome::AlreadyReconciled);
        }

        let status = CallStatus::from_str(&call.status).unwrap_or(CallStatus::Initiated);
        if status != CallStatus::Completed {
            warn!(
                "Call {} is not completed (status {}), nothing to reconcile",
                call_cid, status
            );
            return Ok(ReconcileOutcome::NothingToBill);
        }

        let duration = call.duration_minutes.unwrap_or(0);
        if duration <= 0 {
            // Mark as settled so replays stop here
            self.mark_settled(&mut tx, call.id, Decimal::ZERO, Decimal::ZERO)
                .await?;
            tx.commit().await.map_err(|e| {
                error!("Failed to commit transaction: {}", e);
                AppError::Transaction(format!("Failed to commit transaction: {}", e))
            })?;
            info!("Call {} had no billable minutes", call_cid);
            return Ok(ReconcileOutcome::NothingToBill);
        }

        // Deterministic lock order on user rows prevents deadlocks between
        // concurrent reconciliations sharing a participant
        let (first, second) = if call.client_id <= call.therapist_id {
            (call.client_id, call.therapist_id)
        } else {
            (call.therapist_id, call.client_id)
        };
        let first_row = Self::lock_user(&mut tx, first).await?;
        let second_row = Self::lock_user(&mut tx, second).await?;
        let (client, therapist) = if first_row.id == call.client_id {
            (first_row, second_row)
        } else {
            (second_row, first_row)
        };

        let rate = call
            .rate_per_minute
            .or(therapist.rate_per_minute)
            .unwrap_or(DEFAULT_RATE_PER_MINUTE);

        let gross = rate * Decimal::from(duration);
        let fee = (gross * self.fee_percent / Decimal::ONE_HUNDRED).round_dp(2);
        let net = gross - fee;

        if client.credit_balance < gross {
            error!(
                "Insufficient balance reconciling call {}: required {}, available {}",
                call_cid, gross, client.credit_balance
            );
            return Ok(ReconcileOutcome::InsufficientBalance {
                required: gross,
                available: client.credit_balance,
            });
        }

        // Debit the client
        sqlx::query(
            r#"
            UPDATE users
            SET credit_balance = credit_balance - $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(client.id)
        .bind(gross)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to debit client {}: {}", client.id, e);
            AppError::Database(format!("Failed to debit client: {}", e))
        })?;

        Self::insert_ledger_entry(
            &mut tx,
            client.id,
            LedgerKind::CallDebit,
            -gross,
            call_cid,
            client.credit_balance,
            format!("Call charge: {} minute(s) at {}/min", duration, rate),
        )
        .await?;

        // Credit the therapist
        sqlx::query(
            r#"
            UPDATE users
            SET earning_balance = earning_balance + $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(therapist.id)
        .bind(net)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to credit therapist {}: {}", therapist.id, e);
            AppError::Database(format!("Failed to credit therapist: {}", e))
        })?;

        Self::insert_ledger_entry(
            &mut tx,
            therapist.id,
            LedgerKind::CallCredit,
            net,
            call_cid,
            therapist.earning_balance,
            format!("Call earnings: {} minute(s) at {}/min", duration, rate),
        )
        .await?;

        self.mark_settled(&mut tx, call.id, gross, net).await?;

        tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })?;

        info!(
            "Reconciled call {}: debited {} from client, credited {} to therapist (fee {})",
            call_cid, gross, net, fee
        );

        Ok(ReconcileOutcome::Applied {
            client_debited: gross,
            therapist_credited: net,
        })
    }

    /// Compute the gross/net split for a charge
    ///
    /// Exposed for verification; the fee is rounded to cents before the net
    /// is derived, so gross always equals fee + net exactly.
    pub fn split_amount(&self, rate: Decimal, minutes: i32) -> (Decimal, Decimal, Decimal) {
        let gross = rate * Decimal::from(minutes);
        let fee = (gross * self.fee_percent / Decimal::ONE_HUNDRED).round_dp(2);
        (gross, fee, gross - fee)
    }

    async fn lock_user(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
    ) -> AppResult<BillableUserRow> {
        sqlx::query_as::<sqlx::Postgres, BillableUserRow>(
            r#"
            SELECT id, credit_balance, earning_balance, rate_per_minute
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

    async fn insert_ledger_entry(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        kind: LedgerKind,
        amount: Decimal,
        call_cid: &str,
        balance_before: Decimal,
        description: String,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ledger_entries (
                user_id, kind, amount, description,
                related_call_cid, balance_before, balance_after
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user_id)
        .bind(kind.to_string())
        .bind(amount)
        .bind(description)
        .bind(call_cid)
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

    async fn mark_settled(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        call_id: i64,
        client_debited: Decimal,
        therapist_credited: Decimal,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE call_records
            SET client_debited = $2,
                therapist_credited = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(call_id)
        .bind(client_debited)
        .bind(therapist_credited)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            error!("Failed to mark call {} settled: {}", call_id, e);
            AppError::Database(format!("Failed to mark call settled: {}", e))
        })?;

        Ok(())
    }
}

/// Helper struct for the locked call row
#[derive(Debug, sqlx::FromRow)]
struct BillableCallRow {
    id: i64,
    #[allow(dead_code)]
    call_cid: String,
    client_id: Uuid,
    therapist_id: Uuid,
    status: String,
    duration_minutes: Option<i32>,
    rate_per_minute: Option<Decimal>,
    client_debited: Option<Decimal>,
}

/// Helper struct for the locked user rows
#[derive(Debug, sqlx::FromRow)]
struct BillableUserRow {
    id: Uuid,
    credit_balance: Decimal,
    earning_balance: Decimal,
    rate_per_minute: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn reconciler(fee_percent: Decimal) -> BillingReconciler {
        // Pool is only needed for database paths; split_amount is pure
        BillingReconciler {
            pool: PgPool::connect_lazy("postgresql://localhost/therapay").unwrap(),
            fee_percent,
        }
    }

    #[tokio::test]
    async fn test_split_without_fee() {
        let r = reconciler(Decimal::ZERO);
        let (gross, fee, net) = r.split_amount(dec!(5.00), 3);
        assert_eq!(gross, dec!(15.00));
        assert_eq!(fee, dec!(0.00));
        assert_eq!(net, dec!(15.00));
    }

    #[tokio::test]
    async fn test_split_with_fee() {
        let r = reconciler(dec!(20));
        let (gross, fee, net) = r.split_amount(dec!(5.00), 4);
        assert_eq!(gross, dec!(20.00));
        assert_eq!(fee, dec!(4.00));
        assert_eq!(net, dec!(16.00));
    }

    #[tokio::test]
    async fn test_split_rounds_fee_to_cents() {
        let r = reconciler(dec!(7.5));
        let (gross, fee, net) = r.split_amount(dec!(3.33), 1);
        assert_eq!(gross, dec!(3.33));
        assert_eq!(fee, dec!(0.25)); // 0.24975 rounds to 0.25
        assert_eq!(net, gross - fee);
    }
}
