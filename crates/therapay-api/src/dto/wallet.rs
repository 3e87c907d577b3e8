//! Wallet and withdrawal DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use therapay_core::models::{LedgerEntry, WithdrawalRequest};
use uuid::Uuid;
use validator::Validate;

/// Credit purchase request
///
/// Amount bounds are enforced by the wallet service; validator's `range`
/// does not handle Decimal.
#[derive(Debug, Clone, Deserialize)]
pub struct TopUpRequest {
    pub amount: Decimal,
    pub payment_ref: Option<String>,
}

/// Result of a credit purchase
#[derive(Debug, Clone, Serialize)]
pub struct TopUpResponse {
    pub credited: Decimal,
    pub new_balance: Decimal,
}

/// One ledger entry in a listing
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntryResponse {
    pub id: i64,
    pub kind: String,
    pub amount: Decimal,
    pub description: Option<String>,
    pub related_call_cid: Option<String>,
    pub related_withdrawal_id: Option<Uuid>,
    pub payment_ref: Option<String>,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<LedgerEntry> for LedgerEntryResponse {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id,
            kind: entry.kind.to_string(),
            amount: entry.amount,
            description: entry.description,
            related_call_cid: entry.related_call_cid,
            related_withdrawal_id: entry.related_withdrawal_id,
            payment_ref: entry.payment_ref,
            balance_before: entry.balance_before,
            balance_after: entry.balance_after,
            created_at: entry.created_at,
        }
    }
}

/// Withdrawal request creation payload
#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawalCreateRequest {
    pub therapist_id: Uuid,
    pub amount: Decimal,
}

/// Withdrawal processing payload
#[derive(Debug, Clone, Deserialize, Default)]
pub struct WithdrawalProcessRequest {
    pub payment_ref: Option<String>,
}

/// Withdrawal rejection payload
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct WithdrawalRejectRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

/// Withdrawal request state
#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalResponse {
    pub id: Uuid,
    pub therapist_id: Uuid,
    pub amount: Decimal,
    pub payout_address: String,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<WithdrawalRequest> for WithdrawalResponse {
    fn from(request: WithdrawalRequest) -> Self {
        Self {
            id: request.id,
            therapist_id: request.therapist_id,
            amount: request.amount,
            payout_address: request.payout_address,
            status: request.status.to_string(),
            rejection_reason: request.rejection_reason,
            processed_at: request.processed_at,
            created_at: request.created_at,
        }
    }
}
