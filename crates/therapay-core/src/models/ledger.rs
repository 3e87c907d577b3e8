//! Ledger entry model
//!
//! Append-only, balance-affecting accounting records with before/after
//! snapshots. Entries are written in the same transaction as the balance
//! mutation they describe and are never mutated afterwards.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Ledger entry kind enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    /// Client buys credits
    CreditPurchase,
    /// Client pays for a completed call
    CallDebit,
    /// Therapist earns from a completed call
    CallCredit,
    /// Therapist requests a payout (earning balance locked)
    WithdrawalRequest,
    /// Payout successful
    WithdrawalProcessed,
    /// Payout failed, locked amount refunded
    WithdrawalRejected,
}

impl fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerKind::CreditPurchase => write!(f, "credit_purchase"),
            LedgerKind::CallDebit => write!(f, "call_debit"),
            LedgerKind::CallCredit => write!(f, "call_credit"),
            LedgerKind::WithdrawalRequest => write!(f, "withdrawal_request"),
            LedgerKind::WithdrawalProcessed => write!(f, "withdrawal_processed"),
            LedgerKind::WithdrawalRejected => write!(f, "withdrawal_rejected"),
        }
    }
}

impl LedgerKind {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "credit_purchase" => Some(LedgerKind::CreditPurchase),
            "call_debit" => Some(LedgerKind::CallDebit),
            "call_credit" => Some(LedgerKind::CallCredit),
            "withdrawal_request" => Some(LedgerKind::WithdrawalRequest),
            "withdrawal_processed" => Some(LedgerKind::WithdrawalProcessed),
            "withdrawal_rejected" => Some(LedgerKind::WithdrawalRejected),
            _ => None,
        }
    }

    /// Which balance this kind affects
    pub fn affects_earning_balance(&self) -> bool {
        matches!(
            self,
            LedgerKind::CallCredit
                | LedgerKind::WithdrawalRequest
                | LedgerKind::WithdrawalProcessed
                | LedgerKind::WithdrawalRejected
        )
    }
}

/// Ledger entry entity
///
/// Invariant: `balance_after = balance_before + amount`, and `balance_after`
/// equals the user's balance field at the instant this entry was committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique identifier
    pub id: i64,

    /// User involved (client or therapist)
    pub user_id: Uuid,

    /// Entry kind
    pub kind: LedgerKind,

    /// Signed amount: positive credits the user, negative debits
    pub amount: Decimal,

    /// Optional human-readable description
    pub description: Option<String>,

    /// Link back to the call this entry settles
    pub related_call_cid: Option<String>,

    /// Link to a withdrawal request
    pub related_withdrawal_id: Option<Uuid>,

    /// Reference from an external payment provider
    pub payment_ref: Option<String>,

    /// Balance before this entry was applied
    pub balance_before: Decimal,

    /// Balance after this entry was applied
    pub balance_after: Decimal,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Check the snapshot invariant
    pub fn is_consistent(&self) -> bool {
        self.balance_after == self.balance_before + self.amount
    }
}

impl Default for LedgerEntry {
    fn default() -> Self {
        Self {
            id: 0,
            user_id: Uuid::new_v4(),
            kind: LedgerKind::CreditPurchase,
            amount: Decimal::ZERO,
            description: None,
            related_call_cid: None,
            related_withdrawal_id: None,
            payment_ref: None,
            balance_before: Decimal::ZERO,
            balance_after: Decimal::ZERO,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            LedgerKind::CreditPurchase,
            LedgerKind::CallDebit,
            LedgerKind::CallCredit,
            LedgerKind::WithdrawalRequest,
            LedgerKind::WithdrawalProcessed,
            LedgerKind::WithdrawalRejected,
        ] {
            assert_eq!(LedgerKind::from_str(&kind.to_string()), Some(kind));
        }
        assert_eq!(LedgerKind::from_str("refund"), None);
    }

    #[test]
    fn test_balance_affected() {
        assert!(!LedgerKind::CreditPurchase.affects_earning_balance());
        assert!(!LedgerKind::CallDebit.affects_earning_balance());
        assert!(LedgerKind::CallCredit.affects_earning_balance());
        assert!(LedgerKind::WithdrawalRejected.affects_earning_balance());
    }

    #[test]
    fn test_snapshot_invariant() {
        let entry = LedgerEntry {
            amount: dec!(-25.00),
            balance_before: dec!(100.00),
            balance_after: dec!(75.00),
            ..Default::default()
        };
        assert!(entry.is_consistent());

        let broken = LedgerEntry {
            amount: dec!(-25.00),
            balance_before: dec!(100.00),
            balance_after: dec!(80.00),
            ..Default::default()
        };
        assert!(!broken.is_consistent());
    }
}
