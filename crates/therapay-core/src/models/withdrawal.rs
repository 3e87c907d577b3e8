//! Withdrawal request model
//!
//! Therapist payout requests. Requesting a withdrawal locks the amount out of
//! the earning balance; a rejected request refunds it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Withdrawal status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    /// Requested, amount locked, awaiting processing
    #[default]
    Pending,
    /// Payout completed
    Processed,
    /// Payout failed or denied, amount refunded
    Rejected,
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WithdrawalStatus::Pending => write!(f, "pending"),
            WithdrawalStatus::Processed => write!(f, "processed"),
            WithdrawalStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl WithdrawalStatus {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(WithdrawalStatus::Pending),
            "processed" => Some(WithdrawalStatus::Processed),
            "rejected" => Some(WithdrawalStatus::Rejected),
            _ => None,
        }
    }
}

/// Withdrawal request entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    /// Unique identifier
    pub id: Uuid,

    /// Requesting therapist
    pub therapist_id: Uuid,

    /// Requested amount
    pub amount: Decimal,

    /// Payout address captured at request time
    pub payout_address: String,

    /// Request status
    pub status: WithdrawalStatus,

    /// Reason given on rejection
    pub rejection_reason: Option<String>,

    /// When the request was processed or rejected
    pub processed_at: Option<DateTime<Utc>>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl WithdrawalRequest {
    /// Create a new pending request
    pub fn new(therapist_id: Uuid, amount: Decimal, payout_address: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            therapist_id,
            amount,
            payout_address,
            status: WithdrawalStatus::Pending,
            rejection_reason: None,
            processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the request can still be processed or rejected
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.status == WithdrawalStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_round_trip() {
        assert_eq!(
            WithdrawalStatus::from_str("Processed"),
            Some(WithdrawalStatus::Processed)
        );
        assert_eq!(WithdrawalStatus::from_str("cancelled"), None);
    }

    #[test]
    fn test_new_request_is_pending() {
        let request = WithdrawalRequest::new(Uuid::new_v4(), dec!(50.00), "pay@upi".to_string());
        assert!(request.is_pending());
        assert_eq!(request.amount, dec!(50.00));
        assert!(request.processed_at.is_none());
    }
}
