//! User account model
//!
//! Represents the two participant roles brokered by the system: clients who
//! spend credits and therapists who earn them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// User role enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Client - purchases credits and pays for calls
    #[default]
    Client,
    /// Therapist - earns from completed calls
    Therapist,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Client => write!(f, "client"),
            UserRole::Therapist => write!(f, "therapist"),
        }
    }
}

impl UserRole {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "client" => Some(UserRole::Client),
            "therapist" => Some(UserRole::Therapist),
            _ => None,
        }
    }
}

/// User account entity
///
/// Holds two distinct balances: `credit_balance` is the client-side spendable
/// amount, `earning_balance` is the therapist-side earned amount. Both are
/// invariantly non-negative and are only mutated inside the same transaction
/// that appends the corresponding ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    /// Unique identifier
    pub id: Uuid,

    /// Email address (unique)
    pub email: String,

    /// Opaque identifier assigned by the communication platform (unique)
    pub platform_id: String,

    /// Account role
    pub role: UserRole,

    /// Spendable credits (clients)
    pub credit_balance: Decimal,

    /// Earned credits (therapists)
    pub earning_balance: Decimal,

    /// Whether a therapist is currently accepting calls
    pub is_available: bool,

    /// Therapist billing rate per minute
    pub rate_per_minute: Option<Decimal>,

    /// Payout address for withdrawals
    pub payout_address: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl UserAccount {
    /// Check if this account belongs to a therapist
    #[inline]
    pub fn is_therapist(&self) -> bool {
        self.role == UserRole::Therapist
    }

    /// Check if this account belongs to a client
    #[inline]
    pub fn is_client(&self) -> bool {
        self.role == UserRole::Client
    }

    /// Check if the client balance can cover a debit
    pub fn can_afford(&self, amount: Decimal) -> bool {
        self.credit_balance >= amount
    }
}

impl Default for UserAccount {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: String::new(),
            platform_id: String::new(),
            role: UserRole::Client,
            credit_balance: Decimal::ZERO,
            earning_balance: Decimal::ZERO,
            is_available: false,
            rate_per_minute: None,
            payout_address: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Slim identity record for cached platform-id lookups
///
/// Deliberately excludes balances and the billing rate so cached entries can
/// never serve stale financial data to the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIdentity {
    /// Internal user id
    pub user_id: Uuid,

    /// Account role
    pub role: UserRole,
}

impl From<&UserAccount> for ResolvedIdentity {
    fn from(user: &UserAccount) -> Self {
        Self {
            user_id: user.id,
            role: user.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_role_round_trip() {
        assert_eq!(UserRole::from_str("Therapist"), Some(UserRole::Therapist));
        assert_eq!(UserRole::from_str("client"), Some(UserRole::Client));
        assert_eq!(UserRole::from_str("admin"), None);
        assert_eq!(UserRole::Therapist.to_string(), "therapist");
    }

    #[test]
    fn test_can_afford() {
        let user = UserAccount {
            credit_balance: dec!(10.00),
            ..Default::default()
        };

        assert!(user.can_afford(dec!(10.00)));
        assert!(user.can_afford(dec!(5.00)));
        assert!(!user.can_afford(dec!(10.01)));
    }

    #[test]
    fn test_resolved_identity_excludes_rate() {
        let user = UserAccount {
            role: UserRole::Therapist,
            rate_per_minute: Some(dec!(5.00)),
            ..Default::default()
        };

        let identity = ResolvedIdentity::from(&user);
        assert_eq!(identity.user_id, user.id);
        assert_eq!(identity.role, UserRole::Therapist);
    }
}
