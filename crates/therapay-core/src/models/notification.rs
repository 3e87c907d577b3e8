//! Pending call-invite model
//!
//! Ephemeral ringing-UX payload staged per therapist while a client waits for
//! pickup. Never persisted; each entry carries an absolute expiry.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Call mode enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CallMode {
    #[default]
    Audio,
    Video,
}

impl fmt::Display for CallMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallMode::Audio => write!(f, "audio"),
            CallMode::Video => write!(f, "video"),
        }
    }
}

/// Staged call invite
///
/// At most one exists per therapist; a newer invite supersedes the old one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingInvite {
    /// Invite identifier, unique per staging (used for supersession-safe clears)
    pub id: String,

    /// Composite platform call identifier
    pub call_cid: String,

    /// Audio or video
    pub call_mode: CallMode,

    /// Display name of the calling client
    pub caller_name: String,

    /// Caller's platform identifier
    pub caller_platform_id: String,

    /// Target therapist's platform identifier
    pub therapist_platform_id: String,

    /// Rate the client agreed to
    pub rate_per_minute: Decimal,

    /// When the invite was staged
    pub staged_at: DateTime<Utc>,

    /// Absolute expiry; readers treat entries past this instant as absent
    pub expires_at: DateTime<Utc>,
}

impl PendingInvite {
    /// Check whether the invite has expired at the given instant
    #[inline]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn invite(expires_at: DateTime<Utc>) -> PendingInvite {
        PendingInvite {
            id: "call-1_1700000000".to_string(),
            call_cid: "default:call-1".to_string(),
            call_mode: CallMode::Video,
            caller_name: "Alice".to_string(),
            caller_platform_id: "client-1".to_string(),
            therapist_platform_id: "therapist-1".to_string(),
            rate_per_minute: dec!(5.00),
            staged_at: expires_at - Duration::seconds(30),
            expires_at,
        }
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let staged = invite(now);

        assert!(staged.is_expired_at(now));
        assert!(!staged.is_expired_at(now - Duration::seconds(1)));
    }
}
