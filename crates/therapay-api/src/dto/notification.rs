//! Call invite DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use therapay_core::models::{CallMode, PendingInvite};
use validator::Validate;

/// Invite staging payload sent by the caller's app
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StageInviteRequest {
    #[validate(length(min = 1))]
    pub therapist_platform_id: String,

    #[validate(length(min = 1))]
    pub caller_platform_id: String,

    #[validate(length(min = 1))]
    pub call_cid: String,

    #[serde(default)]
    pub call_mode: CallMode,

    #[validate(length(min = 1, max = 100))]
    pub caller_name: String,
}

/// Staged invite as seen by the therapist's app
#[derive(Debug, Clone, Serialize)]
pub struct InviteResponse {
    pub id: String,
    pub call_cid: String,
    pub call_mode: String,
    pub caller_name: String,
    pub caller_platform_id: String,
    pub rate_per_minute: Decimal,
    pub staged_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<PendingInvite> for InviteResponse {
    fn from(invite: PendingInvite) -> Self {
        Self {
            id: invite.id,
            call_cid: invite.call_cid,
            call_mode: invite.call_mode.to_string(),
            caller_name: invite.caller_name,
            caller_platform_id: invite.caller_platform_id,
            rate_per_minute: invite.rate_per_minute,
            staged_at: invite.staged_at,
            expires_at: invite.expires_at,
        }
    }
}

/// Result of a clear-invite request
#[derive(Debug, Clone, Serialize)]
pub struct ClearInviteResponse {
    /// False when no invite existed or a newer invite superseded the target
    pub cleared: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_request_validation() {
        let valid = StageInviteRequest {
            therapist_platform_id: "t-1".to_string(),
            caller_platform_id: "c-1".to_string(),
            call_cid: "default:abc".to_string(),
            call_mode: CallMode::Video,
            caller_name: "Alice".to_string(),
        };
        assert!(valid.validate().is_ok());

        let missing_name = StageInviteRequest {
            caller_name: String::new(),
            ..valid
        };
        assert!(missing_name.validate().is_err());
    }
}
