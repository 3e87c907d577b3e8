//! Raw webhook payload types
//!
//! Mirrors the platform's JSON shapes loosely: every field the engine does
//! not strictly require is optional, because the platform omits nested
//! objects on some event types and adds fields without notice.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Top-level webhook payload
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlatformEvent {
    /// Event type discriminator, e.g. "call.session_started"
    #[serde(rename = "type")]
    pub event_type: String,

    /// Composite call identifier ("<type>:<id>"); present on most events
    pub call_cid: Option<String>,

    /// When the platform emitted the event
    pub created_at: Option<DateTime<Utc>>,

    /// Nested call object; absent on participant events
    pub call: Option<RawCall>,

    /// Top-level members list (creation events)
    #[serde(default)]
    pub members: Vec<RawMember>,

    /// Participant join/leave details
    pub participant: Option<RawParticipant>,

    /// Acting user (accept/reject events)
    pub user: Option<RawUser>,
}

/// Nested call object
#[derive(Debug, Clone, Deserialize)]
pub struct RawCall {
    /// Call type component of the cid
    #[serde(rename = "type")]
    pub call_type: Option<String>,

    /// Call id component of the cid
    pub id: Option<String>,

    /// App-defined custom fields set at call creation
    pub custom: Option<RawCustom>,

    /// Live session state
    pub session: Option<RawSession>,

    /// When the call ended (end events only)
    pub ended_at: Option<DateTime<Utc>>,

    /// Members list nested under the call object
    #[serde(default)]
    pub members: Vec<RawMember>,
}

/// App-defined custom fields carried on the call object
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCustom {
    /// Platform id of the user who initiated the call
    pub caller_id: Option<String>,

    /// Platform id of the user being called
    pub receiver_id: Option<String>,
}

/// Live session state
#[derive(Debug, Clone, Deserialize)]
pub struct RawSession {
    pub started_at: Option<DateTime<Utc>>,

    /// Participants currently in the session, after the triggering change
    pub participants_count: Option<i32>,
}

/// Call member entry
#[derive(Debug, Clone, Deserialize)]
pub struct RawMember {
    pub user_id: Option<String>,
}

/// Participant details on join/leave events
#[derive(Debug, Clone, Deserialize)]
pub struct RawParticipant {
    pub user_id: Option<String>,
    pub user: Option<RawUser>,
}

impl RawParticipant {
    /// Platform user id, preferring the nested user object
    pub fn platform_user_id(&self) -> Option<String> {
        self.user
            .as_ref()
            .and_then(|u| u.id.clone())
            .or_else(|| self.user_id.clone())
    }
}

/// User object
#[derive(Debug, Clone, Deserialize)]
pub struct RawUser {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_event() {
        let json = r#"{"type": "call.ended", "call_cid": "default:abc"}"#;
        let event: RawPlatformEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type, "call.ended");
        assert_eq!(event.call_cid.as_deref(), Some("default:abc"));
        assert!(event.call.is_none());
        assert!(event.members.is_empty());
    }

    #[test]
    fn test_deserialize_participant_left() {
        let json = r#"{
            "type": "call.session_participant_left",
            "call_cid": "default:abc",
            "created_at": "2025-06-01T10:00:00Z",
            "participant": {"user": {"id": "stream-user-1"}},
            "call": {"session": {"participants_count": 1}}
        }"#;
        let event: RawPlatformEvent = serde_json::from_str(json).unwrap();
        let participant = event.participant.unwrap();
        assert_eq!(
            participant.platform_user_id().as_deref(),
            Some("stream-user-1")
        );
        let session = event.call.unwrap().session.unwrap();
        assert_eq!(session.participants_count, Some(1));
    }

    #[test]
    fn test_unknown_fields_are_tolerated() {
        let json = r#"{"type": "call.ring", "call_cid": "default:x", "egress": {"rtmp": true}}"#;
        let event: RawPlatformEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type, "call.ring");
    }
}
