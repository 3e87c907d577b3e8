//! Normalized platform event
//!
//! The canonical internal event type produced by the platform-boundary
//! normalizer. Downstream logic branches on this, never on the raw payload
//! shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Explicit caller/receiver identifiers carried in a creation event's custom
/// fields. Either side may be either role; the identity resolver checks both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomParticipants {
    pub caller_platform_id: Option<String>,
    pub receiver_platform_id: Option<String>,
}

impl CustomParticipants {
    /// Whether both explicit identifiers are present
    pub fn is_complete(&self) -> bool {
        self.caller_platform_id.is_some() && self.receiver_platform_id.is_some()
    }
}

/// Normalized event kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventKind {
    /// Call created or ringing; may create a call record
    Created {
        custom: CustomParticipants,
        member_platform_ids: Vec<String>,
    },

    /// Session started; activates the record
    SessionStarted { started_at: Option<DateTime<Utc>> },

    /// A participant joined; observability only
    ParticipantJoined { platform_user_id: Option<String> },

    /// A participant left; may end a two-party call
    ParticipantLeft {
        platform_user_id: Option<String>,
        /// Opportunistic remaining-participants count; absent when the
        /// platform omitted it, in which case the call is treated as
        /// continuing.
        participants_remaining: Option<i32>,
    },

    /// Call ended on the platform side
    Ended { ended_at: Option<DateTime<Utc>> },

    /// Call rejected or missed; fails the record
    Rejected { reason: Option<String> },

    /// Call accepted; observability only
    Accepted { platform_user_id: Option<String> },

    /// Recognized payload but an event type this engine does not act on
    Ignored { event_type: String },
}

/// Normalized platform event
///
/// Carries the canonical call identifiers extracted by the normalizer plus
/// the event timestamp used as a fallback for start/end times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Composite call identifier (`"<type>:<id>"`)
    pub call_cid: String,

    /// Call type component
    pub call_type: String,

    /// Call id component
    pub call_id: String,

    /// When the platform says the event occurred
    pub occurred_at: DateTime<Utc>,

    /// What happened
    pub kind: EventKind,
}

impl NormalizedEvent {
    /// Short label for logging
    pub fn kind_label(&self) -> &'static str {
        match self.kind {
            EventKind::Created { .. } => "created",
            EventKind::SessionStarted { .. } => "session_started",
            EventKind::ParticipantJoined { .. } => "participant_joined",
            EventKind::ParticipantLeft { .. } => "participant_left",
            EventKind::Ended { .. } => "ended",
            EventKind::Rejected { .. } => "rejected",
            EventKind::Accepted { .. } => "accepted",
            EventKind::Ignored { .. } => "ignored",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_participants_completeness() {
        let both = CustomParticipants {
            caller_platform_id: Some("a".to_string()),
            receiver_platform_id: Some("b".to_string()),
        };
        assert!(both.is_complete());

        let one = CustomParticipants {
            caller_platform_id: Some("a".to_string()),
            receiver_platform_id: None,
        };
        assert!(!one.is_complete());
    }

    #[test]
    fn test_kind_label() {
        let event = NormalizedEvent {
            call_cid: "default:abc".to_string(),
            call_type: "default".to_string(),
            call_id: "abc".to_string(),
            occurred_at: Utc::now(),
            kind: EventKind::Ended { ended_at: None },
        };
        assert_eq!(event.kind_label(), "ended");
    }
}
