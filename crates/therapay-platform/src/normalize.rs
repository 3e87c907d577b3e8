//! Webhook event normalization
//!
//! Turns raw platform payloads into [`NormalizedEvent`]s. The platform is
//! inconsistent about where call identifiers live: creation and end events
//! carry a nested call object, participant events often carry only the
//! composite `call_cid`. The normalizer reconciles both sources so downstream
//! logic never touches raw JSON.

use chrono::Utc;
use therapay_core::models::{CustomParticipants, EventKind, NormalizedEvent};
use therapay_core::{AppError, AppResult};
use tracing::{debug, warn};

use crate::event::RawPlatformEvent;

/// Normalize a raw platform event
///
/// Fails with [`AppError::MissingField`] when no usable call identifiers can
/// be recovered; callers acknowledge such events without acting on them.
pub fn normalize_event(raw: &RawPlatformEvent) -> AppResult<NormalizedEvent> {
    let (call_cid, call_type, call_id) = extract_identifiers(raw)?;

    let occurred_at = raw.created_at.unwrap_or_else(Utc::now);

    let kind = match raw.event_type.as_str() {
        "call.created" | "call.ring" => {
            let custom = raw
                .call
                .as_ref()
                .and_then(|c| c.custom.clone())
                .unwrap_or_default();

            // Creation events carry members either at the top level or
            // nested under the call object.
            let members = if !raw.members.is_empty() {
                &raw.members
            } else if let Some(call) = raw.call.as_ref() {
                &call.members
            } else {
                &raw.members
            };

            EventKind::Created {
                custom: CustomParticipants {
                    caller_platform_id: custom.caller_id,
                    receiver_platform_id: custom.receiver_id,
                },
                member_platform_ids: members
                    .iter()
                    .filter_map(|m| m.user_id.clone())
                    .collect(),
            }
        }

        "call.session_started" => EventKind::SessionStarted {
            started_at: raw
                .call
                .as_ref()
                .and_then(|c| c.session.as_ref())
                .and_then(|s| s.started_at),
        },

        "call.session_participant_joined" => EventKind::ParticipantJoined {
            platform_user_id: raw
                .participant
                .as_ref()
                .and_then(|p| p.platform_user_id()),
        },

        "call.session_participant_left" => EventKind::ParticipantLeft {
            platform_user_id: raw
                .participant
                .as_ref()
                .and_then(|p| p.platform_user_id()),
            participants_remaining: raw
                .call
                .as_ref()
                .and_then(|c| c.session.as_ref())
                .and_then(|s| s.participants_count),
        },

        "call.ended" => EventKind::Ended {
            ended_at: raw.call.as_ref().and_then(|c| c.ended_at),
        },

        "call.rejected" | "call.missed" => EventKind::Rejected {
            reason: Some(raw.event_type.clone()),
        },

        "call.accepted" => EventKind::Accepted {
            platform_user_id: raw.user.as_ref().and_then(|u| u.id.clone()),
        },

        other => {
            debug!("Ignoring platform event type: {}", other);
            EventKind::Ignored {
                event_type: other.to_string(),
            }
        }
    };

    Ok(NormalizedEvent {
        call_cid,
        call_type,
        call_id,
        occurred_at,
        kind,
    })
}

/// Recover (cid, type, id), preferring the nested call object and falling
/// back to splitting the composite cid.
fn extract_identifiers(raw: &RawPlatformEvent) -> AppResult<(String, String, String)> {
    let from_call = raw.call.as_ref().and_then(|c| {
        match (c.call_type.as_deref(), c.id.as_deref()) {
            (Some(t), Some(i)) if !t.is_empty() && !i.is_empty() => {
                Some((t.to_string(), i.to_string()))
            }
            _ => None,
        }
    });

    if let Some((call_type, call_id)) = from_call {
        let call_cid = raw
            .call_cid
            .clone()
            .unwrap_or_else(|| format!("{}:{}", call_type, call_id));
        return Ok((call_cid, call_type, call_id));
    }

    if let Some(cid) = raw.call_cid.as_deref() {
        let parts: Vec<&str> = cid.split(':').collect();
        if parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty() {
            debug!(
                "Parsed call identifiers from cid '{}' for event type {}",
                cid, raw.event_type
            );
            return Ok((cid.to_string(), parts[0].to_string(), parts[1].to_string()));
        }
        warn!(
            "Could not parse call type and id from cid '{}' for event type {}",
            cid, raw.event_type
        );
    } else {
        warn!(
            "Event '{}' carries no call identifiers at all",
            raw.event_type
        );
    }

    Err(AppError::MissingField("call identifiers".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn parse(json: &str) -> RawPlatformEvent {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_identifiers_from_call_object() {
        let raw = parse(
            r#"{"type": "call.created", "call": {"type": "default", "id": "abc-123"}}"#,
        );
        let event = normalize_event(&raw).unwrap();
        assert_eq!(event.call_cid, "default:abc-123");
        assert_eq!(event.call_type, "default");
        assert_eq!(event.call_id, "abc-123");
    }

    #[test]
    fn test_identifiers_from_cid_fallback() {
        let raw = parse(
            r#"{"type": "call.session_participant_left", "call_cid": "default:abc-123"}"#,
        );
        let event = normalize_event(&raw).unwrap();
        assert_eq!(event.call_type, "default");
        assert_eq!(event.call_id, "abc-123");
    }

    #[test]
    fn test_unparseable_cid_is_rejected() {
        let raw = parse(r#"{"type": "call.ended", "call_cid": "no-separator"}"#);
        assert!(normalize_event(&raw).is_err());

        let raw = parse(r#"{"type": "call.ended", "call_cid": ":dangling"}"#);
        assert!(normalize_event(&raw).is_err());

        let raw = parse(r#"{"type": "call.ended"}"#);
        assert!(normalize_event(&raw).is_err());
    }

    #[test]
    fn test_cid_with_extra_separator_is_rejected() {
        let raw = parse(r#"{"type": "call.ended", "call_cid": "default:a:b"}"#);
        assert!(normalize_event(&raw).is_err());
    }

    #[test]
    fn test_created_collects_custom_and_members() {
        let raw = parse(
            r#"{
                "type": "call.ring",
                "call_cid": "default:abc",
                "call": {
                    "type": "default",
                    "id": "abc",
                    "custom": {"caller_id": "c-1", "receiver_id": "t-1"},
                    "members": [{"user_id": "c-1"}, {"user_id": "t-1"}]
                }
            }"#,
        );
        let event = normalize_event(&raw).unwrap();
        match event.kind {
            EventKind::Created {
                custom,
                member_platform_ids,
            } => {
                assert_eq!(custom.caller_platform_id.as_deref(), Some("c-1"));
                assert_eq!(custom.receiver_platform_id.as_deref(), Some("t-1"));
                assert_eq!(member_platform_ids, vec!["c-1", "t-1"]);
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_participant_left_remaining_count() {
        let raw = parse(
            r#"{
                "type": "call.session_participant_left",
                "call_cid": "default:abc",
                "participant": {"user": {"id": "t-1"}},
                "call": {"session": {"participants_count": 1}}
            }"#,
        );
        let event = normalize_event(&raw).unwrap();
        match event.kind {
            EventKind::ParticipantLeft {
                platform_user_id,
                participants_remaining,
            } => {
                assert_eq!(platform_user_id.as_deref(), Some("t-1"));
                assert_eq!(participants_remaining, Some(1));
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_participant_left_missing_count_stays_unknown() {
        let raw = parse(
            r#"{"type": "call.session_participant_left", "call_cid": "default:abc"}"#,
        );
        let event = normalize_event(&raw).unwrap();
        match event.kind {
            EventKind::ParticipantLeft {
                participants_remaining,
                ..
            } => assert_eq!(participants_remaining, None),
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_missed_maps_to_rejected() {
        let raw = parse(r#"{"type": "call.missed", "call_cid": "default:abc"}"#);
        let event = normalize_event(&raw).unwrap();
        assert!(matches!(event.kind, EventKind::Rejected { .. }));
    }

    #[test]
    fn test_unknown_event_type_is_ignored_kind() {
        let raw = parse(r#"{"type": "call.recording_ready", "call_cid": "default:abc"}"#);
        let event = normalize_event(&raw).unwrap();
        match event.kind {
            EventKind::Ignored { event_type } => {
                assert_eq!(event_type, "call.recording_ready");
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_occurred_at_prefers_payload_timestamp() {
        let raw = parse(
            r#"{"type": "call.ended", "call_cid": "default:abc", "created_at": "2025-06-01T10:00:00Z"}"#,
        );
        let event = normalize_event(&raw).unwrap();
        let expected: DateTime<Utc> = "2025-06-01T10:00:00Z".parse().unwrap();
        assert_eq!(event.occurred_at, expected);
    }
}
