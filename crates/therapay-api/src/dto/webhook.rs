//! Webhook acknowledgement DTO

use serde::Serialize;
use therapay_services::EventOutcome;

/// Body returned to the platform for every accepted webhook
///
/// The platform only cares about the status code; the body exists for
/// operators reading delivery logs.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl WebhookAck {
    /// Event was structurally valid but could not be normalized or mapped
    pub fn dropped(detail: impl Into<String>) -> Self {
        Self {
            outcome: "dropped",
            detail: Some(detail.into()),
        }
    }

    /// Event went through the lifecycle engine
    pub fn from_outcome(outcome: &EventOutcome) -> Self {
        match outcome {
            EventOutcome::Created => Self {
                outcome: "created",
                detail: None,
            },
            EventOutcome::Activated => Self {
                outcome: "activated",
                detail: None,
            },
            EventOutcome::Completed {
                duration_minutes, ..
            } => Self {
                outcome: "completed",
                detail: Some(format!("{} billable minute(s)", duration_minutes)),
            },
            EventOutcome::Failed => Self {
                outcome: "failed",
                detail: None,
            },
            EventOutcome::Skipped(reason) => Self {
                outcome: "skipped",
                detail: Some((*reason).to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use therapay_services::ReconcileOutcome;

    #[test]
    fn test_ack_labels() {
        assert_eq!(WebhookAck::from_outcome(&EventOutcome::Created).outcome, "created");
        assert_eq!(
            WebhookAck::from_outcome(&EventOutcome::Skipped("already finalized")).detail,
            Some("already finalized".to_string())
        );

        let ack = WebhookAck::from_outcome(&EventOutcome::Completed {
            duration_minutes: 3,
            reconciliation: ReconcileOutcome::AlreadyReconciled,
        });
        assert_eq!(ack.outcome, "completed");
        assert_eq!(ack.detail, Some("3 billable minute(s)".to_string()));
    }
}
