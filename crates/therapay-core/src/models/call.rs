//! Call record model
//!
//! The authoritative internal representation of one consultation's lifecycle
//! and billing outcome, derived from the platform's webhook event feed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Call status enumeration
///
/// Status only moves forward along Initiated -> Active -> {Completed, Failed}.
/// Completed and Failed are terminal: at most one terminal transition ever
/// executes per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    /// Record created from a creation/ring event, session not yet started
    #[default]
    Initiated,
    /// Session started, participants connected
    Active,
    /// Call finished normally; billing applies
    Completed,
    /// Call rejected or missed; zero duration, nothing billed
    Failed,
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallStatus::Initiated => write!(f, "initiated"),
            CallStatus::Active => write!(f, "active"),
            CallStatus::Completed => write!(f, "completed"),
            CallStatus::Failed => write!(f, "failed"),
        }
    }
}

impl CallStatus {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "initiated" => Some(CallStatus::Initiated),
            "active" => Some(CallStatus::Active),
            "completed" => Some(CallStatus::Completed),
            "failed" => Some(CallStatus::Failed),
            _ => None,
        }
    }

    /// Check if no further status change is permitted
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallStatus::Completed | CallStatus::Failed)
    }
}

/// Call record entity
///
/// Created on the first event referencing an unknown call cid whose
/// participant roles both resolve. Mutated only by the call lifecycle engine,
/// never deleted (audit trail).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    /// Unique identifier
    pub id: i64,

    /// Composite platform call identifier (`"<type>:<id>"`, unique, immutable)
    pub call_cid: String,

    /// Client participant (immutable once set)
    pub client_id: Uuid,

    /// Therapist participant (immutable once set)
    pub therapist_id: Uuid,

    /// Current lifecycle status
    pub status: CallStatus,

    /// Session start timestamp (set exactly once)
    pub start_time: Option<DateTime<Utc>>,

    /// Session end timestamp (set exactly once; >= start_time when both present)
    pub end_time: Option<DateTime<Utc>>,

    /// Billable duration, ceiling of elapsed seconds / 60, never negative
    pub duration_minutes: Option<i32>,

    /// Rate snapshot taken at reconciliation time
    ///
    /// Never read live from the therapist profile after reconciliation, so
    /// later rate changes cannot corrupt historical billing.
    pub rate_per_minute: Option<Decimal>,

    /// Amount debited from the client; present iff reconciliation ran
    pub client_debited: Option<Decimal>,

    /// Amount credited to the therapist; present iff reconciliation ran
    pub therapist_credited: Option<Decimal>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl CallRecord {
    /// Check whether billing reconciliation already ran for this record
    #[inline]
    pub fn is_reconciled(&self) -> bool {
        self.client_debited.is_some()
    }

    /// Check whether the record completed without its billing marks
    ///
    /// Happens when reconciliation failed transiently after the completion
    /// committed; the redelivered terminal event re-enters the reconciler.
    #[inline]
    pub fn needs_reconciliation(&self) -> bool {
        self.status == CallStatus::Completed && !self.is_reconciled()
    }

    /// Billable minutes between two timestamps
    ///
    /// Ceiling of elapsed seconds / 60, floored at 0. A missing start time
    /// yields 0: duration is never inferred from elsewhere.
    pub fn billable_minutes(start: Option<DateTime<Utc>>, end: DateTime<Utc>) -> i32 {
        let Some(start) = start else {
            return 0;
        };

        let elapsed_secs = (end - start).num_seconds();
        if elapsed_secs <= 0 {
            return 0;
        }

        ((elapsed_secs + 59) / 60) as i32
    }
}

impl Default for CallRecord {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            call_cid: String::new(),
            client_id: Uuid::new_v4(),
            therapist_id: Uuid::new_v4(),
            status: CallStatus::Initiated,
            start_time: None,
            end_time: None,
            duration_minutes: None,
            rate_per_minute: None,
            client_debited: None,
            therapist_credited: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_status_round_trip() {
        assert_eq!(CallStatus::from_str("ACTIVE"), Some(CallStatus::Active));
        assert_eq!(CallStatus::from_str("completed"), Some(CallStatus::Completed));
        assert_eq!(CallStatus::from_str("ringing"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!CallStatus::Initiated.is_terminal());
        assert!(!CallStatus::Active.is_terminal());
        assert!(CallStatus::Completed.is_terminal());
        assert!(CallStatus::Failed.is_terminal());
    }

    #[test]
    fn test_billable_minutes_ceiling() {
        let start = Utc::now();

        // 61 seconds rounds up to 2 minutes
        let end = start + Duration::seconds(61);
        assert_eq!(CallRecord::billable_minutes(Some(start), end), 2);

        // Exactly 60 seconds is 1 minute
        let end = start + Duration::seconds(60);
        assert_eq!(CallRecord::billable_minutes(Some(start), end), 1);

        // A one second call still bills a full minute
        let end = start + Duration::seconds(1);
        assert_eq!(CallRecord::billable_minutes(Some(start), end), 1);
    }

    #[test]
    fn test_billable_minutes_never_negative() {
        let start = Utc::now();

        // Out-of-order timestamps floor at zero
        let end = start - Duration::seconds(30);
        assert_eq!(CallRecord::billable_minutes(Some(start), end), 0);

        // Missing start time yields zero
        assert_eq!(CallRecord::billable_minutes(None, start), 0);
    }

    #[test]
    fn test_is_reconciled() {
        let mut record = CallRecord::default();
        assert!(!record.is_reconciled());

        record.client_debited = Some(rust_decimal_macros::dec!(25.00));
        assert!(record.is_reconciled());
    }

    #[test]
    fn test_needs_reconciliation_only_for_unsettled_completions() {
        let mut record = CallRecord {
            status: CallStatus::Completed,
            ..CallRecord::default()
        };
        assert!(record.needs_reconciliation());

        record.client_debited = Some(rust_decimal_macros::dec!(0));
        assert!(!record.needs_reconciliation());

        let failed = CallRecord {
            status: CallStatus::Failed,
            ..CallRecord::default()
        };
        assert!(!failed.needs_reconciliation());
    }
}
