//! Call history DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use therapay_core::models::CallRecord;
use uuid::Uuid;

/// One call in a user's history listing
#[derive(Debug, Clone, Serialize)]
pub struct CallHistoryItem {
    pub id: i64,
    pub call_cid: String,
    pub client_id: Uuid,
    pub therapist_id: Uuid,
    pub status: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub rate_per_minute: Option<Decimal>,
    pub client_debited: Option<Decimal>,
    pub therapist_credited: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl From<CallRecord> for CallHistoryItem {
    fn from(record: CallRecord) -> Self {
        Self {
            id: record.id,
            call_cid: record.call_cid,
            client_id: record.client_id,
            therapist_id: record.therapist_id,
            status: record.status.to_string(),
            start_time: record.start_time,
            end_time: record.end_time,
            duration_minutes: record.duration_minutes,
            rate_per_minute: record.rate_per_minute,
            client_debited: record.client_debited,
            therapist_credited: record.therapist_credited,
            created_at: record.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use therapay_core::models::CallStatus;

    #[test]
    fn test_history_item_from_record() {
        let record = CallRecord {
            call_cid: "default:abc".to_string(),
            status: CallStatus::Completed,
            duration_minutes: Some(3),
            client_debited: Some(dec!(15.00)),
            ..Default::default()
        };

        let item = CallHistoryItem::from(record);
        assert_eq!(item.call_cid, "default:abc");
        assert_eq!(item.status, "completed");
        assert_eq!(item.client_debited, Some(dec!(15.00)));
    }
}
