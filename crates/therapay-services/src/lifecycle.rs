//! Call lifecycle service
//!
//! Drives the idempotent call state machine from normalized platform events:
//!
//! - `call.created` / `call.ring` create the record (once)
//! - `call.session_started` activates it and pins the start time
//! - `call.session_participant_left` ends a two-party call early
//! - `call.ended` finalizes whatever state the record is in
//! - `call.rejected` / `call.missed` fail it
//!
//! Transition planning is a pure function over (current record, event) so the
//! state table can be tested without a database. Applying a plan happens in a
//! transaction that re-checks the state under a row lock, so replayed or
//! out-of-order webhooks collapse into no-ops.
//!
//! One replay is not a no-op: a terminal event landing on a completed record
//! whose billing marks are missing re-enters the reconciler. That is the
//! recovery path when reconciliation failed transiently, the webhook 500ed,
//! and the platform redelivered the event.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use therapay_core::{
    models::{CallRecord, CallStatus, EventKind, NormalizedEvent},
    traits::{CacheService, CallControl, UserRepository},
    AppError, AppResult,
};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::identity::IdentityResolver;
use crate::reconciler::{BillingReconciler, ReconcileOutcome};

/// What an event should do to the call record
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionPlan {
    /// Insert a fresh record in `Initiated`
    Create,
    /// Move `Initiated` -> `Active`, pinning the start time
    Activate { start_time: DateTime<Utc> },
    /// Move to `Completed`; `teardown` asks the platform to delete the call
    Complete {
        end_time: DateTime<Utc>,
        teardown: bool,
    },
    /// Move to `Failed` (rejected or missed before completion)
    Fail { end_time: DateTime<Utc> },
    /// Record is `Completed` but its billing marks are missing; re-enter the
    /// reconciler (a transient failure 500ed the earlier delivery)
    Reconcile,
    /// Nothing to do; the reason is logged
    Noop(&'static str),
}

/// Result of handling one event
#[derive(Debug)]
pub enum EventOutcome {
    Created,
    Activated,
    Completed {
        duration_minutes: i32,
        reconciliation: ReconcileOutcome,
    },
    Failed,
    Skipped(&'static str),
}

/// Decide the transition for an event given the current record state
///
/// Pure: consults nothing but its arguments. Duplicate and out-of-order
/// events fall out as `Noop`.
pub fn plan_transition(
    existing: Option<&CallRecord>,
    event: &NormalizedEvent,
) -> TransitionPlan {
    match &event.kind {
        EventKind::Created { .. } => match existing {
            None => TransitionPlan::Create,
            Some(_) => TransitionPlan::Noop("record already exists"),
        },

        EventKind::SessionStarted { started_at } => match existing {
            None => TransitionPlan::Noop("no record for session start"),
            Some(record) if record.status == CallStatus::Initiated => TransitionPlan::Activate {
                start_time: started_at.unwrap_or(event.occurred_at),
            },
            Some(_) => TransitionPlan::Noop("not in initiated state"),
        },

        EventKind::ParticipantLeft {
            participants_remaining,
            ..
        } => match existing {
            None => TransitionPlan::Noop("no record for participant left"),
            Some(record) if record.needs_reconciliation() => TransitionPlan::Reconcile,
            Some(record) if record.status != CallStatus::Active => {
                TransitionPlan::Noop("call not active")
            }
            // A missing count means the platform saw the session as already
            // empty; treat it as zero so the call ends and tears down.
            Some(_) if participants_remaining.unwrap_or(0) > 1 => {
                TransitionPlan::Noop("call continues")
            }
            Some(_) => TransitionPlan::Complete {
                end_time: event.occurred_at,
                teardown: true,
            },
        },

        EventKind::Ended { ended_at } => match existing {
            None => TransitionPlan::Noop("no record for call end"),
            Some(record) if record.needs_reconciliation() => TransitionPlan::Reconcile,
            Some(record) if record.status.is_terminal() => {
                TransitionPlan::Noop("already finalized")
            }
            Some(_) => TransitionPlan::Complete {
                end_time: ended_at.unwrap_or(event.occurred_at),
                teardown: false,
            },
        },

        EventKind::Rejected { .. } => match existing {
            None => TransitionPlan::Noop("no record for rejection"),
            Some(record) if record.status.is_terminal() => {
                TransitionPlan::Noop("already finalized")
            }
            Some(_) => TransitionPlan::Fail {
                end_time: event.occurred_at,
            },
        },

        EventKind::ParticipantJoined { .. } => TransitionPlan::Noop("participant joined"),
        EventKind::Accepted { .. } => TransitionPlan::Noop("call accepted"),
        EventKind::Ignored { .. } => TransitionPlan::Noop("unhandled event type"),
    }
}

/// Call lifecycle service
///
/// Owns the webhook-driven state machine. Billing runs through the
/// [`BillingReconciler`] after a completion commits; remote teardown is
/// fire-and-forget.
pub struct CallLifecycleService<U: UserRepository, C: CacheService> {
    pool: PgPool,
    resolver: Arc<IdentityResolver<U, C>>,
    users: Arc<U>,
    reconciler: Arc<BillingReconciler>,
    control: Arc<dyn CallControl>,
}

impl<U: UserRepository, C: CacheService> CallLifecycleService<U, C> {
    /// Create a new lifecycle service
    pub fn new(
        pool: PgPool,
        resolver: Arc<IdentityResolver<U, C>>,
        users: Arc<U>,
        reconciler: Arc<BillingReconciler>,
        control: Arc<dyn CallControl>,
    ) -> Self {
        Self {
            pool,
            resolver,
            users,
            reconciler,
            control,
        }
    }

    /// Handle one normalized platform event
    #[instrument(skip(self, event), fields(call_cid = %event.call_cid, kind = event.kind_label()))]
    pub async fn handle_event(&self, event: &NormalizedEvent) -> AppResult<EventOutcome> {
        let existing = self.find_record(&event.call_cid).await?;

        let plan = plan_transition(existing.as_ref(), event);
        debug!("Planned transition: {:?}", plan);

        match plan {
            TransitionPlan::Noop(reason) => {
                debug!("Skipping event for {}: {}", event.call_cid, reason);
                Ok(EventOutcome::Skipped(reason))
            }
            TransitionPlan::Create => self.apply_create(event).await,
            TransitionPlan::Activate { start_time } => {
                self.apply_activate(&event.call_cid, start_time).await
            }
            TransitionPlan::Complete { end_time, teardown } => {
                self.apply_complete(event, end_time, teardown).await
            }
            TransitionPlan::Fail { end_time } => self.apply_fail(&event.call_cid, end_time).await,
            TransitionPlan::Reconcile => {
                info!(
                    "Call {} completed without billing marks, re-entering reconciliation",
                    event.call_cid
                );
                let reconciliation = self.reconciler.reconcile_call(&event.call_cid).await?;
                let duration_minutes = existing
                    .as_ref()
                    .and_then(|r| r.duration_minutes)
                    .unwrap_or(0);
                Ok(EventOutcome::Completed {
                    duration_minutes,
                    reconciliation,
                })
            }
        }
    }

    async fn find_record(&self, call_cid: &str) -> AppResult<Option<CallRecord>> {
        let row = sqlx::query_as::<sqlx::Postgres, CallRow>(
            r#"
            SELECT id, call_cid, client_id, therapist_id, status,
                   start_time, end_time, duration_minutes,
                   rate_per_minute, client_debited, therapist_credited,
                   created_at, updated_at
            FROM call_records
            WHERE call_cid = $1
            "#,
        )
        .bind(call_cid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to load call record {}: {}", call_cid, e);
            AppError::Database(format!("Failed to load call record: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    /// Create the record for a new call, resolving both participants
    async fn apply_create(&self, event: &NormalizedEvent) -> AppResult<EventOutcome> {
        let (custom, members) = match &event.kind {
            EventKind::Created {
                custom,
                member_platform_ids,
            } => (custom, member_platform_ids),
            _ => return Ok(EventOutcome::Skipped("not a creation event")),
        };

        let pair = match self.resolver.resolve_participants(custom, members).await? {
            Some(pair) => pair,
            None => {
                warn!(
                    "Could not map client/therapist for {} (members: {:?})",
                    event.call_cid, members
                );
                return Ok(EventOutcome::Skipped("unmapped participants"));
            }
        };

        // Capture the therapist's rate at creation so later rate changes
        // don't re-price in-flight calls.
        let rate = self
            .users
            .find_by_id(pair.therapist_id)
            .await?
            .and_then(|t| t.rate_per_minute);

        let result = sqlx::query(
            r#"
            INSERT INTO call_records (
                call_cid, client_id, therapist_id, status, rate_per_minute
            )
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (call_cid) DO NOTHING
            "#,
        )
        .bind(&event.call_cid)
        .bind(pair.client_id)
        .bind(pair.therapist_id)
        .bind(CallStatus::Initiated.to_string())
        .bind(rate)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create call record {}: {}", event.call_cid, e);
            AppError::Database(format!("Failed to create call record: {}", e))
        })?;

        if result.rows_affected() == 0 {
            debug!("Concurrent creation won for {}", event.call_cid);
            return Ok(EventOutcome::Skipped("record already exists"));
        }

        info!("Call record created for {}", event.call_cid);
        Ok(EventOutcome::Created)
    }

    /// Activate an initiated call under a row lock
    async fn apply_activate(
        &self,
        call_cid: &str,
        start_time: DateTime<Utc>,
    ) -> AppResult<EventOutcome> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })?;

        let result = sqlx::query(
            r#"
            UPDATE call_records
            SET status = $2,
                start_time = $3,
                updated_at = NOW()
            WHERE call_cid = $1
              AND status = $4
            "#,
        )
        .bind(call_cid)
        .bind(CallStatus::Active.to_string())
        .bind(start_time)
        .bind(CallStatus::Initiated.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to activate call {}: {}", call_cid, e);
            AppError::Database(format!("Failed to activate call: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })?;

        if result.rows_affected() == 0 {
            debug!("Activation lost a race for {}", call_cid);
            return Ok(EventOutcome::Skipped("concurrent transition"));
        }

        info!("Call {} activated, start_time={}", call_cid, start_time);
        Ok(EventOutcome::Activated)
    }

    /// Complete a call: finalize the record, then reconcile billing and
    /// optionally tear the remote session down
    async fn apply_complete(
        &self,
        event: &NormalizedEvent,
        end_time: DateTime<Utc>,
        teardown: bool,
    ) -> AppResult<EventOutcome> {
        let call_cid = &event.call_cid;

        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })?;

        // Re-read under lock; the snapshot used for planning may be stale
        let record = sqlx::query_as::<sqlx::Postgres, CallRow>(
            r#"
            SELECT id, call_cid, client_id, therapist_id, status,
                   start_time, end_time, duration_minutes,
                   rate_per_minute, client_debited, therapist_credited,
                   created_at, updated_at
            FROM call_records
            WHERE call_cid = $1
            FOR UPDATE
            "#,
        )
        .bind(call_cid)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to lock call record {}: {}", call_cid, e);
            AppError::Database(format!("Failed to lock call record: {}", e))
        })?
        .map(CallRecord::from);

        let record = match record {
            Some(r) => r,
            None => return Ok(EventOutcome::Skipped("no record")),
        };

        if record.status.is_terminal() {
            debug!(
                "Call {} already finalized ({}), ignoring",
                call_cid, record.status
            );
            return Ok(EventOutcome::Skipped("already finalized"));
        }

        let duration = CallRecord::billable_minutes(record.start_time, end_time);

        let result = sqlx::query(
            r#"
            UPDATE call_records
            SET status = $2,
                end_time = $3,
                duration_minutes = $4,
                updated_at = NOW()
            WHERE id = $1
              AND status = $5
            "#,
        )
        .bind(record.id)
        .bind(CallStatus::Completed.to_string())
        .bind(end_time)
        .bind(duration)
        .bind(record.status.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to complete call {}: {}", call_cid, e);
            AppError::Database(format!("Failed to complete call: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })?;

        if result.rows_affected() == 0 {
            return Ok(EventOutcome::Skipped("concurrent transition"));
        }

        info!(
            "Call {} completed, duration={}m, teardown={}",
            call_cid, duration, teardown
        );

        if teardown {
            // Best-effort: the platform echoes a call.ended webhook which
            // the state machine already treats as a duplicate.
            let control = Arc::clone(&self.control);
            let call_type = event.call_type.clone();
            let call_id = event.call_id.clone();
            tokio::spawn(async move {
                if let Err(e) = control.end_call(&call_type, &call_id).await {
                    error!(
                        "Failed to tear down platform call {}:{}: {}",
                        call_type, call_id, e
                    );
                }
            });
        }

        let reconciliation = self.reconciler.reconcile_call(call_cid).await?;

        Ok(EventOutcome::Completed {
            duration_minutes: duration,
            reconciliation,
        })
    }

    /// Fail a non-terminal call (rejected or missed)
    async fn apply_fail(&self, call_cid: &str, end_time: DateTime<Utc>) -> AppResult<EventOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE call_records
            SET status = $2,
                end_time = $3,
                duration_minutes = 0,
                updated_at = NOW()
            WHERE call_cid = $1
              AND status NOT IN ($4, $5)
            "#,
        )
        .bind(call_cid)
        .bind(CallStatus::Failed.to_string())
        .bind(end_time)
        .bind(CallStatus::Completed.to_string())
        .bind(CallStatus::Failed.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to fail call {}: {}", call_cid, e);
            AppError::Database(format!("Failed to fail call: {}", e))
        })?;

        if result.rows_affected() == 0 {
            return Ok(EventOutcome::Skipped("already finalized"));
        }

        info!("Call {} marked failed", call_cid);
        Ok(EventOutcome::Failed)
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct CallRow {
    id: i64,
    call_cid: String,
    client_id: Uuid,
    therapist_id: Uuid,
    status: String,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    duration_minutes: Option<i32>,
    rate_per_minute: Option<Decimal>,
    client_debited: Option<Decimal>,
    therapist_credited: Option<Decimal>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CallRow> for CallRecord {
    fn from(row: CallRow) -> Self {
        Self {
            id: row.id,
            call_cid: row.call_cid,
            client_id: row.client_id,
            therapist_id: row.therapist_id,
            status: CallStatus::from_str(&row.status).unwrap_or(CallStatus::Initiated),
            start_time: row.start_time,
            end_time: row.end_time,
            duration_minutes: row.duration_minutes,
            rate_per_minute: row.rate_per_minute,
            client_debited: row.client_debited,
            therapist_credited: row.therapist_credited,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use therapay_core::models::CustomParticipants;

    fn event(kind: EventKind) -> NormalizedEvent {
        NormalizedEvent {
            call_cid: "default:abc".to_string(),
            call_type: "default".to_string(),
            call_id: "abc".to_string(),
            occurred_at: Utc::now(),
            kind,
        }
    }

    fn record(status: CallStatus) -> CallRecord {
        CallRecord {
            call_cid: "default:abc".to_string(),
            status,
            start_time: matches!(status, CallStatus::Active | CallStatus::Completed)
                .then(Utc::now),
            ..Default::default()
        }
    }

    fn settled_record() -> CallRecord {
        CallRecord {
            duration_minutes: Some(2),
            client_debited: Some(Decimal::TEN),
            therapist_credited: Some(Decimal::TEN),
            ..record(CallStatus::Completed)
        }
    }

    fn created_event() -> NormalizedEvent {
        event(EventKind::Created {
            custom: CustomParticipants::default(),
            member_platform_ids: vec![],
        })
    }

    #[test]
    fn test_created_plans_create_when_absent() {
        assert_eq!(plan_transition(None, &created_event()), TransitionPlan::Create);
    }

    #[test]
    fn test_created_is_idempotent() {
        let existing = record(CallStatus::Initiated);
        assert!(matches!(
            plan_transition(Some(&existing), &created_event()),
            TransitionPlan::Noop(_)
        ));
    }

    #[test]
    fn test_session_started_activates_initiated() {
        let existing = record(CallStatus::Initiated);
        let started_at = Utc::now();
        let plan = plan_transition(
            Some(&existing),
            &event(EventKind::SessionStarted {
                started_at: Some(started_at),
            }),
        );
        assert_eq!(
            plan,
            TransitionPlan::Activate {
                start_time: started_at
            }
        );
    }

    #[test]
    fn test_session_started_falls_back_to_event_time() {
        let existing = record(CallStatus::Initiated);
        let ev = event(EventKind::SessionStarted { started_at: None });
        let plan = plan_transition(Some(&existing), &ev);
        assert_eq!(
            plan,
            TransitionPlan::Activate {
                start_time: ev.occurred_at
            }
        );
    }

    #[test]
    fn test_session_started_ignored_when_not_initiated() {
        for status in [CallStatus::Active, CallStatus::Completed, CallStatus::Failed] {
            let existing = record(status);
            let plan = plan_transition(
                Some(&existing),
                &event(EventKind::SessionStarted { started_at: None }),
            );
            assert!(matches!(plan, TransitionPlan::Noop(_)), "status {status}");
        }
    }

    #[test]
    fn test_participant_left_ends_two_party_call() {
        let existing = record(CallStatus::Active);
        let ev = event(EventKind::ParticipantLeft {
            platform_user_id: Some("t-1".to_string()),
            participants_remaining: Some(1),
        });
        let plan = plan_transition(Some(&existing), &ev);
        assert_eq!(
            plan,
            TransitionPlan::Complete {
                end_time: ev.occurred_at,
                teardown: true
            }
        );
    }

    #[test]
    fn test_participant_left_zero_remaining_also_ends() {
        let existing = record(CallStatus::Active);
        let ev = event(EventKind::ParticipantLeft {
            platform_user_id: None,
            participants_remaining: Some(0),
        });
        assert!(matches!(
            plan_transition(Some(&existing), &ev),
            TransitionPlan::Complete { teardown: true, .. }
        ));
    }

    #[test]
    fn test_participant_left_with_others_remaining_continues() {
        let existing = record(CallStatus::Active);
        let ev = event(EventKind::ParticipantLeft {
            platform_user_id: None,
            participants_remaining: Some(2),
        });
        assert!(matches!(
            plan_transition(Some(&existing), &ev),
            TransitionPlan::Noop(_)
        ));
    }

    #[test]
    fn test_participant_left_unknown_count_ends_call() {
        // The platform omits the count when the session is already empty
        let existing = record(CallStatus::Active);
        let ev = event(EventKind::ParticipantLeft {
            platform_user_id: None,
            participants_remaining: None,
        });
        assert_eq!(
            plan_transition(Some(&existing), &ev),
            TransitionPlan::Complete {
                end_time: ev.occurred_at,
                teardown: true
            }
        );
    }

    #[test]
    fn test_participant_left_ignored_when_not_active() {
        let existing = record(CallStatus::Initiated);
        let ev = event(EventKind::ParticipantLeft {
            platform_user_id: None,
            participants_remaining: Some(1),
        });
        assert!(matches!(
            plan_transition(Some(&existing), &ev),
            TransitionPlan::Noop(_)
        ));
    }

    #[test]
    fn test_ended_completes_active_call() {
        let existing = record(CallStatus::Active);
        let ended_at = Utc::now();
        let plan = plan_transition(
            Some(&existing),
            &event(EventKind::Ended {
                ended_at: Some(ended_at),
            }),
        );
        assert_eq!(
            plan,
            TransitionPlan::Complete {
                end_time: ended_at,
                teardown: false
            }
        );
    }

    #[test]
    fn test_ended_completes_initiated_call() {
        // A call that never started can still be ended by the platform
        let existing = record(CallStatus::Initiated);
        let plan = plan_transition(
            Some(&existing),
            &event(EventKind::Ended { ended_at: None }),
        );
        assert!(matches!(plan, TransitionPlan::Complete { .. }));
    }

    #[test]
    fn test_ended_is_idempotent_on_settled_terminal_states() {
        for existing in [settled_record(), record(CallStatus::Failed)] {
            let plan = plan_transition(
                Some(&existing),
                &event(EventKind::Ended { ended_at: None }),
            );
            assert!(
                matches!(plan, TransitionPlan::Noop(_)),
                "status {}",
                existing.status
            );
        }
    }

    #[test]
    fn test_ended_replay_reconciles_unsettled_completion() {
        // Reconciliation failed transiently after the completion committed;
        // the redelivered end event must re-enter the reconciler.
        let existing = record(CallStatus::Completed);
        let plan = plan_transition(
            Some(&existing),
            &event(EventKind::Ended { ended_at: None }),
        );
        assert_eq!(plan, TransitionPlan::Reconcile);
    }

    #[test]
    fn test_participant_left_replay_reconciles_unsettled_completion() {
        let existing = record(CallStatus::Completed);
        let ev = event(EventKind::ParticipantLeft {
            platform_user_id: None,
            participants_remaining: Some(1),
        });
        assert_eq!(plan_transition(Some(&existing), &ev), TransitionPlan::Reconcile);
    }

    #[test]
    fn test_rejected_fails_non_terminal_call() {
        let existing = record(CallStatus::Initiated);
        let ev = event(EventKind::Rejected {
            reason: Some("call.missed".to_string()),
        });
        let plan = plan_transition(Some(&existing), &ev);
        assert_eq!(
            plan,
            TransitionPlan::Fail {
                end_time: ev.occurred_at
            }
        );
    }

    #[test]
    fn test_rejected_after_completion_is_ignored() {
        let existing = record(CallStatus::Completed);
        let ev = event(EventKind::Rejected { reason: None });
        assert!(matches!(
            plan_transition(Some(&existing), &ev),
            TransitionPlan::Noop(_)
        ));
    }

    #[test]
    fn test_observability_events_are_noops() {
        let existing = record(CallStatus::Active);
        for kind in [
            EventKind::ParticipantJoined {
                platform_user_id: Some("c-1".to_string()),
            },
            EventKind::Accepted {
                platform_user_id: Some("t-1".to_string()),
            },
            EventKind::Ignored {
                event_type: "call.recording_ready".to_string(),
            },
        ] {
            assert!(matches!(
                plan_transition(Some(&existing), &event(kind)),
                TransitionPlan::Noop(_)
            ));
        }
    }

    #[test]
    fn test_events_without_record_are_noops() {
        for kind in [
            EventKind::SessionStarted { started_at: None },
            EventKind::ParticipantLeft {
                platform_user_id: None,
                participants_remaining: Some(1),
            },
            EventKind::Ended { ended_at: None },
            EventKind::Rejected { reason: None },
        ] {
            assert!(matches!(
                plan_transition(None, &event(kind)),
                TransitionPlan::Noop(_)
            ));
        }
    }
}
