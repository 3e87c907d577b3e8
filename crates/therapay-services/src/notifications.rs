//! Call invite staging
//!
//! In-memory staging area for ringing-UX invites. A client stages an invite
//! for a therapist when initiating a call; the therapist's app polls for it
//! and clears it by id once handled. Entries live for a short TTL and are
//! never persisted: after a restart clients simply re-initiate.
//!
//! At most one invite exists per therapist; staging a new one supersedes the
//! old. Clearing requires the invite id so a late clear for a superseded
//! invite cannot drop a newer one.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use therapay_core::models::{CallMode, PendingInvite};
use tracing::{debug, info};

/// Time source, injectable for tests
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Staging area for pending call invites, keyed by therapist platform id
pub struct NotificationStage {
    entries: RwLock<HashMap<String, PendingInvite>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl NotificationStage {
    /// Create a stage with the wall clock
    pub fn new(ttl_secs: i64) -> Self {
        Self::with_clock(ttl_secs, Arc::new(SystemClock))
    }

    /// Create a stage with an injected clock
    pub fn with_clock(ttl_secs: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Stage an invite for a therapist, superseding any existing one
    #[allow(clippy::too_many_arguments)]
    pub fn stage(
        &self,
        call_cid: &str,
        call_mode: CallMode,
        caller_name: &str,
        caller_platform_id: &str,
        therapist_platform_id: &str,
        rate_per_minute: Decimal,
    ) -> PendingInvite {
        let now = self.clock.now();
        let invite = PendingInvite {
            id: format!("{}_{}", call_cid, now.timestamp_millis()),
            call_cid: call_cid.to_string(),
            call_mode,
            caller_name: caller_name.to_string(),
            caller_platform_id: caller_platform_id.to_string(),
            therapist_platform_id: therapist_platform_id.to_string(),
            rate_per_minute,
            staged_at: now,
            expires_at: now + self.ttl,
        };

        self.entries
            .write()
            .insert(therapist_platform_id.to_string(), invite.clone());

        info!(
            "Staged invite {} for therapist {} (call {})",
            invite.id, therapist_platform_id, call_cid
        );
        invite
    }

    /// Fetch the pending invite for a therapist, if any
    ///
    /// Expired entries are treated as absent and dropped on sight.
    pub fn pending_for(&self, therapist_platform_id: &str) -> Option<PendingInvite> {
        let now = self.clock.now();

        let expired = {
            let entries = self.entries.read();
            match entries.get(therapist_platform_id) {
                Some(invite) if !invite.is_expired_at(now) => return Some(invite.clone()),
                Some(_) => true,
                None => false,
            }
        };

        if expired {
            self.entries.write().remove(therapist_platform_id);
            debug!(
                "Dropped expired invite for therapist {}",
                therapist_platform_id
            );
        }
        None
    }

    /// Clear an invite by id
    ///
    /// Returns false when no invite exists or the id doesn't match (a newer
    /// invite superseded the one being cleared).
    pub fn clear(&self, therapist_platform_id: &str, invite_id: &str) -> bool {
        let mut entries = self.entries.write();
        match entries.get(therapist_platform_id) {
            Some(invite) if invite.id == invite_id => {
                entries.remove(therapist_platform_id);
                info!(
                    "Cleared invite {} for therapist {}",
                    invite_id, therapist_platform_id
                );
                true
            }
            _ => false,
        }
    }

    /// Drop every expired invite; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, invite| !invite.is_expired_at(now));
        let purged = before - entries.len();
        if purged > 0 {
            debug!("Purged {} expired invite(s)", purged);
        }
        purged
    }

    /// Number of currently staged invites, expired or not
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;

    struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(Utc::now()),
            })
        }

        fn advance(&self, secs: i64) {
            *self.now.lock() += Duration::seconds(secs);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock()
        }
    }

    fn stage_invite(stage: &NotificationStage, call_cid: &str) -> PendingInvite {
        stage.stage(
            call_cid,
            CallMode::Video,
            "Alice",
            "c-1",
            "t-1",
            dec!(5.00),
        )
    }

    #[test]
    fn test_stage_and_fetch() {
        let stage = NotificationStage::new(30);
        let invite = stage_invite(&stage, "default:abc");

        let pending = stage.pending_for("t-1").unwrap();
        assert_eq!(pending.id, invite.id);
        assert_eq!(pending.call_cid, "default:abc");

        assert!(stage.pending_for("t-2").is_none());
    }

    #[test]
    fn test_invite_expires_after_ttl() {
        let clock = ManualClock::new();
        let stage = NotificationStage::with_clock(30, clock.clone());
        stage_invite(&stage, "default:abc");

        clock.advance(29);
        assert!(stage.pending_for("t-1").is_some());

        clock.advance(1);
        assert!(stage.pending_for("t-1").is_none());
        // Expired entry was dropped eagerly
        assert!(stage.is_empty());
    }

    #[test]
    fn test_newer_invite_supersedes() {
        let clock = ManualClock::new();
        let stage = NotificationStage::with_clock(30, clock.clone());

        let first = stage_invite(&stage, "default:abc");
        clock.advance(5);
        let second = stage_invite(&stage, "default:xyz");

        assert_ne!(first.id, second.id);
        assert_eq!(stage.pending_for("t-1").unwrap().id, second.id);
        assert_eq!(stage.len(), 1);
    }

    #[test]
    fn test_clear_requires_matching_id() {
        let clock = ManualClock::new();
        let stage = NotificationStage::with_clock(30, clock.clone());

        let first = stage_invite(&stage, "default:abc");
        clock.advance(5);
        let second = stage_invite(&stage, "default:xyz");

        // Late clear for the superseded invite must not drop the newer one
        assert!(!stage.clear("t-1", &first.id));
        assert!(stage.pending_for("t-1").is_some());

        assert!(stage.clear("t-1", &second.id));
        assert!(stage.pending_for("t-1").is_none());
    }

    #[test]
    fn test_purge_expired() {
        let clock = ManualClock::new();
        let stage = NotificationStage::with_clock(30, clock.clone());

        stage.stage("default:a", CallMode::Audio, "A", "c-1", "t-1", dec!(5.00));
        stage.stage("default:b", CallMode::Audio, "B", "c-2", "t-2", dec!(4.00));

        clock.advance(10);
        stage.stage("default:c", CallMode::Audio, "C", "c-3", "t-3", dec!(3.00));

        clock.advance(25); // t-1 and t-2 expired (35s), t-3 still live (25s)
        assert_eq!(stage.purge_expired(), 2);
        assert_eq!(stage.len(), 1);
        assert!(stage.pending_for("t-3").is_some());
    }
}
