//! Identity resolution service
//!
//! Maps the communication platform's opaque user identifiers to internal
//! accounts. Resolutions are cached in Redis with a short TTL; only the slim
//! identity (id and role) is cached, never balances or rates, so stale cache
//! entries can never feed the billing path.

use std::sync::Arc;
use therapay_cache::keys;
use therapay_core::{
    models::{CustomParticipants, ResolvedIdentity, UserRole},
    traits::{CacheService, UserRepository},
    AppResult,
};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// A resolved client/therapist pairing for a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPair {
    pub client_id: Uuid,
    pub therapist_id: Uuid,
}

/// Identity resolver with read-through caching
pub struct IdentityResolver<U: UserRepository, C: CacheService> {
    users: Arc<U>,
    cache: Arc<C>,
    ttl_secs: u64,
}

impl<U: UserRepository, C: CacheService> IdentityResolver<U, C> {
    /// Create a new identity resolver
    pub fn new(users: Arc<U>, cache: Arc<C>, ttl_secs: u64) -> Self {
        Self {
            users,
            cache,
            ttl_secs,
        }
    }

    /// Resolve a platform identifier to an internal identity
    ///
    /// Cache failures degrade to a database lookup; they never fail the
    /// resolution.
    #[instrument(skip(self))]
    pub async fn resolve(&self, platform_id: &str) -> AppResult<Option<ResolvedIdentity>> {
        if platform_id.is_empty() {
            warn!("Asked to resolve an empty platform id");
            return Ok(None);
        }

        let key = keys::identity_key(platform_id);

        match self.cache.get::<ResolvedIdentity>(&key).await {
            Ok(Some(identity)) => {
                debug!("Identity cache hit for {}", platform_id);
                return Ok(Some(identity));
            }
            Ok(None) => {}
            Err(e) => warn!("Identity cache read failed for {}: {}", platform_id, e),
        }

        let user = self.users.find_by_platform_id(platform_id).await?;

        match user {
            Some(user) => {
                let identity = ResolvedIdentity::from(&user);
                if let Err(e) = self.cache.set(&key, &identity, self.ttl_secs).await {
                    warn!("Identity cache write failed for {}: {}", platform_id, e);
                }
                Ok(Some(identity))
            }
            None => {
                debug!("No account for platform id {}", platform_id);
                Ok(None)
            }
        }
    }

    /// Resolve the client/therapist pair for a call creation event
    ///
    /// Explicit custom identifiers win when both are present; either side may
    /// hold either role. Otherwise the member list is scanned and the first
    /// account of each role is taken. Returns `None` when no complete pair
    /// can be assembled.
    #[instrument(skip(self, custom, member_platform_ids))]
    pub async fn resolve_participants(
        &self,
        custom: &CustomParticipants,
        member_platform_ids: &[String],
    ) -> AppResult<Option<ResolvedPair>> {
        if let (Some(caller_id), Some(receiver_id)) = (
            custom.caller_platform_id.as_deref(),
            custom.receiver_platform_id.as_deref(),
        ) {
            let caller = self.resolve(caller_id).await?;
            let receiver = self.resolve(receiver_id).await?;

            let mut client = None;
            let mut therapist = None;
            for identity in [caller, receiver].into_iter().flatten() {
                match identity.role {
                    UserRole::Client if client.is_none() => client = Some(identity.user_id),
                    UserRole::Therapist if therapist.is_none() => {
                        therapist = Some(identity.user_id)
                    }
                    _ => {}
                }
            }

            if let (Some(client_id), Some(therapist_id)) = (client, therapist) {
                return Ok(Some(ResolvedPair {
                    client_id,
                    therapist_id,
                }));
            }

            warn!(
                "Custom participant ids did not resolve to a client/therapist pair \
                 (caller={}, receiver={})",
                caller_id, receiver_id
            );
        }

        let mut client = None;
        let mut therapist = None;

        for platform_id in member_platform_ids {
            if let Some(identity) = self.resolve(platform_id).await? {
                match identity.role {
                    UserRole::Client if client.is_none() => client = Some(identity.user_id),
                    UserRole::Therapist if therapist.is_none() => {
                        therapist = Some(identity.user_id)
                    }
                    _ => {}
                }
            }
            if client.is_some() && therapist.is_some() {
                break;
            }
        }

        match (client, therapist) {
            (Some(client_id), Some(therapist_id)) => Ok(Some(ResolvedPair {
                client_id,
                therapist_id,
            })),
            _ => Ok(None),
        }
    }
}
