//! Business logic services for Therapay
//!
//! This crate contains the services that orchestrate call lifecycle
//! reconciliation and billing:
//!
//! # Architecture
//!
//! Services are designed to be composable and testable:
//! - Each service owns its dependencies (repositories, cache, etc.)
//! - Services are wrapped in Arc for safe sharing across async tasks
//! - All operations are instrumented with tracing
//! - Comprehensive error handling with AppError
//!
//! # Services
//!
//! - `IdentityResolver` - Platform id to internal identity mapping with caching
//! - `CallLifecycleService` - Idempotent call state machine driven by webhooks
//! - `BillingReconciler` - Exactly-once double-entry billing for completed calls
//! - `WalletService` - Credit top-ups and therapist payout lifecycle
//! - `NotificationStage` - Ephemeral ringing-UX invite staging with TTL

pub mod identity;
pub mod lifecycle;
pub mod notifications;
pub mod reconciler;
pub mod wallet;

pub use identity::{IdentityResolver, ResolvedPair};
pub use lifecycle::{plan_transition, CallLifecycleService, EventOutcome, TransitionPlan};
pub use notifications::{Clock, NotificationStage, SystemClock};
pub use reconciler::{BillingReconciler, ReconcileOutcome};
pub use wallet::WalletService;

/// Business logic constants
pub mod constants {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    /// Rate applied when neither the call record nor the therapist profile
    /// carries one
    pub const DEFAULT_RATE_PER_MINUTE: Decimal = dec!(5.00);

    /// How long a staged call invite stays visible (seconds)
    pub const INVITE_TTL_SECS: i64 = 30;

    /// Default page size for call history listings
    pub const HISTORY_PAGE_SIZE: i64 = 50;
}
