//! Domain models for Therapay
//!
//! This module contains all the core domain models used throughout the application.

pub mod call;
pub mod event;
pub mod ledger;
pub mod notification;
pub mod user;
pub mod withdrawal;

pub use call::{CallRecord, CallStatus};
pub use event::{CustomParticipants, EventKind, NormalizedEvent};
pub use ledger::{LedgerEntry, LedgerKind};
pub use notification::{CallMode, PendingInvite};
pub use user::{ResolvedIdentity, UserAccount, UserRole};
pub use withdrawal::{WithdrawalRequest, WithdrawalStatus};
