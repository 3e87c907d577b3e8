//! HTTP API layer for Therapay
//!
//! Exposes the platform webhook endpoint, call history, invite staging, and
//! wallet operations over actix-web. Handlers stay thin: they validate input,
//! call into therapay-services, and map results to DTOs.

pub mod dto;
pub mod handlers;

use therapay_cache::RedisCache;
use therapay_db::PgUserRepository;
use therapay_services::{CallLifecycleService, IdentityResolver};

/// Concrete lifecycle engine wired in main and shared as app data
pub type CallEngine = CallLifecycleService<PgUserRepository, RedisCache>;

/// Concrete identity resolver backing the engine
pub type PlatformIdentityResolver = IdentityResolver<PgUserRepository, RedisCache>;

pub use dto::{ApiResponse, PaginationParams};
pub use handlers::{
    configure_calls, configure_notifications, configure_wallet, configure_webhooks,
    configure_withdrawals, health,
};
