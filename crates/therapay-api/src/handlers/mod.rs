//! HTTP request handlers

pub mod call;
pub mod health;
pub mod notification;
pub mod wallet;
pub mod webhook;

pub use call::configure as configure_calls;
pub use health::health;
pub use notification::configure as configure_notifications;
pub use wallet::configure_wallet;
pub use wallet::configure_withdrawals;
pub use webhook::configure as configure_webhooks;
