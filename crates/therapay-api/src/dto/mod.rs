//! Data Transfer Objects for API requests and responses

pub mod call;
pub mod common;
pub mod notification;
pub mod wallet;
pub mod webhook;

pub use call::*;
pub use common::*;
pub use notification::*;
pub use wallet::*;
pub use webhook::*;
