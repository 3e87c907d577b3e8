//! Communication platform boundary for Therapay
//!
//! Everything that knows the wire shape of the video platform lives here:
//!
//! - Raw webhook payload types and the normalizer that turns them into
//!   [`NormalizedEvent`](therapay_core::models::NormalizedEvent)
//! - HMAC-SHA256 webhook signature verification
//! - The HTTP client used to tear down remote call sessions
//!
//! Nothing outside this crate parses platform JSON or builds platform URLs.

pub mod control;
pub mod event;
pub mod normalize;
pub mod signature;

pub use control::PlatformCallControl;
pub use event::RawPlatformEvent;
pub use normalize::normalize_event;
pub use signature::{compute_signature, verify_signature};
