//! Cache key constants and builders for Therapay
//!
//! Provides standardized key naming patterns for cached entities, ensuring
//! consistency across the application and preventing key collisions.
//!
//! # Key Patterns
//!
//! - `identity:{platform_id}` - Resolved user identity by platform identifier
//!
//! # Example
//!
//! ```
//! use therapay_cache::keys;
//!
//! let key = keys::identity_key("stream-user-42");
//! assert_eq!(key, "identity:stream-user-42");
//! ```

/// Prefix for resolved identity entries
///
/// Format: `identity:{platform_id}`
pub const IDENTITY_PREFIX: &str = "identity";

/// Build a cache key for a resolved identity by platform identifier
///
/// # Example
///
/// ```
/// use therapay_cache::keys::identity_key;
///
/// let key = identity_key("stream-user-42");
/// assert_eq!(key, "identity:stream-user-42");
/// ```
pub fn identity_key(platform_id: &str) -> String {
    format!("{}:{}", IDENTITY_PREFIX, platform_id)
}
