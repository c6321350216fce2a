//! Cache key builder
//!
//! Keys are a pure function of what is being cached, never of call order:
//!
//! - directional data uses a namespaced concatenation (`<prefix>:stock:product:<id>`)
//! - symmetric relations sort their identifiers first, so the distance A→B and
//!   B→A share one entry (`<prefix>:geo:distance:<lo>:<hi>`)
//!
//! The prefix keeps environments apart when several deployments share Redis.

use crate::models::{normalize_postal_code, ProductId};
use crate::Config;

/// Builds every key the cache layer uses
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    prefix: String,
}

impl KeyBuilder {
    /// Create a new `KeyBuilder` with the given prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix: String = prefix.into();
        Self {
            prefix: prefix.trim_end_matches(':').to_string(),
        }
    }

    /// Create `KeyBuilder` from configuration
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.redis.key_prefix.clone())
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Product snapshot from the Stock API
    ///
    /// Value: JSON `ProductRecord`, short TTL
    #[must_use]
    pub fn product(&self, product_id: &ProductId) -> String {
        format!("{}:stock:product:{}", self.prefix, product_id.as_str())
    }

    /// Distance between two postal codes, order-independent
    ///
    /// Value: JSON number (km), long TTL
    #[must_use]
    pub fn distance(&self, from_postal_code: &str, to_postal_code: &str) -> String {
        let a = escape_segment(&normalize_postal_code(from_postal_code));
        let b = escape_segment(&normalize_postal_code(to_postal_code));
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        format!("{}:geo:distance:{}:{}", self.prefix, lo, hi)
    }

    /// Sentinel written and read back by the cache health check
    #[must_use]
    pub fn health_sentinel(&self, nonce: &str) -> String {
        format!("{}:health:{}", self.prefix, nonce)
    }

    /// Glob matching every key under this prefix (Redis SCAN)
    #[must_use]
    pub fn pattern_all(&self) -> String {
        format!("{}:*", self.prefix)
    }
}

/// Percent-escape the key separator so a segment can never span two segments
fn escape_segment(segment: &str) -> String {
    segment.replace('%', "%25").replace(':', "%3A")
}

impl Default for KeyBuilder {
    fn default() -> Self {
        Self::new("freightline")
    }
}
