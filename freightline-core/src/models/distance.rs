use serde::{Deserialize, Serialize};

/// Where a resolved distance came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceSource {
    Cache,
    Api,
    /// Great-circle distance between postal-code centroids
    Manual,
}

impl DistanceSource {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Api => "api",
            Self::Manual => "manual",
        }
    }
}

/// Distance between two postal codes. Never persisted; the cache only keeps `distance_km`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedDistance {
    pub distance_km: f64,
    pub source: DistanceSource,
    pub response_time_ms: u64,
}
