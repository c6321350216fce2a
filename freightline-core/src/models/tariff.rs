//! Tariff records and calculation results

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::TransportMethodId;

/// Deployment environment a tariff record applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("Unknown environment: {other}")),
        }
    }
}

/// Pricing record owned by the configuration store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffConfig {
    pub transport_method_id: TransportMethodId,
    pub base_tariff: Decimal,
    pub cost_per_kg: Decimal,
    pub cost_per_km: Decimal,
    /// kg per cubic metre
    pub volumetric_factor: Decimal,
    pub environment: Environment,
    pub valid_from: DateTime<Utc>,
    /// `None` means open-ended
    #[serde(default)]
    pub valid_to: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

impl TariffConfig {
    /// Whether this record is active and its validity window contains `as_of`
    #[must_use]
    pub fn is_applicable_at(&self, as_of: DateTime<Utc>) -> bool {
        self.is_active
            && self.valid_from <= as_of
            && self.valid_to.is_none_or(|valid_to| valid_to >= as_of)
    }
}

/// Per-line cost breakdown. Every line is rounded to 2 decimals and
/// `total_cost` is the exact sum of the rounded lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffBreakdown {
    pub base_tariff: Decimal,
    pub weight_cost: Decimal,
    pub distance_cost: Decimal,
    pub total_cost: Decimal,
    pub billable_weight_kg: Decimal,
    pub distance_km: Decimal,
    /// `valid_from` of the tariff record used, if the breakdown came from a lookup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tariff_valid_from: Option<DateTime<Utc>>,
}

/// Result of `calculate_tariff`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffQuote {
    pub total_cost: Decimal,
    pub breakdown: TariffBreakdown,
}
