//! Product snapshots served by the Stock API

use serde::{Deserialize, Serialize};

use super::ProductId;

/// Package dimensions in centimetres
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length_cm: f64,
    pub width_cm: f64,
    pub height_cm: f64,
}

impl Dimensions {
    #[must_use]
    pub const fn new(length_cm: f64, width_cm: f64, height_cm: f64) -> Self {
        Self {
            length_cm,
            width_cm,
            height_cm,
        }
    }

    /// Volume in cubic centimetres
    #[must_use]
    pub fn volume_cm3(&self) -> f64 {
        self.length_cm * self.width_cm * self.height_cm
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::new(10.0, 10.0, 10.0)
    }
}

/// Warehouse address the product ships from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl Default for Address {
    fn default() -> Self {
        Self {
            street: "Unknown".to_string(),
            city: "Unknown".to_string(),
            postal_code: "0000".to_string(),
            country: "AR".to_string(),
        }
    }
}

/// Product record as returned by the Stock API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    /// Units currently in stock
    pub stock: u32,
    pub weight_kg: f64,
    pub dimensions: Dimensions,
    pub warehouse_address: Address,
    #[serde(default = "default_available")]
    pub available: bool,
}

const fn default_available() -> bool {
    true
}

impl ProductRecord {
    /// Placeholder returned when the Stock API cannot be reached.
    ///
    /// Keeps the id; zero stock, 1 kg, 10x10x10 cm and a default address so a
    /// cost can still be computed downstream.
    #[must_use]
    pub fn unavailable(id: ProductId) -> Self {
        Self {
            id,
            name: "Product unavailable".to_string(),
            stock: 0,
            weight_kg: 1.0,
            dimensions: Dimensions::default(),
            warehouse_address: Address::default(),
            available: false,
        }
    }
}

/// Where a resolved product came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSource {
    Cache,
    Api,
    Fallback,
}

impl ProductSource {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Api => "api",
            Self::Fallback => "fallback",
        }
    }
}

/// Result of a product resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedProduct {
    pub product: ProductRecord,
    pub source: ProductSource,
}

impl ResolvedProduct {
    /// True when the product is the fallback placeholder
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.source == ProductSource::Fallback
    }
}
