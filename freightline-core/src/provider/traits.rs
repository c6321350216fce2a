//! Downstream dependency interfaces
//!
//! The resolvers only see these traits; transport details live in
//! [`super::http`].

use async_trait::async_trait;

use super::ProviderError;
use crate::models::{ProductId, ProductRecord};

/// External Stock API
///
/// Transport errors and "not found" are both failures.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StockApi: Send + Sync {
    async fn fetch_product(&self, product_id: &ProductId) -> Result<ProductRecord, ProviderError>;
}

/// External distance / geocoding API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DistanceApi: Send + Sync {
    /// Road distance in km between two postal codes
    async fn fetch_distance(&self, from_postal_code: &str, to_postal_code: &str) -> Result<f64, ProviderError>;
}
