//! Test helpers and fixtures for freightline-core tests
//!
//! Fixture builders, fake downstream APIs with call counters, and small
//! constructors for caches and retry policies that keep tests fast.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use crate::cache::{KeyBuilder, TtlCache};
use crate::models::{
    Address, Dimensions, Environment, ProductId, ProductRecord, TariffConfig, TransportMethodId,
};
use crate::provider::{DistanceApi, ProviderError, StockApi};
use crate::resilience::RetryPolicy;

/// A realistic product as the Stock API would return it
pub fn sample_product(id: &str) -> ProductRecord {
    ProductFixture::new().with_id(id).build()
}

/// L1-only cache with a test prefix
pub fn test_cache() -> TtlCache {
    TtlCache::new(
        None,
        1_000,
        Duration::from_secs(60),
        Duration::from_millis(100),
        KeyBuilder::new("test"),
    )
}

/// Three attempts with a short base delay
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(10),
        attempt_timeout: Duration::from_secs(1),
    }
}

/// Test fixture builder for `ProductRecord`
#[derive(Debug, Clone)]
pub struct ProductFixture {
    id: String,
    name: String,
    stock: u32,
    weight_kg: f64,
    dimensions: Dimensions,
    postal_code: String,
}

impl ProductFixture {
    pub fn new() -> Self {
        Self {
            id: "SKU-1".to_string(),
            name: "Pallet jack".to_string(),
            stock: 12,
            weight_kg: 48.5,
            dimensions: Dimensions::new(120.0, 55.0, 120.0),
            postal_code: "C1043".to_string(),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_weight(mut self, weight_kg: f64) -> Self {
        self.weight_kg = weight_kg;
        self
    }

    pub fn with_dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_stock(mut self, stock: u32) -> Self {
        self.stock = stock;
        self
    }

    pub fn build(self) -> ProductRecord {
        ProductRecord {
            id: ProductId::from(self.id),
            name: self.name,
            stock: self.stock,
            weight_kg: self.weight_kg,
            dimensions: self.dimensions,
            warehouse_address: Address {
                street: "Av. Corrientes 1234".to_string(),
                city: "Buenos Aires".to_string(),
                postal_code: self.postal_code,
                country: "AR".to_string(),
            },
            available: true,
        }
    }
}

impl Default for ProductFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Test fixture builder for `TariffConfig`
pub struct TariffFixture {
    config: TariffConfig,
}

impl TariffFixture {
    /// Active production tariff for `truck`, valid since 30 days ago
    pub fn new() -> Self {
        Self {
            config: TariffConfig {
                transport_method_id: TransportMethodId::from("truck"),
                base_tariff: Decimal::new(10000, 2),
                cost_per_kg: Decimal::new(250, 2),
                cost_per_km: Decimal::new(110, 2),
                volumetric_factor: Decimal::from(200),
                environment: Environment::Production,
                valid_from: Utc::now() - ChronoDuration::days(30),
                valid_to: None,
                is_active: true,
            },
        }
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.config.transport_method_id = TransportMethodId::from(method);
        self
    }

    pub fn with_rates(mut self, base_tariff: Decimal, cost_per_kg: Decimal, cost_per_km: Decimal) -> Self {
        self.config.base_tariff = base_tariff;
        self.config.cost_per_kg = cost_per_kg;
        self.config.cost_per_km = cost_per_km;
        self
    }

    pub fn with_volumetric_factor(mut self, factor: Decimal) -> Self {
        self.config.volumetric_factor = factor;
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.config.environment = environment;
        self
    }

    pub fn valid_between(mut self, valid_from: DateTime<Utc>, valid_to: Option<DateTime<Utc>>) -> Self {
        self.config.valid_from = valid_from;
        self.config.valid_to = valid_to;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.config.is_active = false;
        self
    }

    pub fn build(self) -> TariffConfig {
        self.config
    }
}

impl Default for TariffFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Stock API fake that counts calls and can be switched off
#[derive(Debug, Default)]
pub struct FakeStockApi {
    calls: AtomicU32,
    down: AtomicBool,
    served: parking_lot::Mutex<Option<ProductFixture>>,
}

impl FakeStockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `fixture` (with the requested id) instead of the default product
    pub fn serving(fixture: ProductFixture) -> Self {
        let api = Self::default();
        *api.served.lock() = Some(fixture);
        api
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StockApi for FakeStockApi {
    async fn fetch_product(&self, product_id: &ProductId) -> Result<ProductRecord, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(ProviderError::Network("connection refused".to_string()));
        }
        let product = match self.served.lock().clone() {
            Some(fixture) => fixture.with_id(product_id.as_str()).build(),
            None => sample_product(product_id.as_str()),
        };
        Ok(product)
    }
}

/// Distance API fake returning a fixed distance
#[derive(Debug)]
pub struct FakeDistanceApi {
    distance_km: f64,
    calls: AtomicU32,
    down: AtomicBool,
}

impl FakeDistanceApi {
    pub fn new(distance_km: f64) -> Self {
        Self {
            distance_km,
            calls: AtomicU32::new(0),
            down: AtomicBool::new(false),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DistanceApi for FakeDistanceApi {
    async fn fetch_distance(&self, _from: &str, _to: &str) -> Result<f64, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(ProviderError::Http {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                url: "http://distance.test/distance".to_string(),
            });
        }
        Ok(self.distance_km)
    }
}
