//! Facade exposed to calling services
//!
//! Ties the resolvers and the tariff calculator together and carries the
//! read-only observability operations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::tariff::{billable_weight, checked_product, cost_breakdown, to_decimal};
use super::{DistanceResolver, ProductResolver, TariffCalculator};
use crate::cache::{CacheHealth, TtlCache};
use crate::metrics::tariff::CALCULATIONS;
use crate::models::{
    Environment, ProductId, ProductRecord, ProductSource, ResolvedDistance, ResolvedProduct, TariffQuote,
    TransportMethodId,
};
use crate::resilience::CircuitBreakerStats;
use crate::{Error, Result};

/// Price of shipping `quantity` units of one product between two postal codes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentQuote {
    pub product: ProductRecord,
    pub product_source: ProductSource,
    pub quantity: u32,
    pub distance: ResolvedDistance,
    pub billable_weight_kg: Decimal,
    pub quote: TariffQuote,
    /// Priced from the placeholder product because the Stock API was down
    pub degraded: bool,
}

#[derive(Clone, Debug)]
pub struct QuoteService {
    products: ProductResolver,
    distances: DistanceResolver,
    tariffs: TariffCalculator,
    cache: TtlCache,
}

impl QuoteService {
    pub fn new(
        products: ProductResolver,
        distances: DistanceResolver,
        tariffs: TariffCalculator,
        cache: TtlCache,
    ) -> Self {
        Self {
            products,
            distances,
            tariffs,
            cache,
        }
    }

    /// Never fails; degraded results carry `ProductSource::Fallback`
    pub async fn resolve_product(&self, product_id: &ProductId) -> ResolvedProduct {
        self.products.resolve(product_id).await
    }

    /// Fails only with `DistanceUnresolvable` or `InvalidInput`
    pub async fn resolve_distance(&self, from_postal_code: &str, to_postal_code: &str) -> Result<ResolvedDistance> {
        self.distances.resolve(from_postal_code, to_postal_code).await
    }

    pub async fn calculate_tariff(
        &self,
        transport_method_id: &TransportMethodId,
        billable_weight_kg: f64,
        distance_km: f64,
        environment: Environment,
    ) -> Result<TariffQuote> {
        self.tariffs
            .calculate_tariff(transport_method_id, billable_weight_kg, distance_km, environment)
            .await
    }

    pub async fn calculate_tariff_at(
        &self,
        transport_method_id: &TransportMethodId,
        billable_weight_kg: f64,
        distance_km: f64,
        environment: Environment,
        as_of: DateTime<Utc>,
    ) -> Result<TariffQuote> {
        self.tariffs
            .calculate_tariff_at(transport_method_id, billable_weight_kg, distance_km, environment, as_of)
            .await
    }

    /// Resolve product and distance concurrently, then price the shipment.
    ///
    /// Billable weight is `quantity` times the per-unit billable weight under
    /// the selected tariff's volumetric factor.
    pub async fn quote_shipment(
        &self,
        product_id: &ProductId,
        quantity: u32,
        from_postal_code: &str,
        to_postal_code: &str,
        transport_method_id: &TransportMethodId,
        environment: Environment,
    ) -> Result<ShipmentQuote> {
        if quantity == 0 {
            return Err(Error::InvalidInput("quantity must be at least 1".to_string()));
        }

        let (resolved_product, distance) = tokio::join!(
            self.products.resolve(product_id),
            self.distances.resolve(from_postal_code, to_postal_code),
        );
        let distance = distance?;

        let config = self
            .tariffs
            .applicable_config(transport_method_id, environment, Utc::now())
            .await;
        let config = match config {
            Ok(config) => config,
            Err(e) => {
                if e.is_missing_tariff() {
                    CALCULATIONS.with_label_values(&["no_tariff"]).inc();
                }
                return Err(e);
            }
        };

        let product = resolved_product.product;
        let unit_weight = to_decimal(product.weight_kg, "weight_kg")?;
        let unit_billable = billable_weight(unit_weight, &product.dimensions, config.volumetric_factor)?;
        let billable_weight_kg = checked_product(unit_billable, Decimal::from(quantity), "billable weight")?;
        let distance_km = to_decimal(distance.distance_km, "distance_km")?;

        let breakdown = cost_breakdown(&config, billable_weight_kg, distance_km)?;
        CALCULATIONS.with_label_values(&["ok"]).inc();

        let degraded = resolved_product.source == ProductSource::Fallback;
        info!(
            product_id = %product_id,
            quantity,
            transport_method_id = %transport_method_id,
            total = %breakdown.total_cost,
            product_source = resolved_product.source.as_str(),
            distance_source = distance.source.as_str(),
            degraded,
            "Shipment quoted"
        );

        Ok(ShipmentQuote {
            product,
            product_source: resolved_product.source,
            quantity,
            distance,
            billable_weight_kg,
            quote: TariffQuote {
                total_cost: breakdown.total_cost,
                breakdown,
            },
            degraded,
        })
    }

    /// One snapshot per downstream dependency
    #[must_use]
    pub fn circuit_breaker_stats(&self) -> Vec<CircuitBreakerStats> {
        vec![self.products.breaker().stats(), self.distances.breaker().stats()]
    }

    pub async fn cache_health(&self) -> CacheHealth {
        self.cache.health().await
    }

    /// Administrative: close every breaker and forget recorded failures
    pub fn reset_circuit_breakers(&self) {
        self.products.breaker().reset();
        self.distances.breaker().reset();
    }

    #[must_use]
    pub const fn cache(&self) -> &TtlCache {
        &self.cache
    }
}
