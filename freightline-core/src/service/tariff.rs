//! Tariff selection and shipping cost arithmetic
//!
//! All money and weights are `Decimal`. Every line of a breakdown is rounded
//! to 2 decimals half-up on its own and the total is the sum of the rounded
//! lines, so a displayed breakdown always adds up.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::metrics::tariff::CALCULATIONS;
use crate::models::{Dimensions, Environment, TariffBreakdown, TariffConfig, TariffQuote, TransportMethodId};
use crate::repository::TariffConfigRepository;
use crate::{Error, Result};

/// cm³ in one m³
const CM3_PER_M3: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Round to 2 decimals, half up
#[must_use]
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Non-negative, finite `f64` as `Decimal`
pub fn to_decimal(value: f64, what: &str) -> Result<Decimal> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::InvalidInput(format!("{what} must be a non-negative number, got {value}")));
    }
    Decimal::try_from(value).map_err(|e| Error::InvalidInput(format!("{what} out of range: {e}")))
}

/// `a * b`, or `InvalidInput` when the product leaves `Decimal`'s range
pub fn checked_product(a: Decimal, b: Decimal, what: &str) -> Result<Decimal> {
    a.checked_mul(b)
        .ok_or_else(|| Error::InvalidInput(format!("{what} is out of range ({a} x {b})")))
}

fn checked_sum(lines: &[Decimal]) -> Result<Decimal> {
    lines
        .iter()
        .try_fold(Decimal::ZERO, |acc, line| acc.checked_add(*line))
        .ok_or_else(|| Error::InvalidInput("total cost is out of range".to_string()))
}

/// The single record that applies at `as_of`.
///
/// Active, matching method and environment, validity window containing
/// `as_of`; the latest `valid_from` wins and on equal `valid_from` the record
/// listed last wins.
pub fn select_applicable_config<'a>(
    configs: &'a [TariffConfig],
    transport_method_id: &TransportMethodId,
    environment: Environment,
    as_of: DateTime<Utc>,
) -> Result<&'a TariffConfig> {
    configs
        .iter()
        .filter(|c| {
            &c.transport_method_id == transport_method_id
                && c.environment == environment
                && c.is_applicable_at(as_of)
        })
        // max_by_key keeps the last of equal maxima
        .max_by_key(|c| c.valid_from)
        .ok_or_else(|| Error::NoApplicableTariff {
            transport_method_id: transport_method_id.clone(),
            environment,
            as_of,
        })
}

/// `round2(L * W * H / 1_000_000 * factor)` with dimensions in cm
pub fn volumetric_weight(dimensions: &Dimensions, volumetric_factor: Decimal) -> Result<Decimal> {
    let length = to_decimal(dimensions.length_cm, "length_cm")?;
    let width = to_decimal(dimensions.width_cm, "width_cm")?;
    let height = to_decimal(dimensions.height_cm, "height_cm")?;

    let volume_cm3 = checked_product(checked_product(length, width, "package volume")?, height, "package volume")?;
    let cubic_metres = volume_cm3 / CM3_PER_M3;
    Ok(round2(checked_product(cubic_metres, volumetric_factor, "volumetric weight")?))
}

/// The larger of actual and volumetric weight
pub fn billable_weight(real_weight_kg: Decimal, dimensions: &Dimensions, volumetric_factor: Decimal) -> Result<Decimal> {
    if real_weight_kg.is_sign_negative() {
        return Err(Error::InvalidInput(format!("weight must be non-negative, got {real_weight_kg}")));
    }
    Ok(real_weight_kg.max(volumetric_weight(dimensions, volumetric_factor)?))
}

/// Per-line breakdown for `config` applied to a weight and a distance
pub fn cost_breakdown(config: &TariffConfig, billable_weight_kg: Decimal, distance_km: Decimal) -> Result<TariffBreakdown> {
    let base_tariff = round2(config.base_tariff);
    let weight_cost = round2(checked_product(billable_weight_kg, config.cost_per_kg, "weight cost")?);
    let distance_cost = round2(checked_product(distance_km, config.cost_per_km, "distance cost")?);

    Ok(TariffBreakdown {
        base_tariff,
        weight_cost,
        distance_cost,
        total_cost: checked_sum(&[base_tariff, weight_cost, distance_cost])?,
        billable_weight_kg,
        distance_km,
        tariff_valid_from: Some(config.valid_from),
    })
}

/// `round2(base) + round2(weight * per_kg) + round2(distance * per_km)`
pub fn total_cost(
    base_tariff: Decimal,
    cost_per_kg: Decimal,
    cost_per_km: Decimal,
    billable_weight_kg: Decimal,
    distance_km: Decimal,
) -> Result<Decimal> {
    checked_sum(&[
        round2(base_tariff),
        round2(checked_product(billable_weight_kg, cost_per_kg, "weight cost")?),
        round2(checked_product(distance_km, cost_per_km, "distance cost")?),
    ])
}

/// Prices shipments against the tariff store
#[derive(Clone)]
pub struct TariffCalculator {
    repository: Arc<dyn TariffConfigRepository>,
}

impl TariffCalculator {
    pub fn new(repository: Arc<dyn TariffConfigRepository>) -> Self {
        Self { repository }
    }

    /// Record that applies now (or at `as_of`)
    pub async fn applicable_config(
        &self,
        transport_method_id: &TransportMethodId,
        environment: Environment,
        as_of: DateTime<Utc>,
    ) -> Result<TariffConfig> {
        let configs = self
            .repository
            .get_active_tariff_configs(transport_method_id, environment)
            .await?;
        select_applicable_config(&configs, transport_method_id, environment, as_of).cloned()
    }

    pub async fn calculate_tariff(
        &self,
        transport_method_id: &TransportMethodId,
        billable_weight_kg: f64,
        distance_km: f64,
        environment: Environment,
    ) -> Result<TariffQuote> {
        self.calculate_tariff_at(transport_method_id, billable_weight_kg, distance_km, environment, Utc::now())
            .await
    }

    /// Fails with `NoApplicableTariff` when no record covers `as_of`
    pub async fn calculate_tariff_at(
        &self,
        transport_method_id: &TransportMethodId,
        billable_weight_kg: f64,
        distance_km: f64,
        environment: Environment,
        as_of: DateTime<Utc>,
    ) -> Result<TariffQuote> {
        let result = self
            .quote(transport_method_id, billable_weight_kg, distance_km, environment, as_of)
            .await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(Error::NoApplicableTariff { .. }) => "no_tariff",
            Err(Error::InvalidInput(_)) => "invalid_input",
            Err(_) => "error",
        };
        CALCULATIONS.with_label_values(&[outcome]).inc();
        result
    }

    async fn quote(
        &self,
        transport_method_id: &TransportMethodId,
        billable_weight_kg: f64,
        distance_km: f64,
        environment: Environment,
        as_of: DateTime<Utc>,
    ) -> Result<TariffQuote> {
        let weight = to_decimal(billable_weight_kg, "billable_weight_kg")?;
        let distance = to_decimal(distance_km, "distance_km")?;

        let config = self
            .applicable_config(transport_method_id, environment, as_of)
            .await
            .inspect_err(|e| {
                if e.is_missing_tariff() {
                    warn!(
                        transport_method_id = %transport_method_id,
                        environment = %environment,
                        "No applicable tariff configured"
                    );
                }
            })?;

        let breakdown = cost_breakdown(&config, weight, distance)?;
        debug!(
            transport_method_id = %transport_method_id,
            total = %breakdown.total_cost,
            valid_from = %config.valid_from,
            "Tariff calculated"
        );

        Ok(TariffQuote {
            total_cost: breakdown.total_cost,
            breakdown,
        })
    }
}

impl std::fmt::Debug for TariffCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TariffCalculator").finish_non_exhaustive()
    }
}
