//! Distance lookup: cache, then the distance API behind a breaker and
//! retries, then great-circle distance between postal-code centroids.
//!
//! Fails only when neither the API nor the centroid table can produce a
//! number. There is no silent zero.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::{Coalescer, TtlCache};
use crate::geo::CentroidTable;
use crate::metrics::resolver::DOWNSTREAM_DURATION;
use crate::models::{normalize_postal_code, DistanceSource, ResolvedDistance};
use crate::provider::{DistanceApi, ProviderError};
use crate::resilience::{CircuitBreaker, RetryExecutor};
use crate::{Error, Result};

/// Breaker and metrics name of the distance API
pub const DISTANCE_API: &str = "distance_api";

#[derive(Clone)]
pub struct DistanceResolver {
    api: Arc<dyn DistanceApi>,
    cache: TtlCache,
    breaker: Arc<CircuitBreaker>,
    retry: RetryExecutor,
    centroids: Arc<CentroidTable>,
    ttl: Duration,
    // `None` is "unresolvable"; the error is rebuilt by each caller
    coalescer: Coalescer<String, Option<ResolvedDistance>, std::convert::Infallible>,
}

impl DistanceResolver {
    pub fn new(
        api: Arc<dyn DistanceApi>,
        cache: TtlCache,
        breaker: Arc<CircuitBreaker>,
        retry: RetryExecutor,
        centroids: Arc<CentroidTable>,
        ttl: Duration,
        coalesce_inflight: bool,
    ) -> Self {
        Self {
            api,
            cache,
            breaker,
            retry,
            centroids,
            ttl,
            coalescer: Coalescer::new(coalesce_inflight),
        }
    }

    #[must_use]
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Distance in km between two postal codes.
    ///
    /// Codes are trimmed and upper-cased first; A→B and B→A share a cache entry.
    pub async fn resolve(&self, from_postal_code: &str, to_postal_code: &str) -> Result<ResolvedDistance> {
        let started = Instant::now();
        let from = normalize_postal_code(from_postal_code);
        let to = normalize_postal_code(to_postal_code);
        if from.is_empty() || to.is_empty() {
            return Err(Error::InvalidInput(format!(
                "postal codes must not be empty (from: {from_postal_code:?}, to: {to_postal_code:?})"
            )));
        }

        let key = self.cache.keys().distance(&from, &to);
        if let Some(distance_km) = self.cache.get::<f64>(&key).await {
            crate::record_resolution!("distance", DistanceSource::Cache.as_str());
            return Ok(ResolvedDistance {
                distance_km,
                source: DistanceSource::Cache,
                response_time_ms: elapsed_ms(started),
            });
        }

        let this = self.clone();
        let (owned_from, owned_to) = (from.clone(), to.clone());
        let resolved = self
            .coalescer
            .run(key.clone(), move || {
                let this = this.clone();
                let (from, to, key) = (owned_from.clone(), owned_to.clone(), key.clone());
                async move { Ok(this.resolve_uncached(&from, &to, &key).await) }
            })
            .await
            .unwrap_or_else(|never| match never {});

        resolved
            .map(|distance| ResolvedDistance {
                response_time_ms: elapsed_ms(started),
                ..distance
            })
            .ok_or(Error::DistanceUnresolvable { from, to })
    }

    async fn resolve_uncached(&self, from: &str, to: &str, key: &str) -> Option<ResolvedDistance> {
        if self.breaker.is_open() {
            debug!(from, to, "Distance API circuit open, computing locally");
            return self.manual(from, to, key).await;
        }

        let started = Instant::now();
        let result = self
            .retry
            .execute("distance_api.fetch_distance", move || async move {
                let km = self.api.fetch_distance(from, to).await?;
                if km.is_finite() && km >= 0.0 {
                    Ok(km)
                } else {
                    Err(ProviderError::InvalidResponse(format!("distance {km} km")))
                }
            })
            .await;

        match result {
            Ok(distance_km) => {
                self.breaker.record_success();
                DOWNSTREAM_DURATION
                    .with_label_values(&[DISTANCE_API, "success"])
                    .observe(started.elapsed().as_secs_f64());

                self.cache.set(key, &distance_km, Some(self.ttl)).await;
                crate::record_resolution!("distance", DistanceSource::Api.as_str());
                Some(ResolvedDistance {
                    distance_km,
                    source: DistanceSource::Api,
                    response_time_ms: 0,
                })
            }
            Err(e) => {
                self.breaker.record_failure();
                DOWNSTREAM_DURATION
                    .with_label_values(&[DISTANCE_API, "failure"])
                    .observe(started.elapsed().as_secs_f64());

                warn!(from, to, error = %e, "Distance API unavailable, computing locally");
                self.manual(from, to, key).await
            }
        }
    }

    /// Haversine between centroids, cached like an API result
    async fn manual(&self, from: &str, to: &str, key: &str) -> Option<ResolvedDistance> {
        let Some(distance_km) = self.centroids.distance_km(from, to) else {
            warn!(from, to, "No centroid for postal code, distance unresolvable");
            return None;
        };

        self.cache.set(key, &distance_km, Some(self.ttl)).await;
        crate::record_resolution!("distance", DistanceSource::Manual.as_str());
        Some(ResolvedDistance {
            distance_km,
            source: DistanceSource::Manual,
            response_time_ms: 0,
        })
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

impl std::fmt::Debug for DistanceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistanceResolver")
            .field("breaker", &self.breaker.name())
            .field("centroids", &self.centroids.len())
            .field("ttl", &self.ttl)
            .field("coalescer", &self.coalescer)
            .finish_non_exhaustive()
    }
}
