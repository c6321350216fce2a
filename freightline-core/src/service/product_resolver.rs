//! Product lookup: cache, then the Stock API behind a breaker and retries,
//! then a static placeholder. Never fails.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::{Coalescer, TtlCache};
use crate::metrics::resolver::DOWNSTREAM_DURATION;
use crate::models::{ProductId, ProductRecord, ProductSource, ResolvedProduct};
use crate::provider::StockApi;
use crate::resilience::{CircuitBreaker, RetryExecutor};

/// Breaker and metrics name of the Stock API
pub const STOCK_API: &str = "stock_api";

#[derive(Clone)]
pub struct ProductResolver {
    api: Arc<dyn StockApi>,
    cache: TtlCache,
    breaker: Arc<CircuitBreaker>,
    retry: RetryExecutor,
    ttl: Duration,
    coalescer: Coalescer<String, ResolvedProduct, Infallible>,
}

impl ProductResolver {
    pub fn new(
        api: Arc<dyn StockApi>,
        cache: TtlCache,
        breaker: Arc<CircuitBreaker>,
        retry: RetryExecutor,
        ttl: Duration,
        coalesce_inflight: bool,
    ) -> Self {
        Self {
            api,
            cache,
            breaker,
            retry,
            ttl,
            coalescer: Coalescer::new(coalesce_inflight),
        }
    }

    #[must_use]
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Current product snapshot, or the unavailable placeholder when the
    /// Stock API cannot be reached
    pub async fn resolve(&self, product_id: &ProductId) -> ResolvedProduct {
        let key = self.cache.keys().product(product_id);

        if let Some(product) = self.cache.get::<ProductRecord>(&key).await {
            crate::record_resolution!("product", ProductSource::Cache.as_str());
            return ResolvedProduct {
                product,
                source: ProductSource::Cache,
            };
        }

        let this = self.clone();
        let product_id = product_id.clone();
        self.coalescer
            .run(key.clone(), move || {
                let this = this.clone();
                let product_id = product_id.clone();
                let key = key.clone();
                async move { this.resolve_uncached(&product_id, &key).await }
            })
            .await
            .unwrap_or_else(|never| match never {})
    }

    async fn resolve_uncached(&self, product_id: &ProductId, key: &str) -> Result<ResolvedProduct, Infallible> {
        if self.breaker.is_open() {
            debug!(product_id = %product_id, "Stock API circuit open, using placeholder");
            return Ok(self.fallback(product_id));
        }

        let started = Instant::now();
        let result = self
            .retry
            .execute("stock_api.fetch_product", move || self.api.fetch_product(product_id))
            .await;

        match result {
            Ok(product) => {
                self.breaker.record_success();
                DOWNSTREAM_DURATION
                    .with_label_values(&[STOCK_API, "success"])
                    .observe(started.elapsed().as_secs_f64());

                self.cache.set(key, &product, Some(self.ttl)).await;
                crate::record_resolution!("product", ProductSource::Api.as_str());
                Ok(ResolvedProduct {
                    product,
                    source: ProductSource::Api,
                })
            }
            Err(e) => {
                self.breaker.record_failure();
                DOWNSTREAM_DURATION
                    .with_label_values(&[STOCK_API, "failure"])
                    .observe(started.elapsed().as_secs_f64());

                warn!(product_id = %product_id, error = %e, "Stock API unavailable, using placeholder");
                Ok(self.fallback(product_id))
            }
        }
    }

    /// Placeholder; never cached so the real record is picked up on recovery
    fn fallback(&self, product_id: &ProductId) -> ResolvedProduct {
        crate::record_resolution!("product", ProductSource::Fallback.as_str());
        ResolvedProduct {
            product: ProductRecord::unavailable(product_id.clone()),
            source: ProductSource::Fallback,
        }
    }
}

impl std::fmt::Debug for ProductResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductResolver")
            .field("breaker", &self.breaker.name())
            .field("ttl", &self.ttl)
            .field("coalescer", &self.coalescer)
            .finish_non_exhaustive()
    }
}
