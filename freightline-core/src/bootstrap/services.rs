//! Service initialization and dependency injection

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::{
    cache::TtlCache,
    config::DependencyPolicy,
    geo::CentroidTable,
    provider::{DistanceApi, StockApi},
    repository::TariffConfigRepository,
    resilience::{CircuitBreaker, RetryExecutor, RetryPolicy},
    service::{DistanceResolver, ProductResolver, QuoteService, TariffCalculator, DISTANCE_API, STOCK_API},
    Config,
};

/// Container for all initialized services
#[derive(Clone, Debug)]
pub struct Services {
    /// Facade used by calling services
    pub quote_service: QuoteService,
    /// Shared cache (L1, plus Redis when configured)
    pub cache: TtlCache,
    pub stock_breaker: Arc<CircuitBreaker>,
    pub distance_breaker: Arc<CircuitBreaker>,
}

fn breaker(name: &str, policy: &DependencyPolicy) -> Arc<CircuitBreaker> {
    Arc::new(CircuitBreaker::new(name, policy.failure_threshold, policy.cooldown()))
}

/// Connect to Redis if configured. A Redis outage at startup degrades to
/// L1-only caching instead of failing.
async fn connect_redis(config: &Config) -> Option<redis::aio::ConnectionManager> {
    if !config.redis.is_enabled() {
        info!("Redis not configured, cache is process-local");
        return None;
    }

    let client = match redis::Client::open(config.redis.url.clone()) {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "Invalid Redis URL, cache is process-local");
            return None;
        }
    };

    let connect = redis::aio::ConnectionManager::new(client);
    match tokio::time::timeout(Duration::from_secs(5), connect).await {
        Ok(Ok(conn)) => {
            info!("Redis L2 cache connected");
            Some(conn)
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Redis unavailable, cache is process-local");
            None
        }
        Err(_) => {
            warn!("Redis connection timed out, cache is process-local");
            None
        }
    }
}

/// Build the shared cache, one breaker per dependency, retry executors and
/// the resolvers from `Config`
pub async fn init_services(
    config: &Config,
    stock_api: Arc<dyn StockApi>,
    distance_api: Arc<dyn DistanceApi>,
    tariffs: Arc<dyn TariffConfigRepository>,
) -> Result<Services, anyhow::Error> {
    info!("Initializing services...");

    let redis = connect_redis(config).await;
    let cache = TtlCache::from_config(config, redis);

    let policies = &config.resilience;
    let stock_breaker = breaker(STOCK_API, &policies.stock_api);
    let distance_breaker = breaker(DISTANCE_API, &policies.distance_api);

    let products = ProductResolver::new(
        stock_api,
        cache.clone(),
        stock_breaker.clone(),
        RetryExecutor::new(RetryPolicy::from_dependency(&policies.stock_api)),
        config.cache.product_ttl(),
        policies.coalesce_inflight,
    );
    info!(
        threshold = policies.stock_api.failure_threshold,
        max_attempts = policies.stock_api.max_attempts,
        ttl_secs = config.cache.product_ttl_seconds,
        "ProductResolver initialized"
    );

    let centroids = Arc::new(CentroidTable::from_config(&config.geo));
    let distances = DistanceResolver::new(
        distance_api,
        cache.clone(),
        distance_breaker.clone(),
        RetryExecutor::new(RetryPolicy::from_dependency(&policies.distance_api)),
        centroids.clone(),
        config.cache.distance_ttl(),
        policies.coalesce_inflight,
    );
    info!(
        threshold = policies.distance_api.failure_threshold,
        max_attempts = policies.distance_api.max_attempts,
        ttl_secs = config.cache.distance_ttl_seconds,
        centroids = centroids.len(),
        "DistanceResolver initialized"
    );

    let quote_service = QuoteService::new(products, distances, TariffCalculator::new(tariffs), cache.clone());
    info!("QuoteService initialized");

    Ok(Services {
        quote_service,
        cache,
        stock_breaker,
        distance_breaker,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProductId, ProductSource};
    use crate::repository::InMemoryTariffRepository;
    use crate::resilience::CircuitState;
    use crate::test_helpers::{FakeDistanceApi, FakeStockApi};

    #[tokio::test(start_paused = true)]
    async fn test_init_services_wires_configured_policies() {
        let mut config = Config::default();
        config.resilience.stock_api.failure_threshold = 1;
        config.resilience.stock_api.base_delay_ms = 1;

        let stock = Arc::new(FakeStockApi::new());
        stock.set_down(true);
        let services = init_services(
            &config,
            stock.clone(),
            Arc::new(FakeDistanceApi::new(10.0)),
            Arc::new(InMemoryTariffRepository::default()),
        )
        .await
        .unwrap();

        assert!(!services.cache.redis_enabled());
        let resolved = services.quote_service.resolve_product(&ProductId::from("p")).await;
        assert_eq!(resolved.source, ProductSource::Fallback);
        assert_eq!(stock.calls(), 3);
        assert_eq!(services.stock_breaker.state(), CircuitState::Open);
        assert_eq!(services.distance_breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_unreachable_redis_degrades_to_l1() {
        let mut config = Config::default();
        config.redis.url = "not-a-redis-url".to_string();

        assert!(connect_redis(&config).await.is_none());
    }
}
