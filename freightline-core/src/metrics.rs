//! Prometheus metrics for the integration layer
//!
//! Everything registers into one process-wide registry; `gather_metrics()`
//! renders it in the text exposition format for the health surface.

use prometheus::{Encoder, Registry, TextEncoder};

/// Global metrics registry
pub static REGISTRY: std::sync::LazyLock<Registry> = std::sync::LazyLock::new(Registry::new);

/// Cache operations
pub mod cache {
    use super::REGISTRY;
    use prometheus::{register_counter_vec_with_registry, CounterVec};

    /// Cache hit counter
    pub static CACHE_HITS: std::sync::LazyLock<CounterVec> = std::sync::LazyLock::new(|| {
        register_counter_vec_with_registry!(
            "cache_hits_total",
            "Total number of cache hits",
            &["cache_type", "level"],
            REGISTRY.clone()
        ).expect("Failed to register CACHE_HITS")
    });

    /// Cache miss counter
    pub static CACHE_MISSES: std::sync::LazyLock<CounterVec> = std::sync::LazyLock::new(|| {
        register_counter_vec_with_registry!(
            "cache_misses_total",
            "Total number of cache misses",
            &["cache_type"],
            REGISTRY.clone()
        ).expect("Failed to register CACHE_MISSES")
    });

    /// Absorbed storage errors (counted, never propagated)
    pub static CACHE_ERRORS: std::sync::LazyLock<CounterVec> = std::sync::LazyLock::new(|| {
        register_counter_vec_with_registry!(
            "cache_errors_total",
            "Total number of absorbed cache storage errors",
            &["level", "operation"],
            REGISTRY.clone()
        ).expect("Failed to register CACHE_ERRORS")
    });
}

/// Circuit breakers and retries
pub mod resilience {
    use super::REGISTRY;
    use prometheus::{
        register_counter_vec_with_registry, register_int_gauge_vec_with_registry, CounterVec,
        IntGaugeVec,
    };

    /// Current breaker state: 0 closed, 1 open, 2 half-open
    pub static CIRCUIT_BREAKER_STATE: std::sync::LazyLock<IntGaugeVec> = std::sync::LazyLock::new(|| {
        register_int_gauge_vec_with_registry!(
            "circuit_breaker_state",
            "Circuit breaker state (0 closed, 1 open, 2 half-open)",
            &["dependency"],
            REGISTRY.clone()
        ).expect("Failed to register CIRCUIT_BREAKER_STATE")
    });

    /// Breaker transitions
    pub static CIRCUIT_BREAKER_TRANSITIONS: std::sync::LazyLock<CounterVec> = std::sync::LazyLock::new(|| {
        register_counter_vec_with_registry!(
            "circuit_breaker_transitions_total",
            "Total number of circuit breaker state transitions",
            &["dependency", "to"],
            REGISTRY.clone()
        ).expect("Failed to register CIRCUIT_BREAKER_TRANSITIONS")
    });

    /// Failed attempts that were followed by another attempt
    pub static DOWNSTREAM_RETRIES: std::sync::LazyLock<CounterVec> = std::sync::LazyLock::new(|| {
        register_counter_vec_with_registry!(
            "downstream_retries_total",
            "Total number of retried downstream attempts",
            &["operation"],
            REGISTRY.clone()
        ).expect("Failed to register DOWNSTREAM_RETRIES")
    });
}

/// Resolver outcomes
pub mod resolver {
    use super::REGISTRY;
    use prometheus::{
        register_counter_vec_with_registry, register_histogram_vec_with_registry, CounterVec,
        HistogramVec,
    };

    /// Resolutions by resolver and source (cache, api, fallback, manual)
    pub static RESOLUTIONS: std::sync::LazyLock<CounterVec> = std::sync::LazyLock::new(|| {
        register_counter_vec_with_registry!(
            "resolver_resolutions_total",
            "Total number of resolutions by source",
            &["resolver", "source"],
            REGISTRY.clone()
        ).expect("Failed to register RESOLUTIONS")
    });

    /// Duration of the retried downstream call, including backoff
    pub static DOWNSTREAM_DURATION: std::sync::LazyLock<HistogramVec> = std::sync::LazyLock::new(|| {
        register_histogram_vec_with_registry!(
            "downstream_call_duration_seconds",
            "Downstream call duration in seconds, including retries",
            &["dependency", "outcome"],
            REGISTRY.clone()
        ).expect("Failed to register DOWNSTREAM_DURATION")
    });
}

/// Tariff calculations
pub mod tariff {
    use super::REGISTRY;
    use prometheus::{register_counter_vec_with_registry, CounterVec};

    pub static CALCULATIONS: std::sync::LazyLock<CounterVec> = std::sync::LazyLock::new(|| {
        register_counter_vec_with_registry!(
            "tariff_calculations_total",
            "Total number of tariff calculations by outcome",
            &["outcome"],
            REGISTRY.clone()
        ).expect("Failed to register CALCULATIONS")
    });
}

/// Helper macro to record cache metrics
#[macro_export]
macro_rules! record_cache_hit {
    ($cache_type:expr, $level:expr) => {
        $crate::metrics::cache::CACHE_HITS
            .with_label_values(&[$cache_type, $level])
            .inc();
    };
}

#[macro_export]
macro_rules! record_cache_miss {
    ($cache_type:expr) => {
        $crate::metrics::cache::CACHE_MISSES
            .with_label_values(&[$cache_type])
            .inc();
    };
}

/// Helper macro to record a resolver outcome
#[macro_export]
macro_rules! record_resolution {
    ($resolver:expr, $source:expr) => {
        $crate::metrics::resolver::RESOLUTIONS
            .with_label_values(&[$resolver, $source])
            .inc();
    };
}

/// Expose metrics in Prometheus format
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|_| prometheus::Error::Msg("Invalid UTF-8".to_string()))
}
