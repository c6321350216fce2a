use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub redis: RedisConfig,
    pub cache: CacheConfig,
    pub resilience: ResilienceConfig,
    pub stock_api: ApiConfig,
    pub distance_api: ApiConfig,
    pub geo: GeoConfig,
    pub tariffs: TariffsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

/// Optional shared L2 cache. An empty `url` keeps the cache process-local.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
    pub operation_timeout_ms: u64,
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            operation_timeout_ms: 500,
            key_prefix: "freightline".to_string(),
        }
    }
}

impl RedisConfig {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.url.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_capacity: u64,
    /// TTL used when `set` is called without one
    pub default_ttl_seconds: u64,
    /// Volatile product/stock snapshots
    pub product_ttl_seconds: u64,
    /// Stable geographic distances
    pub distance_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            default_ttl_seconds: 300,
            product_ttl_seconds: 600,
            distance_ttl_seconds: 3600,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }

    #[must_use]
    pub const fn product_ttl(&self) -> Duration {
        Duration::from_secs(self.product_ttl_seconds)
    }

    #[must_use]
    pub const fn distance_ttl(&self) -> Duration {
        Duration::from_secs(self.distance_ttl_seconds)
    }
}

/// Circuit breaker and retry settings for one downstream dependency
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyPolicy {
    pub failure_threshold: u32,
    pub cooldown_seconds: u64,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub attempt_timeout_ms: u64,
}

impl Default for DependencyPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_seconds: 60,
            max_attempts: 3,
            base_delay_ms: 1000,
            attempt_timeout_ms: 5000,
        }
    }
}

impl DependencyPolicy {
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }

    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    #[must_use]
    pub const fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub stock_api: DependencyPolicy,
    pub distance_api: DependencyPolicy,
    /// Share one downstream call between concurrent cache misses for the same key
    pub coalesce_inflight: bool,
}

/// HTTP endpoint of a downstream dependency
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub connect_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: None,
            connect_timeout_seconds: 5,
            request_timeout_seconds: 10,
        }
    }
}

/// Extra postal-code centroids for the manual distance fallback
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    pub centroids: Vec<CentroidConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CentroidConfig {
    pub prefix: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TariffsConfig {
    /// YAML file holding the tariff records (used by the CLI)
    pub file_path: Option<String>,
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // FREIGHTLINE_CACHE__PRODUCT_TTL_SECONDS=120, FREIGHTLINE_REDIS__URL=..., etc.
        builder = builder.add_source(
            Environment::with_prefix("FREIGHTLINE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only (for Docker/K8s)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Check the configuration, collecting every problem instead of stopping at the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for (name, policy) in [
            ("stock_api", &self.resilience.stock_api),
            ("distance_api", &self.resilience.distance_api),
        ] {
            if policy.failure_threshold == 0 {
                errors.push(format!("resilience.{name}.failure_threshold must be at least 1"));
            }
            if policy.max_attempts == 0 {
                errors.push(format!("resilience.{name}.max_attempts must be at least 1"));
            }
            if policy.attempt_timeout_ms == 0 {
                errors.push(format!("resilience.{name}.attempt_timeout_ms must be positive"));
            }
        }

        if self.cache.product_ttl_seconds == 0 {
            errors.push("cache.product_ttl_seconds must be positive".to_string());
        }
        if self.cache.distance_ttl_seconds == 0 {
            errors.push("cache.distance_ttl_seconds must be positive".to_string());
        }
        if self.cache.max_capacity == 0 {
            errors.push("cache.max_capacity must be positive".to_string());
        }

        for (name, api) in [("stock_api", &self.stock_api), ("distance_api", &self.distance_api)] {
            if !api.base_url.is_empty() && reqwest::Url::parse(&api.base_url).is_err() {
                errors.push(format!("{name}.base_url is not a valid URL: {}", api.base_url));
            }
        }

        for centroid in &self.geo.centroids {
            if centroid.prefix.is_empty() {
                errors.push("geo.centroids entries need a non-empty prefix".to_string());
            }
            if !(-90.0..=90.0).contains(&centroid.latitude)
                || !(-180.0..=180.0).contains(&centroid.longitude)
            {
                errors.push(format!(
                    "geo.centroids[{}] has out-of-range coordinates",
                    centroid.prefix
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
