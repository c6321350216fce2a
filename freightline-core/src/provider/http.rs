//! reqwest-backed adapters for the Stock and distance APIs

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::error::check_response;
use super::{DistanceApi, ProviderError, StockApi};
use crate::config::ApiConfig;
use crate::models::{ProductId, ProductRecord};

fn build_client(config: &ApiConfig, name: &str) -> Result<Client, ProviderError> {
    if config.base_url.is_empty() {
        return Err(ProviderError::InvalidConfig(format!("{name}.base_url is not set")));
    }

    // Redirects disabled: the configured host is the only host we talk to
    Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .timeout(Duration::from_secs(config.request_timeout_seconds))
        .pool_max_idle_per_host(10)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| ProviderError::InvalidConfig(format!("Failed to build {name} HTTP client: {e}")))
}

fn base_url(config: &ApiConfig) -> String {
    config.base_url.trim_end_matches('/').to_string()
}

/// `GET {base}/products/{id}` returning a JSON `ProductRecord`
#[derive(Debug, Clone)]
pub struct HttpStockApi {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpStockApi {
    pub fn from_config(config: &ApiConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            base_url: base_url(config),
            api_key: config.api_key.clone(),
            client: build_client(config, "stock_api")?,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl StockApi for HttpStockApi {
    async fn fetch_product(&self, product_id: &ProductId) -> Result<ProductRecord, ProviderError> {
        let url = format!("{}/products/{}", self.base_url, product_id.as_str());

        let mut request = self.client.get(&url);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = check_response(request.send().await?, &format!("product {product_id}"))?;
        let product: ProductRecord = response.json().await?;

        if product.id != *product_id {
            return Err(ProviderError::InvalidResponse(format!(
                "asked for product {product_id}, got {}",
                product.id
            )));
        }
        Ok(product)
    }
}

#[derive(Debug, Deserialize)]
struct DistanceResponse {
    distance_km: f64,
}

/// `GET {base}/distance?from=..&to=..` returning `{"distance_km": f64}`
#[derive(Debug, Clone)]
pub struct HttpDistanceApi {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpDistanceApi {
    pub fn from_config(config: &ApiConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            base_url: base_url(config),
            api_key: config.api_key.clone(),
            client: build_client(config, "distance_api")?,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl DistanceApi for HttpDistanceApi {
    async fn fetch_distance(&self, from_postal_code: &str, to_postal_code: &str) -> Result<f64, ProviderError> {
        let url = format!("{}/distance", self.base_url);

        let mut request = self
            .client
            .get(&url)
            .query(&[("from", from_postal_code), ("to", to_postal_code)]);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = check_response(
            request.send().await?,
            &format!("distance {from_postal_code} -> {to_postal_code}"),
        )?;
        let body: DistanceResponse = response.json().await?;
        Ok(body.distance_km)
    }
}
