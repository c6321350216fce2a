use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{info, warn};

use freightline_core::{
    bootstrap::{init_services, load_config, load_config_from, Services},
    logging,
    metrics::gather_metrics,
    models::{Environment, ProductId, TransportMethodId},
    provider::{HttpDistanceApi, HttpStockApi},
    repository::{FileTariffRepository, InMemoryTariffRepository, TariffConfigRepository},
    Config,
};

#[derive(Parser, Debug)]
#[command(name = "freightline")]
#[command(about = "Shipping quotes over the stock and distance services", long_about = None)]
struct Args {
    /// Config file (defaults to FREIGHTLINE_CONFIG_PATH, then ./config.yaml)
    #[arg(long, short)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Quote a shipment end to end
    Quote {
        #[arg(long)]
        product_id: String,

        #[arg(long, default_value_t = 1)]
        quantity: u32,

        /// Origin postal code
        #[arg(long)]
        from: String,

        /// Destination postal code
        #[arg(long)]
        to: String,

        /// Transport method id, e.g. "truck"
        #[arg(long)]
        method: String,

        #[arg(long, env = "FREIGHTLINE_ENVIRONMENT", default_value = "production")]
        environment: Environment,
    },

    /// Resolve the distance between two postal codes
    Distance {
        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,
    },

    /// Resolve a product snapshot
    Product {
        #[arg(long)]
        product_id: String,
    },

    /// Circuit breaker and cache health
    Health {
        /// Also dump Prometheus metrics
        #[arg(long)]
        metrics: bool,
    },
}

fn tariff_repository(config: &Config) -> Result<Arc<dyn TariffConfigRepository>> {
    if let Some(path) = &config.tariffs.file_path {
        return Ok(Arc::new(FileTariffRepository::load(path)?));
    }

    warn!("tariffs.file_path not set, no tariff records available");
    Ok(Arc::new(InMemoryTariffRepository::default()))
}

async fn build_services(config: &Config) -> Result<Services> {
    let stock_api = Arc::new(HttpStockApi::from_config(&config.stock_api)?);
    let distance_api = Arc::new(HttpDistanceApi::from_config(&config.distance_api)?);
    let tariffs = tariff_repository(config)?;

    init_services(config, stock_api, distance_api, tariffs).await
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Load configuration
    let config = match args.config.as_deref() {
        Some(path) => load_config_from(Some(path))?,
        None => load_config()?,
    };

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;

    // 3. Wire adapters, cache and resolvers
    let services = build_services(&config).await?;
    info!(command = ?args.command, "Freightline ready");
    let quotes = &services.quote_service;

    match args.command {
        Command::Quote {
            product_id,
            quantity,
            from,
            to,
            method,
            environment,
        } => {
            let quote = quotes
                .quote_shipment(
                    &ProductId::from(product_id),
                    quantity,
                    &from,
                    &to,
                    &TransportMethodId::from(method),
                    environment,
                )
                .await?;
            print_json(&quote)?;
        }
        Command::Distance { from, to } => {
            let distance = quotes.resolve_distance(&from, &to).await?;
            print_json(&distance)?;
        }
        Command::Product { product_id } => {
            let product = quotes.resolve_product(&ProductId::from(product_id)).await;
            print_json(&product)?;
        }
        Command::Health { metrics } => {
            let health = json!({
                "circuit_breakers": quotes.circuit_breaker_stats(),
                "cache": quotes.cache_health().await,
            });
            print_json(&health)?;

            if metrics {
                print!("{}", gather_metrics()?);
            }
        }
    }

    Ok(())
}
