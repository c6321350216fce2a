//! Tariff configuration store
//!
//! The store is owned elsewhere; this crate only reads from it. Records come
//! back in store order, which the calculator relies on to break ties between
//! records sharing a `valid_from`.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::models::{Environment, TariffConfig, TransportMethodId};
use crate::{Error, Result};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TariffConfigRepository: Send + Sync {
    /// Active records for a transport method and environment, in store order
    async fn get_active_tariff_configs(
        &self,
        transport_method_id: &TransportMethodId,
        environment: Environment,
    ) -> Result<Vec<TariffConfig>>;
}

fn matching(
    records: &[TariffConfig],
    transport_method_id: &TransportMethodId,
    environment: Environment,
) -> Vec<TariffConfig> {
    records
        .iter()
        .filter(|c| c.is_active && c.environment == environment && &c.transport_method_id == transport_method_id)
        .cloned()
        .collect()
}

/// Store held in memory
#[derive(Debug, Default)]
pub struct InMemoryTariffRepository {
    records: RwLock<Vec<TariffConfig>>,
}

impl InMemoryTariffRepository {
    #[must_use]
    pub fn new(records: Vec<TariffConfig>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Append a record (it wins ties against earlier records)
    pub fn insert(&self, record: TariffConfig) {
        self.records.write().push(record);
    }

    pub fn replace_all(&self, records: Vec<TariffConfig>) {
        *self.records.write() = records;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl TariffConfigRepository for InMemoryTariffRepository {
    async fn get_active_tariff_configs(
        &self,
        transport_method_id: &TransportMethodId,
        environment: Environment,
    ) -> Result<Vec<TariffConfig>> {
        let records = matching(&self.records.read(), transport_method_id, environment);
        debug!(
            transport_method_id = %transport_method_id,
            environment = %environment,
            count = records.len(),
            "Loaded tariff configs"
        );
        Ok(records)
    }
}

/// Store backed by a YAML file holding a list of records
#[derive(Debug)]
pub struct FileTariffRepository {
    path: PathBuf,
    records: RwLock<Vec<TariffConfig>>,
}

impl FileTariffRepository {
    /// Read and parse the file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = Self::read(&path)?;
        tracing::info!(path = %path.display(), count = records.len(), "Tariff file loaded");
        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    /// Re-read the file. On failure the previous records are kept.
    pub fn reload(&self) -> Result<usize> {
        let records = Self::read(&self.path)?;
        let count = records.len();
        *self.records.write() = records;
        tracing::info!(path = %self.path.display(), count, "Tariff file reloaded");
        Ok(count)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(path: &Path) -> Result<Vec<TariffConfig>> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::TariffStore(format!("Failed to read tariff file {}: {e}", path.display()))
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

#[async_trait]
impl TariffConfigRepository for FileTariffRepository {
    async fn get_active_tariff_configs(
        &self,
        transport_method_id: &TransportMethodId,
        environment: Environment,
    ) -> Result<Vec<TariffConfig>> {
        Ok(matching(&self.records.read(), transport_method_id, environment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::io::Write;

    const TARIFF_YAML: &str = r#"
- transport_method_id: truck
  base_tariff: "100.00"
  cost_per_kg: "2.50"
  cost_per_km: "1.10"
  volumetric_factor: "200"
  environment: production
  valid_from: "2026-01-01T00:00:00Z"
- transport_method_id: truck
  base_tariff: "90.00"
  cost_per_kg: "2.00"
  cost_per_km: "1.00"
  volumetric_factor: "200"
  environment: staging
  valid_from: "2026-01-01T00:00:00Z"
- transport_method_id: truck
  base_tariff: "120.00"
  cost_per_kg: "3.00"
  cost_per_km: "1.50"
  volumetric_factor: "250"
  environment: production
  valid_from: "2026-06-01T00:00:00Z"
  valid_to: "2026-12-31T23:59:59Z"
  is_active: false
"#;

    fn tariff_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_file_repository_filters_by_method_environment_and_active() {
        let file = tariff_file(TARIFF_YAML);
        let repo = FileTariffRepository::load(file.path()).unwrap();

        let configs = repo
            .get_active_tariff_configs(&TransportMethodId::from("truck"), Environment::Production)
            .await
            .unwrap();

        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].base_tariff, dec!(100.00));
        assert_eq!(configs[0].valid_from, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        assert!(configs[0].valid_to.is_none());

        let none = repo
            .get_active_tariff_configs(&TransportMethodId::from("van"), Environment::Production)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_file_repository_reload_keeps_old_records_on_error() {
        let file = tariff_file(TARIFF_YAML);
        let repo = FileTariffRepository::load(file.path()).unwrap();

        std::fs::write(file.path(), "not: [valid").unwrap();

        assert!(matches!(repo.reload(), Err(Error::TariffStore(_))));
        let configs = repo
            .get_active_tariff_configs(&TransportMethodId::from("truck"), Environment::Staging)
            .await
            .unwrap();
        assert_eq!(configs.len(), 1);
    }

    #[test]
    fn test_missing_file() {
        let err = FileTariffRepository::load("/nonexistent/tariffs.yaml").unwrap_err();
        assert!(matches!(err, Error::TariffStore(msg) if msg.contains("Failed to read")));
    }

    #[tokio::test]
    async fn test_in_memory_preserves_store_order() {
        let file = tariff_file(TARIFF_YAML);
        let records = FileTariffRepository::read(file.path()).unwrap();
        let repo = InMemoryTariffRepository::new(Vec::new());
        assert!(repo.is_empty());

        let mut later = records[0].clone();
        later.base_tariff = dec!(105.00);
        repo.insert(records[0].clone());
        repo.insert(later);

        let configs = repo
            .get_active_tariff_configs(&TransportMethodId::from("truck"), Environment::Production)
            .await
            .unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[1].base_tariff, dec!(105.00));

        repo.replace_all(records);
        assert_eq!(repo.len(), 3);
    }
}
