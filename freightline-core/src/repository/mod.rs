pub mod tariff;

pub use tariff::{FileTariffRepository, InMemoryTariffRepository, TariffConfigRepository};

#[cfg(test)]
pub use tariff::MockTariffConfigRepository;
