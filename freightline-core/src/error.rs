use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{Environment, TransportMethodId};

#[derive(Error, Debug)]
pub enum Error {
    /// No active tariff record covers the requested method, environment and instant.
    /// A configuration problem: retrying will not help.
    #[error("No applicable tariff for transport method {transport_method_id} in {environment} at {as_of}")]
    NoApplicableTariff {
        transport_method_id: TransportMethodId,
        environment: Environment,
        as_of: DateTime<Utc>,
    },

    /// Neither the distance API nor the local centroid table could produce a distance.
    #[error("Distance unresolvable between postal codes {from} and {to}")]
    DistanceUnresolvable { from: String, to: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Tariff store error: {0}")]
    TariffStore(String),
}

impl Error {
    /// True for "no pricing policy configured", as opposed to a dependency outage.
    #[must_use]
    pub const fn is_missing_tariff(&self) -> bool {
        matches!(self, Self::NoApplicableTariff { .. })
    }

    /// True when no distance could be produced anywhere in the fallback chain.
    #[must_use]
    pub const fn is_unresolvable_distance(&self) -> bool {
        matches!(self, Self::DistanceUnresolvable { .. })
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::TariffStore(format!("Failed to parse tariff file: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
