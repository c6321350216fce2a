// Downstream dependency adapters
//
// Traits the resolvers call, plus their HTTP implementations

pub mod error;
pub mod http;
pub mod traits;

pub use error::ProviderError;
pub use http::{HttpDistanceApi, HttpStockApi};
pub use traits::{DistanceApi, StockApi};

#[cfg(test)]
pub use traits::{MockDistanceApi, MockStockApi};
