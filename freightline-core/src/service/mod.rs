pub mod distance_resolver;
pub mod product_resolver;
pub mod quote;
pub mod tariff;

pub use distance_resolver::{DistanceResolver, DISTANCE_API};
pub use product_resolver::{ProductResolver, STOCK_API};
pub use quote::{QuoteService, ShipmentQuote};
pub use tariff::{billable_weight, select_applicable_config, total_cost, volumetric_weight, TariffCalculator};
