pub mod distance;
pub mod id;
pub mod product;
pub mod tariff;

pub use distance::{DistanceSource, ResolvedDistance};
pub use id::{normalize_postal_code, ProductId, TransportMethodId};
pub use product::{Address, Dimensions, ProductRecord, ProductSource, ResolvedProduct};
pub use tariff::{Environment, TariffBreakdown, TariffConfig, TariffQuote};
