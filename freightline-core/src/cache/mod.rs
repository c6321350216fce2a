pub mod key_builder;
pub mod singleflight;
pub mod ttl_cache;

pub use key_builder::KeyBuilder;
pub use singleflight::Coalescer;
pub use ttl_cache::{CacheHealth, TtlCache};
