//! Resilience primitives for downstream dependencies
//!
//! - [`circuit_breaker`]: per-dependency CLOSED / OPEN / HALF_OPEN guard
//! - [`retry`]: bounded exponential backoff with per-attempt timeouts (`backon`)
//!
//! Both are safe to share between concurrent callers and know nothing about
//! each other; the resolvers in [`crate::service`] compose them.

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerStats, CircuitState};
pub use retry::{AttemptError, RetryAttempt, RetryExecutor, RetryExhausted, RetryPolicy};
