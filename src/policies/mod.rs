//! The five resilience policies
//!
//! Fallback, retry, and timeout are pure per-invocation transformations;
//! distribute and circuit breaker own chain-scoped mutable state. Each
//! policy wraps a call and produces a call with the same signature, so any
//! combination composes.

pub mod circuit_breaker;
pub mod distribute;
pub mod fallback;
pub mod retry;
pub mod timeout;

pub use circuit_breaker::{
    CircuitBreakerOptions, CircuitBreakerPolicy, CircuitBreakerStatistics, CircuitState,
    DEFAULT_BACKEND_KEY,
};
pub use distribute::{DistributeOptions, DistributePolicy, SelectionPolicy};
pub use fallback::FallbackPolicy;
pub use retry::{RetryOptions, RetryPolicy};
pub use timeout::{TimeoutOptions, TimeoutPolicy};
