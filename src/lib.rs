//! Composable fault-tolerance policies for async remote calls.
//!
//! `diplomat` wraps an arbitrary asynchronous call (an RPC, an HTTP
//! request, anything `async`) with production-grade resilience patterns
//! without the call site reimplementing them:
//!
//! - **Fallback**: recover from any failure with a substitute call
//! - **Retry**: bounded re-invocation with a fixed delay and a deadline
//! - **Timeout**: stop waiting on a call that takes too long
//! - **Distribute**: fail over across a pool of backend candidates
//! - **Circuit breaker**: stop dispatching to a backend whose
//!   sliding-window failure statistics crossed a threshold
//!
//! Policies are appended to a [`Diplomat`] chain in the order they should
//! take effect (first appended is outermost) and finalized with a terminal
//! call; the result is a single reentrant callable with the terminal
//! call's signature.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use diplomat::{Diplomat, RetryOptions, TimeoutOptions};
//!
//! # #[derive(Debug, thiserror::Error)]
//! # #[error("unreachable")]
//! # struct DialError;
//! # async fn example() {
//! let call = Diplomat::new()
//!     .retry(RetryOptions { max_attempts: 3, ..RetryOptions::default() })
//!     .timeout(TimeoutOptions { max_wait: Duration::from_millis(500) })
//!     .run(|host: String| async move { Ok::<_, DialError>(format!("pong from {host}")) });
//!
//! let result = call.call("foo.com".to_string()).await;
//! # let _ = result;
//! # }
//! ```
//!
//! The chain itself performs no network I/O, connection management, or
//! service discovery; the wrapped call is an external collaborator. None
//! of the policies cancel a call's underlying work — timeout and the
//! distribute deadline only stop waiting for it.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod call;
pub mod chain;
pub mod error;
pub mod policies;
pub mod timer;

pub use call::{from_fn, Call, CallContext, CallFuture, Policy};
pub use chain::{ComposedCall, Diplomat};
pub use error::{BoxedError, FaultError, FaultKind, FaultResult};
pub use policies::{
    CircuitBreakerOptions, CircuitBreakerPolicy, CircuitBreakerStatistics, CircuitState,
    DistributeOptions, DistributePolicy, FallbackPolicy, RetryOptions, RetryPolicy,
    SelectionPolicy, TimeoutOptions, TimeoutPolicy, DEFAULT_BACKEND_KEY,
};
pub use timer::TimerHandle;
