//! Call representation and the policy seam
//!
//! A [`Call`] is a type-erased async function from a per-invocation
//! [`CallContext`] to a [`FaultResult`]. Policies transform one `Call` into
//! another with the same signature; the chain composes them by folding over
//! the terminal call.
//!
//! The context carries the backend key selected by the distribute policy so
//! the circuit breaker can credit the right backend's statistics. Threading
//! it per invocation (instead of through a chain-scoped field) keeps
//! concurrent invocations of the same composed call from clobbering each
//! other's selection.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::{FaultError, FaultResult};

/// Boxed future produced by every call in a chain
pub type CallFuture<T> = BoxFuture<'static, FaultResult<T>>;

/// Type-erased async call from context to result
pub type Call<A, T> = Arc<dyn Fn(CallContext<A>) -> CallFuture<T> + Send + Sync>;

/// Per-invocation envelope threaded through the chain
#[derive(Debug, Clone)]
pub struct CallContext<A> {
    /// The argument the wrapped call is invoked with. The distribute policy
    /// replaces this with the selected candidate for each attempt.
    pub arg: A,
    /// Backend key written by the distribute policy and read by the circuit
    /// breaker. `None` outside a distribute scope.
    pub backend: Option<String>,
}

impl<A> CallContext<A> {
    /// Create a fresh context for a new invocation
    pub fn new(arg: A) -> Self {
        Self { arg, backend: None }
    }
}

/// A unit of resilience behavior that wraps a call
///
/// `wrap` receives the next call in the chain and returns a call with the
/// same signature. Stateless policies (retry, timeout, fallback) close over
/// configuration only; distribute and circuit breaker close over shared,
/// chain-scoped state.
pub trait Policy<A, T>: Send + Sync {
    fn wrap(&self, next: Call<A, T>) -> Call<A, T>;
}

/// Lift a user async function into a [`Call`]
///
/// The function's native error is boxed into [`FaultError::Call`] so it can
/// travel through the chain unchanged.
pub fn from_fn<A, T, F, Fut, E>(f: F) -> Call<A, T>
where
    A: Send + 'static,
    T: Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    Arc::new(move |cx: CallContext<A>| {
        let fut = f(cx.arg);
        Box::pin(async move { fut.await.map_err(FaultError::call) })
    })
}
