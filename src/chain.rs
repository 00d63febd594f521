//! Chain building and composition
//!
//! A [`Diplomat`] accumulates policies in the order they should take
//! effect, outermost first, then folds them right-to-left over a terminal
//! call. The result is a [`ComposedCall`] with the terminal call's
//! signature; invoking it runs the outermost policy, which runs the next,
//! down to the terminal call.
//!
//! Mutable policy state (distribute selection, circuit breaker statistics)
//! is scoped to the chain instance: every invocation of one composed call
//! shares it, while separate chains are fully independent.

use std::future::Future;
use std::sync::Arc;

use crate::call::{from_fn, Call, CallContext, CallFuture, Policy};
use crate::policies::circuit_breaker::{CircuitBreakerOptions, CircuitBreakerPolicy};
use crate::policies::distribute::{DistributeOptions, DistributePolicy};
use crate::policies::fallback::FallbackPolicy;
use crate::policies::retry::{RetryOptions, RetryPolicy};
use crate::policies::timeout::{TimeoutOptions, TimeoutPolicy};

/// Fluent builder for a policy chain
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
///
/// use diplomat::{Diplomat, RetryOptions, TimeoutOptions};
///
/// # #[derive(Debug, thiserror::Error)]
/// # #[error("unreachable")]
/// # struct DialError;
/// #[tokio::main]
/// async fn main() {
///     let call = Diplomat::new()
///         .retry(RetryOptions::default())
///         .timeout(TimeoutOptions { max_wait: Duration::from_millis(500) })
///         .run(|host: String| async move {
///             Ok::<_, DialError>(format!("pong from {host}"))
///         });
///
///     let result = call.call("foo.com".to_string()).await;
///     println!("{result:?}");
/// }
/// ```
pub struct Diplomat<A, T> {
    policies: Vec<Arc<dyn Policy<A, T>>>,
}

impl<A, T> Default for Diplomat<A, T>
where
    A: Clone + Send + Sync + 'static,
    T: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A, T> Diplomat<A, T>
where
    A: Clone + Send + Sync + 'static,
    T: Send + 'static,
{
    /// Create an empty chain
    pub fn new() -> Self {
        Self { policies: Vec::new() }
    }

    /// Append any policy; first appended runs outermost
    pub fn append<P>(mut self, policy: P) -> Self
    where
        P: Policy<A, T> + 'static,
    {
        self.policies.push(Arc::new(policy));
        self
    }

    /// Recover from any inner failure with a substitute call
    pub fn fallback<F, Fut, E>(self, fallback: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.append(FallbackPolicy::new(fallback))
    }

    /// Retry failed calls per [`RetryOptions`]
    pub fn retry(self, options: RetryOptions) -> Self {
        self.append(RetryPolicy::new(options))
    }

    /// Bound how long a single invocation is waited on
    pub fn timeout(self, options: TimeoutOptions) -> Self {
        self.append(TimeoutPolicy::new(options))
    }

    /// Gate calls on per-backend failure statistics
    pub fn circuit_breaker(self, options: CircuitBreakerOptions) -> Self {
        self.append(CircuitBreakerPolicy::new(options))
    }

    /// Fail over across a pool of backend candidates
    pub fn distribute(self, options: DistributeOptions<A>) -> Self {
        self.append(DistributePolicy::new(options))
    }

    /// Finalize the chain around a terminal call
    ///
    /// Folds the policies right-to-left so the first appended policy is
    /// outermost and the terminal call is innermost.
    pub fn run<F, Fut, E>(self, terminal: F) -> ComposedCall<A, T>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let composed = self
            .policies
            .iter()
            .rev()
            .fold(from_fn(terminal), |next, policy| policy.wrap(next));
        ComposedCall { inner: composed }
    }
}

/// A finalized chain, invocable with the terminal call's signature
///
/// Cloning is cheap and clones share the chain's policy state; the call is
/// reentrant, so independent invocations may be in flight concurrently.
pub struct ComposedCall<A, T> {
    inner: Call<A, T>,
}

impl<A, T> Clone for ComposedCall<A, T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<A, T> ComposedCall<A, T> {
    /// Invoke the chain with a fresh per-invocation context
    pub fn call(&self, arg: A) -> CallFuture<T> {
        (self.inner)(CallContext::new(arg))
    }
}
