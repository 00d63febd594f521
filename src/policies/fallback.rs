//! Fallback policy
//!
//! Invokes a substitute call with the original arguments when the wrapped
//! call fails for any reason. The inner failure is discarded, not
//! aggregated; only the fallback's own outcome reaches the caller.

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::call::{from_fn, Call, CallContext, Policy};

/// Policy that recovers locally with a substitute call
pub struct FallbackPolicy<A, T> {
    fallback: Call<A, T>,
}

impl<A, T> FallbackPolicy<A, T>
where
    A: Send + 'static,
    T: Send + 'static,
{
    /// Create a fallback policy from a user async function with the same
    /// signature as the terminal call
    pub fn new<F, Fut, E>(fallback: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self { fallback: from_fn(fallback) }
    }
}

impl<A, T> Policy<A, T> for FallbackPolicy<A, T>
where
    A: Clone + Send + Sync + 'static,
    T: Send + 'static,
{
    fn wrap(&self, next: Call<A, T>) -> Call<A, T> {
        let fallback = Arc::clone(&self.fallback);
        Arc::new(move |cx: CallContext<A>| {
            let next = Arc::clone(&next);
            let fallback = Arc::clone(&fallback);
            Box::pin(async move {
                match next(cx.clone()).await {
                    Ok(value) => Ok(value),
                    Err(err) => {
                        debug!(error = %err, "falling back");
                        fallback(cx).await
                    }
                }
            })
        })
    }
}
