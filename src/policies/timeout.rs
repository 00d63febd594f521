//! Timeout policy
//!
//! Races the wrapped call against a timer. The call is spawned onto the
//! runtime so its underlying work keeps running after a timeout; the policy
//! only stops waiting for it. The timer future is dropped as soon as the
//! call wins.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::call::{Call, CallContext, Policy};
use crate::error::FaultError;

/// Configuration for the timeout policy
#[derive(Debug, Clone, Copy)]
pub struct TimeoutOptions {
    /// How long to wait for the wrapped call before failing
    pub max_wait: Duration,
}

/// Policy that bounds how long a single invocation is waited on
#[derive(Debug, Clone)]
pub struct TimeoutPolicy {
    options: TimeoutOptions,
}

impl TimeoutPolicy {
    pub fn new(options: TimeoutOptions) -> Self {
        Self { options }
    }
}

impl<A, T> Policy<A, T> for TimeoutPolicy
where
    A: Send + 'static,
    T: Send + 'static,
{
    fn wrap(&self, next: Call<A, T>) -> Call<A, T> {
        let max_wait = self.options.max_wait;
        Arc::new(move |cx: CallContext<A>| {
            let next = Arc::clone(&next);
            Box::pin(async move {
                // Spawned so the callee's work continues if the timer wins;
                // no cancellation signal is propagated.
                let mut task = tokio::spawn(next(cx));

                tokio::select! {
                    joined = &mut task => match joined {
                        Ok(outcome) => outcome,
                        Err(join_err) => Err(FaultError::call(join_err)),
                    },
                    _ = tokio::time::sleep(max_wait) => {
                        warn!(?max_wait, "call timed out");
                        Err(FaultError::Timeout { max_wait })
                    }
                }
            })
        })
    }
}
