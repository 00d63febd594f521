//! Retry policy
//!
//! Re-invokes the wrapped call on failure with a fixed inter-attempt delay,
//! bounded by an attempt count and an overall deadline. The deadline check
//! is projective: retrying stops when the *next* wait would blow the
//! budget, so the final attempt may overrun the nominal deadline by up to
//! one `delay`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::call::{Call, CallContext, Policy};
use crate::error::FaultError;

/// Configuration for the retry policy
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Maximum number of invocations of the wrapped call
    pub max_attempts: u32,
    /// Fixed wait between attempts; zero retries immediately
    pub delay: Duration,
    /// Overall deadline budget for the whole retry loop
    pub max_delay: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(60_000),
        }
    }
}

/// Policy that retries the wrapped call per [`RetryOptions`]
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    options: RetryOptions,
}

impl RetryPolicy {
    pub fn new(options: RetryOptions) -> Self {
        Self { options }
    }
}

impl<A, T> Policy<A, T> for RetryPolicy
where
    A: Clone + Send + Sync + 'static,
    T: Send + 'static,
{
    fn wrap(&self, next: Call<A, T>) -> Call<A, T> {
        let options = self.options.clone();
        Arc::new(move |cx: CallContext<A>| {
            let next = Arc::clone(&next);
            let options = options.clone();
            Box::pin(async move {
                let start = Instant::now();
                let mut attempts = 0u32;
                let mut causes = Vec::new();

                loop {
                    attempts += 1;
                    debug!(attempt = attempts, max = options.max_attempts, "retry attempt");

                    match next(cx.clone()).await {
                        Ok(value) => return Ok(value),
                        Err(err) => {
                            debug!(error = %err, "retry attempt failed");
                            causes.push(err);

                            let budget_spent = attempts >= options.max_attempts
                                || start.elapsed() + options.delay > options.max_delay;
                            if budget_spent {
                                warn!(attempts, "retry budget exhausted");
                                return Err(FaultError::Retry { attempts, causes });
                            }
                        }
                    }

                    if options.delay > Duration::ZERO {
                        tokio::time::sleep(options.delay).await;
                    }
                }
            })
        })
    }
}
