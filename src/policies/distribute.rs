//! Distribute (failover) policy
//!
//! Walks a pool of backend candidates, invoking the wrapped call with one
//! candidate per attempt and failing over on error. The caller-supplied
//! argument is itself the first candidate, ahead of the configured
//! addresses. Two independent exit conditions: an attempt budget and a
//! deadline; hitting either yields a `Distribute` fault.
//!
//! The selected candidate's pool index is recorded in the invocation
//! context as the backend key, which a circuit breaker composed after this
//! policy uses to credit the right backend's statistics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::call::{Call, CallContext, Policy};
use crate::error::FaultError;
use crate::timer;

/// How the next candidate is chosen after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Advance to `(index + 1) % pool.len()`
    Ordered,
    /// Pick a uniformly random index
    Random,
}

/// Configuration for the distribute policy
#[derive(Debug, Clone)]
pub struct DistributeOptions<A> {
    /// Backend candidates tried after the caller-supplied argument
    pub addrs: Vec<A>,
    /// Candidate selection strategy
    pub policy: SelectionPolicy,
    /// Attempt budget across all candidates; `None` means unbounded
    pub max_attempt: Option<u32>,
    /// Deadline for the whole failover loop; `None` means no deadline
    pub max_wait: Option<Duration>,
}

/// Policy that fails over across a pool of backend candidates
#[derive(Debug, Clone)]
pub struct DistributePolicy<A> {
    options: DistributeOptions<A>,
}

impl<A> DistributePolicy<A> {
    pub fn new(options: DistributeOptions<A>) -> Self {
        Self { options }
    }
}

impl<A, T> Policy<A, T> for DistributePolicy<A>
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
                // The caller's argument is an extra candidate ahead of the
                // configured list.
                let mut pool = Vec::with_capacity(options.addrs.len() + 1);
                pool.push(cx.arg.clone());
                pool.extend(options.addrs.iter().cloned());

                let expired = Arc::new(AtomicBool::new(false));
                let expiry = Arc::new(Notify::new());
                let deadline = options.max_wait.map(|max_wait| {
                    let expired = Arc::clone(&expired);
                    let expiry = Arc::clone(&expiry);
                    timer::oneshot(max_wait, move || {
                        warn!(?max_wait, "distribute exceeded max duration");
                        expired.store(true, Ordering::SeqCst);
                        expiry.notify_one();
                    })
                });

                let mut index = 0usize;
                let mut attempts = 0u32;
                let mut causes = Vec::new();

                loop {
                    let mut attempt_cx = cx.clone();
                    attempt_cx.arg = pool[index].clone();
                    attempt_cx.backend = Some(index.to_string());
                    debug!(backend = index, "distribute attempt");

                    // Spawned so a losing call keeps running; the expiry
                    // signal only stops the wait.
                    let mut task = tokio::spawn(next(attempt_cx));
                    let outcome = tokio::select! {
                        joined = &mut task => match joined {
                            Ok(outcome) => outcome,
                            Err(join_err) => Err(FaultError::call(join_err)),
                        },
                        _ = expiry.notified() => {
                            return Err(FaultError::Distribute { attempts, causes });
                        }
                    };

                    match outcome {
                        Ok(value) => {
                            if let Some(handle) = &deadline {
                                handle.cancel();
                            }
                            return Ok(value);
                        }
                        Err(err) => {
                            causes.push(err);
                            attempts += 1;

                            if let Some(max) = options.max_attempt {
                                if attempts >= max {
                                    warn!(attempts, "distribute exceeded max attempt");
                                    return Err(FaultError::Distribute { attempts, causes });
                                }
                            }
                            if expired.load(Ordering::SeqCst) {
                                return Err(FaultError::Distribute { attempts, causes });
                            }

                            index = match options.policy {
                                SelectionPolicy::Ordered => (index + 1) % pool.len(),
                                SelectionPolicy::Random => {
                                    rand::thread_rng().gen_range(0..pool.len())
                                }
                            };
                        }
                    }

                    // Yield so the deadline timer callback can run before
                    // the next attempt.
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            })
        })
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the distribute policy.

    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;
    use std::time::Instant;

    use super::*;
    use crate::call::from_fn;

    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    struct TestError(String);

    /// Terminal call that records every address it is invoked with and
    /// fails unless the address is in `good`.
    fn recording_call(
        seen: Arc<Mutex<Vec<String>>>,
        good: &'static [&'static str],
    ) -> Call<String, String> {
        from_fn(move |addr: String| {
            seen.lock().expect("test lock").push(addr.clone());
            async move {
                if good.contains(&addr.as_str()) {
                    Ok(format!("OK - {addr}"))
                } else {
                    Err(TestError(format!("Error - {addr}")))
                }
            }
        })
    }

    /// Validates the ordered selection walk: the caller argument is
    /// candidate 0, then the configured addresses in order.
    ///
    /// Assertions:
    /// - Confirms the invocation sequence `["seed", "a", "b"]`.
    /// - Confirms the successful outcome came from backend `b`.
    #[tokio::test]
    async fn test_ordered_walks_pool_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let policy = DistributePolicy::new(DistributeOptions {
            addrs: vec!["a".to_string(), "b".to_string()],
            policy: SelectionPolicy::Ordered,
            max_attempt: Some(200_000),
            max_wait: None,
        });
        let call = policy.wrap(recording_call(Arc::clone(&seen), &["b"]));

        let result = call(CallContext::new("seed".to_string())).await;
        assert_eq!(result.expect("should fail over to b"), "OK - b");
        assert_eq!(*seen.lock().expect("test lock"), vec!["seed", "a", "b"]);
    }

    /// Validates the attempt budget: with `max_attempt = 4` the wrapped
    /// call is invoked exactly 4 times across the pool (caller argument
    /// included), then a `Distribute` fault is raised with 4 causes.
    #[tokio::test]
    async fn test_max_attempt_bounds_invocations() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let policy = DistributePolicy::new(DistributeOptions {
            addrs: vec!["b".to_string(), "c".to_string()],
            policy: SelectionPolicy::Ordered,
            max_attempt: Some(4),
            max_wait: None,
        });
        let call = policy.wrap(recording_call(Arc::clone(&seen), &[]));

        let result = call(CallContext::new("x".to_string())).await;
        match result {
            Err(FaultError::Distribute { attempts, causes }) => {
                assert_eq!(attempts, 4);
                assert_eq!(causes.len(), 4);
            }
            other => panic!("expected Distribute error, got {other:?}"),
        }
        assert_eq!(*seen.lock().expect("test lock"), vec!["x", "b", "c", "x"]);
    }

    /// Validates the deadline exit: with every attempt failing and no
    /// attempt budget, the loop stops once the deadline timer fires.
    #[tokio::test]
    async fn test_max_wait_expires_loop() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let policy = DistributePolicy::new(DistributeOptions {
            addrs: vec!["a".to_string(), "b".to_string()],
            policy: SelectionPolicy::Ordered,
            max_attempt: None,
            max_wait: Some(Duration::from_millis(50)),
        });
        let call = policy.wrap(recording_call(Arc::clone(&seen), &[]));

        let start = Instant::now();
        let result = call(CallContext::new("x".to_string())).await;
        let elapsed = start.elapsed();

        match result {
            Err(FaultError::Distribute { .. }) => {}
            other => panic!("expected Distribute error, got {other:?}"),
        }
        assert!(elapsed >= Duration::from_millis(45));
        assert!(elapsed < Duration::from_secs(2), "expiry fired too late: {elapsed:?}");
    }

    /// Validates the expiry race against a call that never settles: the
    /// expiry signal wins and the loop fails instead of hanging.
    #[tokio::test]
    async fn test_expiry_wins_race_against_hung_call() {
        let terminal = from_fn(|_addr: String| async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok::<_, TestError>("never".to_string())
        });
        let policy = DistributePolicy::new(DistributeOptions {
            addrs: vec!["a".to_string()],
            policy: SelectionPolicy::Ordered,
            max_attempt: None,
            max_wait: Some(Duration::from_millis(50)),
        });
        let call = policy.wrap(terminal);

        let start = Instant::now();
        let result = call(CallContext::new("x".to_string())).await;

        assert!(matches!(result, Err(FaultError::Distribute { .. })));
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    /// Validates that random selection stays within the candidate pool.
    #[tokio::test]
    async fn test_random_selection_stays_in_pool() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = Arc::clone(&attempts);
        let seen_clone = Arc::clone(&seen);

        let terminal = from_fn(move |addr: String| {
            seen_clone.lock().expect("test lock").push(addr);
            attempts_clone.fetch_add(1, Ordering::SeqCst);
            async move { Err::<String, _>(TestError("always fails".to_string())) }
        });
        let policy = DistributePolicy::new(DistributeOptions {
            addrs: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            policy: SelectionPolicy::Random,
            max_attempt: Some(20),
            max_wait: None,
        });
        let call = policy.wrap(terminal);

        let result = call(CallContext::new("x".to_string())).await;
        assert!(matches!(result, Err(FaultError::Distribute { attempts: 20, .. })));

        let pool = ["x", "a", "b", "c"];
        for addr in seen.lock().expect("test lock").iter() {
            assert!(pool.contains(&addr.as_str()), "unexpected candidate {addr}");
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 20);
    }

    /// Validates that the backend key written into the context is the pool
    /// index of the selected candidate.
    #[tokio::test]
    async fn test_backend_key_is_pool_index() {
        let keys = Arc::new(Mutex::new(Vec::new()));
        let keys_clone = Arc::clone(&keys);

        // Raw call so the context (not just the argument) is observable.
        let terminal: Call<String, String> = Arc::new(move |cx: CallContext<String>| {
            keys_clone.lock().expect("test lock").push(cx.backend.clone());
            Box::pin(async move {
                if cx.arg == "b" {
                    Ok("OK".to_string())
                } else {
                    Err(FaultError::call(TestError("nope".to_string())))
                }
            })
        });

        let policy = DistributePolicy::new(DistributeOptions {
            addrs: vec!["a".to_string(), "b".to_string()],
            policy: SelectionPolicy::Ordered,
            max_attempt: None,
            max_wait: None,
        });
        let call = policy.wrap(terminal);

        call(CallContext::new("seed".to_string())).await.expect("should reach b");
        let recorded = keys.lock().expect("test lock").clone();
        assert_eq!(
            recorded,
            vec![Some("0".to_string()), Some("1".to_string()), Some("2".to_string())]
        );
    }
}
