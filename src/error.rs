//! Fault taxonomy for composed call chains
//!
//! Every policy in a chain reports exhaustion through one tagged error type
//! so that callers can pattern-match uniformly regardless of how deep the
//! chain is. Each exhaustion variant carries the ordered list of underlying
//! failures that led the policy to give up; the terminal call's native error
//! travels through the chain unchanged inside [`FaultError::Call`].

use std::time::Duration;

use thiserror::Error;

/// Boxed error type for heterogeneous underlying call failures
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type produced by every call in a chain
pub type FaultResult<T> = Result<T, FaultError>;

/// Which policy gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Retry,
    Timeout,
    CircuitBreaker,
    Distribute,
}

/// Errors surfaced by a composed call
///
/// The four policy variants signal that a specific policy's budget
/// (attempts, time, or breaker state) was exhausted. `Call` wraps the
/// wrapped call's own failure when no policy intercepted it.
#[derive(Debug, Error)]
pub enum FaultError {
    /// Retry policy exhausted its attempt or deadline budget
    #[error("retry budget exhausted after {attempts} attempts")]
    Retry { attempts: u32, causes: Vec<FaultError> },

    /// Timeout policy's timer won the race against the wrapped call
    #[error("call timed out after {max_wait:?}")]
    Timeout { max_wait: Duration },

    /// Circuit breaker rejected the call or tripped on this failure
    #[error("circuit breaker for backend {key:?} rejected the call")]
    CircuitBreaker { key: String, causes: Vec<FaultError> },

    /// Distribute policy ran out of attempts or time across its candidates
    #[error("distribute failover gave up after {attempts} attempts")]
    Distribute { attempts: u32, causes: Vec<FaultError> },

    /// The wrapped call failed; propagated unchanged through the chain
    #[error("call failed")]
    Call {
        #[source]
        source: BoxedError,
    },
}

impl FaultError {
    /// Wrap a native call failure
    pub fn call<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        FaultError::Call { source: Box::new(source) }
    }

    /// The policy kind that produced this error, if any
    pub fn kind(&self) -> Option<FaultKind> {
        match self {
            FaultError::Retry { .. } => Some(FaultKind::Retry),
            FaultError::Timeout { .. } => Some(FaultKind::Timeout),
            FaultError::CircuitBreaker { .. } => Some(FaultKind::CircuitBreaker),
            FaultError::Distribute { .. } => Some(FaultKind::Distribute),
            FaultError::Call { .. } => None,
        }
    }

    /// Ordered list of underlying failures that led to exhaustion
    ///
    /// Empty for `Timeout` and for `CircuitBreaker` (the breaker discards
    /// the failure that tripped it) and for `Call`.
    pub fn causes(&self) -> &[FaultError] {
        match self {
            FaultError::Retry { causes, .. }
            | FaultError::CircuitBreaker { causes, .. }
            | FaultError::Distribute { causes, .. } => causes,
            FaultError::Timeout { .. } | FaultError::Call { .. } => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the fault taxonomy.

    use super::*;

    #[derive(Debug, Error)]
    #[error("{0}")]
    struct TestError(String);

    /// Validates `FaultError::call` behavior for the native failure wrapping
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms `err.kind()` equals `None`.
    /// - Ensures the source chain carries the wrapped error's message.
    #[test]
    fn test_call_error_wraps_source() {
        let err = FaultError::call(TestError("boom".to_string()));
        assert_eq!(err.kind(), None);

        let source = std::error::Error::source(&err).expect("call error should carry a source");
        assert_eq!(source.to_string(), "boom");
    }

    /// Validates `FaultError::kind` for each policy variant.
    #[test]
    fn test_fault_kind_tags() {
        let retry = FaultError::Retry { attempts: 3, causes: vec![] };
        assert_eq!(retry.kind(), Some(FaultKind::Retry));

        let timeout = FaultError::Timeout { max_wait: Duration::from_millis(500) };
        assert_eq!(timeout.kind(), Some(FaultKind::Timeout));

        let breaker = FaultError::CircuitBreaker { key: "single".to_string(), causes: vec![] };
        assert_eq!(breaker.kind(), Some(FaultKind::CircuitBreaker));

        let distribute = FaultError::Distribute { attempts: 4, causes: vec![] };
        assert_eq!(distribute.kind(), Some(FaultKind::Distribute));
    }

    /// Validates `FaultError::causes` behavior for the aggregate variants.
    ///
    /// Assertions:
    /// - Confirms `retry.causes().len()` equals `2`.
    /// - Confirms `timeout.causes()` is empty.
    #[test]
    fn test_causes_are_ordered_and_preserved() {
        let causes = vec![
            FaultError::call(TestError("first".to_string())),
            FaultError::call(TestError("second".to_string())),
        ];
        let retry = FaultError::Retry { attempts: 2, causes };
        assert_eq!(retry.causes().len(), 2);

        let timeout = FaultError::Timeout { max_wait: Duration::from_secs(1) };
        assert!(timeout.causes().is_empty());
    }

    /// Validates display output for each variant.
    #[test]
    fn test_fault_error_display() {
        let err = FaultError::Retry { attempts: 3, causes: vec![] };
        assert!(err.to_string().contains("3 attempts"));

        let err = FaultError::Timeout { max_wait: Duration::from_millis(500) };
        assert!(err.to_string().contains("timed out"));

        let err = FaultError::CircuitBreaker { key: "0".to_string(), causes: vec![] };
        assert!(err.to_string().contains("circuit breaker"));

        let err = FaultError::Distribute { attempts: 4, causes: vec![] };
        assert!(err.to_string().contains("4 attempts"));
    }
}
