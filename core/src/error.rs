//! Error taxonomy for the gate, the engine manager and its sessions.
//!
//! Every gate-protected operation either yields its result or fails with
//! exactly one of these kinds. Sentinels reported by the native layer
//! (`None`, `false`) are turned into explicit variants here and never leak
//! out as "valid empty" values.

use std::time::Duration;

use thiserror::Error;

use crate::gate::OperationClass;
use crate::manager::EngineState;
use crate::session::CandidateOp;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, GateError>;

#[derive(Debug, Error)]
pub enum GateError {
    /// The engine factory or the engine's setup step failed. The manager is
    /// left `Uninitialized`.
    #[error("engine initialization failed: {0}")]
    InitializationFailed(#[source] anyhow::Error),

    /// A native call raised a fault or returned a null handle.
    #[error("engine operation `{operation}` failed: {cause}")]
    EngineOperationFailed {
        operation: &'static str,
        #[source]
        cause: anyhow::Error,
    },

    /// The engine could not produce its schema catalog. Distinct from an
    /// empty catalog, which is a success.
    #[error("schema list unavailable")]
    SchemaListUnavailable,

    /// The session has no current schema.
    #[error("current schema unavailable")]
    SchemaUnavailable,

    #[error("cannot {op} candidate {index}")]
    CandidateActionFailed { index: usize, op: CandidateOp },

    #[error("session destroyed")]
    SessionDestroyed,

    /// The manager is not in the `Ready` state.
    #[error("engine not ready (state: {0})")]
    EngineNotReady(EngineState),

    /// A candidate operation name outside `select`/`delete`.
    #[error("invalid candidate operation `{0}`")]
    InvalidCandidateOp(String),

    /// The operation did not acquire and finish within its class limit.
    /// The gate has been released.
    #[error("{class} operation timed out after {limit:?}")]
    Timeout {
        class: OperationClass,
        limit: Duration,
    },
}

impl GateError {
    pub(crate) fn engine(operation: &'static str, cause: anyhow::Error) -> Self {
        GateError::EngineOperationFailed { operation, cause }
    }

    /// Whether repeating the same call later may succeed without any other
    /// change. No retries happen inside this crate; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GateError::Timeout { .. }
                | GateError::EngineNotReady(EngineState::Uninitialized)
                | GateError::EngineNotReady(EngineState::Initializing)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_action_message() {
        let err = GateError::CandidateActionFailed {
            index: 3,
            op: CandidateOp::Delete,
        };
        assert_eq!(err.to_string(), "cannot delete candidate 3");
    }

    #[test]
    fn test_engine_operation_keeps_cause() {
        let err = GateError::engine("rebuild_index", anyhow::anyhow!("disk full"));
        let msg = err.to_string();
        assert!(msg.contains("rebuild_index"));
        assert!(msg.contains("disk full"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_retryable() {
        let timeout = GateError::Timeout {
            class: OperationClass::Interactive,
            limit: Duration::from_millis(10),
        };
        assert!(timeout.is_retryable());
        assert!(GateError::EngineNotReady(EngineState::Uninitialized).is_retryable());
        assert!(!GateError::EngineNotReady(EngineState::Destroyed).is_retryable());
        assert!(!GateError::SessionDestroyed.is_retryable());
        assert!(!GateError::SchemaUnavailable.is_retryable());
    }
}
