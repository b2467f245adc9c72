//! Exclusive access gate.
//!
//! `Gate<T>` owns the state it protects. The only way to reach that state is
//! through [`Gate::run_exclusive`], which hands the operation a `&mut T`
//! while the lock is held. There is exactly one gate per manager, shared by
//! the manager and every session it spawns, so all engine activity forms a
//! single total order.
//!
//! The lock is `tokio::sync::Mutex`, which grants acquisition in FIFO order.
//! Operations must not call back into the gate: the lock is not reentrant and
//! a nested acquisition waits on itself. Two engine actions that must be
//! atomic belong in one operation.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use crate::config::GateConfig;
use crate::error::{GateError, Result};

/// Boxed future returned by a gate operation. It may borrow the protected
/// state for its whole lifetime.
pub type OpFuture<'a, R> = Pin<Box<dyn Future<Output = Result<R>> + Send + 'a>>;

/// Timeout class of a gated operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    /// Session calls driven by user input.
    Interactive,
    /// Manager calls: lifecycle, index rebuild, maintenance, catalog.
    Background,
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationClass::Interactive => f.write_str("interactive"),
            OperationClass::Background => f.write_str("background"),
        }
    }
}

pub struct Gate<T> {
    state: Arc<Mutex<T>>,
    config: GateConfig,
}

impl<T> Clone for Gate<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            config: self.config.clone(),
        }
    }
}

impl<T> fmt::Debug for Gate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gate")
            .field("held", &self.is_held())
            .field("config", &self.config)
            .finish()
    }
}

impl<T> Gate<T> {
    pub fn new(state: T, config: GateConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            config,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Whether some operation currently holds the gate.
    pub fn is_held(&self) -> bool {
        self.state.try_lock().is_err()
    }
}

impl<T: Send> Gate<T> {

    /// Run `op` with exclusive access to the protected state.
    ///
    /// The lock is released on every exit path: normal return, error, panic
    /// unwinding, or cancellation when the class timeout expires. The
    /// operation's result is returned unchanged.
    pub async fn run_exclusive<R, F>(
        &self,
        class: OperationClass,
        operation: &'static str,
        op: F,
    ) -> Result<R>
    where
        R: Send,
        F: for<'a> FnOnce(&'a mut T) -> OpFuture<'a, R> + Send,
    {
        let queued_at = Instant::now();
        let work = async {
            let mut guard = self.state.lock().await;
            let acquired_at = Instant::now();
            tracing::debug!(
                operation,
                %class,
                waited_us = acquired_at.duration_since(queued_at).as_micros() as u64,
                "gate acquired"
            );
            let outcome = op(&mut *guard).await;
            drop(guard);
            tracing::debug!(
                operation,
                held_us = acquired_at.elapsed().as_micros() as u64,
                ok = outcome.is_ok(),
                "gate released"
            );
            outcome
        };

        match self.config.timeout_for(class) {
            None => work.await,
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!(operation, %class, ?limit, "gate operation timed out");
                    Err(GateError::Timeout { class, limit })
                }
            },
        }
    }
}
