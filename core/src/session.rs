//! Per-input-context session.
//!
//! A `Session` is a thin adapter: every operation acquires the manager's
//! gate and makes exactly one native call on the session's handle. Query
//! results are never cached, since the engine may change its own state
//! while answering (reading the commit consumes it, for instance).
//!
//! `Live -> Destroyed`. Once destroyed, every call fails with
//! `SessionDestroyed` before touching the gate or the native handle. A
//! session also counts as destroyed once its manager is, since manager
//! teardown closes every handle. Dropping a live session closes its handle
//! in the background.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};
use crate::gate::OperationClass;
use crate::manager::Shared;
use crate::snapshot::{Commit, Context, Status};

/// Manager-unique session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub(crate) u64);

impl SessionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Action on a candidate of the current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateOp {
    Select,
    Delete,
}

impl CandidateOp {
    /// Native action code.
    pub fn code(self) -> u32 {
        match self {
            CandidateOp::Select => 0,
            CandidateOp::Delete => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CandidateOp::Select => "select",
            CandidateOp::Delete => "delete",
        }
    }
}

impl fmt::Display for CandidateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandidateOp {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "select" => Ok(CandidateOp::Select),
            "delete" => Ok(CandidateOp::Delete),
            other => Err(GateError::InvalidCandidateOp(other.to_string())),
        }
    }
}

pub struct Session {
    id: SessionId,
    schema_id: String,
    shared: Arc<Shared>,
    destroyed: AtomicBool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("schema_id", &self.schema_id)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl Session {
    pub(crate) fn new(id: SessionId, schema_id: String, shared: Arc<Shared>) -> Self {
        Self {
            id,
            schema_id,
            shared,
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Schema requested at creation. The engine may have switched since;
    /// ask [`Session::get_current_schema`] for the live value.
    pub fn schema_id(&self) -> &str {
        &self.schema_id
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst) || self.shared.is_destroyed()
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_destroyed() {
            Err(GateError::SessionDestroyed)
        } else {
            Ok(())
        }
    }

    /// Feed one key. Returns whether the engine consumed it.
    pub async fn process_key(&self, key_id: u32, modifier_mask: u32) -> Result<bool> {
        self.ensure_live()?;
        let id = self.id;
        self.shared
            .gate
            .run_exclusive(OperationClass::Interactive, "process_key", move |slot| {
                Box::pin(async move {
                    slot.session_mut(id)?
                        .process_key(key_id, modifier_mask)
                        .await
                        .map_err(|e| GateError::engine("process_key", e))
                })
            })
            .await
    }

    pub async fn get_context(&self) -> Result<Context> {
        self.ensure_live()?;
        let id = self.id;
        self.shared
            .gate
            .run_exclusive(OperationClass::Interactive, "get_context", move |slot| {
                Box::pin(async move {
                    slot.session_mut(id)?
                        .context()
                        .await
                        .map_err(|e| GateError::engine("get_context", e))
                })
            })
            .await
    }

    /// Text committed since the last call.
    pub async fn get_commit(&self) -> Result<Commit> {
        self.ensure_live()?;
        let id = self.id;
        self.shared
            .gate
            .run_exclusive(OperationClass::Interactive, "get_commit", move |slot| {
                Box::pin(async move {
                    slot.session_mut(id)?
                        .commit()
                        .await
                        .map_err(|e| GateError::engine("get_commit", e))
                })
            })
            .await
    }

    pub async fn get_status(&self) -> Result<Status> {
        self.ensure_live()?;
        let id = self.id;
        self.shared
            .gate
            .run_exclusive(OperationClass::Interactive, "get_status", move |slot| {
                Box::pin(async move {
                    slot.session_mut(id)?
                        .status()
                        .await
                        .map_err(|e| GateError::engine("get_status", e))
                })
            })
            .await
    }

    pub async fn clear_composition(&self) -> Result<()> {
        self.ensure_live()?;
        let id = self.id;
        self.shared
            .gate
            .run_exclusive(OperationClass::Interactive, "clear_composition", move |slot| {
                Box::pin(async move {
                    slot.session_mut(id)?
                        .clear_composition()
                        .await
                        .map_err(|e| GateError::engine("clear_composition", e))
                })
            })
            .await
    }

    /// Schema the engine currently uses for this session. An absent value is
    /// an error, never an empty id.
    pub async fn get_current_schema(&self) -> Result<String> {
        self.ensure_live()?;
        let id = self.id;
        self.shared
            .gate
            .run_exclusive(OperationClass::Interactive, "get_current_schema", move |slot| {
                Box::pin(async move {
                    slot.session_mut(id)?
                        .current_schema()
                        .await
                        .map_err(|e| GateError::engine("get_current_schema", e))?
                        .ok_or_else(|| {
                            tracing::warn!(session = %id, "engine reported no current schema");
                            GateError::SchemaUnavailable
                        })
                })
            })
            .await
    }

    /// Select or delete the `index`-th candidate of the page the engine
    /// currently holds. The page is not checked against any context the
    /// caller fetched earlier.
    pub async fn action_candidate_on_current_page(&self, index: usize, op: CandidateOp) -> Result<()> {
        self.ensure_live()?;
        let id = self.id;
        self.shared
            .gate
            .run_exclusive(OperationClass::Interactive, "action_candidate", move |slot| {
                Box::pin(async move {
                    let done = slot
                        .session_mut(id)?
                        .action_candidate_on_current_page(index, op.code())
                        .await
                        .map_err(|e| GateError::engine("action_candidate", e))?;
                    if done {
                        Ok(())
                    } else {
                        tracing::debug!(session = %id, index, %op, "candidate action refused");
                        Err(GateError::CandidateActionFailed { index, op })
                    }
                })
            })
            .await
    }

    /// Same as [`Session::action_candidate_on_current_page`] with the
    /// operation given by name, as host adapters send it. Unknown names fail
    /// before the gate is touched.
    pub async fn action_candidate_named(&self, index: usize, op: &str) -> Result<()> {
        let op: CandidateOp = op.parse()?;
        self.action_candidate_on_current_page(index, op).await
    }

    /// Close the native handle. Waits for in-flight calls on the gate;
    /// calls issued after this one fail with `SessionDestroyed`.
    pub async fn destroy(&self) -> Result<()> {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        close_handle(&self.shared, self.id).await
    }
}

/// Take the session's handle out of the manager and close it. A handle the
/// manager already closed is skipped.
async fn close_handle(shared: &Shared, id: SessionId) -> Result<()> {
    shared
        .gate
        .run_exclusive(OperationClass::Interactive, "destroy_session", move |slot| {
            Box::pin(async move {
                if let Some(mut handle) = slot.take_session(id) {
                    handle.close().await;
                    tracing::debug!(session = %id, "session destroyed");
                }
                Ok(())
            })
        })
        .await
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.destroyed.swap(true, Ordering::SeqCst) || self.shared.is_destroyed() {
            return;
        }
        let id = self.id;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let shared = Arc::clone(&self.shared);
                runtime.spawn(async move {
                    if let Err(e) = close_handle(&shared, id).await {
                        tracing::warn!(session = %id, error = %e, "closing dropped session failed");
                    }
                });
            }
            Err(_) => {
                // No runtime to close it on; manager destroy closes it.
                tracing::debug!(session = %id, "session dropped outside a runtime");
            }
        }
    }
}
