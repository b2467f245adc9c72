//! Engine manager.
//!
//! The manager owns the native engine's lifecycle and every live session
//! handle. Both sit in a single [`Slot`] behind the manager's [`Gate`], so
//! any code that touches the engine does it inside `run_exclusive`.
//!
//! States: `Uninitialized -> Initializing -> Ready`, terminal `Destroyed`.
//! A failed (or cancelled) initialization falls back to `Uninitialized`.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crate::config::GateConfig;
use crate::error::{GateError, Result};
use crate::fs::FileSystem;
use crate::gate::{Gate, OperationClass};
use crate::native::{EngineFactory, LogSink, NativeEngine, NativeSession};
use crate::session::{Session, SessionId};
use crate::snapshot::SchemaDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineState {
    Uninitialized = 0,
    Initializing = 1,
    Ready = 2,
    Destroyed = 3,
}

impl EngineState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => EngineState::Initializing,
            2 => EngineState::Ready,
            3 => EngineState::Destroyed,
            _ => EngineState::Uninitialized,
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineState::Uninitialized => "uninitialized",
            EngineState::Initializing => "initializing",
            EngineState::Ready => "ready",
            EngineState::Destroyed => "destroyed",
        };
        f.write_str(s)
    }
}

/// Lifecycle state readable without the gate. Written only while the gate is
/// held, or by the reset guard of a cancelled initialization.
#[derive(Debug, Clone, Default)]
struct StateCell(Arc<AtomicU8>);

impl StateCell {
    fn get(&self) -> EngineState {
        EngineState::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn set(&self, state: EngineState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

/// Resets `Initializing` to `Uninitialized` unless disarmed, so a timeout
/// that drops the initialize future mid-way leaves no partial state.
struct InitReset {
    state: StateCell,
    armed: bool,
}

impl Drop for InitReset {
    fn drop(&mut self) {
        if self.armed && self.state.get() == EngineState::Initializing {
            tracing::warn!("initialization abandoned; engine stays uninitialized");
            self.state.set(EngineState::Uninitialized);
        }
    }
}

/// Everything the gate protects.
pub(crate) struct Slot {
    state: StateCell,
    engine: Option<Box<dyn NativeEngine>>,
    sessions: HashMap<SessionId, Box<dyn NativeSession>>,
}

impl Slot {
    fn engine_mut(&mut self) -> Result<&mut Box<dyn NativeEngine>> {
        match (self.state.get(), self.engine.as_mut()) {
            (EngineState::Ready, Some(engine)) => Ok(engine),
            (state, _) => Err(GateError::EngineNotReady(state)),
        }
    }

    /// Handle of a live session. Manager teardown closes every handle, so a
    /// session of a destroyed manager is itself destroyed.
    pub(crate) fn session_mut(&mut self, id: SessionId) -> Result<&mut Box<dyn NativeSession>> {
        match self.state.get() {
            EngineState::Ready => {}
            EngineState::Destroyed => return Err(GateError::SessionDestroyed),
            state => return Err(GateError::EngineNotReady(state)),
        }
        self.sessions
            .get_mut(&id)
            .ok_or(GateError::SessionDestroyed)
    }

    pub(crate) fn take_session(&mut self, id: SessionId) -> Option<Box<dyn NativeSession>> {
        self.sessions.remove(&id)
    }
}

pub(crate) struct Shared {
    pub(crate) gate: Gate<Slot>,
    factory: Arc<dyn EngineFactory>,
    state: StateCell,
    next_session: AtomicU64,
}

impl Shared {
    pub(crate) fn is_destroyed(&self) -> bool {
        self.state.get() == EngineState::Destroyed
    }
}

/// Handle to the engine manager. Clones share the same engine and gate.
#[derive(Clone)]
pub struct EngineManager {
    shared: Arc<Shared>,
}

impl fmt::Debug for EngineManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineManager")
            .field("state", &self.state())
            .field("gate", &self.shared.gate)
            .finish()
    }
}

impl EngineManager {
    pub fn new<F: EngineFactory + 'static>(factory: F, config: GateConfig) -> Self {
        Self::from_arc(Arc::new(factory), config)
    }

    pub fn from_arc(factory: Arc<dyn EngineFactory>, config: GateConfig) -> Self {
        let state = StateCell::default();
        let slot = Slot {
            state: state.clone(),
            engine: None,
            sessions: HashMap::new(),
        };
        Self {
            shared: Arc::new(Shared {
                gate: Gate::new(slot, config),
                factory,
                state,
                next_session: AtomicU64::new(1),
            }),
        }
    }

    pub fn state(&self) -> EngineState {
        self.shared.state.get()
    }

    pub fn config(&self) -> &GateConfig {
        self.shared.gate.config()
    }

    /// Construct and set up the engine. A no-op when already `Ready`;
    /// concurrent callers queue on the gate and the later ones find the
    /// engine ready.
    pub async fn initialize(&self, log_sink: LogSink, fs: Arc<dyn FileSystem>) -> Result<()> {
        if self.state() == EngineState::Ready {
            return Ok(());
        }
        let factory = Arc::clone(&self.shared.factory);
        self.shared
            .gate
            .run_exclusive(OperationClass::Background, "initialize", move |slot| {
                Box::pin(async move {
                    match slot.state.get() {
                        EngineState::Ready => return Ok(()),
                        EngineState::Destroyed => {
                            return Err(GateError::EngineNotReady(EngineState::Destroyed))
                        }
                        EngineState::Uninitialized | EngineState::Initializing => {}
                    }

                    slot.state.set(EngineState::Initializing);
                    let mut reset = InitReset {
                        state: slot.state.clone(),
                        armed: true,
                    };
                    tracing::info!("constructing engine");

                    let built = async {
                        let mut engine = factory.create(log_sink, fs).await?;
                        engine.setup().await?;
                        Ok::<_, anyhow::Error>(engine)
                    }
                    .await;

                    reset.armed = false;
                    match built {
                        Ok(engine) => {
                            slot.engine = Some(engine);
                            slot.state.set(EngineState::Ready);
                            tracing::info!("engine ready");
                            Ok(())
                        }
                        Err(cause) => {
                            slot.state.set(EngineState::Uninitialized);
                            tracing::warn!(error = %cause, "engine initialization failed");
                            Err(GateError::InitializationFailed(cause))
                        }
                    }
                })
            })
            .await
    }

    /// Rebuild the compiled index of one schema from its config text.
    pub async fn rebuild_index(&self, schema_id: &str, schema_config: &str) -> Result<()> {
        let schema_id = schema_id.to_string();
        let schema_config = schema_config.to_string();
        self.shared
            .gate
            .run_exclusive(OperationClass::Background, "rebuild_index", move |slot| {
                Box::pin(async move {
                    tracing::info!(schema = %schema_id, "rebuilding index");
                    slot.engine_mut()?
                        .rebuild_index_for_schema(&schema_id, &schema_config)
                        .await
                        .map_err(|e| {
                            tracing::warn!(schema = %schema_id, error = %e, "index rebuild failed");
                            GateError::engine("rebuild_index", e)
                        })
                })
            })
            .await
    }

    /// Allocate a session bound to `schema_id`.
    pub async fn create_session(&self, schema_id: &str, schema_config: &str) -> Result<Session> {
        let id = SessionId(self.shared.next_session.fetch_add(1, Ordering::Relaxed));
        let owned_id = schema_id.to_string();
        let schema_config = schema_config.to_string();
        self.shared
            .gate
            .run_exclusive(OperationClass::Background, "create_session", move |slot| {
                Box::pin(async move {
                    let handle = slot
                        .engine_mut()?
                        .create_session(&owned_id, &schema_config)
                        .await
                        .map_err(|e| GateError::engine("create_session", e))?
                        .ok_or_else(|| {
                            tracing::warn!(schema = %owned_id, "engine returned no session");
                            GateError::engine(
                                "create_session",
                                anyhow::anyhow!("engine returned no session for {}", owned_id),
                            )
                        })?;
                    slot.sessions.insert(id, handle);
                    tracing::debug!(session = %id, schema = %owned_id, "session created");
                    Ok(())
                })
            })
            .await?;
        Ok(Session::new(id, schema_id.to_string(), Arc::clone(&self.shared)))
    }

    /// Engine housekeeping. Runs in the same total order as key processing.
    pub async fn perform_maintenance(&self) -> Result<()> {
        self.shared
            .gate
            .run_exclusive(OperationClass::Background, "perform_maintenance", |slot| {
                Box::pin(async move {
                    slot.engine_mut()?
                        .perform_maintenance()
                        .await
                        .map_err(|e| GateError::engine("perform_maintenance", e))
                })
            })
            .await
    }

    /// The engine's schema catalog, in engine order.
    pub async fn list_schemas(&self) -> Result<Vec<SchemaDescriptor>> {
        self.shared
            .gate
            .run_exclusive(OperationClass::Background, "list_schemas", |slot| {
                Box::pin(async move {
                    let listed = slot
                        .engine_mut()?
                        .list_schemas()
                        .await
                        .map_err(|e| GateError::engine("list_schemas", e))?;
                    listed.ok_or_else(|| {
                        tracing::warn!("engine reported schema catalog unavailable");
                        GateError::SchemaListUnavailable
                    })
                })
            })
            .await
    }

    /// Number of session handles that are still open.
    pub async fn live_sessions(&self) -> Result<usize> {
        self.shared
            .gate
            .run_exclusive(OperationClass::Background, "live_sessions", |slot| {
                Box::pin(async move { Ok(slot.sessions.len()) })
            })
            .await
    }

    /// Close every session, finalize the engine and enter `Destroyed`.
    ///
    /// Runs through the gate, so it waits for in-flight work and nothing
    /// queued behind it can reach the engine. Calling it again is a no-op.
    pub async fn destroy(&self) -> Result<()> {
        self.shared
            .gate
            .run_exclusive(OperationClass::Background, "destroy", |slot| {
                Box::pin(async move {
                    if slot.state.get() == EngineState::Destroyed {
                        return Ok(());
                    }
                    // Destroyed before the first await: a timeout that drops
                    // this future mid-teardown still leaves no engine behind
                    // a `Ready` state.
                    let sessions: Vec<_> = slot.sessions.drain().collect();
                    let engine = slot.engine.take();
                    slot.state.set(EngineState::Destroyed);

                    let open = sessions.len();
                    for (_, mut handle) in sessions {
                        handle.close().await;
                    }
                    let finalized = match engine {
                        Some(mut engine) => engine.finalize().await,
                        None => Ok(()),
                    };
                    tracing::info!(closed_sessions = open, "engine destroyed");
                    finalized.map_err(|e| {
                        tracing::warn!(error = %e, "engine finalize failed");
                        GateError::engine("destroy", e)
                    })
                })
            })
            .await
    }
}
