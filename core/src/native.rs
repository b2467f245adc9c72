//! Capability interface of the native composition engine.
//!
//! The manager and sessions only ever talk to the engine through these
//! traits. Failure comes in two shapes at this boundary: a fault
//! (`Err(anyhow::Error)`) or a sentinel (`None` / `false`). Converting both
//! into [`GateError`](crate::GateError) is the caller's job, never the
//! engine's.
//!
//! All methods take `&mut self`: the engine is not reentrant, and the only
//! place a `&mut` to it exists is inside the gate.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::fs::FileSystem;
use crate::snapshot::{Commit, Context, SchemaDescriptor, Status};

/// Builds the engine. Construction happens at most once per manager.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn create(
        &self,
        log_sink: LogSink,
        fs: Arc<dyn FileSystem>,
    ) -> anyhow::Result<Box<dyn NativeEngine>>;
}

#[async_trait]
pub trait NativeEngine: Send {
    /// One-time setup after construction (deployment, loading user data).
    async fn setup(&mut self) -> anyhow::Result<()>;

    /// Rebuild the compiled search index for one schema.
    async fn rebuild_index_for_schema(
        &mut self,
        schema_id: &str,
        schema_config: &str,
    ) -> anyhow::Result<()>;

    /// Allocate a session bound to a schema. `None` means the engine
    /// refused to create one.
    async fn create_session(
        &mut self,
        schema_id: &str,
        schema_config: &str,
    ) -> anyhow::Result<Option<Box<dyn NativeSession>>>;

    /// `None` means the catalog is unavailable; `Some(vec![])` is an empty
    /// catalog.
    async fn list_schemas(&mut self) -> anyhow::Result<Option<Vec<SchemaDescriptor>>>;

    async fn perform_maintenance(&mut self) -> anyhow::Result<()>;

    /// Release engine resources. Called once, after every session is closed.
    async fn finalize(&mut self) -> anyhow::Result<()>;
}

#[async_trait]
pub trait NativeSession: Send {
    async fn process_key(&mut self, key_id: u32, modifier_mask: u32) -> anyhow::Result<bool>;

    async fn context(&mut self) -> anyhow::Result<Context>;

    async fn commit(&mut self) -> anyhow::Result<Commit>;

    async fn status(&mut self) -> anyhow::Result<Status>;

    async fn clear_composition(&mut self) -> anyhow::Result<()>;

    async fn current_schema(&mut self) -> anyhow::Result<Option<String>>;

    /// `action` is the native code: 0 selects, 1 deletes.
    async fn action_candidate_on_current_page(
        &mut self,
        index: usize,
        action: u32,
    ) -> anyhow::Result<bool>;

    /// Release the session. No other method is called afterwards.
    async fn close(&mut self);
}

/// Callback receiving the engine's diagnostic text.
#[derive(Clone)]
pub struct LogSink(Arc<dyn Fn(&str) + Send + Sync>);

impl LogSink {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        LogSink(Arc::new(f))
    }

    /// Forward engine diagnostics to `tracing`.
    pub fn tracing() -> Self {
        LogSink::new(|line| tracing::info!(target: "imegate::engine", "{}", line))
    }

    /// Discard everything.
    pub fn discard() -> Self {
        LogSink::new(|_| {})
    }

    pub fn log(&self, line: &str) {
        (self.0)(line)
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LogSink(..)")
    }
}

impl Default for LogSink {
    fn default() -> Self {
        LogSink::tracing()
    }
}
