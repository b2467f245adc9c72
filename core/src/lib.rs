//! imegate-core
//!
//! Serialized access to a single stateful, non-reentrant composition engine
//! from many independent asynchronous callers (key events, focus changes,
//! schema switches, periodic maintenance).
//!
//! Public API:
//! - `Gate` - the one exclusive-access primitive; every engine call runs in it
//! - `EngineManager` - engine lifecycle, schema catalog, index rebuild, maintenance
//! - `Session` - one input context bound to the shared engine
//! - `EngineFactory` / `NativeEngine` / `NativeSession` - the engine's capability interface
//! - `FileSystem` - storage collaborator handed to the engine (`MemoryFs`, `DirFs`)
//! - `GateConfig` - per-class operation timeouts
//! - `GateError` - error taxonomy
//! - `table` - a reference table engine implementing the capability interface
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use imegate_core::{EngineManager, GateConfig, LogSink, MemoryFs, CandidateOp};
//! use imegate_core::table::TableEngineFactory;
//! use imegate_core::keys::key_code;
//!
//! let manager = EngineManager::new(TableEngineFactory::new(), GateConfig::default());
//! manager.initialize(LogSink::tracing(), Arc::new(MemoryFs::new())).await?;
//! let session = manager.create_session("luna_pinyin_simp", &config_text).await?;
//! session.process_key(key_code('n'), 0).await?;
//! session.process_key(key_code('i'), 0).await?;
//! session.action_candidate_on_current_page(0, CandidateOp::Select).await?;
//! println!("{}", session.get_commit().await?.text);
//! session.destroy().await?;
//! manager.destroy().await?;
//! ```

pub mod config;
pub use config::GateConfig;

pub mod error;
pub use error::{GateError, Result};

pub mod gate;
pub use gate::{Gate, OpFuture, OperationClass};

pub mod fs;
pub use fs::{DirFs, FileSystem, MemoryFs};

pub mod keys;

pub mod native;
pub use native::{EngineFactory, LogSink, NativeEngine, NativeSession};

pub mod snapshot;
pub use snapshot::{CandidateItem, Commit, Composition, Context, Menu, SchemaDescriptor, Status};

pub mod manager;
pub use manager::{EngineManager, EngineState};

pub mod session;
pub use session::{CandidateOp, Session, SessionId};

pub mod table;
