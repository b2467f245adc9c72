//! Reference table engine.
//!
//! A small composition engine implementing the native capability traits
//! over a per-schema phrase table given as TOML config text:
//!
//! ```toml
//! [schema]
//! id = "luna_pinyin_simp"
//! name = "Luna Pinyin"
//! page_size = 5          # optional
//! select_keys = "12345"  # optional
//!
//! [table]
//! ni = ["你", "尼"]
//! nihao = ["你好"]
//! ```
//!
//! It lets the manager run end-to-end (CLI, integration tests) without the
//! real engine. Lowercase letters compose, space commits the highlighted
//! candidate, Return commits the raw input. Committed phrases are learned
//! per schema; maintenance persists what was learned under `user/`.

mod candidates;
mod index;
mod input_buffer;
mod session;
mod userdict;

pub use index::{schema_path, CompiledTable, SchemaConfig, SchemaSection};
pub use session::TableSession;
pub use userdict::UserDict;

use std::num::NonZeroUsize;
use std::sync::Arc;

use ahash::AHashMap;
use async_trait::async_trait;
use lru::LruCache;

use crate::fs::FileSystem;
use crate::native::{EngineFactory, LogSink, NativeEngine, NativeSession};
use crate::snapshot::SchemaDescriptor;

const USER_DIR: &str = "user";
const USERDB_SUFFIX: &str = ".userdb.bin";

fn userdb_path(schema_id: &str) -> String {
    format!("{}/{}{}", USER_DIR, schema_id, USERDB_SUFFIX)
}

/// Builds [`TableEngine`]s.
#[derive(Debug, Clone)]
pub struct TableEngineFactory {
    /// Compiled tables kept in memory at once.
    table_cache: NonZeroUsize,
}

impl TableEngineFactory {
    pub fn new() -> Self {
        Self::with_table_cache(8)
    }

    pub fn with_table_cache(capacity: usize) -> Self {
        Self {
            table_cache: NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl Default for TableEngineFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EngineFactory for TableEngineFactory {
    async fn create(
        &self,
        log_sink: LogSink,
        fs: Arc<dyn FileSystem>,
    ) -> anyhow::Result<Box<dyn NativeEngine>> {
        log_sink.log("table engine created");
        Ok(Box::new(TableEngine {
            fs,
            log: log_sink,
            tables: LruCache::new(self.table_cache),
            user_dicts: AHashMap::new(),
        }))
    }
}

pub struct TableEngine {
    fs: Arc<dyn FileSystem>,
    log: LogSink,
    tables: LruCache<String, Arc<CompiledTable>>,
    user_dicts: AHashMap<String, UserDict>,
}

impl TableEngine {
    /// Compiled table for a schema: memory cache, then stored artifacts,
    /// then a fresh build from `config_text`.
    async fn table_for(
        &mut self,
        schema_id: &str,
        config_text: &str,
    ) -> anyhow::Result<Arc<CompiledTable>> {
        if let Some(table) = self.tables.get(schema_id) {
            return Ok(Arc::clone(table));
        }
        let table = match CompiledTable::load(self.fs.as_ref(), schema_id).await? {
            Some(table) => table,
            None => {
                self.log
                    .log(&format!("no index for {}, building", schema_id));
                let config = SchemaConfig::parse(config_text)?;
                let table = CompiledTable::build(schema_id, &config)?;
                table.store(self.fs.as_ref(), config_text).await?;
                table
            }
        };
        let table = Arc::new(table);
        self.tables.put(schema_id.to_string(), Arc::clone(&table));
        Ok(table)
    }

    fn user_dict(&mut self, schema_id: &str) -> UserDict {
        self.user_dicts
            .entry(schema_id.to_string())
            .or_default()
            .clone()
    }

    /// Persist every dictionary changed since the last flush.
    async fn flush_user_dicts(&mut self) -> anyhow::Result<usize> {
        let mut written = 0;
        for (schema_id, dict) in &self.user_dicts {
            if !dict.is_dirty() {
                continue;
            }
            self.fs
                .write(&userdb_path(schema_id), &dict.to_bytes()?)
                .await?;
            dict.mark_clean();
            written += 1;
        }
        Ok(written)
    }
}

#[async_trait]
impl NativeEngine for TableEngine {
    async fn setup(&mut self) -> anyhow::Result<()> {
        for name in self.fs.list(USER_DIR).await? {
            let Some(schema_id) = name.strip_suffix(USERDB_SUFFIX) else {
                continue;
            };
            let Some(bytes) = self.fs.read(&userdb_path(schema_id)).await? else {
                continue;
            };
            match UserDict::from_bytes(&bytes) {
                Ok(dict) => {
                    self.user_dicts.insert(schema_id.to_string(), dict);
                }
                Err(e) => self
                    .log
                    .log(&format!("skipping unreadable user dictionary {}: {}", name, e)),
            }
        }
        self.log.log(&format!(
            "setup complete, {} user dictionaries loaded",
            self.user_dicts.len()
        ));
        Ok(())
    }

    async fn rebuild_index_for_schema(
        &mut self,
        schema_id: &str,
        schema_config: &str,
    ) -> anyhow::Result<()> {
        let config = SchemaConfig::parse(schema_config)?;
        let table = CompiledTable::build(schema_id, &config)?;
        table.store(self.fs.as_ref(), schema_config).await?;
        self.log.log(&format!(
            "rebuilt index for {} ({} keys)",
            schema_id,
            table.len()
        ));
        self.tables.put(schema_id.to_string(), Arc::new(table));
        Ok(())
    }

    async fn create_session(
        &mut self,
        schema_id: &str,
        schema_config: &str,
    ) -> anyhow::Result<Option<Box<dyn NativeSession>>> {
        if schema_id.is_empty() {
            return Ok(None);
        }
        let table = self.table_for(schema_id, schema_config).await?;
        let user = self.user_dict(schema_id);
        Ok(Some(Box::new(TableSession::new(table, user))))
    }

    async fn list_schemas(&mut self) -> anyhow::Result<Option<Vec<SchemaDescriptor>>> {
        let names = match self.fs.list(index::BUILD_DIR).await {
            Ok(names) => names,
            Err(e) => {
                self.log.log(&format!("cannot list schemas: {}", e));
                return Ok(None);
            }
        };
        let mut schemas = Vec::new();
        for name in names {
            let Some(schema_id) = name.strip_suffix(index::SCHEMA_SUFFIX) else {
                continue;
            };
            let Some(bytes) = self.fs.read(&index::schema_path(schema_id)).await? else {
                continue;
            };
            let parsed = std::str::from_utf8(&bytes)
                .map_err(anyhow::Error::from)
                .and_then(SchemaConfig::parse);
            match parsed {
                Ok(cfg) => schemas.push(SchemaDescriptor::new(schema_id, cfg.schema.name)),
                Err(e) => self
                    .log
                    .log(&format!("skipping unreadable schema {}: {}", name, e)),
            }
        }
        Ok(Some(schemas))
    }

    async fn perform_maintenance(&mut self) -> anyhow::Result<()> {
        let written = self.flush_user_dicts().await?;
        self.log
            .log(&format!("maintenance done, {} user dictionaries synced", written));
        Ok(())
    }

    async fn finalize(&mut self) -> anyhow::Result<()> {
        self.flush_user_dicts().await?;
        self.tables.clear();
        self.user_dicts.clear();
        self.log.log("table engine finalized");
        Ok(())
    }
}
