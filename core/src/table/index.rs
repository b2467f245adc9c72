//! Schema config parsing and the compiled table index.
//!
//! A schema's phrase table is compiled into an FST mapping each input key
//! to an index into a bincode payload (`Vec<Vec<String>>`). Both artifacts
//! and the config text are stored under `build/` on the engine's
//! filesystem:
//!
//! - `build/<id>.prism.fst`
//! - `build/<id>.table.bin`
//! - `build/<id>.schema.toml`

use std::collections::BTreeMap;

use anyhow::{bail, Context as _};
use fst::automaton::{Automaton, Str};
use fst::{IntoStreamer, Map, MapBuilder, Streamer};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::fs::FileSystem;

pub const BUILD_DIR: &str = "build";
pub const SCHEMA_SUFFIX: &str = ".schema.toml";

/// Upper bound on phrases gathered for one input.
const MAX_CANDIDATES: usize = 64;

fn default_page_size() -> usize {
    5
}

fn default_select_keys() -> String {
    "1234567890".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchemaSection {
    pub id: String,
    pub name: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_select_keys")]
    pub select_keys: String,
}

/// Parsed schema config text.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchemaConfig {
    pub schema: SchemaSection,
    #[serde(default)]
    pub table: BTreeMap<String, Vec<String>>,
}

impl SchemaConfig {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let config: SchemaConfig = toml::from_str(text).context("parse schema config")?;
        if config.schema.id.is_empty() {
            bail!("schema id is empty");
        }
        if config.schema.page_size == 0 {
            bail!("schema {}: page_size must be positive", config.schema.id);
        }
        for key in config.table.keys() {
            if key.is_empty() || !key.bytes().all(|b| b.is_ascii_lowercase()) {
                bail!(
                    "schema {}: table key `{}` must be lowercase ASCII letters",
                    config.schema.id,
                    key
                );
            }
        }
        Ok(config)
    }
}

pub fn prism_path(schema_id: &str) -> String {
    format!("{}/{}.prism.fst", BUILD_DIR, schema_id)
}

pub fn table_path(schema_id: &str) -> String {
    format!("{}/{}.table.bin", BUILD_DIR, schema_id)
}

pub fn schema_path(schema_id: &str) -> String {
    format!("{}/{}{}", BUILD_DIR, schema_id, SCHEMA_SUFFIX)
}

/// Normalize phrases (NFC) and trim whitespace.
fn normalize(s: &str) -> String {
    s.nfc().collect::<String>().trim().to_string()
}

/// Compiled, read-only lookup structure of one schema.
pub struct CompiledTable {
    pub schema_id: String,
    pub name: String,
    pub page_size: usize,
    pub select_keys: String,
    map: Map<Vec<u8>>,
    payloads: Vec<Vec<String>>,
}

impl std::fmt::Debug for CompiledTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledTable")
            .field("schema_id", &self.schema_id)
            .field("keys", &self.map.len())
            .finish()
    }
}

impl CompiledTable {
    /// Compile `config` for `schema_id`. The id inside the config must match.
    pub fn build(schema_id: &str, config: &SchemaConfig) -> anyhow::Result<Self> {
        if config.schema.id != schema_id {
            bail!(
                "schema config declares id `{}`, expected `{}`",
                config.schema.id,
                schema_id
            );
        }

        // BTreeMap iterates keys in byte order, as the FST builder requires.
        let mut builder = MapBuilder::memory();
        let mut payloads = Vec::with_capacity(config.table.len());
        for (key, phrases) in &config.table {
            let mut cleaned: Vec<String> = Vec::with_capacity(phrases.len());
            for phrase in phrases.iter().map(|p| normalize(p)) {
                if !phrase.is_empty() && !cleaned.contains(&phrase) {
                    cleaned.push(phrase);
                }
            }
            builder.insert(key, payloads.len() as u64)?;
            payloads.push(cleaned);
        }
        let bytes = builder.into_inner()?;

        Ok(Self {
            schema_id: schema_id.to_string(),
            name: config.schema.name.clone(),
            page_size: config.schema.page_size,
            select_keys: config.schema.select_keys.clone(),
            map: Map::new(bytes)?,
            payloads,
        })
    }

    /// Number of distinct input keys.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Phrases for `input`: the exact key's phrases first, then those of
    /// longer keys starting with `input`, in key order. Duplicates keep
    /// their first position.
    pub fn lookup(&self, input: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        if input.is_empty() {
            return out;
        }
        let matcher = Str::new(input).starts_with();
        let mut stream = self.map.search(matcher).into_stream();
        while let Some((_, idx)) = stream.next() {
            if let Some(phrases) = self.payloads.get(idx as usize) {
                for p in phrases {
                    if !out.contains(p) {
                        out.push(p.clone());
                    }
                }
            }
            if out.len() >= MAX_CANDIDATES {
                out.truncate(MAX_CANDIDATES);
                break;
            }
        }
        out
    }

    /// Write the compiled artifacts and the config text.
    pub async fn store(&self, fs: &dyn FileSystem, config_text: &str) -> anyhow::Result<()> {
        let payload = bincode::serialize(&self.payloads)?;
        fs.write(&prism_path(&self.schema_id), self.map.as_fst().as_bytes())
            .await?;
        fs.write(&table_path(&self.schema_id), &payload).await?;
        fs.write(&schema_path(&self.schema_id), config_text.as_bytes())
            .await?;
        Ok(())
    }

    /// Load previously stored artifacts. `None` when the schema has never
    /// been built.
    pub async fn load(fs: &dyn FileSystem, schema_id: &str) -> anyhow::Result<Option<Self>> {
        let (Some(fst_bytes), Some(payload), Some(config_bytes)) = (
            fs.read(&prism_path(schema_id)).await?,
            fs.read(&table_path(schema_id)).await?,
            fs.read(&schema_path(schema_id)).await?,
        ) else {
            return Ok(None);
        };
        let config_text = String::from_utf8(config_bytes).context("schema config is not UTF-8")?;
        let config = SchemaConfig::parse(&config_text)?;
        let map = Map::new(fst_bytes).context("load prism")?;
        let payloads: Vec<Vec<String>> =
            bincode::deserialize(&payload).context("load table payload")?;
        if payloads.len() != map.len() {
            bail!(
                "schema {}: prism has {} keys but table has {} entries",
                schema_id,
                map.len(),
                payloads.len()
            );
        }
        Ok(Some(Self {
            schema_id: schema_id.to_string(),
            name: config.schema.name,
            page_size: config.schema.page_size,
            select_keys: config.schema.select_keys,
            map,
            payloads,
        }))
    }
}
