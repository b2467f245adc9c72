//! Filesystem collaborators handed to the engine at setup.
//!
//! Paths are virtual, `/`-separated and relative to the collaborator's root
//! (a leading `/` is ignored). `..` segments are rejected.
//!
//! - `MemoryFs`: thread-safe in-memory store, for tests and ephemeral runs.
//! - `DirFs`: maps virtual paths below a host directory.

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use ahash::AHashMap;
use anyhow::{bail, Context as _};
use async_trait::async_trait;

#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Whole-file read; `None` if the file does not exist.
    async fn read(&self, path: &str) -> anyhow::Result<Option<Vec<u8>>>;

    /// Whole-file write, creating parent directories as needed.
    async fn write(&self, path: &str, data: &[u8]) -> anyhow::Result<()>;

    /// Returns whether a file was removed.
    async fn remove(&self, path: &str) -> anyhow::Result<bool>;

    /// Names of the files directly inside `dir`, sorted. A missing
    /// directory lists as empty.
    async fn list(&self, dir: &str) -> anyhow::Result<Vec<String>>;
}

/// Validate a virtual path and return its segments.
fn segments(path: &str) -> anyhow::Result<Vec<&str>> {
    let parts: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    if parts.iter().any(|s| *s == "..") {
        bail!("path escapes the filesystem root: {}", path);
    }
    Ok(parts)
}

fn normalize(path: &str) -> anyhow::Result<String> {
    Ok(segments(path)?.join("/"))
}

#[derive(Clone, Debug, Default)]
pub struct MemoryFs {
    files: Arc<RwLock<AHashMap<String, Vec<u8>>>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored files.
    pub fn len(&self) -> usize {
        self.files.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a file exists (normalized path).
    pub fn contains(&self, path: &str) -> bool {
        match (normalize(path), self.files.read()) {
            (Ok(key), Ok(map)) => map.contains_key(&key),
            _ => false,
        }
    }
}

#[async_trait]
impl FileSystem for MemoryFs {
    async fn read(&self, path: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let key = normalize(path)?;
        let map = self
            .files
            .read()
            .map_err(|_| anyhow::anyhow!("memory fs lock poisoned"))?;
        Ok(map.get(&key).cloned())
    }

    async fn write(&self, path: &str, data: &[u8]) -> anyhow::Result<()> {
        let key = normalize(path)?;
        if key.is_empty() {
            bail!("cannot write to the filesystem root");
        }
        let mut map = self
            .files
            .write()
            .map_err(|_| anyhow::anyhow!("memory fs lock poisoned"))?;
        map.insert(key, data.to_vec());
        Ok(())
    }

    async fn remove(&self, path: &str) -> anyhow::Result<bool> {
        let key = normalize(path)?;
        let mut map = self
            .files
            .write()
            .map_err(|_| anyhow::anyhow!("memory fs lock poisoned"))?;
        Ok(map.remove(&key).is_some())
    }

    async fn list(&self, dir: &str) -> anyhow::Result<Vec<String>> {
        let dir = normalize(dir)?;
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{}/", dir)
        };
        let map = self
            .files
            .read()
            .map_err(|_| anyhow::anyhow!("memory fs lock poisoned"))?;
        let mut names: Vec<String> = map
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(str::to_string)
            .collect();
        names.sort();
        Ok(names)
    }
}

/// Virtual root backed by a host directory.
#[derive(Clone, Debug)]
pub struct DirFs {
    root: PathBuf,
}

impl DirFs {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> anyhow::Result<PathBuf> {
        let mut full = self.root.clone();
        for seg in segments(path)? {
            full.push(seg);
        }
        Ok(full)
    }
}

#[async_trait]
impl FileSystem for DirFs {
    async fn read(&self, path: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {}", full.display())),
        }
    }

    async fn write(&self, path: &str, data: &[u8]) -> anyhow::Result<()> {
        let full = self.resolve(path)?;
        if full == self.root {
            bail!("cannot write to the filesystem root");
        }
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create {}", parent.display()))?;
        }
        tokio::fs::write(&full, data)
            .await
            .with_context(|| format!("write {}", full.display()))
    }

    async fn remove(&self, path: &str) -> anyhow::Result<bool> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("remove {}", full.display())),
        }
    }

    async fn list(&self, dir: &str) -> anyhow::Result<Vec<String>> {
        let full = self.resolve(dir)?;
        let mut entries = match tokio::fs::read_dir(&full).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("list {}", full.display())),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
