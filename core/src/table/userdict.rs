//! Learned phrase frequencies and hidden phrases for one schema.
//!
//! Thread-safe and cheap to clone: every session of a schema shares the
//! same dictionary. Changes mark it dirty; maintenance persists dirty
//! dictionaries as bincode.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
struct UserData {
    freq: AHashMap<String, u64>,
    masked: BTreeSet<String>,
    dirty: bool,
}

/// On-disk form.
#[derive(Serialize, Deserialize)]
struct Persisted {
    entries: Vec<(String, u64)>,
    masked: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct UserDict {
    inner: Arc<RwLock<UserData>>,
}

impl UserDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn a phrase: increment its count by 1. Learning a hidden phrase
    /// shows it again.
    pub fn learn(&self, phrase: &str) {
        self.learn_with_count(phrase, 1);
    }

    pub fn learn_with_count(&self, phrase: &str, delta: u64) {
        if delta == 0 {
            return;
        }
        if let Ok(mut data) = self.inner.write() {
            let entry = data.freq.entry(phrase.to_string()).or_insert(0);
            *entry = entry.saturating_add(delta);
            data.masked.remove(phrase);
            data.dirty = true;
        }
    }

    pub fn frequency(&self, phrase: &str) -> u64 {
        if let Ok(data) = self.inner.read() {
            data.freq.get(phrase).copied().unwrap_or(0)
        } else {
            0
        }
    }

    /// Hide a phrase from candidates and forget what was learned about it.
    pub fn mask(&self, phrase: &str) {
        if let Ok(mut data) = self.inner.write() {
            data.freq.remove(phrase);
            data.masked.insert(phrase.to_string());
            data.dirty = true;
        }
    }

    pub fn is_masked(&self, phrase: &str) -> bool {
        if let Ok(data) = self.inner.read() {
            data.masked.contains(phrase)
        } else {
            false
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.read().map(|d| d.dirty).unwrap_or(false)
    }

    pub fn mark_clean(&self) {
        if let Ok(mut data) = self.inner.write() {
            data.dirty = false;
        }
    }

    /// Entries sorted by phrase.
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        let mut entries: Vec<(String, u64)> = match self.inner.read() {
            Ok(data) => data.freq.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            Err(_) => Vec::new(),
        };
        entries.sort();
        entries
    }

    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let masked = match self.inner.read() {
            Ok(data) => data.masked.iter().cloned().collect(),
            Err(_) => anyhow::bail!("user dictionary lock poisoned"),
        };
        let persisted = Persisted {
            entries: self.snapshot(),
            masked,
        };
        Ok(bincode::serialize(&persisted)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        let persisted: Persisted = bincode::deserialize(bytes)?;
        let data = UserData {
            freq: persisted.entries.into_iter().collect(),
            masked: persisted.masked.into_iter().collect(),
            dirty: false,
        };
        Ok(Self {
            inner: Arc::new(RwLock::new(data)),
        })
    }
}
