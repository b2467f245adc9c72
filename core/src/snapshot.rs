//! Snapshot values returned by session queries.
//!
//! These are plain data containers with public fields, produced fresh by the
//! engine on every call. They carry no identity or lifetime beyond the call
//! that produced them; the host adapter reads them to update its UI.

use serde::{Deserialize, Serialize};

/// One installable input schema from the engine's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDescriptor {
    pub schema_id: String,
    pub name: String,
}

impl SchemaDescriptor {
    pub fn new<I: Into<String>, N: Into<String>>(schema_id: I, name: N) -> Self {
        Self {
            schema_id: schema_id.into(),
            name: name.into(),
        }
    }
}

/// Preedit state. Offsets are byte offsets into `preedit`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Composition {
    pub length: usize,
    pub cursor_pos: usize,
    pub sel_start: usize,
    pub sel_end: usize,
    pub preedit: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl CandidateItem {
    pub fn new<T: Into<String>>(text: T) -> Self {
        Self {
            text: text.into(),
            comment: None,
        }
    }
}

/// The candidate page currently materialized inside the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Menu {
    pub page_size: usize,
    /// 0-based page index
    pub page_no: usize,
    pub is_last_page: bool,
    pub highlighted_candidate_index: usize,
    pub candidates: Vec<CandidateItem>,
    pub select_keys: String,
}

/// Composition and menu state of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    pub composition: Composition,
    pub menu: Menu,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_text_preview: Option<String>,
}

impl Context {
    /// Check if there's any visible state (preedit or candidates).
    pub fn has_visible_state(&self) -> bool {
        !self.composition.preedit.is_empty() || !self.menu.candidates.is_empty()
    }
}

/// Text finalized for insertion into the host application. Empty when
/// nothing was committed since the last query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub text: String,
}

impl Commit {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub schema_id: String,
    pub schema_name: String,
    pub is_disabled: bool,
    pub is_composing: bool,
    pub is_ascii_mode: bool,
    pub is_full_shape: bool,
    pub is_simplified: bool,
    pub is_traditional: bool,
    pub is_ascii_punct: bool,
}
