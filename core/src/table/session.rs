//! Composition state of one table-engine session.

use std::sync::Arc;

use async_trait::async_trait;

use super::candidates::{Candidate, CandidateList};
use super::index::CompiledTable;
use super::input_buffer::InputBuffer;
use super::userdict::UserDict;
use crate::keys::KeyEvent;
use crate::native::NativeSession;
use crate::snapshot::{CandidateItem, Commit, Composition, Context, Menu, Status};

pub struct TableSession {
    table: Arc<CompiledTable>,
    user: UserDict,
    input: InputBuffer,
    candidates: CandidateList,
    /// Committed text not yet read by `commit()`
    pending_commit: String,
}

impl TableSession {
    pub(crate) fn new(table: Arc<CompiledTable>, user: UserDict) -> Self {
        let page_size = table.page_size;
        Self {
            table,
            user,
            input: InputBuffer::new(),
            candidates: CandidateList::with_page_size(page_size),
            pending_commit: String::new(),
        }
    }

    fn is_composing(&self) -> bool {
        !self.input.is_empty()
    }

    /// Recompute candidates for the current input. Hidden phrases are
    /// dropped; the rest are ordered by learned frequency, ties keeping
    /// table order.
    fn refresh(&mut self) {
        let mut found: Vec<Candidate> = self
            .table
            .lookup(self.input.text())
            .into_iter()
            .filter(|p| !self.user.is_masked(p))
            .map(|p| {
                let weight = self.user.frequency(&p);
                Candidate::new(p, weight)
            })
            .collect();
        found.sort_by(|a, b| b.weight.cmp(&a.weight));
        self.candidates.set_candidates(found);
    }

    fn reset(&mut self) {
        self.input.clear();
        self.candidates.clear();
    }

    fn commit_text(&mut self, text: String) {
        if !text.is_empty() {
            self.user.learn(&text);
            self.pending_commit.push_str(&text);
        }
        self.reset();
    }

    /// Commit the highlighted candidate, or the raw input when there is none.
    fn commit_selected(&mut self) {
        let text = match self.candidates.selected_candidate() {
            Some(c) => c.text.clone(),
            None => self.input.text().to_string(),
        };
        self.commit_text(text);
    }

    fn select_on_page(&mut self, page_index: usize) -> bool {
        match self.candidates.select_by_index(page_index) {
            Some(c) => {
                let text = c.text.clone();
                self.commit_text(text);
                true
            }
            None => false,
        }
    }

    fn hide_on_page(&mut self, page_index: usize) -> bool {
        match self.candidates.on_page(page_index) {
            Some(c) => {
                let text = c.text.clone();
                self.user.mask(&text);
                self.refresh();
                true
            }
            None => false,
        }
    }

    fn handle(&mut self, key: KeyEvent) -> bool {
        let composing = self.is_composing();
        match key {
            KeyEvent::Modified | KeyEvent::Unknown(_) | KeyEvent::Tab => false,
            KeyEvent::Char(ch)
                if composing && !self.candidates.is_empty() && self.table.select_keys.contains(ch) =>
            {
                if let Some(pos) = self.table.select_keys.chars().position(|c| c == ch) {
                    self.select_on_page(pos);
                }
                true
            }
            KeyEvent::Char(ch) if ch.is_ascii_lowercase() => {
                self.input.insert_char(ch);
                self.refresh();
                true
            }
            KeyEvent::Char('-') if composing => {
                self.candidates.page_up();
                true
            }
            KeyEvent::Char('=') if composing => {
                self.candidates.page_down();
                true
            }
            // Other printable keys are swallowed mid-composition.
            KeyEvent::Char(_) => composing,
            _ if !composing => false,
            KeyEvent::Space => {
                self.commit_selected();
                true
            }
            KeyEvent::Enter => {
                let raw = self.input.text().to_string();
                self.commit_text(raw);
                true
            }
            KeyEvent::Escape => {
                self.reset();
                true
            }
            KeyEvent::Backspace => {
                self.input.delete_before();
                self.refresh();
                true
            }
            KeyEvent::Delete => {
                self.input.delete_after();
                self.refresh();
                true
            }
            KeyEvent::Left => {
                self.input.move_left();
                true
            }
            KeyEvent::Right => {
                self.input.move_right();
                true
            }
            KeyEvent::Home => {
                self.input.move_to_start();
                true
            }
            KeyEvent::End => {
                self.input.move_to_end();
                true
            }
            KeyEvent::Up => {
                self.candidates.cursor_up();
                true
            }
            KeyEvent::Down => {
                self.candidates.cursor_down();
                true
            }
            KeyEvent::PageUp => {
                self.candidates.page_up();
                true
            }
            KeyEvent::PageDown => {
                self.candidates.page_down();
                true
            }
        }
    }

    fn snapshot(&self) -> Context {
        let preedit = self.input.text().to_string();
        Context {
            composition: Composition {
                length: preedit.len(),
                cursor_pos: self.input.cursor(),
                sel_start: 0,
                sel_end: preedit.len(),
                preedit,
            },
            menu: Menu {
                page_size: self.candidates.page_size(),
                page_no: self.candidates.current_page(),
                is_last_page: self.candidates.is_last_page(),
                highlighted_candidate_index: self.candidates.cursor(),
                candidates: self
                    .candidates
                    .current_page_candidates()
                    .iter()
                    .map(|c| CandidateItem::new(c.text.clone()))
                    .collect(),
                select_keys: self.table.select_keys.clone(),
            },
            commit_text_preview: self.candidates.selected_candidate().map(|c| c.text.clone()),
        }
    }
}

#[async_trait]
impl NativeSession for TableSession {
    async fn process_key(&mut self, key_id: u32, modifier_mask: u32) -> anyhow::Result<bool> {
        Ok(self.handle(KeyEvent::decode(key_id, modifier_mask)))
    }

    async fn context(&mut self) -> anyhow::Result<Context> {
        Ok(self.snapshot())
    }

    async fn commit(&mut self) -> anyhow::Result<Commit> {
        Ok(Commit {
            text: std::mem::take(&mut self.pending_commit),
        })
    }

    async fn status(&mut self) -> anyhow::Result<Status> {
        Ok(Status {
            schema_id: self.table.schema_id.clone(),
            schema_name: self.table.name.clone(),
            is_composing: self.is_composing(),
            ..Status::default()
        })
    }

    async fn clear_composition(&mut self) -> anyhow::Result<()> {
        self.reset();
        Ok(())
    }

    async fn current_schema(&mut self) -> anyhow::Result<Option<String>> {
        Ok(Some(self.table.schema_id.clone()))
    }

    async fn action_candidate_on_current_page(
        &mut self,
        index: usize,
        action: u32,
    ) -> anyhow::Result<bool> {
        Ok(match action {
            0 => self.select_on_page(index),
            1 => self.hide_on_page(index),
            _ => false,
        })
    }

    async fn close(&mut self) {
        self.reset();
        self.pending_commit.clear();
    }
}
