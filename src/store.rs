//! The single in-memory document slot.
//!
//! Holds the transcript of the most recently uploaded PDF. Each upload
//! replaces it wholesale. The slot is an [`ArcSwap`], so a question handler
//! that loads it while an upload is storing a new transcript sees either the
//! old text or the new text in full, never a mix of both.

use arc_swap::ArcSwap;
use std::sync::Arc;

/// Process-wide holder of the latest transcript. Last writer wins.
#[derive(Debug)]
pub struct DocumentStore {
    slot: ArcSwap<String>,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore {
    pub fn new() -> Self {
        Self {
            slot: ArcSwap::from_pointee(String::new()),
        }
    }

    /// Replace the stored transcript. No merge, no history.
    pub fn set(&self, transcript: impl Into<String>) {
        self.slot.store(Arc::new(transcript.into()));
    }

    /// Snapshot of the current transcript (empty if never set).
    pub fn get(&self) -> Arc<String> {
        self.slot.load_full()
    }

    pub fn clear(&self) {
        self.set(String::new());
    }

    /// Whether a question can be answered: the transcript has non-whitespace text.
    pub fn has_document(&self) -> bool {
        !self.slot.load().trim().is_empty()
    }
}
