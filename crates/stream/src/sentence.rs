//! Token-to-sentence buffering.
//!
//! The underlying model emits arbitrary-length fragments; the channel
//! accumulates them until a sentence-terminating character is seen, then
//! flushes one chunk per completed sentence-equivalent unit. The
//! terminator set is configurable and covers both Latin and CJK
//! punctuation by default.

use std::collections::HashSet;

/// Default terminators: Latin and CJK sentence-ending punctuation.
pub fn default_terminators() -> HashSet<char> {
    ['.', '!', '?', '。', '！', '？'].into_iter().collect()
}

/// Accumulates fragments and yields completed sentence units.
#[derive(Debug, Clone)]
pub struct SentenceBuffer {
    terminators: HashSet<char>,
    pending: String,
}

impl SentenceBuffer {
    pub fn new(terminators: HashSet<char>) -> Self {
        Self {
            terminators,
            pending: String::new(),
        }
    }

    /// Append a fragment; returns every sentence unit completed by it.
    pub fn push(&mut self, fragment: &str) -> Vec<String> {
        let mut completed = Vec::new();
        for ch in fragment.chars() {
            self.pending.push(ch);
            if self.terminators.contains(&ch) {
                completed.push(std::mem::take(&mut self.pending));
            }
        }
        completed
    }

    /// Drain whatever remains unflushed, if anything.
    pub fn flush(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for SentenceBuffer {
    fn default() -> Self {
        Self::new(default_terminators())
    }
}
