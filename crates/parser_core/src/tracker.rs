use std::collections::HashMap;

use crate::WordformId;

/// Join set for the "reparse text and verify" workflow: completes once every
/// wordform captured at creation has been reported processed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WordformTracker {
    processed: HashMap<WordformId, bool>,
    remaining: usize,
}

impl WordformTracker {
    pub fn new(wordforms: impl IntoIterator<Item = WordformId>) -> Self {
        let processed: HashMap<_, _> = wordforms.into_iter().map(|id| (id, false)).collect();
        let remaining = processed.len();
        Self {
            processed,
            remaining,
        }
    }

    /// Marks `id` processed. Returns true only the first time a tracked
    /// wordform is marked; unknown ids are ignored.
    pub fn mark_processed(&mut self, id: WordformId) -> bool {
        match self.processed.get_mut(&id) {
            Some(done) if !*done => {
                *done = true;
                self.remaining -= 1;
                true
            }
            _ => false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn len(&self) -> usize {
        self.processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }
}
