// ThreadSleuth - app/marks.rs
//
// User marks on threads. Kept beside the dump rather than inside it so the
// parsed model stays immutable.

use crate::core::model::{ThreadDump, ThreadId};
use std::collections::HashMap;

/// Mark flags keyed by thread id.
#[derive(Debug, Clone, Default)]
pub struct MarkTable {
    marks: HashMap<ThreadId, bool>,
}

impl MarkTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, id: ThreadId, marked: bool) {
        self.marks.insert(id, marked);
    }

    /// Flip the mark on `id` and return the new value.
    pub fn toggle(&mut self, id: ThreadId) -> bool {
        let entry = self.marks.entry(id).or_insert(false);
        *entry = !*entry;
        *entry
    }

    pub fn is_marked(&self, id: ThreadId) -> bool {
        self.marks.get(&id).copied().unwrap_or(false)
    }

    /// Marked ids in ascending order.
    pub fn marked_ids(&self) -> Vec<ThreadId> {
        let mut ids: Vec<ThreadId> = self
            .marks
            .iter()
            .filter(|(_, &m)| m)
            .map(|(&id, _)| id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Drop entries for threads that are not in `dump`, e.g. after loading a
    /// newer capture of the same gateway.
    pub fn retain_present(&mut self, dump: &ThreadDump) {
        let before = self.marks.len();
        self.marks.retain(|id, _| dump.thread(*id).is_some());
        tracing::debug!(
            dropped = before - self.marks.len(),
            kept = self.marks.len(),
            "Mark table pruned"
        );
    }
}
