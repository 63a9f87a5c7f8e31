// ThreadSleuth - core/compare.rs
//
// Multi-capture comparison: line up the same thread across several dumps of
// one process so state changes over time are visible.

use crate::core::model::{ThreadDump, ThreadId, ThreadState};
use std::collections::HashMap;

/// One thread followed across every capture in a comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadComparison {
    pub id: ThreadId,
    /// Name from the first capture the thread appears in.
    pub name: String,
    /// State per capture; `None` where the thread is absent.
    pub states: Vec<Option<ThreadState>>,
    /// Highest reported CPU usage across captures.
    pub max_cpu: Option<f64>,
}

impl ThreadComparison {
    /// Compact trail of the states the thread was seen in, e.g. `R -> W -> B`.
    pub fn state_trail(&self) -> String {
        self.states
            .iter()
            .flatten()
            .map(|s| s.short_label().to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// True when the thread was seen in more than one distinct state.
    pub fn changed(&self) -> bool {
        let mut present = self.states.iter().flatten();
        match present.next() {
            Some(first) => present.any(|s| s != first),
            None => false,
        }
    }

    /// Number of captures the thread appears in.
    pub fn seen_in(&self) -> usize {
        self.states.iter().filter(|s| s.is_some()).count()
    }
}

/// Align threads by id across `dumps`, in first-seen order.
pub fn compare(dumps: &[ThreadDump]) -> Vec<ThreadComparison> {
    let mut rows: Vec<ThreadComparison> = Vec::new();
    let mut index: HashMap<ThreadId, usize> = HashMap::new();

    for (capture, dump) in dumps.iter().enumerate() {
        for thread in dump.threads() {
            let slot = *index.entry(thread.id()).or_insert_with(|| {
                rows.push(ThreadComparison {
                    id: thread.id(),
                    name: thread.name().to_string(),
                    states: vec![None; dumps.len()],
                    max_cpu: None,
                });
                rows.len() - 1
            });
            let row = &mut rows[slot];
            row.states[capture] = Some(thread.state());
            if let Some(cpu) = thread.cpu_usage() {
                row.max_cpu = Some(row.max_cpu.map_or(cpu, |m| m.max(cpu)));
            }
        }
    }

    tracing::debug!(
        captures = dumps.len(),
        threads = rows.len(),
        "Captures compared"
    );
    rows
}
