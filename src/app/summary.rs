// ThreadSleuth - app/summary.rs
//
// Facet counts over a parsed dump. Derived on demand by the caller and
// never stored back into the model.

use crate::core::model::{ThreadDump, ThreadState};
use std::collections::BTreeMap;
use std::fmt;

/// Label used for threads whose system attribution is absent.
pub const UNASSIGNED_SYSTEM: &str = "(unassigned)";

/// Aggregate counts used to facet a dump.
#[derive(Debug, Clone, PartialEq)]
pub struct DumpSummary {
    pub version: String,
    pub total: usize,
    pub daemon: usize,
    pub by_state: BTreeMap<ThreadState, usize>,
    pub by_system: BTreeMap<String, usize>,
    pub by_pool: BTreeMap<String, usize>,
    /// Names of deadlocked threads in dump order.
    pub deadlocked: Vec<String>,
}

impl DumpSummary {
    pub fn from_dump(dump: &ThreadDump) -> Self {
        let mut by_state = BTreeMap::new();
        let mut by_system = BTreeMap::new();
        let mut by_pool = BTreeMap::new();
        let mut daemon = 0;

        for thread in dump.threads() {
            *by_state.entry(thread.state()).or_insert(0) += 1;
            let system = thread.system().unwrap_or(UNASSIGNED_SYSTEM);
            *by_system.entry(system.to_string()).or_insert(0) += 1;
            if let Some(pool) = thread.pool() {
                *by_pool.entry(pool.to_string()).or_insert(0) += 1;
            }
            if thread.is_daemon() {
                daemon += 1;
            }
        }

        let deadlocked = dump
            .deadlocked_threads()
            .map(|t| t.name().to_string())
            .collect();

        Self {
            version: dump.version().to_string(),
            total: dump.len(),
            daemon,
            by_state,
            by_system,
            by_pool,
            deadlocked,
        }
    }

    /// Number of threads in `state` (zero when none).
    pub fn count(&self, state: ThreadState) -> usize {
        self.by_state.get(&state).copied().unwrap_or(0)
    }
}

impl fmt::Display for DumpSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "version {}: {} threads ({} daemon)",
            self.version, self.total, self.daemon
        )?;
        for (state, n) in &self.by_state {
            writeln!(f, "  {:<14}{n}", state.label())?;
        }
        if !self.by_pool.is_empty() {
            writeln!(f, "  pools:")?;
            for (pool, n) in &self.by_pool {
                writeln!(f, "    {pool} ({n})")?;
            }
        }
        if !self.deadlocked.is_empty() {
            writeln!(f, "  DEADLOCK: {}", self.deadlocked.join(", "))?;
        }
        Ok(())
    }
}
