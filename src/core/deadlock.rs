// ThreadSleuth - core/deadlock.rs
//
// Deadlock cross-referencing: resolve the thread references collected from a
// deadlock report against the threads parsed from the same dump.

use crate::core::model::{ThreadId, ThreadRecord};
use crate::util::error::ParseError;
use std::collections::{BTreeSet, HashMap, HashSet};

/// A thread named by a deadlock report.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ThreadRef {
    Id(ThreadId),
    Name(String),
}

impl std::fmt::Display for ThreadRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThreadRef::Id(id) => write!(f, "{id}"),
            ThreadRef::Name(name) => f.write_str(name),
        }
    }
}

/// One reported deadlock cycle, as the ordered list of threads it names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeadlockCycle {
    refs: Vec<ThreadRef>,
}

impl DeadlockCycle {
    pub fn new(refs: Vec<ThreadRef>) -> Self {
        Self { refs }
    }

    pub fn push(&mut self, thread: ThreadRef) {
        self.refs.push(thread);
    }

    pub fn refs(&self) -> &[ThreadRef] {
        &self.refs
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

/// Resolve every reference in `cycles` against `threads`.
///
/// Ids match by id; names match the first thread with exactly that name.
/// Returns the union of resolved ids across all cycles. The first reference
/// that matches no thread fails the whole call.
pub fn resolve(
    threads: &[ThreadRecord],
    cycles: &[DeadlockCycle],
) -> Result<BTreeSet<ThreadId>, ParseError> {
    let ids: HashSet<ThreadId> = threads.iter().map(|t| t.id).collect();
    let mut by_name: HashMap<&str, ThreadId> = HashMap::with_capacity(threads.len());
    for thread in threads {
        by_name.entry(thread.name.as_str()).or_insert(thread.id);
    }

    let mut resolved = BTreeSet::new();
    for (index, cycle) in cycles.iter().enumerate() {
        for reference in cycle.refs() {
            let id = match reference {
                ThreadRef::Id(id) => ids.contains(id).then_some(*id),
                ThreadRef::Name(name) => by_name.get(name.as_str()).copied(),
            };
            match id {
                Some(id) => {
                    resolved.insert(id);
                }
                None => {
                    tracing::debug!(cycle = index, reference = %reference, "Dangling deadlock reference");
                    return Err(ParseError::DanglingDeadlockReference {
                        reference: reference.to_string(),
                    });
                }
            }
        }
    }

    if !cycles.is_empty() {
        tracing::debug!(
            cycles = cycles.len(),
            threads = resolved.len(),
            "Deadlock report resolved"
        );
    }

    Ok(resolved)
}
