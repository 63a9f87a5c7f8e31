// ThreadSleuth - core/builder.rs
//
// Canonical model builder: validates parser output and assembles the
// immutable `ThreadDump`.

use crate::core::model::{Thread, ThreadDump, ThreadId, ThreadRecord};
use crate::util::constants::LIVE_CAPTURE_RESERVED_PREFIXES;
use crate::util::error::ParseError;
use std::collections::{BTreeSet, HashSet};

/// Assembles a `ThreadDump` from thread records.
///
/// ```
/// use threadsleuth::core::builder::DumpBuilder;
/// use threadsleuth::core::model::{ThreadRecord, ThreadState};
///
/// let dump = DumpBuilder::new("Dev")
///     .thread(ThreadRecord::new(1, "webserver-1114", ThreadState::Runnable))
///     .build()
///     .unwrap();
/// assert_eq!(dump.threads()[0].pool(), Some("webserver"));
/// ```
#[derive(Debug, Clone)]
pub struct DumpBuilder {
    version: String,
    threads: Vec<ThreadRecord>,
    deadlock_ids: BTreeSet<ThreadId>,
    live_capture: bool,
}

impl DumpBuilder {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            threads: Vec::new(),
            deadlock_ids: BTreeSet::new(),
            live_capture: false,
        }
    }

    /// Drop bookkeeping threads (`RMI`, `JDWP`, `JMX` prefixes) before ids
    /// are checked. Only meaningful for threads captured from a running
    /// process.
    pub fn live_capture(mut self, enabled: bool) -> Self {
        self.live_capture = enabled;
        self
    }

    pub fn thread(mut self, thread: ThreadRecord) -> Self {
        self.threads.push(thread);
        self
    }

    pub fn threads(mut self, threads: impl IntoIterator<Item = ThreadRecord>) -> Self {
        self.threads.extend(threads);
        self
    }

    pub fn deadlock_ids(mut self, ids: impl IntoIterator<Item = ThreadId>) -> Self {
        self.deadlock_ids.extend(ids);
        self
    }

    /// Validate and freeze.
    ///
    /// Fails on duplicate ids, on an empty thread list, and on deadlock ids
    /// that name no retained thread.
    pub fn build(self) -> Result<ThreadDump, ParseError> {
        let DumpBuilder {
            version,
            mut threads,
            deadlock_ids,
            live_capture,
        } = self;

        if live_capture {
            let before = threads.len();
            threads.retain(|t| !is_bookkeeping_thread(&t.name));
            tracing::debug!(
                dropped = before - threads.len(),
                "Live-capture bookkeeping threads removed"
            );
        }

        let mut seen: HashSet<ThreadId> = HashSet::with_capacity(threads.len());
        for thread in &threads {
            if !seen.insert(thread.id) {
                return Err(ParseError::DuplicateThreadId { id: thread.id });
            }
        }

        if threads.is_empty() {
            return Err(ParseError::EmptyDump);
        }

        if let Some(missing) = deadlock_ids.iter().find(|id| !seen.contains(id)) {
            return Err(ParseError::DanglingDeadlockReference {
                reference: missing.to_string(),
            });
        }

        let threads: Vec<Thread> = threads.into_iter().map(Thread::from_record).collect();

        tracing::debug!(
            version = %version,
            threads = threads.len(),
            deadlocked = deadlock_ids.len(),
            "Thread dump built"
        );

        Ok(ThreadDump::new_unchecked(version, threads, deadlock_ids))
    }
}

/// True for threads that only exist because something attached to the JVM.
pub fn is_bookkeeping_thread(name: &str) -> bool {
    LIVE_CAPTURE_RESERVED_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::ThreadState;

    fn record(id: ThreadId, name: &str) -> ThreadRecord {
        ThreadRecord::new(id, name, ThreadState::Runnable)
    }

    #[test]
    fn test_build_preserves_order_and_computes_pools() {
        let dump = DumpBuilder::new("8.1.16")
            .threads([record(3, "opc-ua-executor-18"), record(1, "main")])
            .build()
            .unwrap();
        assert_eq!(dump.version(), "8.1.16");
        let ids: Vec<_> = dump.threads().iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(dump.threads()[0].pool(), Some("opc-ua-executor"));
        assert_eq!(dump.threads()[1].pool(), None);
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let err = DumpBuilder::new("Dev")
            .threads([record(1, "a"), record(2, "b"), record(1, "c")])
            .build()
            .unwrap_err();
        assert_eq!(err, ParseError::DuplicateThreadId { id: 1 });
    }

    #[test]
    fn test_empty_dump_is_rejected() {
        assert_eq!(
            DumpBuilder::new("Dev").build().unwrap_err(),
            ParseError::EmptyDump
        );
    }

    #[test]
    fn test_deadlock_ids_must_exist() {
        let err = DumpBuilder::new("Dev")
            .threads([record(1, "a")])
            .deadlock_ids([1, 4])
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ParseError::DanglingDeadlockReference {
                reference: "4".to_string()
            }
        );
    }

    #[test]
    fn test_live_capture_filter_runs_before_id_checks() {
        // The RMI thread shares an id with a real thread; once filtered there
        // is no collision.
        let dump = DumpBuilder::new("Dev")
            .live_capture(true)
            .threads([
                record(1, "main"),
                record(1, "RMI TCP Connection(2)-10.0.0.5"),
                record(7, "JDWP Transport Listener: dt_socket"),
                record(8, "JMX server connection timeout 22"),
                record(9, "gateway-shared-exec-engine-1"),
            ])
            .build()
            .unwrap();
        let names: Vec<_> = dump.threads().iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["main", "gateway-shared-exec-engine-1"]);
    }

    #[test]
    fn test_live_capture_filter_off_by_default() {
        let dump = DumpBuilder::new("Dev")
            .threads([record(1, "main"), record(2, "RMI Scheduler(0)")])
            .build()
            .unwrap();
        assert_eq!(dump.len(), 2);
    }

    #[test]
    fn test_live_capture_can_empty_the_dump() {
        let err = DumpBuilder::new("Dev")
            .live_capture(true)
            .thread(record(1, "RMI Reaper"))
            .build()
            .unwrap_err();
        assert_eq!(err, ParseError::EmptyDump);
    }

    #[test]
    fn test_is_bookkeeping_thread() {
        assert!(is_bookkeeping_thread("RMI Reaper"));
        assert!(is_bookkeeping_thread("JMX server connection timeout 22"));
        assert!(!is_bookkeeping_thread("gateway-rmi-bridge"));
    }
}
