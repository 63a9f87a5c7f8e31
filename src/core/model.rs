// ThreadSleuth - core/model.rs
//
// Core data model types. Pure data definitions with no I/O and no
// platform dependencies.
//
// `ThreadRecord` is the mutable shape every parser produces; `Thread` and
// `ThreadDump` are the immutable canonical model handed to consumers.

use crate::core::pool::pool_of;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// Thread identifier, unique within one dump.
pub type ThreadId = i64;

// =============================================================================
// Thread state
// =============================================================================

/// JVM thread states, in `java.lang.Thread.State` declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreadState {
    New,
    Runnable,
    Blocked,
    Waiting,
    TimedWaiting,
    Terminated,
}

impl ThreadState {
    /// Returns all variants in declaration order.
    pub fn all() -> &'static [ThreadState] {
        &[
            ThreadState::New,
            ThreadState::Runnable,
            ThreadState::Blocked,
            ThreadState::Waiting,
            ThreadState::TimedWaiting,
            ThreadState::Terminated,
        ]
    }

    /// The JVM spelling of the state.
    pub fn label(&self) -> &'static str {
        match self {
            ThreadState::New => "NEW",
            ThreadState::Runnable => "RUNNABLE",
            ThreadState::Blocked => "BLOCKED",
            ThreadState::Waiting => "WAITING",
            ThreadState::TimedWaiting => "TIMED_WAITING",
            ThreadState::Terminated => "TERMINATED",
        }
    }

    /// One-letter label for compact state trails.
    pub fn short_label(&self) -> char {
        match self {
            ThreadState::New => 'N',
            ThreadState::Runnable => 'R',
            ThreadState::Blocked => 'B',
            ThreadState::Waiting => 'W',
            ThreadState::TimedWaiting => 'T',
            ThreadState::Terminated => 'X',
        }
    }
}

impl std::fmt::Display for ThreadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ThreadState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ThreadState::all()
            .iter()
            .copied()
            .find(|state| state.label() == s)
            .ok_or_else(|| s.to_string())
    }
}

// =============================================================================
// Locks
// =============================================================================

/// A monitor held by a thread, with the frame that acquired it when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monitor {
    pub lock: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<String>,
}

/// The lock a thread is waiting on, and the id of its owner when reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blocker {
    pub lock: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<ThreadId>,
}

impl std::fmt::Display for Blocker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.owner {
            Some(owner) => write!(f, "{} (owned by {owner})", self.lock),
            None => f.write_str(&self.lock),
        }
    }
}

// =============================================================================
// Thread record (parser output, builder input)
// =============================================================================

/// A thread as produced by a parser, before validation.
///
/// Collaborators that obtain threads some other way (for example from a live
/// process) build these directly and hand them to `DumpBuilder`.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadRecord {
    pub id: ThreadId,
    pub name: String,
    pub state: ThreadState,
    pub is_daemon: bool,
    pub system: Option<String>,
    pub scope: Option<String>,
    pub cpu_usage: Option<f64>,
    pub locked_monitors: Vec<Monitor>,
    pub locked_synchronizers: Vec<String>,
    pub blocker: Option<Blocker>,
    pub stacktrace: Vec<String>,
}

impl ThreadRecord {
    /// A record with only the mandatory fields set.
    pub fn new(id: ThreadId, name: impl Into<String>, state: ThreadState) -> Self {
        Self {
            id,
            name: name.into(),
            state,
            is_daemon: false,
            system: None,
            scope: None,
            cpu_usage: None,
            locked_monitors: Vec::new(),
            locked_synchronizers: Vec::new(),
            blocker: None,
            stacktrace: Vec::new(),
        }
    }
}

// =============================================================================
// Thread (canonical, immutable)
// =============================================================================

/// One stack-trace snapshot of a JVM thread at capture time.
///
/// Fields are private so `pool` can never drift from `name`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    id: ThreadId,
    name: String,
    state: ThreadState,
    #[serde(rename = "daemon")]
    is_daemon: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cpu_usage: Option<f64>,
    locked_monitors: Vec<Monitor>,
    locked_synchronizers: Vec<String>,
    #[serde(rename = "waitingFor", skip_serializing_if = "Option::is_none")]
    blocker: Option<Blocker>,
    stacktrace: Vec<String>,
    #[serde(skip)]
    pool: Option<String>,
}

impl Thread {
    pub(crate) fn from_record(record: ThreadRecord) -> Self {
        let pool = pool_of(&record.name);
        Self {
            id: record.id,
            name: record.name,
            state: record.state,
            is_daemon: record.is_daemon,
            system: record.system,
            scope: record.scope,
            cpu_usage: record.cpu_usage,
            locked_monitors: record.locked_monitors,
            locked_synchronizers: record.locked_synchronizers,
            blocker: record.blocker,
            stacktrace: record.stacktrace,
            pool,
        }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ThreadState {
        self.state
    }

    pub fn is_daemon(&self) -> bool {
        self.is_daemon
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// CPU usage percentage, when the producing format reports one.
    pub fn cpu_usage(&self) -> Option<f64> {
        self.cpu_usage
    }

    pub fn locked_monitors(&self) -> &[Monitor] {
        &self.locked_monitors
    }

    pub fn locked_synchronizers(&self) -> &[String] {
        &self.locked_synchronizers
    }

    pub fn blocker(&self) -> Option<&Blocker> {
        self.blocker.as_ref()
    }

    /// Stack frames, outermost call first.
    pub fn stacktrace(&self) -> &[String] {
        &self.stacktrace
    }

    /// Logical worker pool derived from the thread name.
    pub fn pool(&self) -> Option<&str> {
        self.pool.as_deref()
    }
}

// =============================================================================
// Thread dump (aggregate root)
// =============================================================================

/// A complete, validated thread dump. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadDump {
    version: String,
    threads: Vec<Thread>,
    deadlock_ids: BTreeSet<ThreadId>,
}

impl ThreadDump {
    /// Only `DumpBuilder` constructs dumps; it has already checked the
    /// invariants.
    pub(crate) fn new_unchecked(
        version: String,
        threads: Vec<Thread>,
        deadlock_ids: BTreeSet<ThreadId>,
    ) -> Self {
        Self {
            version,
            threads,
            deadlock_ids,
        }
    }

    /// Version string of the producing JVM or application build.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Threads in document order.
    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    /// Ids of threads that take part in a reported deadlock.
    pub fn deadlock_ids(&self) -> &BTreeSet<ThreadId> {
        &self.deadlock_ids
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    pub fn thread(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.iter().find(|t| t.id == id)
    }

    pub fn is_deadlocked(&self, id: ThreadId) -> bool {
        self.deadlock_ids.contains(&id)
    }

    /// Deadlocked threads, in document order.
    pub fn deadlocked_threads(&self) -> impl Iterator<Item = &Thread> {
        self.threads
            .iter()
            .filter(move |t| self.deadlock_ids.contains(&t.id))
    }
}
