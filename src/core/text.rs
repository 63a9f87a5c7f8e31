// ThreadSleuth - core/text.rs
//
// Line-oriented finite automaton shared by both legacy text dialects.
// The dialect-specific knowledge lives entirely in the `Grammar` table.
//
// States:
//   SeekingHeader  - between thread blocks; watches for the version banner,
//                    thread headers and deadlock banners.
//   InStack        - inside a thread block; frames and lock annotations are
//                    attached to the open thread.
//   InDeadlock     - inside a deadlock report; thread references are
//                    collected into the open cycle.

use crate::core::deadlock::DeadlockCycle;
use crate::core::grammar::{Grammar, IdSource, LineKind, VersionRule};
use crate::core::model::{Blocker, Monitor, ThreadId, ThreadRecord, ThreadState};
use crate::core::parser::{RawDump, ThreadDumpParser};
use crate::core::detect::Dialect;
use crate::util::constants::CONTINUATION_SEPARATOR;
use crate::util::error::ParseError;
use crate::util::logging::preview;
use regex::Captures;
use std::collections::HashSet;

/// Parser for one legacy text dialect, driven by its grammar table.
#[derive(Debug, Clone, Copy)]
pub struct TextParser {
    grammar: &'static Grammar,
}

impl TextParser {
    pub fn new(grammar: &'static Grammar) -> Self {
        Self { grammar }
    }
}

impl ThreadDumpParser for TextParser {
    fn dialect(&self) -> Dialect {
        self.grammar.dialect
    }

    fn parse_raw(&self, input: &str) -> Result<RawDump, ParseError> {
        let grammar = self.grammar;
        let mut acc = Accumulator::default();
        let mut state = State::SeekingHeader;
        let mut lines_processed = 0usize;
        let mut non_blank = 0usize;

        for (index, line) in input.lines().enumerate() {
            lines_processed += 1;
            if let VersionRule::FixedLine { index: at, pattern } = &grammar.version {
                // Blank lines do not count toward the fixed index.
                if !line.trim().is_empty() {
                    non_blank += 1;
                    if non_blank == *at + 1 {
                        if let Some(version) = Grammar::capture_version(pattern, line) {
                            acc.version = Some(version);
                            continue;
                        }
                    }
                }
            }
            state = self.step(state, line, index + 1, &mut acc)?;
        }
        acc.finish(state)?;

        tracing::debug!(
            dialect = %grammar.dialect,
            threads = acc.threads.len(),
            cycles = acc.cycles.len(),
            tolerated = acc.tolerated_lines,
            lines = lines_processed,
            "Text dump scanned"
        );

        if acc.headers == 0 {
            return Err(ParseError::UnparseableHeaderLine);
        }
        let version = acc.version.ok_or(ParseError::MissingVersion {
            dialect: grammar.dialect,
        })?;

        Ok(RawDump {
            version,
            threads: acc.threads,
            deadlocks: acc.cycles,
        })
    }
}

enum State {
    SeekingHeader,
    InStack(OpenThread),
    InDeadlock {
        cycle: DeadlockCycle,
        banner_line: usize,
    },
}

#[derive(Default)]
struct Accumulator {
    version: Option<String>,
    threads: Vec<ThreadRecord>,
    cycles: Vec<DeadlockCycle>,
    headers: usize,
    tolerated_lines: usize,
    /// Ids handed out so far, for dialects that synthesise them.
    assigned_ids: HashSet<ThreadId>,
}

impl Accumulator {
    /// Close whatever the automaton has open.
    fn finish(&mut self, state: State) -> Result<(), ParseError> {
        match state {
            State::SeekingHeader => {}
            State::InStack(open) => {
                self.tolerated_lines += open.tolerated;
                self.threads.push(open.into_record()?);
            }
            State::InDeadlock { cycle, banner_line } => {
                if cycle.is_empty() {
                    return Err(ParseError::EmptyDeadlockReport {
                        line_number: banner_line,
                    });
                }
                self.cycles.push(cycle);
            }
        }
        Ok(())
    }
}

impl TextParser {
    fn step(
        &self,
        state: State,
        line: &str,
        line_number: usize,
        acc: &mut Accumulator,
    ) -> Result<State, ParseError> {
        let grammar = self.grammar;

        if line.trim().is_empty() {
            return Ok(match state {
                // A blank line straight after the banner does not end the report.
                State::InDeadlock { cycle, banner_line } if cycle.is_empty() => {
                    State::InDeadlock { cycle, banner_line }
                }
                other => {
                    acc.finish(other)?;
                    State::SeekingHeader
                }
            });
        }

        if grammar.deadlock_banner.is_match(line) {
            acc.finish(state)?;
            return Ok(State::InDeadlock {
                cycle: DeadlockCycle::default(),
                banner_line: line_number,
            });
        }

        match (state, grammar.classify(line)) {
            (state, Some((LineKind::Header, caps))) => {
                acc.finish(state)?;
                acc.headers += 1;
                Ok(State::InStack(self.open_thread(&caps, line_number, acc)?))
            }
            (State::InStack(mut open), classified) => {
                open.absorb(classified, line, line_number)?;
                Ok(State::InStack(open))
            }
            (State::InDeadlock { mut cycle, banner_line }, _) => {
                grammar.collect_refs(line, &mut cycle);
                Ok(State::InDeadlock { cycle, banner_line })
            }
            (State::SeekingHeader, _) => {
                // Only the preamble may carry the banner; indented lines are
                // stray frames.
                let preamble = acc.headers == 0 && !line.starts_with(char::is_whitespace);
                if preamble && acc.version.is_none() {
                    if let VersionRule::Banner(pattern) = &grammar.version {
                        acc.version = Grammar::capture_version(pattern, line);
                    }
                }
                Ok(State::SeekingHeader)
            }
        }
    }

    fn open_thread(
        &self,
        caps: &Captures<'_>,
        line_number: usize,
        acc: &mut Accumulator,
    ) -> Result<OpenThread, ParseError> {
        let name = caps
            .name("name")
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        let id = match self.grammar.id_source {
            IdSource::Captured => caps
                .name("id")
                .and_then(|m| m.as_str().parse::<ThreadId>().ok())
                .ok_or_else(|| ParseError::IncompleteThread {
                    name: name.clone(),
                    line_number,
                    field: "id",
                })?,
            IdSource::NameHash => {
                let id = next_free_id(ThreadId::from(java_string_hash(&name)), &acc.assigned_ids);
                acc.assigned_ids.insert(id);
                id
            }
        };

        let state = caps
            .name("state")
            .map(|m| parse_state(m.as_str(), line_number))
            .transpose()?;

        Ok(OpenThread {
            id,
            name,
            line_number,
            state,
            is_daemon: caps.name("daemon").is_some(),
            cpu_usage: caps.name("cpu").and_then(|m| m.as_str().parse().ok()),
            locked_monitors: Vec::new(),
            locked_synchronizers: Vec::new(),
            blocker: None,
            stacktrace: Vec::new(),
            tolerated: 0,
        })
    }
}

/// A thread block that is still being read.
struct OpenThread {
    id: ThreadId,
    name: String,
    line_number: usize,
    state: Option<ThreadState>,
    is_daemon: bool,
    cpu_usage: Option<f64>,
    locked_monitors: Vec<Monitor>,
    locked_synchronizers: Vec<String>,
    blocker: Option<Blocker>,
    stacktrace: Vec<String>,
    tolerated: usize,
}

impl OpenThread {
    fn absorb(
        &mut self,
        classified: Option<(LineKind, Captures<'_>)>,
        line: &str,
        line_number: usize,
    ) -> Result<(), ParseError> {
        let group = |caps: &Captures<'_>, name: &str| {
            caps.name(name).map(|m| m.as_str().to_string()).unwrap_or_default()
        };

        match classified {
            Some((LineKind::Frame, caps)) => self.stacktrace.push(group(&caps, "frame")),
            Some((LineKind::Monitor, caps)) => self.locked_monitors.push(Monitor {
                lock: group(&caps, "lock"),
                frame: self.stacktrace.last().cloned(),
            }),
            Some((LineKind::Synchronizer, caps)) => {
                self.locked_synchronizers.push(group(&caps, "lock"))
            }
            Some((LineKind::Blocker, caps)) => {
                self.blocker = Some(Blocker {
                    lock: group(&caps, "lock"),
                    owner: caps.name("owner").and_then(|m| m.as_str().parse().ok()),
                })
            }
            Some((LineKind::Cpu, caps)) => {
                self.cpu_usage = caps.name("cpu").and_then(|m| m.as_str().parse().ok())
            }
            Some((LineKind::State, caps)) => {
                self.state = Some(parse_state(&group(&caps, "state"), line_number)?)
            }
            // Headers never reach here; anything else is an irregular line
            // that legacy exports are known to contain.
            Some((LineKind::Header, _)) | None => self.continue_frame(line, line_number),
        }
        Ok(())
    }

    /// Fold an unrecognised line into the current frame.
    fn continue_frame(&mut self, line: &str, line_number: usize) {
        let text = line.trim();
        tracing::trace!(
            line_number,
            thread = %self.name,
            line = preview(text),
            "Unrecognised line folded into stack frame"
        );
        self.tolerated += 1;
        match self.stacktrace.last_mut() {
            Some(frame) => {
                frame.push_str(CONTINUATION_SEPARATOR);
                frame.push_str(text);
            }
            None => self.stacktrace.push(text.to_string()),
        }
    }

    fn into_record(self) -> Result<ThreadRecord, ParseError> {
        let state = self.state.ok_or_else(|| ParseError::IncompleteThread {
            name: self.name.clone(),
            line_number: self.line_number,
            field: "state",
        })?;
        Ok(ThreadRecord {
            id: self.id,
            name: self.name,
            state,
            is_daemon: self.is_daemon,
            system: None,
            scope: None,
            cpu_usage: self.cpu_usage,
            locked_monitors: self.locked_monitors,
            locked_synchronizers: self.locked_synchronizers,
            blocker: self.blocker,
            stacktrace: self.stacktrace,
        })
    }
}

fn parse_state(raw: &str, line_number: usize) -> Result<ThreadState, ParseError> {
    raw.parse()
        .map_err(|value| ParseError::InvalidThreadState { line_number, value })
}

/// The first id at or after `hash` that is not yet taken.
///
/// Repeated thread names and hash collisions are legal in a dump; the later
/// thread in document order moves up to the next free id.
fn next_free_id(hash: ThreadId, taken: &HashSet<ThreadId>) -> ThreadId {
    let mut id = hash;
    while taken.contains(&id) {
        id += 1;
    }
    id
}

/// `java.lang.String#hashCode` over UTF-16 code units.
///
/// The script console reports no thread ids; hashing the name the same way
/// the JVM does keeps ids stable across captures of the same process.
pub fn java_string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::deadlock::ThreadRef;
    use crate::core::grammar;

    fn web(input: &str) -> Result<RawDump, ParseError> {
        TextParser::new(grammar::web()).parse_raw(input)
    }

    fn script(input: &str) -> Result<RawDump, ParseError> {
        TextParser::new(grammar::script()).parse_raw(input)
    }

    #[test]
    fn test_java_string_hash_matches_jvm() {
        assert_eq!(java_string_hash(""), 0);
        assert_eq!(java_string_hash("a"), 97);
        assert_eq!(java_string_hash("hello"), 99_162_322);
        // Overflow wraps the same way as Java int arithmetic.
        assert_eq!(java_string_hash("polygenelubricants"), i32::MIN);
    }

    #[test]
    fn test_web_threads_and_annotations() {
        let input = "\
Ignition v7.9.14 (b2020042813)

Daemon Thread [webserver-1114] id=87, (BLOCKED)
    java.lang.Object.wait(Native Method)
    owns monitor: java.lang.Object@4e1a27c9
    owns synchronizer: java.util.concurrent.locks.ReentrantLock$NonfairSync@6d
    waiting for: java.lang.Object@1b2c3d4e (owned by 12)
    java.lang.Thread.run(Thread.java:834)
Thread [main] id=12, (RUNNABLE) (native)
    java.io.FileInputStream.readBytes(Native Method)
";
        let raw = web(input).unwrap();
        assert_eq!(raw.version, "7.9.14 (b2020042813)");
        assert_eq!(raw.threads.len(), 2);

        let first = &raw.threads[0];
        assert_eq!(first.id, 87);
        assert_eq!(first.name, "webserver-1114");
        assert_eq!(first.state, ThreadState::Blocked);
        assert!(first.is_daemon);
        assert_eq!(
            first.stacktrace,
            vec![
                "java.lang.Object.wait(Native Method)".to_string(),
                "java.lang.Thread.run(Thread.java:834)".to_string(),
            ]
        );
        assert_eq!(
            first.locked_monitors,
            vec![Monitor {
                lock: "java.lang.Object@4e1a27c9".to_string(),
                frame: Some("java.lang.Object.wait(Native Method)".to_string()),
            }]
        );
        assert_eq!(first.locked_synchronizers.len(), 1);
        assert_eq!(
            first.blocker,
            Some(Blocker {
                lock: "java.lang.Object@1b2c3d4e".to_string(),
                owner: Some(12),
            })
        );

        let second = &raw.threads[1];
        assert!(!second.is_daemon);
        assert_eq!(second.state, ThreadState::Runnable);
        assert!(second.cpu_usage.is_none());
    }

    #[test]
    fn test_unrecognised_interior_line_is_folded_into_frame() {
        let input = "\
Ignition v7.9.14 (b2020042813)
Thread [worker-1] id=3, (WAITING)
    com.example.Very.long(Frame.java:1)
wrapped-continuation
";
        let raw = web(input).unwrap();
        assert_eq!(
            raw.threads[0].stacktrace,
            vec!["com.example.Very.long(Frame.java:1) wrapped-continuation".to_string()]
        );
    }

    #[test]
    fn test_unrecognised_line_before_any_frame_becomes_frame() {
        let input = "Ignition v7.9.14 (b2020042813)\nThread [worker-1] id=3, (WAITING)\nstray\n";
        let raw = web(input).unwrap();
        assert_eq!(raw.threads[0].stacktrace, vec!["stray".to_string()]);
    }

    #[test]
    fn test_blank_line_closes_thread() {
        let input = "\
Ignition v7.9.14 (b2020042813)
Thread [worker-1] id=3, (WAITING)
    a.b.C.d(C.java:1)

    orphan.Frame(Ignored.java:2)
";
        let raw = web(input).unwrap();
        assert_eq!(raw.threads.len(), 1);
        assert_eq!(raw.threads[0].stacktrace.len(), 1);
    }

    #[test]
    fn test_zero_headers_is_unparseable() {
        assert_eq!(
            web("Ignition v7.9.14 (b2020042813)\nnothing here\n").unwrap_err(),
            ParseError::UnparseableHeaderLine
        );
        assert_eq!(web("").unwrap_err(), ParseError::UnparseableHeaderLine);
    }

    #[test]
    fn test_missing_version() {
        assert_eq!(
            web("Thread [main] id=1, (RUNNABLE)\n").unwrap_err(),
            ParseError::MissingVersion {
                dialect: Dialect::WebText
            }
        );
    }

    #[test]
    fn test_invalid_state_in_header() {
        let err = web("Ignition v7.9.14 (b2020042813)\nThread [main] id=1, (SLEEPING)\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidThreadState {
                line_number: 2,
                value: "SLEEPING".to_string()
            }
        );
    }

    #[test]
    fn test_deadlock_section_collects_ids() {
        let input = "\
Ignition 8.1.7 (b2021060314)

Deadlock detected:
Deadlocked thread ids: 1, 2

Thread [a-1] id=1, (BLOCKED)
    x.Y.z(Y.java:1)

Thread [a-2] id=2, (BLOCKED)
    x.Y.z(Y.java:2)
";
        let raw = web(input).unwrap();
        assert_eq!(raw.threads.len(), 2);
        assert_eq!(
            raw.deadlocks,
            vec![DeadlockCycle::new(vec![ThreadRef::Id(1), ThreadRef::Id(2)])]
        );
    }

    #[test]
    fn test_bare_id_list_under_banner() {
        let input = "\
Ignition 8.1.7 (b2021060314)
Deadlock detected:
57, 58

Thread [a-57] id=57, (BLOCKED)

Thread [a-58] id=58, (BLOCKED)
";
        let raw = web(input).unwrap();
        assert_eq!(
            raw.deadlocks,
            vec![DeadlockCycle::new(vec![ThreadRef::Id(57), ThreadRef::Id(58)])]
        );
    }

    #[test]
    fn test_deadlock_banner_without_references_fails() {
        let input = "\
Ignition 8.1.7 (b2021060314)
Deadlock detected:
threads 57 and 58 are stuck

Thread [a-57] id=57, (BLOCKED)
";
        assert_eq!(
            web(input).unwrap_err(),
            ParseError::EmptyDeadlockReport { line_number: 2 }
        );

        // A banner closed by a header or end of input is just as empty.
        let input = "Ignition 8.1.7 (b2021060314)\nThread [a] id=1, (BLOCKED)\nDeadlock detected:\n";
        assert_eq!(
            web(input).unwrap_err(),
            ParseError::EmptyDeadlockReport { line_number: 3 }
        );
    }

    #[test]
    fn test_indented_line_before_header_is_not_version() {
        let input = "\
Thread dump

    java.base@11.0.7/java.lang.Thread.run(Thread.java:834)

Thread [main] id=1, (RUNNABLE)
";
        assert_eq!(
            web(input).unwrap_err(),
            ParseError::MissingVersion {
                dialect: Dialect::WebText
            }
        );
    }

    #[test]
    fn test_version_banner_after_first_header_is_ignored() {
        let input = "\
Thread [main] id=1, (RUNNABLE)

Ignition v7.9.14 (b2020042813)
";
        assert_eq!(
            web(input).unwrap_err(),
            ParseError::MissingVersion {
                dialect: Dialect::WebText
            }
        );
    }

    #[test]
    fn test_trailing_jstack_deadlock_section() {
        let input = "\
Ignition version: 8.1.1 (b2020120808)

\"Thread-0\"
  CPU: 0.00%
  java.lang.Thread.State: BLOCKED
  - waiting to lock <0x01> (a java.lang.Object)
  com.example.Lock.a(Lock.java:10)

\"Thread-1\"
  CPU: 0.00%
  java.lang.Thread.State: BLOCKED
  com.example.Lock.b(Lock.java:20)
Found one Java-level deadlock:
=============================

\"Thread-0\":
  waiting to lock monitor 0x02 (object 0x01, a java.lang.Object),
  which is held by \"Thread-1\"
\"Thread-1\":
  waiting to lock monitor 0x03 (object 0x04, a java.lang.Object),
  which is held by \"Thread-0\"
";
        let raw = script(input).unwrap();
        assert_eq!(raw.threads.len(), 2);
        assert_eq!(raw.deadlocks.len(), 1);
        assert_eq!(raw.deadlocks[0].refs().len(), 4);
        assert_eq!(
            raw.threads[0].blocker.as_ref().map(|b| b.lock.as_str()),
            Some("<0x01> (a java.lang.Object)")
        );
    }

    #[test]
    fn test_script_thread_fields() {
        let input = "\
Ignition version: 8.1.1 (b2020120808)

\"gateway-shared-exec-engine-11\"
  CPU: 12.50%
  java.lang.Thread.State: TIMED_WAITING
  - locked <0x00000000c1d2e3f4> (a java.lang.Object)
  java.base@11.0.7/java.lang.Thread.run(Unknown Source)
";
        let raw = script(input).unwrap();
        assert_eq!(raw.version, "8.1.1 (b2020120808)");
        let thread = &raw.threads[0];
        assert_eq!(
            thread.id,
            ThreadId::from(java_string_hash("gateway-shared-exec-engine-11"))
        );
        assert_eq!(thread.cpu_usage, Some(12.5));
        assert_eq!(thread.state, ThreadState::TimedWaiting);
        assert!(!thread.is_daemon);
        assert_eq!(thread.locked_monitors.len(), 1);
        assert!(thread.locked_monitors[0].frame.is_none());
        assert_eq!(thread.stacktrace.len(), 1);
    }

    #[test]
    fn test_script_repeated_names_get_distinct_ids() {
        let input = "\
Ignition version: 8.1.1 (b2020120808)

\"Keep-Alive-Timer\"
  java.lang.Thread.State: TIMED_WAITING

\"Keep-Alive-Timer\"
  java.lang.Thread.State: TIMED_WAITING
";
        let raw = script(input).unwrap();
        let hash = ThreadId::from(java_string_hash("Keep-Alive-Timer"));
        let ids: Vec<_> = raw.threads.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![hash, hash + 1]);
    }

    #[test]
    fn test_script_hash_collision_moves_to_next_free_id() {
        assert_eq!(java_string_hash("Aa"), java_string_hash("BB"));
        let input = "\
Ignition version: 8.1.1 (b2020120808)
\"Aa\"
  java.lang.Thread.State: RUNNABLE
\"BB\"
  java.lang.Thread.State: RUNNABLE
\"Ab\"
  java.lang.Thread.State: RUNNABLE
";
        let raw = script(input).unwrap();
        let ids: Vec<_> = raw.threads.iter().map(|t| t.id).collect();
        // "Ab" hashes to 2113, already taken by "BB".
        assert_eq!(ids, vec![2112, 2113, 2114]);
    }

    #[test]
    fn test_script_version_after_leading_blank_lines() {
        let input = "\n\nIgnition version: 8.1.1 (b2020120808)\n\n\"main\"\n  java.lang.Thread.State: RUNNABLE\n";
        let raw = script(input).unwrap();
        assert_eq!(raw.version, "8.1.1 (b2020120808)");
        assert_eq!(raw.threads.len(), 1);
    }

    #[test]
    fn test_script_thread_without_state_is_incomplete() {
        let input = "Ignition version: 8.1.1 (b2020120808)\n\"main\"\n  CPU: 1.00%\n";
        assert_eq!(
            script(input).unwrap_err(),
            ParseError::IncompleteThread {
                name: "main".to_string(),
                line_number: 2,
                field: "state",
            }
        );
    }

    #[test]
    fn test_script_version_must_lead_the_dump() {
        let input = "\n\"main\"\n  java.lang.Thread.State: RUNNABLE\n";
        assert_eq!(
            script(input).unwrap_err(),
            ParseError::MissingVersion {
                dialect: Dialect::ScriptText
            }
        );
    }
}
