// ThreadSleuth - core/grammar.rs
//
// Per-dialect grammar tables for the legacy text thread-dump formats.
//
// Each dialect is described as data: an ordered list of line rules, a
// version rule, an id policy, and the deadlock-section matchers. The single
// automaton in `core::text` walks any of these tables, so the two legacy
// dialects never duplicate parsing logic.

use crate::core::deadlock::{DeadlockCycle, ThreadRef};
use crate::core::detect::Dialect;
use crate::core::model::ThreadId;
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// What a matched line contributes to the thread being assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Opens a new thread. Capture groups: `name` (required), and any of
    /// `id`, `state`, `daemon`, `cpu`.
    Header,
    /// CPU usage attribute (`cpu`).
    Cpu,
    /// Thread state attribute (`state`).
    State,
    /// A monitor owned by the thread (`lock`).
    Monitor,
    /// An ownable synchronizer held by the thread (`lock`).
    Synchronizer,
    /// The lock the thread is waiting on (`lock`, optional `owner`).
    Blocker,
    /// A stack frame (`frame`).
    Frame,
}

/// One ordered token matcher. The first rule whose pattern matches wins.
#[derive(Debug)]
pub struct LineRule {
    pub kind: LineKind,
    pub pattern: Regex,
}

/// Where a dialect keeps its version string.
#[derive(Debug)]
pub enum VersionRule {
    /// An unindented line before the first thread header may carry the
    /// banner; the first match wins. Capture group: `version`.
    Banner(Regex),
    /// The version sits on a fixed zero-based index among the non-blank
    /// lines.
    FixedLine { index: usize, pattern: Regex },
}

/// How thread ids are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSource {
    /// The header carries a numeric `id` group.
    Captured,
    /// The dialect has no ids; derive one from the thread name.
    NameHash,
}

/// How a deadlock-section matcher names a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// Capture group `ids` holds a comma separated id list.
    Ids,
    /// Capture group `name` holds an exact thread name.
    Name,
}

#[derive(Debug)]
pub struct RefRule {
    pub kind: RefKind,
    pub pattern: Regex,
}

/// Complete description of one text dialect.
#[derive(Debug)]
pub struct Grammar {
    pub dialect: Dialect,
    pub version: VersionRule,
    pub rules: Vec<LineRule>,
    pub id_source: IdSource,
    pub deadlock_banner: Regex,
    pub deadlock_refs: Vec<RefRule>,
}

impl Grammar {
    /// Classify a line against the ordered rule table.
    pub fn classify<'l>(&self, line: &'l str) -> Option<(LineKind, Captures<'l>)> {
        self.rules
            .iter()
            .find_map(|rule| rule.pattern.captures(line).map(|caps| (rule.kind, caps)))
    }

    /// True when `line` opens a thread block in this dialect.
    pub fn is_header(&self, line: &str) -> bool {
        self.rules
            .iter()
            .filter(|rule| rule.kind == LineKind::Header)
            .any(|rule| rule.pattern.is_match(line))
    }

    /// Extract the version string from `line` using `pattern`.
    pub fn capture_version(pattern: &Regex, line: &str) -> Option<String> {
        pattern
            .captures(line)
            .and_then(|caps| caps.name("version"))
            .map(|m| m.as_str().trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Add every thread reference found on a deadlock-section line.
    pub fn collect_refs(&self, line: &str, cycle: &mut DeadlockCycle) {
        for rule in &self.deadlock_refs {
            for caps in rule.pattern.captures_iter(line) {
                match rule.kind {
                    RefKind::Ids => {
                        let Some(ids) = caps.name("ids") else { continue };
                        for raw in ids.as_str().split(',').map(str::trim) {
                            match raw.parse::<ThreadId>() {
                                Ok(id) => cycle.push(ThreadRef::Id(id)),
                                // An id too large to represent can only match by name.
                                Err(_) => cycle.push(ThreadRef::Name(raw.to_string())),
                            }
                        }
                    }
                    RefKind::Name => {
                        if let Some(name) = caps.name("name") {
                            cycle.push(ThreadRef::Name(name.as_str().to_string()));
                        }
                    }
                }
            }
        }
    }
}

/// Grammar table for the given dialect, if it is a text dialect.
pub fn for_dialect(dialect: Dialect) -> Option<&'static Grammar> {
    match dialect {
        Dialect::Json => None,
        Dialect::WebText => Some(web()),
        Dialect::ScriptText => Some(script()),
    }
}

// Patterns are fixed at compile time and covered by the unit tests below,
// so a typo shows up as a failing test rather than a runtime panic.
fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("grammar: invalid regex")
}

fn deadlock_banner() -> Regex {
    re(r"(?i)^\s*(?:found (?:one|\d+) java-level deadlocks?|deadlocks? detected)\b")
}

fn deadlock_refs() -> Vec<RefRule> {
    vec![
        RefRule {
            kind: RefKind::Ids,
            pattern: re(r"(?i)deadlocked thread ids?:\s*(?P<ids>\d+(?:\s*,\s*\d+)*)"),
        },
        // Some exports print the id list on its own line under the banner.
        RefRule {
            kind: RefKind::Ids,
            pattern: re(r"^\s*(?P<ids>\d+(?:\s*,\s*\d+)*)\s*$"),
        },
        RefRule {
            kind: RefKind::Name,
            pattern: re(r#"^\s*"(?P<name>[^"]+)":\s*$"#),
        },
        RefRule {
            kind: RefKind::Name,
            pattern: re(r#"which is held by "(?P<name>[^"]+)""#),
        },
    ]
}

/// Web-page dialect: text scraped from the gateway's thread dump page.
///
/// ```text
/// Ignition v7.9.14 (b2020042813)
/// Daemon Thread [webserver-1114] id=87, (TIMED_WAITING)
///     owns monitor: java.lang.Object@4e1a27c9
///     java.base@11.0.7/java.lang.Object.wait(Native Method)
/// ```
pub fn web() -> &'static Grammar {
    static WEB: OnceLock<Grammar> = OnceLock::new();
    WEB.get_or_init(|| Grammar {
        dialect: Dialect::WebText,
        version: VersionRule::Banner(re(
            r#"^[^\d"]*?v?(?P<version>\d+\.\d+\.\d+\S*(?: \(b\d+\))?)\s*$"#,
        )),
        rules: vec![
            LineRule {
                kind: LineKind::Header,
                pattern: re(
                    r"^\s*(?P<daemon>Daemon )?Thread \[(?P<name>.*)\] id=(?P<id>\d+), \((?P<state>\w+)\)\s*(?:\(native\))?\s*$",
                ),
            },
            LineRule {
                kind: LineKind::Monitor,
                pattern: re(r"^\s+owns monitor: (?P<lock>.+?)\s*$"),
            },
            LineRule {
                kind: LineKind::Synchronizer,
                pattern: re(r"^\s+owns synchronizer: (?P<lock>.+?)\s*$"),
            },
            LineRule {
                kind: LineKind::Blocker,
                pattern: re(r"^\s+waiting for: (?P<lock>\S+)(?: \(owned by (?P<owner>\d+)\))?"),
            },
            LineRule {
                kind: LineKind::Frame,
                pattern: re(r"^\s{2,}(?P<frame>\S.*?)\s*$"),
            },
        ],
        id_source: IdSource::Captured,
        deadlock_banner: deadlock_banner(),
        deadlock_refs: deadlock_refs(),
    })
}

/// Script-console dialect: output of the scripting console's thread dump
/// call.
///
/// ```text
/// Ignition version: 8.1.1 (b2020120808)
/// "gateway-shared-exec-engine-11"
///   CPU: 12.50%
///   java.lang.Thread.State: TIMED_WAITING
///   java.base@11.0.7/jdk.internal.misc.Unsafe.park(Native Method)
/// ```
pub fn script() -> &'static Grammar {
    static SCRIPT: OnceLock<Grammar> = OnceLock::new();
    SCRIPT.get_or_init(|| Grammar {
        dialect: Dialect::ScriptText,
        version: VersionRule::FixedLine {
            index: 0,
            pattern: re(r"^[^:]*:\s*v?(?P<version>\d+\.\d+\.\d+.*?)\s*$"),
        },
        rules: vec![
            LineRule {
                kind: LineKind::Header,
                pattern: re(r#"^"(?P<name>.*)"\s*$"#),
            },
            LineRule {
                kind: LineKind::Cpu,
                pattern: re(r"^\s*CPU:\s*(?P<cpu>\d{1,3}(?:\.\d+)?)%\s*$"),
            },
            LineRule {
                kind: LineKind::State,
                pattern: re(r"^\s*java\.lang\.Thread\.State:\s*(?P<state>\w+)"),
            },
            LineRule {
                kind: LineKind::Monitor,
                pattern: re(r"^\s*- locked (?P<lock>.+?)\s*$"),
            },
            LineRule {
                kind: LineKind::Blocker,
                pattern: re(
                    r"^\s*- (?:waiting to lock|parking to wait for|waiting on) (?P<lock>\S+(?: \(a [^)]+\))?)",
                ),
            },
            LineRule {
                kind: LineKind::Frame,
                pattern: re(r"^\s+(?P<frame>\S.*?)\s*$"),
            },
        ],
        id_source: IdSource::NameHash,
        deadlock_banner: deadlock_banner(),
        deadlock_refs: deadlock_refs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(grammar: &Grammar, line: &str) -> Option<LineKind> {
        grammar.classify(line).map(|(kind, _)| kind)
    }

    #[test]
    fn test_web_header_captures_fields() {
        let (kind, caps) = web()
            .classify("Daemon Thread [AsyncSocketIOSession[I/O]-1] id=42, (RUNNABLE) (native)")
            .unwrap();
        assert_eq!(kind, LineKind::Header);
        assert_eq!(&caps["name"], "AsyncSocketIOSession[I/O]-1");
        assert_eq!(&caps["id"], "42");
        assert_eq!(&caps["state"], "RUNNABLE");
        assert!(caps.name("daemon").is_some());

        let (_, caps) = web()
            .classify("Thread [main] id=1, (WAITING)")
            .unwrap();
        assert!(caps.name("daemon").is_none());
    }

    #[test]
    fn test_web_rule_order() {
        let g = web();
        assert_eq!(
            kind(g, "    owns monitor: java.lang.Object@4e1a27c9"),
            Some(LineKind::Monitor)
        );
        assert_eq!(
            kind(g, "    owns synchronizer: java.util.concurrent.locks.ReentrantLock$NonfairSync@6d"),
            Some(LineKind::Synchronizer)
        );
        assert_eq!(
            kind(g, "    waiting for: java.lang.Object@1b2c3d4e (owned by 58)"),
            Some(LineKind::Blocker)
        );
        assert_eq!(
            kind(g, "    java.lang.Thread.run(Thread.java:834)"),
            Some(LineKind::Frame)
        );
        assert_eq!(kind(g, "unindented text"), None);
    }

    #[test]
    fn test_web_blocker_owner_is_optional() {
        let (_, caps) = web()
            .classify("    waiting for: java.util.concurrent.locks.AbstractQueuedSynchronizer$ConditionObject@3f")
            .unwrap();
        assert!(caps.name("owner").is_none());
        assert_eq!(
            &caps["lock"],
            "java.util.concurrent.locks.AbstractQueuedSynchronizer$ConditionObject@3f"
        );
    }

    #[test]
    fn test_web_version_banner() {
        let VersionRule::Banner(pattern) = &web().version else {
            panic!("web dialect should use a banner version rule");
        };
        assert_eq!(
            Grammar::capture_version(pattern, "Ignition v7.9.14 (b2020042813)").as_deref(),
            Some("7.9.14 (b2020042813)")
        );
        assert_eq!(
            Grammar::capture_version(pattern, "Ignition 8.1.7 (b2021060314)").as_deref(),
            Some("8.1.7 (b2021060314)")
        );
        assert_eq!(Grammar::capture_version(pattern, "Thread Dump"), None);
    }

    #[test]
    fn test_script_rules() {
        let g = script();
        assert_eq!(kind(g, "\"webserver-1114\""), Some(LineKind::Header));
        assert_eq!(kind(g, "  CPU: 12.50%"), Some(LineKind::Cpu));
        assert_eq!(
            kind(g, "  java.lang.Thread.State: TIMED_WAITING"),
            Some(LineKind::State)
        );
        assert_eq!(
            kind(g, "  - locked <0x00000000c1d2e3f4> (a java.lang.Object)"),
            Some(LineKind::Monitor)
        );
        assert_eq!(
            kind(g, "  - parking to wait for <0x00000000c4a1b2c3> (a java.util.concurrent.locks.ReentrantLock$NonfairSync)"),
            Some(LineKind::Blocker)
        );
        assert_eq!(
            kind(g, "  java.base@11.0.7/java.lang.Thread.run(Unknown Source)"),
            Some(LineKind::Frame)
        );
        // jstack deadlock entries are not thread headers.
        assert_eq!(kind(g, "\"Thread-1\":"), None);
    }

    #[test]
    fn test_script_version_line() {
        let VersionRule::FixedLine { index, pattern } = &script().version else {
            panic!("script dialect should use a fixed-line version rule");
        };
        assert_eq!(*index, 0);
        assert_eq!(
            Grammar::capture_version(pattern, "Ignition version: 8.1.1 (b2020120808)").as_deref(),
            Some("8.1.1 (b2020120808)")
        );
    }

    #[test]
    fn test_deadlock_banner_variants() {
        let banner = &web().deadlock_banner;
        assert!(banner.is_match("Found one Java-level deadlock:"));
        assert!(banner.is_match("Found 2 Java-level deadlocks:"));
        assert!(banner.is_match("Deadlock detected:"));
        assert!(!banner.is_match("Found 1 deadlock."));
        assert!(!banner.is_match("Deadlocked thread ids: 1, 2"));
    }

    #[test]
    fn test_collect_refs_by_id_and_name() {
        let mut cycle = DeadlockCycle::default();
        web().collect_refs("Deadlocked thread ids: 57, 58,59", &mut cycle);
        web().collect_refs("\"Thread-1\":", &mut cycle);
        web().collect_refs("  which is held by \"Thread-0\"", &mut cycle);
        assert_eq!(
            cycle.refs(),
            &[
                ThreadRef::Id(57),
                ThreadRef::Id(58),
                ThreadRef::Id(59),
                ThreadRef::Name("Thread-1".to_string()),
                ThreadRef::Name("Thread-0".to_string()),
            ]
        );
    }

    #[test]
    fn test_collect_refs_bare_id_list() {
        let mut cycle = DeadlockCycle::default();
        web().collect_refs("57, 58", &mut cycle);
        web().collect_refs("  waiting to lock monitor 0x02 (object 0x01, a java.lang.Object),", &mut cycle);
        assert_eq!(cycle.refs(), &[ThreadRef::Id(57), ThreadRef::Id(58)]);
    }

    #[test]
    fn test_is_header_only_checks_header_rules() {
        assert!(web().is_header("Thread [main] id=1, (RUNNABLE)"));
        assert!(!web().is_header("    java.lang.Thread.run(Thread.java:834)"));
        assert!(script().is_header("\"main\""));
    }
}
