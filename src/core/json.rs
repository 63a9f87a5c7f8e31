// ThreadSleuth - core/json.rs
//
// Strict decoding of the structured JSON thread dump export.
// Fail-fast: any structural violation rejects the whole document.

use crate::core::deadlock::{DeadlockCycle, ThreadRef};
use crate::core::detect::Dialect;
use crate::core::model::{Blocker, Monitor, ThreadId, ThreadRecord, ThreadState};
use crate::core::parser::{RawDump, ThreadDumpParser};
use crate::util::error::ParseError;
use serde::{Deserialize, Deserializer};

/// Parser for the JSON dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl ThreadDumpParser for JsonParser {
    fn dialect(&self) -> Dialect {
        Dialect::Json
    }

    fn parse_raw(&self, input: &str) -> Result<RawDump, ParseError> {
        let document: JsonDump =
            serde_json::from_str(input).map_err(|e| ParseError::MalformedJson {
                reason: e.to_string(),
            })?;

        let deadlock_ids = document.deadlock_ids.unwrap_or_default();
        tracing::debug!(
            version = %document.version,
            threads = document.threads.len(),
            deadlocks = deadlock_ids.len(),
            "JSON dump decoded"
        );

        let deadlocks = if deadlock_ids.is_empty() {
            Vec::new()
        } else {
            vec![DeadlockCycle::new(
                deadlock_ids.into_iter().map(ThreadRef::Id).collect(),
            )]
        };

        Ok(RawDump {
            version: document.version,
            threads: document.threads.into_iter().map(ThreadRecord::from).collect(),
            deadlocks,
        })
    }
}

/// Wire shape of the JSON document. Unknown keys are ignored so newer
/// exports still load.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonDump {
    version: String,
    threads: Vec<JsonThread>,
    /// Older exports call this field `deadlocks`.
    #[serde(default, alias = "deadlocks")]
    deadlock_ids: Option<Vec<ThreadId>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonThread {
    id: ThreadId,
    name: String,
    state: ThreadState,
    daemon: bool,
    #[serde(default, deserialize_with = "none_as_null")]
    system: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    cpu_usage: Option<f64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    locked_monitors: Vec<Monitor>,
    #[serde(default, deserialize_with = "null_as_empty")]
    locked_synchronizers: Vec<String>,
    #[serde(default)]
    waiting_for: Option<Blocker>,
    #[serde(default, deserialize_with = "null_as_empty")]
    stacktrace: Vec<String>,
}

impl From<JsonThread> for ThreadRecord {
    fn from(t: JsonThread) -> Self {
        Self {
            id: t.id,
            name: t.name,
            state: t.state,
            is_daemon: t.daemon,
            system: t.system,
            scope: t.scope,
            cpu_usage: t.cpu_usage,
            locked_monitors: t.locked_monitors,
            locked_synchronizers: t.locked_synchronizers,
            blocker: t.waiting_for,
            stacktrace: t.stacktrace,
        }
    }
}

/// The gateway writes the literal string `"None"` for threads without a
/// system.
fn none_as_null<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| s != "None"))
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<RawDump, ParseError> {
        JsonParser.parse_raw(input)
    }

    #[test]
    fn test_minimal_thread_gets_defaults() {
        let raw = parse(
            r#"{"version":"Dev","threads":[{"id":1,"name":"main","state":"RUNNABLE","daemon":false}]}"#,
        )
        .unwrap();
        assert_eq!(raw.version, "Dev");
        assert!(raw.deadlocks.is_empty());
        let thread = &raw.threads[0];
        assert_eq!(thread.state, ThreadState::Runnable);
        assert!(thread.system.is_none());
        assert!(thread.cpu_usage.is_none());
        assert!(thread.locked_monitors.is_empty());
        assert!(thread.blocker.is_none());
        assert!(thread.stacktrace.is_empty());
    }

    #[test]
    fn test_full_thread_fields() {
        let raw = parse(
            r#"{
                "version": "8.1.16.2022040511",
                "threads": [{
                    "id": 57,
                    "name": "gateway-tags-exec-1",
                    "state": "BLOCKED",
                    "daemon": true,
                    "system": "Tags",
                    "scope": "G",
                    "cpuUsage": 3.25,
                    "lockedMonitors": [{"lock": "java.lang.Object@1", "frame": "a.B.c(B.java:1)"}],
                    "lockedSynchronizers": ["java.util.concurrent.locks.ReentrantLock$NonfairSync@2"],
                    "waitingFor": {"lock": "java.lang.Object@3", "owner": 58},
                    "stacktrace": ["a.B.c(B.java:1)", "java.lang.Thread.run(Thread.java:834)"]
                }]
            }"#,
        )
        .unwrap();
        let thread = &raw.threads[0];
        assert!(thread.is_daemon);
        assert_eq!(thread.system.as_deref(), Some("Tags"));
        assert_eq!(thread.scope.as_deref(), Some("G"));
        assert_eq!(thread.cpu_usage, Some(3.25));
        assert_eq!(thread.locked_monitors[0].frame.as_deref(), Some("a.B.c(B.java:1)"));
        assert_eq!(thread.blocker.as_ref().and_then(|b| b.owner), Some(58));
        assert_eq!(thread.stacktrace.len(), 2);
    }

    #[test]
    fn test_system_none_string_is_absent() {
        let raw = parse(
            r#"{"version":"Dev","threads":[{"id":1,"name":"a","state":"NEW","daemon":false,"system":"None"}]}"#,
        )
        .unwrap();
        assert!(raw.threads[0].system.is_none());
    }

    #[test]
    fn test_deadlock_ids_and_legacy_alias() {
        let body = r#"[{"id":1,"name":"a","state":"BLOCKED","daemon":false},
                       {"id":2,"name":"b","state":"BLOCKED","daemon":false}]"#;
        for key in ["deadlockIds", "deadlocks"] {
            let raw = parse(&format!(r#"{{"version":"Dev","threads":{body},"{key}":[1,2]}}"#)).unwrap();
            assert_eq!(
                raw.deadlocks,
                vec![DeadlockCycle::new(vec![ThreadRef::Id(1), ThreadRef::Id(2)])],
                "key {key}"
            );
        }

        let raw = parse(&format!(r#"{{"version":"Dev","threads":{body},"deadlockIds":null}}"#)).unwrap();
        assert!(raw.deadlocks.is_empty());
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let raw = parse(
            r#"{"version":"Dev","exportedBy":"gateway","threads":[{"id":1,"name":"a","state":"NEW","daemon":false,"priority":5}]}"#,
        );
        assert!(raw.is_ok());
    }

    #[test]
    fn test_structural_violations_are_malformed() {
        let cases = [
            // missing required thread field
            r#"{"version":"Dev","threads":[{"id":1,"name":"a","state":"NEW"}]}"#,
            // wrong type
            r#"{"version":"Dev","threads":[{"id":"1","name":"a","state":"NEW","daemon":false}]}"#,
            // unknown state
            r#"{"version":"Dev","threads":[{"id":1,"name":"a","state":"SLEEPING","daemon":false}]}"#,
            // missing version
            r#"{"threads":[]}"#,
            // truncated document
            r#"{"version":"Dev","threads":[{"id":1,"#,
        ];
        for input in cases {
            assert!(
                matches!(parse(input), Err(ParseError::MalformedJson { .. })),
                "expected MalformedJson for {input}"
            );
        }
    }
}
