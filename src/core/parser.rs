// ThreadSleuth - core/parser.rs
//
// Single entry point: detect the dialect, run the matching parser,
// cross-reference deadlocks, build the canonical model.
// Core layer: works on fully-read text, never touches the filesystem.

use crate::core::builder::DumpBuilder;
use crate::core::deadlock::{self, DeadlockCycle};
use crate::core::detect::{self, DetectionLimits, Dialect};
use crate::core::grammar;
use crate::core::json::JsonParser;
use crate::core::model::{ThreadDump, ThreadRecord};
use crate::core::text::TextParser;
use crate::util::error::ParseError;

/// Options for a parse call.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// How much of the input the detector may sample.
    pub limits: DetectionLimits,
    /// Apply the live-capture bookkeeping-thread filter.
    pub live_capture: bool,
}

/// What a dialect parser hands to the cross-referencer and builder.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDump {
    pub version: String,
    pub threads: Vec<ThreadRecord>,
    pub deadlocks: Vec<DeadlockCycle>,
}

/// One implementation per `Dialect`.
pub trait ThreadDumpParser {
    fn dialect(&self) -> Dialect;

    /// Parse `input` into unvalidated records.
    fn parse_raw(&self, input: &str) -> Result<RawDump, ParseError>;
}

/// Resolve the parser for a dialect.
pub fn parser_for(dialect: Dialect) -> Box<dyn ThreadDumpParser + Send + Sync> {
    match grammar::for_dialect(dialect) {
        Some(grammar) => Box::new(TextParser::new(grammar)),
        None => Box::new(JsonParser),
    }
}

/// Parse a thread dump with default options.
pub fn parse(input: &str) -> Result<ThreadDump, ParseError> {
    parse_with(input, &ParseOptions::default())
}

/// Parse a thread dump, detecting its dialect from the input prefix.
pub fn parse_with(input: &str, options: &ParseOptions) -> Result<ThreadDump, ParseError> {
    let input = strip_bom(input);
    let dialect = detect::detect(input, &options.limits)?;
    parse_as(dialect, input, options)
}

/// Parse a thread dump as a known dialect, skipping detection.
pub fn parse_as(
    dialect: Dialect,
    input: &str,
    options: &ParseOptions,
) -> Result<ThreadDump, ParseError> {
    let input = strip_bom(input);
    tracing::debug!(dialect = %dialect, bytes = input.len(), "Parsing started");

    let raw = parser_for(dialect).parse_raw(input)?;
    let deadlock_ids = deadlock::resolve(&raw.threads, &raw.deadlocks)?;

    let dump = DumpBuilder::new(raw.version)
        .live_capture(options.live_capture)
        .threads(raw.threads)
        .deadlock_ids(deadlock_ids)
        .build()?;

    tracing::debug!(
        dialect = %dialect,
        threads = dump.len(),
        deadlocked = dump.deadlock_ids().len(),
        "Parsing complete"
    );
    Ok(dump)
}

fn strip_bom(input: &str) -> &str {
    input.strip_prefix('\u{feff}').unwrap_or(input)
}
