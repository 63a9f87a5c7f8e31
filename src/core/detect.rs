// ThreadSleuth - core/detect.rs
//
// Input dialect detection. Looks only at a bounded prefix of the input so
// very large dumps are classified in constant time.

use crate::core::grammar;
use crate::util::error::ParseError;
use regex::Regex;
use std::sync::OnceLock;

/// The closed set of supported input dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Structured JSON export.
    Json,
    /// Text scraped from the web diagnostic page.
    WebText,
    /// Text produced by the scripting console.
    ScriptText,
}

impl Dialect {
    pub fn label(&self) -> &'static str {
        match self {
            Dialect::Json => "JSON",
            Dialect::WebText => "web-page",
            Dialect::ScriptText => "script-console",
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// How much of the input the detector may look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionLimits {
    pub max_lines: usize,
    pub max_bytes: usize,
}

impl Default for DetectionLimits {
    fn default() -> Self {
        use crate::util::constants;
        Self {
            max_lines: constants::DEFAULT_DETECTION_LINES,
            max_bytes: constants::DEFAULT_DETECTION_BYTES,
        }
    }
}

/// Lines that only the script console emits.
fn script_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(r"^\s*(?:java\.lang\.Thread\.State:\s*\w+|CPU:\s*\d{1,3}(?:\.\d+)?%)")
            .expect("detect: invalid regex")
    })
}

/// Pick the dialect of `input` from its prefix.
///
/// JSON wins on a leading `{`. Otherwise a web thread header anywhere in the
/// window selects the web dialect, and a script-console marker selects the
/// script dialect. Web headers are checked first because they are the more
/// specific grammar.
pub fn detect(input: &str, limits: &DetectionLimits) -> Result<Dialect, ParseError> {
    let trimmed = input.trim_start_matches('\u{feff}').trim_start();
    if trimmed.starts_with('{') {
        return Ok(Dialect::Json);
    }

    let web = grammar::web();
    let window = detection_window(trimmed, limits.max_bytes);
    let mut saw_script_marker = false;

    for line in window.lines().take(limits.max_lines) {
        if web.is_header(line) {
            tracing::debug!(dialect = %Dialect::WebText, "Dialect detected");
            return Ok(Dialect::WebText);
        }
        if !saw_script_marker && script_marker().is_match(line) {
            saw_script_marker = true;
        }
    }

    if saw_script_marker {
        tracing::debug!(dialect = %Dialect::ScriptText, "Dialect detected");
        return Ok(Dialect::ScriptText);
    }

    tracing::debug!(bytes_seen = window.len(), "No dialect matched input prefix");
    Err(ParseError::UnrecognizedFormat)
}

/// The complete lines within the first `max_bytes` of `input`.
///
/// A line cut by the byte cap is dropped rather than matched partially.
fn detection_window(input: &str, max_bytes: usize) -> &str {
    if input.len() <= max_bytes {
        return input;
    }
    let mut end = max_bytes;
    while !input.is_char_boundary(end) {
        end -= 1;
    }
    let capped = &input[..end];
    match capped.rfind('\n') {
        Some(newline) => &capped[..newline],
        None => "",
    }
}
