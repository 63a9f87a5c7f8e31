// ThreadSleuth - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// No string-based error propagation.
// All errors preserve the causal chain for diagnostic logging.

use crate::core::detect::Dialect;
use crate::core::model::ThreadId;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all ThreadSleuth operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum ThreadSleuthError {
    /// An in-memory input could not be turned into a thread dump.
    Parse(ParseError),

    /// A dump file was read but could not be parsed.
    Dump { path: PathBuf, source: ParseError },

    /// Export operation failed.
    Export(ExportError),

    /// Configuration loading or validation failed.
    Config(ConfigError),

    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for ThreadSleuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "Parse error: {e}"),
            Self::Dump { path, source } => {
                write!(f, "Parse error in '{}': {source}", path.display())
            }
            Self::Export(e) => write!(f, "Export error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for ThreadSleuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(e) => Some(e),
            Self::Dump { source, .. } => Some(source),
            Self::Export(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Io { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

/// Errors raised while turning raw input into a `ThreadDump`.
///
/// Every variant is fatal to the parse call: no partial model is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The input prefix matches none of the known dialects.
    UnrecognizedFormat,

    /// Structural or type violation in the JSON dialect.
    MalformedJson { reason: String },

    /// A text dialect produced zero recognisable thread headers.
    UnparseableHeaderLine,

    /// A deadlock report names a thread that is not in the parsed set.
    DanglingDeadlockReference { reference: String },

    /// A deadlock banner was not followed by any thread reference.
    EmptyDeadlockReport { line_number: usize },

    /// Two threads share an id within one dump.
    DuplicateThreadId { id: ThreadId },

    /// Parsing succeeded structurally but yielded no threads.
    EmptyDump,

    /// A text dialect carried no recognisable version line.
    MissingVersion { dialect: Dialect },

    /// A thread header named a state that is not a JVM thread state.
    InvalidThreadState { line_number: usize, value: String },

    /// A thread block ended before a mandatory field was seen.
    IncompleteThread {
        name: String,
        line_number: usize,
        field: &'static str,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnrecognizedFormat => {
                write!(f, "input does not look like a supported thread dump")
            }
            Self::MalformedJson { reason } => write!(f, "malformed JSON thread dump: {reason}"),
            Self::UnparseableHeaderLine => {
                write!(f, "no thread header lines could be recognised")
            }
            Self::DanglingDeadlockReference { reference } => write!(
                f,
                "deadlock report references thread '{reference}' which is not in the dump"
            ),
            Self::EmptyDeadlockReport { line_number } => write!(
                f,
                "line {line_number}: deadlock report names no threads"
            ),
            Self::DuplicateThreadId { id } => {
                write!(f, "thread id {id} appears more than once")
            }
            Self::EmptyDump => write!(f, "thread dump contains no threads"),
            Self::MissingVersion { dialect } => {
                write!(f, "{dialect} thread dump has no version line")
            }
            Self::InvalidThreadState { line_number, value } => {
                write!(f, "line {line_number}: unknown thread state '{value}'")
            }
            Self::IncompleteThread {
                name,
                line_number,
                field,
            } => write!(
                f,
                "line {line_number}: thread '{name}' is missing its {field}"
            ),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<ParseError> for ThreadSleuthError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

// ---------------------------------------------------------------------------
// Export errors
// ---------------------------------------------------------------------------

/// Errors related to export operations.
#[derive(Debug)]
pub enum ExportError {
    /// I/O error writing the export file.
    Io { path: PathBuf, source: io::Error },

    /// CSV serialisation error.
    Csv { path: PathBuf, source: csv::Error },

    /// JSON serialisation error.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "Export I/O error '{}': {source}", path.display())
            }
            Self::Csv { path, source } => {
                write!(f, "CSV export error '{}': {source}", path.display())
            }
            Self::Json { path, source } => {
                write!(f, "JSON export error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
        }
    }
}

impl From<ExportError> for ThreadSleuthError {
    fn from(e: ExportError) -> Self {
        Self::Export(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML parsing failed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A config value is out of the allowed range.
    ValueOutOfRange {
        field: String,
        value: String,
        expected: String,
    },

    /// I/O error reading config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Config parse error '{}': {source}", path.display())
            }
            Self::ValueOutOfRange {
                field,
                value,
                expected,
            } => write!(
                f,
                "Config '{field}' = '{value}' is out of range. Expected: {expected}"
            ),
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for ThreadSleuthError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Convenience type alias for ThreadSleuth results.
pub type Result<T> = std::result::Result<T, ThreadSleuthError>;
