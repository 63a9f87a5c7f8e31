// ThreadSleuth - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "ThreadSleuth";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "ThreadSleuth";

/// Current application version (updated by release script).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Format detection limits
// =============================================================================

/// Number of lines sampled from the start of an input for dialect detection.
///
/// Legacy exports may carry a banner and a deadlock report ahead of the first
/// thread header, so the window is generous while still bounded.
pub const DEFAULT_DETECTION_LINES: usize = 256;

/// Maximum number of bytes sampled from the start of an input for dialect
/// detection. Whichever of the line and byte limits is hit first wins.
pub const DEFAULT_DETECTION_BYTES: usize = 64 * 1024; // 64 KB

/// Smallest configurable detection window (lines).
pub const MIN_DETECTION_LINES: usize = 8;

/// Hard upper bound on the detection window (lines).
pub const ABSOLUTE_MAX_DETECTION_LINES: usize = 10_000;

/// Smallest configurable detection window (bytes).
pub const MIN_DETECTION_BYTES: usize = 1024;

/// Hard upper bound on the detection window (bytes).
pub const ABSOLUTE_MAX_DETECTION_BYTES: usize = 4 * 1024 * 1024; // 4 MB

// =============================================================================
// Model building
// =============================================================================

/// Thread name prefixes dropped from live captures.
///
/// Remote-management and debugger bookkeeping threads come and go between
/// captures of the same process and get fresh ids each time, which breaks
/// id-based alignment in multi-capture comparisons.
pub const LIVE_CAPTURE_RESERVED_PREFIXES: &[&str] = &["RMI", "JDWP", "JMX"];

/// Separator used when an unrecognised interior line is folded into the
/// preceding stack frame.
pub const CONTINUATION_SEPARATOR: &str = " ";

// =============================================================================
// File discovery
// =============================================================================

/// Default include glob patterns when a directory is given as input.
pub const DEFAULT_INCLUDE_PATTERNS: &[&str] = &["*.json", "*.txt", "*.log"];

/// Maximum directory recursion depth when expanding directory inputs.
pub const DEFAULT_MAX_DEPTH: usize = 4;

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Maximum length of an input line included in trace output.
pub const DEBUG_MAX_LINE_PREVIEW: usize = 200;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";
