// ThreadSleuth - platform/config.rs
//
// Platform-specific configuration directory resolution and config.toml
// loading with startup validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::core::detect::DetectionLimits;
use crate::core::parser::ParseOptions;
use crate::util::constants;
use crate::util::error::{ConfigError, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Resolved platform paths for ThreadSleuth configuration.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/threadsleuth/ or %APPDATA%\ThreadSleuth\)
    pub config_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to current directory if platform dirs cannot be determined.
    pub fn resolve() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            tracing::debug!(config = %config_dir.display(), "Platform paths resolved");
            Self { config_dir }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            Self {
                config_dir: PathBuf::from("."),
            }
        }
    }

    /// Default location of config.toml.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(constants::CONFIG_FILE_NAME)
    }
}

// =============================================================================
// config.toml loading and validation
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are silently ignored for forward compatibility -- a newer
/// config file can be used with an older binary without crashing.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// `[parsing]` section.
    pub parsing: ParsingSection,
    /// `[export]` section.
    pub export: ExportSection,
    /// `[logging]` section.
    pub logging: LoggingSection,
}

/// `[parsing]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ParsingSection {
    /// Lines sampled for dialect detection.
    pub detection_lines: Option<usize>,
    /// Bytes sampled for dialect detection.
    pub detection_bytes: Option<usize>,
    /// Treat inputs as live captures (drop RMI/JDWP/JMX threads).
    pub live_capture: Option<bool>,
}

/// `[export]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ExportSection {
    /// Indent JSON exports.
    pub pretty_json: Option<bool>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
}

/// Validated application configuration derived from `config.toml`.
///
/// Invalid values produce actionable warnings and fall back to defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Lines sampled for dialect detection.
    pub detection_lines: usize,
    /// Bytes sampled for dialect detection.
    pub detection_bytes: usize,
    /// Apply the live-capture filter.
    pub live_capture: bool,
    /// Indent JSON exports.
    pub pretty_json: bool,
    /// Logging level string (for init before tracing is available).
    pub log_level: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            detection_lines: constants::DEFAULT_DETECTION_LINES,
            detection_bytes: constants::DEFAULT_DETECTION_BYTES,
            live_capture: false,
            pretty_json: true,
            log_level: None,
        }
    }
}

impl AppConfig {
    /// Parse options implied by this configuration.
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            limits: DetectionLimits {
                max_lines: self.detection_lines,
                max_bytes: self.detection_bytes,
            },
            live_capture: self.live_capture,
        }
    }
}

/// Read and deserialise a config file without validating values.
pub fn read_raw_config(path: &Path) -> std::result::Result<RawConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Load and validate the config file at `config_path`.
///
/// Returns `AppConfig` with validated values and a list of non-fatal warnings.
/// If the file does not exist, returns defaults with no warnings (first-run).
/// If the file is unreadable or unparseable, returns defaults with a warning
/// so the tool still runs but the user is informed.
pub fn load_config(config_path: &Path) -> (AppConfig, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No config.toml found; using defaults");
        return (AppConfig::default(), warnings);
    }

    let raw = match read_raw_config(config_path) {
        Ok(raw) => raw,
        Err(e) => {
            let msg = format!("{e}. Using defaults.");
            tracing::warn!("{}", msg);
            warnings.push(msg);
            return (AppConfig::default(), warnings);
        }
    };

    tracing::info!(path = %config_path.display(), "Loaded config.toml");
    let (config, validation) = validate(raw);
    warnings.extend(validation.iter().map(|e| format!("{e}. Using default.")));

    if !warnings.is_empty() {
        tracing::warn!(
            count = warnings.len(),
            "Config validation produced warnings"
        );
    }

    (config, warnings)
}

/// Load a config file the user named explicitly.
///
/// Unlike `load_config`, a missing or unparseable file is an error; invalid
/// values still fall back to defaults with warnings.
pub fn load_config_from(config_path: &Path) -> Result<(AppConfig, Vec<String>)> {
    let raw = read_raw_config(config_path)?;
    tracing::info!(path = %config_path.display(), "Loaded config.toml");
    let (config, errors) = validate(raw);
    let warnings = errors.iter().map(|e| format!("{e}. Using default.")).collect();
    Ok((config, warnings))
}

/// Validate each field against named constants, accumulating all errors.
pub fn validate(raw: RawConfig) -> (AppConfig, Vec<ConfigError>) {
    let mut config = AppConfig::default();
    let mut errors = Vec::new();

    // -- Parsing: detection_lines --
    if let Some(lines) = raw.parsing.detection_lines {
        if (constants::MIN_DETECTION_LINES..=constants::ABSOLUTE_MAX_DETECTION_LINES)
            .contains(&lines)
        {
            config.detection_lines = lines;
        } else {
            errors.push(ConfigError::ValueOutOfRange {
                field: "[parsing] detection_lines".to_string(),
                value: lines.to_string(),
                expected: format!(
                    "{}-{}",
                    constants::MIN_DETECTION_LINES,
                    constants::ABSOLUTE_MAX_DETECTION_LINES
                ),
            });
        }
    }

    // -- Parsing: detection_bytes --
    if let Some(bytes) = raw.parsing.detection_bytes {
        if (constants::MIN_DETECTION_BYTES..=constants::ABSOLUTE_MAX_DETECTION_BYTES)
            .contains(&bytes)
        {
            config.detection_bytes = bytes;
        } else {
            errors.push(ConfigError::ValueOutOfRange {
                field: "[parsing] detection_bytes".to_string(),
                value: bytes.to_string(),
                expected: format!(
                    "{}-{}",
                    constants::MIN_DETECTION_BYTES,
                    constants::ABSOLUTE_MAX_DETECTION_BYTES
                ),
            });
        }
    }

    if let Some(live) = raw.parsing.live_capture {
        config.live_capture = live;
    }

    if let Some(pretty) = raw.export.pretty_json {
        config.pretty_json = pretty;
    }

    // -- Logging: level --
    if let Some(ref level) = raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level.to_lowercase());
        } else {
            errors.push(ConfigError::ValueOutOfRange {
                field: "[logging] level".to_string(),
                value: level.clone(),
                expected: valid.join(", "),
            });
        }
    }

    (config, errors)
}
