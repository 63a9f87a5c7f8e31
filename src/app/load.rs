// ThreadSleuth - app/load.rs
//
// Turns command-line paths into parsed dumps.
//
// Directories are walked with `walkdir` and filtered by filename glob;
// explicit file arguments are always kept regardless of extension, and `-`
// reads standard input. Each file is read fully (lossy UTF-8) and parsed
// independently, so a batch is parsed in parallel with rayon and one bad
// file never aborts the others.

use crate::core::model::ThreadDump;
use crate::core::parser::{self, ParseOptions};
use crate::platform::fs;
use crate::util::constants;
use crate::util::error::{Result, ThreadSleuthError};
use rayon::prelude::*;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Path argument that stands for standard input.
pub const STDIN_PATH: &str = "-";

/// Expand files and directories into the list of candidate dump files.
///
/// Returns the files (directory contents sorted by path) plus non-fatal
/// warnings for entries that could not be visited.
pub fn expand_inputs(paths: &[PathBuf], max_depth: usize) -> (Vec<PathBuf>, Vec<String>) {
    let include_pats = compile_patterns(constants::DEFAULT_INCLUDE_PATTERNS);
    let mut files = Vec::new();
    let mut warnings = Vec::new();

    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }

        let mut found = Vec::new();
        for entry in walkdir::WalkDir::new(path)
            .max_depth(max_depth)
            .follow_links(false)
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    let msg = format!("Cannot access '{}': {e}", path.display());
                    tracing::debug!(warning = %msg, "Input expansion warning");
                    warnings.push(msg);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                warnings.push(format!(
                    "Skipping '{}': non-UTF-8 filename",
                    entry.path().display()
                ));
                continue;
            };
            if include_pats.iter().any(|p| p.matches(name)) {
                found.push(entry.into_path());
            } else {
                tracing::trace!(file = name, "Not matched by include patterns");
            }
        }
        found.sort();
        tracing::debug!(dir = %path.display(), files = found.len(), "Directory expanded");
        files.extend(found);
    }

    (files, warnings)
}

/// Read and parse one dump file, or standard input for `-`.
pub fn load_dump(path: &Path, options: &ParseOptions) -> Result<ThreadDump> {
    if path == Path::new(STDIN_PATH) {
        return load_reader(io::stdin().lock(), options);
    }

    let content = fs::read_file_lossy(path).map_err(|e| ThreadSleuthError::Io {
        path: path.to_path_buf(),
        operation: "read dump",
        source: e,
    })?;
    tracing::debug!(file = %path.display(), bytes = content.len(), "Dump file read");

    let dump = parser::parse_with(&content, options).map_err(|e| ThreadSleuthError::Dump {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::info!(
        file = %path.display(),
        version = dump.version(),
        threads = dump.len(),
        deadlocked = dump.deadlock_ids().len(),
        "Dump loaded"
    );
    Ok(dump)
}

/// Read a dump from a stream such as standard input.
///
/// There is no file behind the stream, so parse failures surface as
/// `ThreadSleuthError::Parse` without path context.
pub fn load_reader<R: Read>(mut reader: R, options: &ParseOptions) -> Result<ThreadDump> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| ThreadSleuthError::Io {
            path: PathBuf::from(STDIN_PATH),
            operation: "read dump stream",
            source: e,
        })?;
    let content = String::from_utf8_lossy(&bytes);
    let dump = parser::parse_with(&content, options)?;
    tracing::info!(
        version = dump.version(),
        threads = dump.len(),
        "Dump loaded from stream"
    );
    Ok(dump)
}

/// Parse every file in parallel. Results come back in input order.
pub fn load_all(paths: &[PathBuf], options: &ParseOptions) -> Vec<(PathBuf, Result<ThreadDump>)> {
    paths
        .par_iter()
        .map(|path| (path.clone(), load_dump(path, options)))
        .collect()
}

fn compile_patterns(patterns: &[&str]) -> Vec<glob::Pattern> {
    patterns
        .iter()
        .filter_map(|p| match glob::Pattern::new(p) {
            Ok(compiled) => Some(compiled),
            Err(e) => {
                tracing::warn!(pattern = p, error = %e, "Invalid glob pattern, skipping");
                None
            }
        })
        .collect()
}
