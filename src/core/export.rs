// ThreadSleuth - core/export.rs
//
// CSV and JSON export of a parsed thread dump.
// Core layer: writes to any Write trait object.

use crate::core::model::ThreadDump;
use crate::util::error::ExportError;
use std::io::Write;
use std::path::Path;

/// Export the dump as canonical JSON. The output parses back to an equal
/// `ThreadDump`.
pub fn export_json<W: Write>(
    dump: &ThreadDump,
    mut writer: W,
    export_path: &Path,
    pretty: bool,
) -> Result<usize, ExportError> {
    let result = if pretty {
        serde_json::to_writer_pretty(&mut writer, dump)
    } else {
        serde_json::to_writer(&mut writer, dump)
    };
    result.map_err(|e| ExportError::Json {
        path: export_path.to_path_buf(),
        source: e,
    })?;

    writer.flush().map_err(|e| ExportError::Io {
        path: export_path.to_path_buf(),
        source: e,
    })?;
    Ok(dump.len())
}

/// Export one row per thread to CSV.
///
/// Writes: id, name, state, daemon, system, scope, cpu, pool, deadlocked,
/// waiting_for, depth
pub fn export_csv<W: Write>(
    dump: &ThreadDump,
    writer: W,
    export_path: &Path,
) -> Result<usize, ExportError> {
    let csv_err = |e| ExportError::Csv {
        path: export_path.to_path_buf(),
        source: e,
    };
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer
        .write_record([
            "id",
            "name",
            "state",
            "daemon",
            "system",
            "scope",
            "cpu",
            "pool",
            "deadlocked",
            "waiting_for",
            "depth",
        ])
        .map_err(csv_err)?;

    let mut count = 0;
    for thread in dump.threads() {
        let id = thread.id().to_string();
        let cpu = thread
            .cpu_usage()
            .map(|c| format!("{c:.2}"))
            .unwrap_or_default();
        let waiting_for = thread.blocker().map(|b| b.to_string()).unwrap_or_default();
        let depth = thread.stacktrace().len().to_string();

        csv_writer
            .write_record([
                id.as_str(),
                thread.name(),
                thread.state().label(),
                if thread.is_daemon() { "true" } else { "false" },
                thread.system().unwrap_or(""),
                thread.scope().unwrap_or(""),
                cpu.as_str(),
                thread.pool().unwrap_or(""),
                if dump.is_deadlocked(thread.id()) { "true" } else { "false" },
                waiting_for.as_str(),
                depth.as_str(),
            ])
            .map_err(csv_err)?;
        count += 1;
    }

    csv_writer.flush().map_err(|e| ExportError::Io {
        path: export_path.to_path_buf(),
        source: e,
    })?;

    Ok(count)
}
