//! Writing a run's audit trail to disk.

use std::path::{Path, PathBuf};

use retag_engine::report::AuditTables;
use retag_engine::RunSummary;

/// Write the four CSV tables and `summary.json` into `dir`, creating it if
/// needed. Tables are written even when empty so every run leaves the same
/// set of files. Returns the paths written.
pub fn write_reports(dir: &Path, summary: &RunSummary) -> Result<Vec<PathBuf>, String> {
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("could not create '{}': {}", dir.display(), e))?;

    let mut written = Vec::new();
    let tables = AuditTables::from_summary(summary);
    for table in tables.tables() {
        let path = dir.join(table.file_name());
        std::fs::write(&path, table.to_csv())
            .map_err(|e| format!("could not write '{}': {}", path.display(), e))?;
        written.push(path);
    }

    let path = dir.join("summary.json");
    let json = serde_json::to_string_pretty(summary)
        .map_err(|e| format!("serialization error: {}", e))?;
    std::fs::write(&path, json + "\n")
        .map_err(|e| format!("could not write '{}': {}", path.display(), e))?;
    written.push(path);

    tracing::info!(dir = %dir.display(), files = written.len(), "audit reports written");
    Ok(written)
}
