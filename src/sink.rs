//! Flat-file output: one CSV row per record, columns spanning every field
//! observed across the run, plus a small JSON summary sidecar.

use crate::models::{Record, RunSummary};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Write records as CSV. Columns are the union of observed field names in
/// sorted order; absent fields become empty cells.
pub fn write_csv(records: &[Record], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if records.is_empty() {
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        info!(path = %path.display(), "no records, wrote empty file");
        return Ok(());
    }

    let mut columns: BTreeSet<&str> = BTreeSet::new();
    for record in records {
        columns.extend(record.field_names());
    }
    let columns: Vec<&str> = columns.into_iter().collect();

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(&columns)?;
    for record in records {
        let row: Vec<&str> = columns
            .iter()
            .map(|column| record.get(column).unwrap_or(""))
            .collect();
        writer.write_record(&row)?;
    }
    writer.flush()?;

    info!(rows = records.len(), columns = columns.len(), path = %path.display(), "wrote results");
    Ok(())
}

/// Write the run summary as pretty JSON.
pub fn write_summary(summary: &RunSummary, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "wrote summary");
    Ok(())
}
