//! Result sinks: CSV snapshot file and in-memory store.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Error;
use crate::table::RowTable;
use crate::traits::{ResultSink, SnapshotKind};

/// Writes each snapshot as a complete CSV file.
///
/// The table goes to a sibling `.tmp` file first and is then renamed over
/// the output, so an interrupted run always leaves a readable file behind.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
    delimiter: u8,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ResultSink for CsvSink {
    fn persist(&mut self, table: &RowTable, kind: SnapshotKind) -> Result<(), Error> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.tmp_path();
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        table.write_csv(&mut writer, self.delimiter)?;
        writer.flush()?;
        drop(writer);
        fs::rename(&tmp_path, &self.path)?;

        debug!(path = %self.path.display(), ?kind, rows = table.len(), "snapshot written");
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Keeps every snapshot in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    snapshots: Vec<(SnapshotKind, RowTable)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> &[(SnapshotKind, RowTable)] {
        &self.snapshots
    }

    pub fn latest(&self) -> Option<&RowTable> {
        self.snapshots.last().map(|(_, table)| table)
    }

    pub fn count(&self, kind: SnapshotKind) -> usize {
        self.snapshots
            .iter()
            .filter(|(snapshot_kind, _)| *snapshot_kind == kind)
            .count()
    }
}

impl ResultSink for MemorySink {
    fn persist(&mut self, table: &RowTable, kind: SnapshotKind) -> Result<(), Error> {
        self.snapshots.push((kind, table.clone()));
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
