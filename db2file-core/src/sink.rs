//! CSV output for a materialized [`ResultSet`].
//!
//! The file is staged next to its destination and only persisted once every
//! row has been written, so a failed run never leaves a partial output file.

use std::path::{Path, PathBuf};

use base64::{Engine, engine::general_purpose::STANDARD};
use tracing::{debug, info};

use crate::Result;
use crate::config::OutputTarget;
use crate::error::Db2FileError;
use crate::models::{ResultSet, SchemaDescriptor, Value};

/// Datetime layout used for `DATETIME`/`TIMESTAMP` cells
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Renders one cell as a CSV field.
///
/// ```rust
/// use db2file_core::models::Value;
/// use db2file_core::sink::format_value;
///
/// assert_eq!(format_value(&Value::Null), "");
/// assert_eq!(format_value(&Value::Float(21.5)), "21.5");
/// ```
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(v) => v.to_string(),
        Value::Unsigned(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Text(v) => v.clone(),
        Value::Bytes(v) => STANDARD.encode(v),
        Value::Date(v) => v.format("%Y-%m-%d").to_string(),
        Value::Time(v) => v.format("%H:%M:%S").to_string(),
        Value::DateTime(v) => v.format(DATETIME_FORMAT).to_string(),
    }
}

/// Writes result sets to a CSV file.
#[derive(Debug, Clone)]
pub struct CsvSink {
    target: OutputTarget,
}

impl CsvSink {
    /// Sink writing to `target`.
    pub const fn new(target: OutputTarget) -> Self {
        Self { target }
    }

    /// Final output path.
    pub fn path(&self) -> &Path {
        &self.target.path
    }

    fn staging_dir(&self) -> PathBuf {
        match self.target.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Writes `result`, preceded by `header` when given, and returns the
    /// number of data rows written.
    ///
    /// # Errors
    /// - `SchemaMismatch` if the header or any row disagrees with the
    ///   result's column count; nothing is written in that case
    /// - `Io` if the file cannot be staged, written or persisted
    pub fn write(&self, result: &ResultSet, header: Option<&SchemaDescriptor>) -> Result<usize> {
        let columns = result.column_count();
        if let Some(header) = header {
            header.check_arity(columns)?;
        }
        if let Some(row) = result.rows.iter().find(|row| row.len() != columns) {
            return Err(Db2FileError::SchemaMismatch {
                expected: columns,
                actual: row.len(),
            });
        }

        let path = &self.target.path;
        let staged = tempfile::NamedTempFile::new_in(self.staging_dir())
            .map_err(|e| Db2FileError::io(format!("Failed to stage {}", path.display()), e))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(staged);

        let write_failed = |e: csv::Error| {
            Db2FileError::io(format!("Failed to write {}", path.display()), e.into())
        };

        if let Some(header) = header {
            writer.write_record(header.columns()).map_err(write_failed)?;
        }
        for row in &result.rows {
            writer
                .write_record(row.iter().map(format_value))
                .map_err(write_failed)?;
        }

        let staged = writer.into_inner().map_err(|e| {
            Db2FileError::io(format!("Failed to flush {}", path.display()), e.into_error())
        })?;
        staged
            .as_file()
            .sync_all()
            .map_err(|e| Db2FileError::io(format!("Failed to sync {}", path.display()), e))?;
        staged
            .persist(path)
            .map_err(|e| Db2FileError::io(format!("Failed to save {}", path.display()), e.error))?;

        debug!("Header row: {}", header.is_some());
        info!("Wrote {} rows to {}", result.row_count(), path.display());
        Ok(result.row_count())
    }
}
