//! CSV file writer

use super::{next_id, FileWriter, Writer};
use crate::error::{ConfigError, WriteError};
use crate::record::CsvRecord;
use crate::types::BookInfo;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Collects rows in memory and writes them as one CSV file on finish
pub struct CsvWriter {
    path: PathBuf,
    rows: BTreeMap<i64, CsvRecord>,
}

impl CsvWriter {
    /// Open a CSV target, loading rows from an existing file
    pub fn open(path: &Path, create: bool) -> Result<Self, ConfigError> {
        let mut rows = BTreeMap::new();
        if path.exists() {
            let destination = |reason: String| ConfigError::Destination {
                path: path.to_path_buf(),
                reason,
            };
            let mut reader = ::csv::Reader::from_path(path).map_err(|e| destination(e.to_string()))?;
            for record in reader.deserialize::<CsvRecord>() {
                let record = record.map_err(|e| destination(e.to_string()))?;
                rows.insert(record.id, record);
            }
            tracing::debug!("Loaded {} rows from {:?}", rows.len(), path);
        } else if !create {
            return Err(ConfigError::DestinationMissing(path.to_path_buf()));
        }

        Ok(Self {
            path: path.to_path_buf(),
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Writer for CsvWriter {
    fn format_name(&self) -> &str {
        "CSV"
    }

    fn add_book(&mut self, book: &BookInfo, id: i64) -> Result<i64, WriteError> {
        let id = if id > 0 { id } else { next_id(&self.rows) };
        let row = CsvRecord::from_book(book, id)?;
        self.rows.insert(id, row);
        Ok(id)
    }

    fn finish(&mut self) -> Result<(), WriteError> {
        self.save_to_file()
    }

    fn as_file_writer(&self) -> Option<&dyn FileWriter> {
        Some(self)
    }
}

impl FileWriter for CsvWriter {
    fn path(&self) -> &Path {
        &self.path
    }

    fn content_type(&self) -> &'static str {
        "text/csv; charset=utf-8"
    }

    fn write_body(&self, out: &mut dyn Write) -> Result<(), WriteError> {
        let mut csv = ::csv::Writer::from_writer(out);
        if self.rows.is_empty() {
            csv.write_record(crate::record::CSV_HEADERS)?;
        }
        for row in self.rows.values() {
            csv.serialize(row)?;
        }
        csv.flush()?;
        Ok(())
    }
}
