//! CSV file reader

use super::{source_name, source_root, BookSink, ItemLog, ProcessReport, Reader};
use crate::error::{ParseError, Result};
use crate::record::CsvRecord;
use std::path::Path;

/// Reads records from a CSV file in the canonical column layout
#[derive(Default)]
pub struct CsvReader;

impl CsvReader {
    pub fn new() -> Self {
        Self
    }
}

impl Reader for CsvReader {
    fn label(&self) -> &str {
        "CSV"
    }

    fn process(
        &mut self,
        base_path: &Path,
        local_path: &str,
        sink: &mut dyn BookSink,
    ) -> Result<ProcessReport> {
        let file = source_root(base_path, local_path);
        let name = source_name(base_path, local_path);
        let mut log = ItemLog::new();

        let mut csv = match ::csv::ReaderBuilder::new().flexible(false).from_path(&file) {
            Ok(csv) => csv,
            Err(e) => {
                log.error(&name, ParseError::Unreadable(e.to_string()));
                return Ok(log.finish(self.label(), &name));
            }
        };

        for (row, record) in csv.deserialize::<CsvRecord>().enumerate() {
            let item = format!("{}#{}", name, row + 1);
            let decoded = record
                .map_err(|e| ParseError::MalformedContent(e.to_string()))
                .and_then(|record| record.to_book());

            let key = match &decoded {
                Ok(book) => book.item_key(),
                Err(_) => item.clone(),
            };
            log.item(sink, &item, &key, decoded)?;
        }

        Ok(log.finish(self.label(), &name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::testing::MemorySink;
    use crate::record::CSV_HEADERS;
    use std::fs;

    #[test]
    fn test_rows_are_items() {
        let dir = tempfile::tempdir().unwrap();
        let header = CSV_HEADERS.join(",");
        let data = format!(
            "{header}\n\
             1,mort,local,Mort,,,en,,,,,,,,,,,,,Pratchett,\n\
             2,,local,Nameless,,,,,,,,,,,,,,,,,\n\
             3,eric,local,Eric,[broken,,,,,,,,,,,,,,,,\n"
        );
        fs::write(dir.path().join("books.csv"), data).unwrap();

        let mut sink = MemorySink::default();
        sink.ids.insert("Pratchett/mort".to_string(), 12);
        let report = CsvReader::new()
            .process(dir.path(), "books.csv", &mut sink)
            .unwrap();

        assert_eq!(report.books["books.csv#1"], 12);
        assert!(report.errors["books.csv#2"].contains("id"));
        assert!(report.errors["books.csv#3"].contains("column authors"));
        assert_eq!(
            report.messages[0],
            "CSV books.csv - 1 files OK - 2 files Error"
        );
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = MemorySink::default();
        let report = CsvReader::new()
            .process(dir.path(), "none.csv", &mut sink)
            .unwrap();
        assert_eq!(report.error_count(), 1);
        assert!(report.errors.contains_key("none.csv"));
    }
}
