//! Calibre library reader

use super::{source_name, BookSink, ItemLog, ProcessReport, Reader};
use crate::calibre::CalibreDb;
use crate::error::{ConfigError, ParseError, Result};
use std::path::{Path, PathBuf};

/// Reads every book out of a Calibre `metadata.db`
pub struct CalibreReader {
    db: CalibreDb,
    db_path: PathBuf,
}

impl CalibreReader {
    /// Open the database read-only
    pub fn open(path: &Path) -> std::result::Result<Self, ConfigError> {
        let db = CalibreDb::open_read_only(path)?;
        tracing::debug!("Opened Calibre source {:?}", path);
        Ok(Self {
            db,
            db_path: path.to_path_buf(),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

impl Reader for CalibreReader {
    fn label(&self) -> &str {
        "Calibre"
    }

    /// `local_path`, when set, restricts the run to books stored under that
    /// library folder.
    fn process(
        &mut self,
        base_path: &Path,
        local_path: &str,
        sink: &mut dyn BookSink,
    ) -> Result<ProcessReport> {
        let prefix = local_path.trim_matches('/');
        let mut log = ItemLog::new();

        for (id, path) in self.db.book_paths()? {
            if !prefix.is_empty() && !path.starts_with(prefix) {
                continue;
            }
            let item = if path.is_empty() { id.to_string() } else { path };

            let decoded = match self.db.load_book(id) {
                Ok(Some(mut book)) => {
                    book.base_path = base_path.to_string_lossy().into_owned();
                    Ok(book)
                }
                Ok(None) => Err(ParseError::MissingField(format!("book {}", id))),
                Err(e) => Err(ParseError::Unreadable(e.to_string())),
            };
            log.item(sink, &item, &item, decoded)?;
        }

        let source = if local_path.is_empty() {
            self.db_path.display().to_string()
        } else {
            source_name(base_path, local_path)
        };
        Ok(log.finish(self.label(), &source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::testing::MemorySink;
    use crate::types::{AuthorInfo, BookInfo, SeriesInfo};

    fn library(dir: &Path) -> PathBuf {
        let path = dir.join("metadata.db");
        let mut db = CalibreDb::open(&path, true).unwrap();

        let mut mort = BookInfo::new("local", "Mort")
            .with_title("Mort")
            .with_path("", "Terry Pratchett");
        mort.add_author(AuthorInfo::new("Terry Pratchett"));
        mort.add_series(SeriesInfo::new("Discworld", 4.0));
        db.upsert_book(&mort, 0).unwrap();

        let verne = BookInfo::new("local", "Nautilus")
            .with_title("Twenty Thousand Leagues")
            .with_path("", "Jules Verne");
        db.upsert_book(&verne, 0).unwrap();
        path
    }

    #[test]
    fn test_reads_all_books_keyed_by_library_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = library(dir.path());

        let mut reader = CalibreReader::open(&path).unwrap();
        let mut sink = MemorySink::default();
        sink.ids.insert("Jules Verne/Nautilus".to_string(), 40);
        let report = reader.process(dir.path(), "", &mut sink).unwrap();

        assert_eq!(report.ok_count(), 2);
        assert_eq!(report.books["Jules Verne/Nautilus"], 40);
        let (mort, _) = &sink.books[0];
        assert_eq!(mort.id, "Mort");
        assert_eq!(mort.path, "Terry Pratchett");
        assert_eq!(mort.primary_series().unwrap().index, 4.0);
        assert!(report.messages[0].ends_with("- 2 files OK - 0 files Error"));
    }

    #[test]
    fn test_local_path_filters_folders() {
        let dir = tempfile::tempdir().unwrap();
        let path = library(dir.path());

        let mut reader = CalibreReader::open(&path).unwrap();
        let mut sink = MemorySink::default();
        let report = reader.process(dir.path(), "Jules Verne", &mut sink).unwrap();
        assert_eq!(report.ok_count(), 1);
        assert_eq!(
            report.messages[0],
            "Calibre Jules Verne - 1 files OK - 0 files Error"
        );
    }

    #[test]
    fn test_missing_database_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            CalibreReader::open(&dir.path().join("nope.db")),
            Err(ConfigError::DestinationMissing(_))
        ));
    }
}
