//! Readers enumerate a source and decode its items into [`BookInfo`] records

mod calibre;
mod csv;
mod json;
mod local;

pub use self::calibre::CalibreReader;
pub use self::csv::CsvReader;
pub use self::json::{decode_json, CachePath, JsonReader};
pub use self::local::LocalBooksReader;

use crate::error::{BookflowError, ConfigError, ParseError, Result};
use crate::source::SourceType;
use crate::types::BookInfo;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Where a reader delivers its decoded records
pub trait BookSink {
    /// Stable target id for a source path, `0` when unknown
    fn book_id(&self, path: &str) -> i64;

    /// Persist a record, returning the id it was stored under
    fn add_book(&mut self, book: &BookInfo, id: i64) -> std::result::Result<i64, crate::error::WriteError>;
}

/// Trait for reading book metadata out of a source
pub trait Reader {
    /// Label used in the summary message, e.g. "Local"
    fn label(&self) -> &str;

    /// Enumerate `base_path/local_path` and hand every decoded record to `sink`.
    ///
    /// Per-item failures are collected in the returned report; only
    /// configuration problems and fatal write errors are returned as `Err`.
    fn process(
        &mut self,
        base_path: &Path,
        local_path: &str,
        sink: &mut dyn BookSink,
    ) -> Result<ProcessReport>;
}

/// Outcome of one `process` call
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ProcessReport {
    pub messages: Vec<String>,

    /// Item path → error message
    pub errors: BTreeMap<String, String>,

    /// Item path → id the record was stored under
    pub books: BTreeMap<String, i64>,

    /// Counted units that succeeded: files, or rows and entries for
    /// sources whose items are not files
    pub ok: usize,

    pub failed: usize,
}

impl ProcessReport {
    pub fn ok_count(&self) -> usize {
        self.ok
    }

    pub fn error_count(&self) -> usize {
        self.failed
    }

    /// Append the `"<label> <source> - N files OK - M files Error"` summary
    pub fn summarize(&mut self, label: &str, source: &str) {
        let message = format!(
            "{} {} - {} files OK - {} files Error",
            label,
            source,
            self.ok_count(),
            self.error_count()
        );
        tracing::info!("{}", message);
        self.messages.push(message);
    }
}

/// Per-call bookkeeping shared by all readers
///
/// Record keys repeated inside one file are rejected as duplicates. A key
/// already written from an earlier file is not written again; the item is
/// reported under the id it was stored with.
pub(crate) struct ItemLog {
    report: ProcessReport,
    written: HashMap<String, i64>,
    in_file: HashSet<String>,
}

impl ItemLog {
    pub(crate) fn new() -> Self {
        Self {
            report: ProcessReport::default(),
            written: HashMap::new(),
            in_file: HashSet::new(),
        }
    }

    /// Start a new file; duplicate detection is scoped to it
    pub(crate) fn begin_file(&mut self) {
        self.in_file.clear();
    }

    /// Record a failed unit
    pub(crate) fn error(&mut self, item: &str, err: impl std::fmt::Display) {
        self.record_error(item, err);
        self.count(false);
    }

    pub(crate) fn count(&mut self, ok: bool) {
        if ok {
            self.report.ok += 1;
        } else {
            self.report.failed += 1;
        }
    }

    fn record_error(&mut self, item: &str, err: impl std::fmt::Display) {
        tracing::warn!("{}: {}", item, err);
        self.report.errors.insert(item.to_string(), err.to_string());
    }

    /// Deliver one item that is also one counted unit
    pub(crate) fn item(
        &mut self,
        sink: &mut dyn BookSink,
        item: &str,
        key: &str,
        decoded: std::result::Result<BookInfo, ParseError>,
    ) -> Result<()> {
        let ok = self.deliver(sink, item, key, decoded)?;
        self.count(ok);
        Ok(())
    }

    /// Validate, resolve and write one decoded record without counting it.
    ///
    /// `key` is the converter lookup path; `item` names the record in the
    /// report. Returns whether the record made it to the sink.
    pub(crate) fn deliver(
        &mut self,
        sink: &mut dyn BookSink,
        item: &str,
        key: &str,
        decoded: std::result::Result<BookInfo, ParseError>,
    ) -> Result<bool> {
        let book = match decoded.and_then(|book| {
            book.validate()?;
            Ok(book)
        }) {
            Ok(book) => book,
            Err(err) => {
                self.record_error(item, err);
                return Ok(false);
            }
        };

        let record_key = book.item_key();
        if !self.in_file.insert(record_key.clone()) {
            self.record_error(item, ParseError::DuplicateId(book.id.clone()));
            return Ok(false);
        }
        if let Some(&stored) = self.written.get(&record_key) {
            tracing::debug!("{}: {} already written (id {})", item, record_key, stored);
            self.report.books.insert(item.to_string(), stored);
            return Ok(true);
        }

        let id = sink.book_id(key);
        match sink.add_book(&book, id) {
            Ok(stored) => {
                tracing::debug!("{} -> {} (id {})", item, book.title, stored);
                self.written.insert(record_key, stored);
                self.report.books.insert(item.to_string(), stored);
                Ok(true)
            }
            Err(err) if err.is_fatal() => {
                tracing::error!("{}: destination failed: {}", item, err);
                Err(BookflowError::Write(err))
            }
            Err(err) => {
                self.record_error(item, err);
                Ok(false)
            }
        }
    }

    pub(crate) fn finish(mut self, label: &str, source: &str) -> ProcessReport {
        self.report.summarize(label, source);
        self.report
    }
}

/// Get the reader for a source type.
///
/// `path` is the database file for [`SourceType::Calibre`] and unused by the
/// file-based readers, which take their location from `process`.
pub fn reader_for(kind: SourceType, path: Option<&Path>) -> Result<Box<dyn Reader>> {
    match kind {
        SourceType::Calibre => {
            let path = path.ok_or(ConfigError::MissingSourcePath(kind))?;
            Ok(Box::new(CalibreReader::open(path)?))
        }
        SourceType::LocalBooks => Ok(Box::new(LocalBooksReader::new())),
        SourceType::CsvFiles => Ok(Box::new(CsvReader::new())),
        SourceType::JsonFiles => Ok(Box::new(JsonReader::new())),
        SourceType::Callback => Err(ConfigError::UnsupportedReader(kind).into()),
    }
}

/// Display form of the source location used in summary messages
pub(crate) fn source_name(base_path: &Path, local_path: &str) -> String {
    if local_path.is_empty() {
        base_path.display().to_string()
    } else {
        local_path.to_string()
    }
}

/// `base_path/local_path`, or `base_path` alone when `local_path` is empty
pub(crate) fn source_root(base_path: &Path, local_path: &str) -> std::path::PathBuf {
    let local = local_path.trim_start_matches('/');
    if local.is_empty() {
        base_path.to_path_buf()
    } else {
        base_path.join(local)
    }
}

/// Relative path with forward slashes
pub(crate) fn relative_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
