//! Local EPUB tree reader

use super::{relative_path, source_name, source_root, BookSink, ItemLog, ProcessReport, Reader};
use crate::epub::EpubContainer;
use crate::error::{ParseError, Result};
use crate::types::{AuthorInfo, BookInfo, SeriesInfo};
use regex::Regex;
use std::path::Path;
use walkdir::WalkDir;

/// Default pattern for book files
pub const DEFAULT_PATTERN: &str = "*.epub";

/// Reads metadata from a directory tree of EPUB files
pub struct LocalBooksReader {
    pattern: String,
    matcher: Regex,
}

impl LocalBooksReader {
    pub fn new() -> Self {
        Self::with_pattern(DEFAULT_PATTERN)
    }

    /// Match file names against a glob such as `*.epub` (case-insensitive)
    pub fn with_pattern(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            matcher: glob_to_regex(pattern),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    fn matches(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|name| self.matcher.is_match(name))
            .unwrap_or(false)
    }

    /// Decode one EPUB file into a record
    pub fn read_book(&self, file: &Path, base_path: &Path) -> std::result::Result<BookInfo, ParseError> {
        let epub = EpubContainer::open(file)?;

        let stem = file
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ParseError::MissingField("file name".to_string()))?;
        let dir = file
            .parent()
            .map(|p| relative_path(p, base_path))
            .unwrap_or_default();

        let mut book = BookInfo::new("local", stem)
            .with_title(epub.title().unwrap_or_else(|| stem.to_string()))
            .with_path(base_path.to_string_lossy(), dir);

        for creator in epub.authors() {
            let mut author = AuthorInfo::new(creator.name);
            if let Some(sort) = creator.sort {
                author.sort = sort;
            }
            book.add_author(author);
        }

        book.language = epub.language().unwrap_or_default();
        book.description = epub.description();
        book.subjects = epub.subjects().into_iter().collect();
        book.publisher = epub.publisher();
        book.rights = epub.copyright();
        book.cover = epub.cover_info().map(|cover| cover.path);

        for (scheme, value) in epub.identifiers() {
            book.add_identifier(scheme, value);
        }
        book.isbn = epub.isbn().unwrap_or_default();
        book.uri = epub.uri().unwrap_or_default();
        book.uuid = epub
            .unique_identifier()
            .or_else(|| epub.uuid())
            .unwrap_or_default();

        book.creation_date = epub.creation_date();
        book.modification_date = epub.modification_date();

        if let Some((name, index)) = epub.series_or_collection() {
            book.add_series(SeriesInfo::new(name, index));
        }

        Ok(book)
    }
}

impl Default for LocalBooksReader {
    fn default() -> Self {
        Self::new()
    }
}

impl Reader for LocalBooksReader {
    fn label(&self) -> &str {
        "Local"
    }

    fn process(
        &mut self,
        base_path: &Path,
        local_path: &str,
        sink: &mut dyn BookSink,
    ) -> Result<ProcessReport> {
        let root = source_root(base_path, local_path);
        let mut log = ItemLog::new();

        let mut files = Vec::new();
        for entry in WalkDir::new(&root).follow_links(true) {
            match entry {
                Ok(entry) if entry.file_type().is_file() && self.matches(entry.path()) => {
                    files.push(entry.into_path());
                }
                Ok(_) => {}
                Err(err) => {
                    let item = err
                        .path()
                        .map(|p| relative_path(p, base_path))
                        .unwrap_or_else(|| relative_path(&root, base_path));
                    log.error(&item, ParseError::Unreadable(err.to_string()));
                }
            }
        }
        files.sort();
        tracing::debug!("Found {} files matching {} under {:?}", files.len(), self.pattern, root);

        for file in files {
            let item = relative_path(&file, base_path);
            let decoded = self.read_book(&file, base_path);
            log.item(sink, &item, &item, decoded)?;
        }

        Ok(log.finish(self.label(), &source_name(base_path, local_path)))
    }
}

/// Translate a file-name glob (`*`, `?`) into an anchored regex
fn glob_to_regex(pattern: &str) -> Regex {
    let mut expr = String::from("(?i)^");
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            c => expr.push_str(&regex::escape(&c.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr).expect("escaped glob is a valid regex")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob() {
        let reader = LocalBooksReader::new();
        assert!(reader.matches(Path::new("a/b/Alice.epub")));
        assert!(reader.matches(Path::new("UPPER.EPUB")));
        assert!(!reader.matches(Path::new("notes.txt")));
        assert!(!reader.matches(Path::new("book.epub.bak")));

        let reader = LocalBooksReader::with_pattern("vol?.kepub.epub");
        assert!(reader.matches(Path::new("vol1.kepub.epub")));
        assert!(!reader.matches(Path::new("vol12.kepub.epub")));
    }

    #[test]
    fn test_missing_root_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = crate::reader::testing::MemorySink::default();
        let report = LocalBooksReader::new()
            .process(dir.path(), "does-not-exist", &mut sink)
            .unwrap();

        assert_eq!(report.error_count(), 1);
        assert_eq!(
            report.messages.last().unwrap(),
            "Local does-not-exist - 0 files OK - 1 files Error"
        );
    }
}
