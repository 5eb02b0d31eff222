//! JSON writer
//!
//! Two layouts, chosen by the target path:
//!
//! - `*.json`: one file holding an object that maps numeric ids to records
//! - anything else: a directory with one file per record at
//!   `books/<id>.<lang>.json`

use super::{next_id, FileWriter, Writer};
use crate::error::{ConfigError, WriteError};
use crate::reader::CachePath;
use crate::types::BookInfo;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Category directory used by the tree layout
pub const BOOKS_CATEGORY: &str = "books";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonLayout {
    SingleFile,
    Tree,
}

impl JsonLayout {
    pub fn for_path(path: &Path) -> Self {
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            JsonLayout::SingleFile
        } else {
            JsonLayout::Tree
        }
    }
}

/// Collects records and writes them as JSON on finish
pub struct JsonWriter {
    path: PathBuf,
    layout: JsonLayout,
    books: BTreeMap<i64, BookInfo>,
}

impl JsonWriter {
    pub fn open(path: &Path, create: bool) -> Result<Self, ConfigError> {
        let layout = JsonLayout::for_path(path);
        if !path.exists() && !create {
            return Err(ConfigError::DestinationMissing(path.to_path_buf()));
        }

        let mut writer = Self {
            path: path.to_path_buf(),
            layout,
            books: BTreeMap::new(),
        };
        if path.exists() {
            writer.load().map_err(|reason| ConfigError::Destination {
                path: path.to_path_buf(),
                reason,
            })?;
            tracing::debug!("Loaded {} records from {:?}", writer.books.len(), path);
        }
        Ok(writer)
    }

    pub fn layout(&self) -> JsonLayout {
        self.layout
    }

    pub fn books(&self) -> &BTreeMap<i64, BookInfo> {
        &self.books
    }

    fn load(&mut self) -> Result<(), String> {
        match self.layout {
            JsonLayout::SingleFile => {
                let text = fs::read_to_string(&self.path).map_err(|e| e.to_string())?;
                let entries: Option<BTreeMap<String, BookInfo>> =
                    serde_json::from_str(&text).map_err(|e| e.to_string())?;
                for (key, book) in entries.unwrap_or_default() {
                    let id: i64 = key
                        .parse()
                        .map_err(|_| format!("record key {:?} is not a numeric id", key))?;
                    self.books.insert(id, book);
                }
            }
            JsonLayout::Tree => {
                for (id, file) in self.record_files().map_err(|e| e.to_string())? {
                    let text = fs::read_to_string(&file).map_err(|e| e.to_string())?;
                    let book: Option<BookInfo> = serde_json::from_str(&text)
                        .map_err(|e| format!("{}: {}", file.display(), e))?;
                    if let Some(book) = book {
                        self.books.insert(id, book);
                    }
                }
            }
        }
        Ok(())
    }

    fn category_dir(&self) -> PathBuf {
        self.path.join(BOOKS_CATEGORY)
    }

    /// Record files currently in the tree, as `(id, path)`
    fn record_files(&self) -> std::io::Result<Vec<(i64, PathBuf)>> {
        let dir = self.category_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
            let id = name
                .as_deref()
                .and_then(CachePath::parse)
                .and_then(|cache| cache.key.parse::<i64>().ok());
            if let Some(id) = id {
                files.push((id, path));
            }
        }
        files.sort();
        Ok(files)
    }

    fn record_path(&self, id: i64, book: &BookInfo) -> PathBuf {
        let cache = CachePath::new(BOOKS_CATEGORY, id.to_string(), &book.language);
        self.path.join(cache.to_path())
    }

    fn save_tree(&self) -> Result<(), WriteError> {
        fs::create_dir_all(self.category_dir())?;

        let mut written = BTreeSet::new();
        for (id, book) in &self.books {
            let path = self.record_path(*id, book);
            let mut out = BufWriter::new(File::create(&path)?);
            serde_json::to_writer_pretty(&mut out, book)?;
            out.flush()?;
            written.insert(path);
        }

        // A record whose language changed leaves its old file behind
        for (_, file) in self.record_files()? {
            if !written.contains(&file) {
                tracing::debug!("Removing stale {:?}", file);
                fs::remove_file(&file)?;
            }
        }
        tracing::debug!("Saved {} records under {:?}", written.len(), self.path);
        Ok(())
    }
}

impl Writer for JsonWriter {
    fn format_name(&self) -> &str {
        "JSON"
    }

    fn add_book(&mut self, book: &BookInfo, id: i64) -> Result<i64, WriteError> {
        let id = if id > 0 { id } else { next_id(&self.books) };
        self.books.insert(id, book.clone());
        Ok(id)
    }

    fn finish(&mut self) -> Result<(), WriteError> {
        self.save_to_file()
    }

    fn as_file_writer(&self) -> Option<&dyn FileWriter> {
        Some(self)
    }
}

impl FileWriter for JsonWriter {
    fn path(&self) -> &Path {
        &self.path
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn download_name(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| BOOKS_CATEGORY.to_string());
        match self.layout {
            JsonLayout::SingleFile => name,
            JsonLayout::Tree => format!("{}.json", name),
        }
    }

    /// The single-file layout; the tree layout downloads in this form too
    fn write_body(&self, out: &mut dyn Write) -> Result<(), WriteError> {
        serde_json::to_writer_pretty(&mut *out, &self.books)?;
        out.write_all(b"\n")?;
        Ok(())
    }

    fn save_to_file(&self) -> Result<(), WriteError> {
        match self.layout {
            JsonLayout::Tree => self.save_tree(),
            JsonLayout::SingleFile => {
                if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)?;
                }
                let mut out = BufWriter::new(File::create(&self.path)?);
                self.write_body(&mut out)?;
                out.flush()?;
                Ok(())
            }
        }
    }
}
