//! Calibre library writer

use super::Writer;
use crate::calibre::CalibreDb;
use crate::error::{ConfigError, WriteError};
use crate::types::BookInfo;
use std::path::{Path, PathBuf};

/// Upserts records into a Calibre `metadata.db`
pub struct CalibreWriter {
    db: CalibreDb,
    path: PathBuf,
}

impl CalibreWriter {
    pub fn open(path: &Path, create: bool) -> Result<Self, ConfigError> {
        Ok(Self {
            db: CalibreDb::open(path, create)?,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The underlying store
    pub fn db(&self) -> &CalibreDb {
        &self.db
    }
}

impl Writer for CalibreWriter {
    fn format_name(&self) -> &str {
        "Calibre"
    }

    fn add_book(&mut self, book: &BookInfo, id: i64) -> Result<i64, WriteError> {
        self.db.upsert_book(book, id)
    }
}
