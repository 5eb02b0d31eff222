//! Writers persist [`BookInfo`] records into a target

mod callback;
mod calibre;
mod csv;
mod json;

pub use self::callback::CallbackWriter;
pub use self::calibre::CalibreWriter;
pub use self::csv::CsvWriter;
pub use self::json::{JsonLayout, JsonWriter};

use crate::error::{ConfigError, Result, WriteError};
use crate::source::SourceType;
use crate::types::BookInfo;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Trait for storing book metadata into a target
pub trait Writer {
    /// Name of the target format, e.g. "CSV"
    fn format_name(&self) -> &str;

    /// Store a record, returning the id it was stored under.
    ///
    /// `id == 0` asks the writer to allocate one.
    fn add_book(&mut self, book: &BookInfo, id: i64) -> std::result::Result<i64, WriteError>;

    /// Flush buffered state once the reader is done
    fn finish(&mut self) -> std::result::Result<(), WriteError> {
        Ok(())
    }

    /// Access to the file-backed operations, for writers that have them
    fn as_file_writer(&self) -> Option<&dyn FileWriter> {
        None
    }
}

/// Writers whose target is a file or file tree
pub trait FileWriter {
    /// Where `save_to_file` writes
    fn path(&self) -> &Path;

    fn content_type(&self) -> &'static str;

    /// Serialize the complete content
    fn write_body(&self, out: &mut dyn Write) -> std::result::Result<(), WriteError>;

    /// File name offered by `download`
    fn download_name(&self) -> String {
        self.path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "books".to_string())
    }

    /// Write the content to [`FileWriter::path`]
    fn save_to_file(&self) -> std::result::Result<(), WriteError> {
        let path = self.path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(path)?);
        self.write_body(&mut out)?;
        out.flush()?;
        tracing::debug!("Saved {:?}", path);
        Ok(())
    }

    /// Save, then write the content as an attachment response to `out`
    fn download(&self, out: &mut dyn Write) -> std::result::Result<(), WriteError> {
        self.save_to_file()?;

        let mut body = Vec::new();
        self.write_body(&mut body)?;

        write!(out, "Content-Type: {}\r\n", self.content_type())?;
        write!(
            out,
            "Content-Disposition: attachment; filename=\"{}\"\r\n",
            self.download_name()
        )?;
        write!(out, "Content-Length: {}\r\n\r\n", body.len())?;
        out.write_all(&body)?;
        out.flush()?;
        Ok(())
    }
}

/// Get the writer for a target type.
///
/// A missing destination is a configuration error unless `create` is set.
pub fn writer_for(kind: SourceType, path: &Path, create: bool) -> Result<Box<dyn Writer>> {
    let writer: Box<dyn Writer> = match kind {
        SourceType::Calibre => Box::new(CalibreWriter::open(path, create)?),
        SourceType::CsvFiles => Box::new(CsvWriter::open(path, create)?),
        SourceType::JsonFiles => Box::new(JsonWriter::open(path, create)?),
        SourceType::Callback => return Err(ConfigError::CallbackRequired(kind).into()),
        SourceType::LocalBooks => return Err(ConfigError::UnsupportedWriter(kind).into()),
    };
    tracing::debug!("Writing {} to {:?}", writer.format_name(), path);
    Ok(writer)
}

/// Next free id in an ordered index
pub(crate) fn next_id<V>(index: &std::collections::BTreeMap<i64, V>) -> i64 {
    index.keys().next_back().map(|max| max + 1).unwrap_or(1).max(1)
}
