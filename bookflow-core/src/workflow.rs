//! Workflow: one reader, one writer and an optional id mapper
//!
//! ```no_run
//! use bookflow_core::{SourceType, Workflow};
//! use std::path::Path;
//!
//! let mut workflow = Workflow::import(
//!     SourceType::LocalBooks,
//!     Path::new("/srv/books"),
//!     Path::new("/srv/calibre/metadata.db"),
//!     true,
//!     None,
//! )?;
//! let report = workflow.process(Path::new("/srv/books"), "")?;
//! println!("{}", report.messages.join("\n"));
//! # Ok::<(), bookflow_core::BookflowError>(())
//! ```

use crate::converter::Converter;
use crate::error::{BookflowError, ConfigError, Result, WriteError};
use crate::reader::{reader_for, BookSink, ProcessReport, Reader};
use crate::source::SourceType;
use crate::types::BookInfo;
use crate::writer::{writer_for, Writer};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Source and target of a workflow
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    pub source: SourceType,

    /// Database file for a Calibre source; unused by file sources
    #[serde(default)]
    pub source_path: Option<PathBuf>,

    pub target: SourceType,

    pub target_path: PathBuf,

    /// Create the target when it does not exist
    #[serde(default)]
    pub create: bool,

    #[serde(default)]
    pub mapping_file: Option<PathBuf>,
}

/// Writer and converter, seen by the reader as its sink
struct Pipeline {
    writer: Box<dyn Writer>,
    converter: Option<Converter>,
}

impl BookSink for Pipeline {
    fn book_id(&self, path: &str) -> i64 {
        self.converter
            .as_ref()
            .map(|converter| converter.book_id(path))
            .unwrap_or(0)
    }

    fn add_book(&mut self, book: &BookInfo, id: i64) -> std::result::Result<i64, WriteError> {
        self.writer.add_book(book, id)
    }
}

/// Drives a reader into a writer
pub struct Workflow {
    reader: Box<dyn Reader>,
    pipeline: Pipeline,
    report: ProcessReport,
}

impl Workflow {
    pub fn new(
        reader: Box<dyn Reader>,
        writer: Box<dyn Writer>,
        converter: Option<Converter>,
    ) -> Self {
        Self {
            reader,
            pipeline: Pipeline { writer, converter },
            report: ProcessReport::default(),
        }
    }

    /// Build the reader, writer and converter a config names.
    ///
    /// Fails before anything is read if a type is unsupported, the target
    /// is missing without `create`, or the mapping file cannot be loaded.
    pub fn from_config(config: &WorkflowConfig) -> Result<Self> {
        let converter = config
            .mapping_file
            .as_deref()
            .map(Converter::load)
            .transpose()?;
        let reader = reader_for(config.source, config.source_path.as_deref())?;
        let writer = writer_for(config.target, &config.target_path, config.create)?;
        tracing::info!(
            "Workflow {} -> {} ({:?})",
            config.source.name(),
            config.target.name(),
            config.target_path
        );
        Ok(Self::new(reader, writer, converter))
    }

    /// Import into a Calibre database
    pub fn import(
        source_type: SourceType,
        source_path: &Path,
        db_path: &Path,
        create: bool,
        mapping: Option<&Path>,
    ) -> Result<Self> {
        Self::from_config(&WorkflowConfig {
            source: source_type,
            source_path: Some(source_path.to_path_buf()),
            target: SourceType::Calibre,
            target_path: db_path.to_path_buf(),
            create,
            mapping_file: mapping.map(Path::to_path_buf),
        })
    }

    /// Export a Calibre database
    pub fn export(
        db_path: &Path,
        target_type: SourceType,
        target_path: &Path,
        create: bool,
    ) -> Result<Self> {
        Self::from_config(&WorkflowConfig {
            source: SourceType::Calibre,
            source_path: Some(db_path.to_path_buf()),
            target: target_type,
            target_path: target_path.to_path_buf(),
            create,
            mapping_file: None,
        })
    }

    /// Run the reader over `base_path/local_path`, then finish the writer.
    ///
    /// Every call starts a fresh report. Per-item failures end up in
    /// [`Workflow::errors`]; only configuration and fatal write errors are
    /// returned.
    pub fn process(&mut self, base_path: &Path, local_path: &str) -> Result<&ProcessReport> {
        self.report = ProcessReport::default();

        self.report = self
            .reader
            .process(base_path, local_path, &mut self.pipeline)?;
        self.pipeline.writer.finish()?;
        Ok(&self.report)
    }

    /// Target id for a source path, `0` without a converter or mapping
    pub fn book_id(&self, path: &str) -> i64 {
        self.pipeline.book_id(path)
    }

    pub fn add_book(&mut self, book: &BookInfo, id: i64) -> Result<i64> {
        Ok(self.pipeline.add_book(book, id)?)
    }

    pub fn messages(&self) -> &[String] {
        &self.report.messages
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.report.errors
    }

    pub fn report(&self) -> &ProcessReport {
        &self.report
    }

    pub fn reader(&self) -> &dyn Reader {
        self.reader.as_ref()
    }

    pub fn writer(&self) -> &dyn Writer {
        self.pipeline.writer.as_ref()
    }

    /// Save a file target and write it as an attachment response to `out`
    pub fn download(&self, out: &mut dyn Write) -> Result<()> {
        let writer = self.writer();
        let file_writer = writer.as_file_writer().ok_or_else(|| {
            BookflowError::Config(ConfigError::Destination {
                path: PathBuf::new(),
                reason: format!("{} target has no file to download", writer.format_name()),
            })
        })?;
        file_writer.download(out)?;
        Ok(())
    }
}
