//! CLI command implementations

mod authors;
mod export;
mod import;
mod run;

pub use authors::{authors, link_author};
pub use export::export;
pub use import::import;
pub use run::{config_from_args, load_config, run};

use crate::progress::ProgressWriter;
use anyhow::{bail, Context, Result};
use bookflow_core::reader::LocalBooksReader;
use bookflow_core::{
    reader_for, writer_for, Converter, ProcessReport, Reader, SourceType, Workflow,
    WorkflowConfig,
};
use std::path::{Path, PathBuf};

/// Assemble a workflow with a progress display on its writer
fn build_workflow(config: &WorkflowConfig, pattern: Option<&str>) -> Result<Workflow> {
    let converter = match &config.mapping_file {
        Some(path) => Some(
            Converter::load(path)
                .with_context(|| format!("Failed to load id mapping {}", path.display()))?,
        ),
        None => None,
    };

    let reader: Box<dyn Reader> = match (config.source, pattern) {
        (SourceType::LocalBooks, Some(pattern)) => Box::new(LocalBooksReader::with_pattern(pattern)),
        (kind, _) => reader_for(kind, config.source_path.as_deref())
            .with_context(|| format!("Cannot read from {}", kind))?,
    };

    let writer = writer_for(config.target, &config.target_path, config.create)
        .with_context(|| format!("Cannot write to {}", config.target_path.display()))?;

    Ok(Workflow::new(
        reader,
        Box::new(ProgressWriter::new(writer)),
        converter,
    ))
}

/// Split a source location into the base directory and the path below it
fn split_source(path: &Path) -> (PathBuf, String) {
    if path.is_file() {
        let base = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let local = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        (base, local)
    } else {
        (path.to_path_buf(), String::new())
    }
}

/// Print a run report; fails when any item failed
fn print_report(report: &ProcessReport, to_stderr: bool) -> Result<()> {
    let mut lines = report.messages.clone();
    for (item, error) in &report.errors {
        lines.push(format!("  {}: {}", item, error));
    }
    for line in lines {
        if to_stderr {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }

    if !report.errors.is_empty() {
        bail!("Completed with {} errors", report.error_count());
    }
    Ok(())
}
