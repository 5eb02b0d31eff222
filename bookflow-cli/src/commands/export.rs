//! Export command implementation

use super::{build_workflow, print_report};
use anyhow::{Context, Result};
use bookflow_core::{SourceType, WorkflowConfig};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Export a Calibre database to a file target
pub fn export(
    db: &Path,
    target: SourceType,
    target_path: &Path,
    create: bool,
    stdout: bool,
) -> Result<()> {
    let config = WorkflowConfig {
        source: SourceType::Calibre,
        source_path: Some(db.to_path_buf()),
        target,
        target_path: target_path.to_path_buf(),
        create,
        mapping_file: None,
    };
    let library = db
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    tracing::info!("Exporting {} to {}", db.display(), target_path.display());
    let mut workflow = build_workflow(&config, None)?;
    workflow
        .process(&library, "")
        .with_context(|| format!("Export of {} failed", db.display()))?;

    if stdout {
        let mut out = std::io::stdout().lock();
        workflow
            .download(&mut out)
            .context("Failed to write export to stdout")?;
        out.flush()?;
    }

    print_report(workflow.report(), stdout)
}
