//! Import command implementation

use super::{build_workflow, print_report, split_source};
use anyhow::{Context, Result};
use bookflow_core::{SourceType, WorkflowConfig};
use std::path::{Path, PathBuf};

/// Import books from a source into a Calibre database
pub fn import(
    source: SourceType,
    source_path: &Path,
    db: &Path,
    create: bool,
    mapping: Option<PathBuf>,
    pattern: Option<&str>,
) -> Result<()> {
    let config = WorkflowConfig {
        source,
        source_path: Some(source_path.to_path_buf()),
        target: SourceType::Calibre,
        target_path: db.to_path_buf(),
        create,
        mapping_file: mapping,
    };

    // A Calibre source is read through its database, not walked
    let (base, local) = match source {
        SourceType::Calibre => (
            source_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
            String::new(),
        ),
        _ => split_source(source_path),
    };

    tracing::info!("Importing {} into {}", source_path.display(), db.display());
    let mut workflow = build_workflow(&config, pattern)?;
    let report = workflow
        .process(&base, &local)
        .with_context(|| format!("Import into {} failed", db.display()))?;

    print_report(report, false)
}
