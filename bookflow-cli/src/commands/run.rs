//! Run command implementation

use super::{build_workflow, print_report};
use anyhow::{Context, Result};
use bookflow_core::{SourceType, WorkflowConfig};
use std::path::{Path, PathBuf};

/// Load a workflow config from a JSON file
pub fn load_config(path: &Path) -> Result<WorkflowConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid config file: {}", path.display()))
}

/// Build a workflow config from command-line options
pub fn config_from_args(
    source: Option<SourceType>,
    source_db: Option<PathBuf>,
    target: Option<SourceType>,
    target_path: Option<PathBuf>,
    create: bool,
    mapping: Option<PathBuf>,
) -> Result<WorkflowConfig> {
    Ok(WorkflowConfig {
        source: source.context("--source is required")?,
        source_path: source_db,
        target: target.context("--target is required")?,
        target_path: target_path.context("--target-path is required")?,
        create,
        mapping_file: mapping,
    })
}

/// Run a workflow over `base/local`
pub fn run(config: &WorkflowConfig, base: &Path, local: &str, pattern: Option<&str>) -> Result<()> {
    tracing::info!(
        "Running {} -> {} ({})",
        config.source,
        config.target,
        config.target_path.display()
    );

    let mut workflow = build_workflow(config, pattern)?;
    let report = workflow
        .process(base, local)
        .with_context(|| format!("Workflow failed on {}", base.join(local).display()))?;

    print_report(report, false)
}
