pub mod annotate;
pub mod assemble;
pub mod package;
pub mod survey;

use std::path::{Path, PathBuf};

use log::info;

use crate::config::defs::{PipelineError, RunConfig};
use crate::utils::command::run_workflow;
use crate::utils::file::{is_yaml, resolve_path, write_tsv, TsvTable};
use crate::utils::samplesheet::Samplesheet;


/// Loads the stage's input samplesheet; an empty sheet is an error.
pub fn load_samplesheet(config: &RunConfig) -> Result<Samplesheet, PipelineError> {
    let path = resolve_path(Path::new(&config.args.samplesheet), &config.cwd);
    let sheet = Samplesheet::from_path(&path)?;
    if sheet.is_empty() {
        return Err(PipelineError::Samplesheet(format!("{} contains no samples", path.display())));
    }
    Ok(sheet)
}

/// Output samplesheet path, keeping the input sheet's format.
pub fn next_samplesheet_path(config: &RunConfig, csv_name: &str) -> PathBuf {
    let path = config.out_dir.join(csv_name);
    if is_yaml(Path::new(&config.args.samplesheet)) {
        path.with_extension("yaml")
    } else {
        path
    }
}

/// Writes the stage config and hands it to the workflow engine, unless
/// running in report-only mode.
///
/// # Arguments
///
/// * `config` - RunConfig struct from main.
///
/// # Returns
/// Result<(), PipelineError>
pub async fn launch_workflow(config: &RunConfig) -> Result<(), PipelineError> {
    let configfile = config.workflow.write(&config.config_dir())?;
    if config.args.report_only {
        info!("Report-only mode: skipping workflow engine");
        return Ok(());
    }
    let workflow_dir = resolve_path(Path::new(&config.args.workflow_dir), &config.cwd);
    let snakefile = workflow_dir.join(format!("{}.smk", config.args.stage.as_str()));
    run_workflow(config, &snakefile, &configfile).await
}

pub fn write_report(config: &RunConfig, name: &str, table: &TsvTable) -> Result<PathBuf, PipelineError> {
    let path = config.reports_dir().join(name);
    write_tsv(&path, &table.header, &table.rows)?;
    info!("Wrote {} rows to {}", table.rows.len(), path.display());
    Ok(path)
}
