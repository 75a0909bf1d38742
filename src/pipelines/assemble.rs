//! Assembly stage: full assembly, QC report compilation and Enterobase filtering.
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};

use crate::config::defs::{
    PipelineError, RunConfig, ANNOTATION_SAMPLESHEET, BLOBTOOLS_REPORT, BLOBTOOLS_TABLE_SUFFIX,
    BUSCO_REPORT, QUAST_REPORT, QUAST_TRANSPOSED,
};
use crate::pipelines::{launch_workflow, load_samplesheet, next_samplesheet_path, write_report};
use crate::utils::blobtools::compile_blobtools_report;
use crate::utils::busco::compile_busco_report;
use crate::utils::enterobase::{enterobase_filter, CriteriaTable};
use crate::utils::file::{glob_sample_files, resolve_path, TsvTable};
use crate::utils::quast::compile_quast_report;
use crate::utils::samplesheet::{SampleStage, Samplesheet};

#[derive(Debug, Clone, Default)]
pub struct AssemblyReports {
    pub quast: Option<TsvTable>,
    pub busco: Option<TsvTable>,
    pub blobtools: Option<TsvTable>,
}

/// Per-sample reports under `out_dir` that belong to samples in `sheet`.
pub fn sheet_reports(out_dir: &Path, sheet: &Samplesheet, tail: &str) -> Result<Vec<(String, PathBuf)>, PipelineError> {
    let found = glob_sample_files(out_dir, tail)?;
    Ok(found
        .into_iter()
        .filter(|(sample, _)| sheet.get(sample).is_some())
        .collect())
}

/// Compiles the QUAST, BUSCO and blobtools reports present under `out_dir`.
/// A report type with no per-sample files is left as `None`.
pub fn compile_assembly_reports(out_dir: &Path, sheet: &Samplesheet) -> Result<AssemblyReports, PipelineError> {
    let mut reports = AssemblyReports::default();

    let quast = sheet_reports(out_dir, sheet, &format!("quast/{}", QUAST_TRANSPOSED))?;
    if quast.is_empty() {
        warn!("No QUAST reports found under {}", out_dir.display());
    } else {
        match compile_quast_report(&quast) {
            Ok(t) => reports.quast = Some(t),
            Err(e) => warn!("QUAST compilation failed: {}", e),
        }
    }

    let busco = sheet_reports(out_dir, sheet, "busco/short_summary*.txt")?;
    if busco.is_empty() {
        warn!("No BUSCO summaries found under {}", out_dir.display());
    } else {
        reports.busco = Some(compile_busco_report(&busco));
    }

    let blob = sheet_reports(out_dir, sheet, &format!("blobtools/*{}", BLOBTOOLS_TABLE_SUFFIX))?;
    if blob.is_empty() {
        warn!("No blobtools tables found under {}", out_dir.display());
    } else {
        reports.blobtools = Some(compile_blobtools_report(&blob));
    }

    Ok(reports)
}


/// Run function for the assembly stage
///
/// # Arguments
///
/// * `config` - RunConfig struct from main.
///
/// # Returns
/// Result<(), PipelineError>
pub async fn run(config: Arc<RunConfig>) -> Result<(), PipelineError> {
    let mut sheet = load_samplesheet(&config)?;
    launch_workflow(&config).await?;

    sheet.upgrade(SampleStage::Assembled, &config.out_dir);

    let reports = compile_assembly_reports(&config.out_dir, &sheet)?;
    if let Some(quast) = &reports.quast {
        write_report(&config, QUAST_REPORT, quast)?;
    }
    if let Some(busco) = &reports.busco {
        write_report(&config, BUSCO_REPORT, busco)?;
    }
    if let Some(blob) = &reports.blobtools {
        write_report(&config, BLOBTOOLS_REPORT, blob)?;
    }

    if let Some(group) = &config.args.enterobase_group {
        let table = match &config.args.enterobase_criteria {
            Some(path) => CriteriaTable::from_yaml(&resolve_path(Path::new(path), &config.cwd))?,
            None => CriteriaTable::default(),
        };
        match (&reports.quast, &reports.blobtools) {
            (Some(quast), Some(blob)) => {
                let passing = enterobase_filter(quast, blob, &table, group)?;
                fs::create_dir_all(config.reports_dir())?;
                let path = config.reports_dir().join(format!("enterobase_{}.txt", group));
                let mut body = passing.join("\n");
                if !body.is_empty() {
                    body.push('\n');
                }
                fs::write(&path, body)?;
                info!("Wrote {} Enterobase {} samples to {}", passing.len(), group, path.display());
            }
            _ => warn!("Enterobase filter needs both QUAST and blobtools reports; skipped"),
        }
    }

    let assembled: Vec<String> = sheet
        .iter()
        .filter(|s| match &s.assembly {
            Some(path) if path.exists() => true,
            _ => {
                warn!("{}: no assembly on disk; not carried to annotation", s.id);
                false
            }
        })
        .map(|s| s.id.clone())
        .collect();
    let next_path = next_samplesheet_path(&config, ANNOTATION_SAMPLESHEET);
    sheet.write_subset(&assembled, &next_path)?;

    info!("Assembly: {} of {} samples assembled", assembled.len(), sheet.len());
    Ok(())
}
