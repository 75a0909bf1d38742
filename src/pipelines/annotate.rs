//! Annotation stage: Prokka and RATT runs, then annotation summaries and the
//! Prokka/RATT comparison.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};

use crate::config::defs::{
    PipelineError, RunConfig, ANNOCMP_REPORT, BEDTOOLS_TAG, PACKAGE_SAMPLESHEET, PROKKA_REPORT,
    RATT_REPORT,
};
use crate::pipelines::{launch_workflow, load_samplesheet, next_samplesheet_path, write_report};
use crate::utils::command::{bedtools_subtract, check_versions};
use crate::utils::file::TsvTable;
use crate::utils::gff::{
    classify_remaining, compile_prokka_report, compile_ratt_report, write_features, DeltaClass, Gff,
    GffFeature, DELTA_HEADER,
};
use crate::utils::layout::SampleLayout;
use crate::utils::samplesheet::{SampleStage, Samplesheet};


/// Delta rows for one sample from both subtraction directions.
///
/// # Arguments
///
/// * `sample` - Sample ID.
/// * `prokka` - Prokka annotation features.
/// * `prokka_remaining` - Prokka minus RATT.
/// * `ratt` - RATT transferred features.
/// * `ratt_remaining` - RATT minus Prokka.
///
/// # Returns
/// Rows matching DELTA_HEADER, Prokka-origin rows first.
pub fn delta_rows(
    sample: &str,
    prokka: &[GffFeature],
    prokka_remaining: &[GffFeature],
    ratt: &[GffFeature],
    ratt_remaining: &[GffFeature],
) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = classify_remaining(prokka, prokka_remaining, DeltaClass::Novel)
        .iter()
        .map(|d| d.to_row(sample, "prokka"))
        .collect();
    rows.extend(
        classify_remaining(ratt, ratt_remaining, DeltaClass::Unpredicted)
            .iter()
            .map(|d| d.to_row(sample, "ratt")),
    );
    rows
}

fn annotation_only(lines: Vec<String>) -> Result<Vec<GffFeature>, PipelineError> {
    let gff = Gff::parse(&lines.join("\n"))?;
    Ok(gff.annotation_features())
}

/// Annotation features of a GFF, parse failures reported against the file.
fn read_annotation(path: &Path) -> Result<Vec<GffFeature>, PipelineError> {
    Gff::from_path(path)
        .map(|gff| gff.annotation_features())
        .map_err(|e| PipelineError::Report { path: path.to_path_buf(), error: e.to_string() })
}

async fn compare_annotations(
    config: &RunConfig,
    sample: &str,
    prokka_gff: &Path,
    ratt_gff: &Path,
) -> Result<Vec<Vec<String>>, PipelineError> {
    let prokka = read_annotation(prokka_gff)?;
    let ratt = read_annotation(ratt_gff)?;

    // bedtools cannot read the ##FASTA section Prokka appends
    let cmp_dir = SampleLayout::new(&config.out_dir, sample).root().join("annocmp");
    let prokka_bare = cmp_dir.join(format!("{}.prokka.gff", sample));
    let ratt_bare = cmp_dir.join(format!("{}.ratt.gff", sample));
    write_features(&prokka_bare, &prokka)?;
    write_features(&ratt_bare, &ratt)?;

    let prokka_remaining = annotation_only(bedtools_subtract(config, &prokka_bare, &ratt_bare).await?)?;
    let ratt_remaining = annotation_only(bedtools_subtract(config, &ratt_bare, &prokka_bare).await?)?;

    Ok(delta_rows(sample, &prokka, &prokka_remaining, &ratt, &ratt_remaining))
}

/// Samples whose Prokka GFF exists.
fn prokka_outputs(config: &RunConfig, sheet: &Samplesheet) -> Vec<(String, PathBuf)> {
    sheet
        .iter()
        .map(|s| (s.id.clone(), SampleLayout::new(&config.out_dir, &s.id).prokka("gff")))
        .filter(|(id, p)| {
            let ok = p.exists();
            if !ok {
                warn!("{}: no Prokka GFF at {}", id, p.display());
            }
            ok
        })
        .collect()
}

/// Samples whose RATT reference and transferred GFFs both exist.
fn ratt_outputs(config: &RunConfig, sheet: &Samplesheet) -> Vec<(String, PathBuf, PathBuf)> {
    sheet
        .iter()
        .map(|s| {
            let layout = SampleLayout::new(&config.out_dir, &s.id);
            (s.id.clone(), layout.ratt_reference_gff(), layout.ratt_gff())
        })
        .filter(|(id, reference, transferred)| {
            let ok = reference.exists() && transferred.exists();
            if !ok {
                warn!("{}: RATT outputs incomplete", id);
            }
            ok
        })
        .collect()
}


/// Run function for the annotation stage
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

    sheet.upgrade(SampleStage::Annotated, &config.out_dir);

    let prokka = if config.workflow.run_prokka {
        let outputs = prokka_outputs(&config, &sheet);
        write_report(&config, PROKKA_REPORT, &compile_prokka_report(&outputs))?;
        outputs
    } else {
        Vec::new()
    };

    if config.workflow.run_ratt {
        let ratt = ratt_outputs(&config, &sheet);
        write_report(&config, RATT_REPORT, &compile_ratt_report(&ratt))?;

        let pairs: Vec<(String, PathBuf, PathBuf)> = prokka
            .iter()
            .filter_map(|(id, prokka_gff)| {
                ratt.iter()
                    .find(|(rid, _, _)| rid == id)
                    .map(|(_, _, ratt_gff)| (id.clone(), prokka_gff.clone(), ratt_gff.clone()))
            })
            .collect();

        if !pairs.is_empty() {
            check_versions(vec![BEDTOOLS_TAG]).await?;
            let mut table = TsvTable {
                header: DELTA_HEADER.iter().map(|h| h.to_string()).collect(),
                rows: Vec::new(),
            };
            for (id, prokka_gff, ratt_gff) in &pairs {
                match compare_annotations(&config, id, prokka_gff, ratt_gff).await {
                    Ok(rows) => table.rows.extend(rows),
                    Err(e) => warn!("{}: annotation comparison failed: {}", id, e),
                }
            }
            write_report(&config, ANNOCMP_REPORT, &table)?;
        }
    }

    let next_path = next_samplesheet_path(&config, PACKAGE_SAMPLESHEET);
    sheet.write(&next_path)?;

    info!("Annotation: {} samples processed", sheet.len());
    Ok(())
}
