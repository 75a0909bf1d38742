//! Survey stage: read QC, k-mer spectrum and survey assembly gating.
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::defs::{PipelineError, RunConfig, ASSEMBLY_SAMPLESHEET, SURVEY_REPORT};
use crate::config::settings::Thresholds;
use crate::pipelines::{launch_workflow, load_samplesheet, next_samplesheet_path, write_report};
use crate::utils::asmstats::assembly_size;
use crate::utils::fastqc::total_sequences;
use crate::utils::file::TsvTable;
use crate::utils::kat::read_spectrum;
use crate::utils::layout::{Mate, SampleLayout};
use crate::utils::samplesheet::{Sample, SampleStage, Samplesheet};

pub const READS_TEST: &str = "reads";
pub const KMER_TEST: &str = "kmer";
pub const ASSEMBLY_TEST: &str = "assembly";

pub const REASON_OK: &str = "OK";
pub const REASON_MISSING: &str = "MISSING";
pub const REASON_INCONSISTENT: &str = "INCONSISTENT";
pub const REASON_LOW: &str = "LOW";
pub const REASON_PEAKS: &str = "PEAKS";
pub const REASON_VOLUME: &str = "VOLUME";
pub const REASON_NOASSEMBLY: &str = "NOASSEMBLY";
pub const REASON_SMALL: &str = "SMALL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pass,
    Fail,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Pass => write!(f, "PASS"),
            Status::Fail => write!(f, "FAIL"),
        }
    }
}

/// Outcome of one named check on one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub sample: String,
    pub test: &'static str,
    pub status: Status,
    pub reason: &'static str,
    pub data: Vec<String>,
}

impl CheckResult {
    fn new(sample: &str, test: &'static str, status: Status, reason: &'static str, data: Vec<String>) -> Self {
        CheckResult { sample: sample.to_string(), test, status, reason, data }
    }

    pub fn passed(&self) -> bool {
        self.status == Status::Pass
    }

    pub fn to_row(&self) -> Vec<String> {
        let data = if self.data.is_empty() { "-".to_string() } else { self.data.join(";") };
        vec![
            self.sample.clone(),
            self.test.to_string(),
            self.status.to_string(),
            self.reason.to_string(),
            data,
        ]
    }
}

pub const SURVEY_HEADER: [&str; 5] = ["sample", "test", "status", "reason", "data"];


/// Read counts from FastQC. INCONSISTENT is decided before LOW, so a sample
/// only ever reports one of them.
pub fn check_reads(sample: &Sample, layout: &SampleLayout, thresholds: &Thresholds) -> CheckResult {
    let id = sample.id.as_str();
    let r1 = total_sequences(&layout.fastqc_data(Mate::R1));
    let r2 = if sample.is_paired() {
        Some(total_sequences(&layout.fastqc_data(Mate::R2)))
    } else {
        None
    };

    let r1 = match r1 {
        Ok(n) => n,
        Err(e) => {
            debug!("{}: {}", id, e);
            return CheckResult::new(id, READS_TEST, Status::Fail, REASON_MISSING, vec![]);
        }
    };
    match r2 {
        Some(Err(e)) => {
            debug!("{}: {}", id, e);
            CheckResult::new(id, READS_TEST, Status::Fail, REASON_MISSING, vec![])
        }
        Some(Ok(r2)) if r2 != r1 => CheckResult::new(
            id,
            READS_TEST,
            Status::Fail,
            REASON_INCONSISTENT,
            vec![r1.to_string(), r2.to_string()],
        ),
        _ if r1 < thresholds.min_reads => {
            CheckResult::new(id, READS_TEST, Status::Fail, REASON_LOW, vec![r1.to_string()])
        }
        _ => CheckResult::new(id, READS_TEST, Status::Pass, REASON_OK, vec![r1.to_string()]),
    }
}

/// K-mer spectrum shape. Absent or unreadable reports pass with MISSING.
pub fn check_kmer(sample: &Sample, layout: &SampleLayout, thresholds: &Thresholds) -> CheckResult {
    let id = sample.id.as_str();
    let spectrum = match read_spectrum(&layout.kat_json(), &layout.kat_legacy()) {
        Ok(Some(s)) => s,
        Ok(None) => {
            warn!("{}: no KAT report found; k-mer check skipped", id);
            return CheckResult::new(id, KMER_TEST, Status::Pass, REASON_MISSING, vec![]);
        }
        Err(e) => {
            warn!("{}: KAT report unreadable ({}); k-mer check skipped", id, e);
            return CheckResult::new(id, KMER_TEST, Status::Pass, REASON_MISSING, vec![]);
        }
    };

    let fraction = spectrum.dominant_fraction();
    let data = vec![spectrum.nb_peaks.to_string(), format!("{:.4}", fraction)];
    if spectrum.nb_peaks > thresholds.max_kmer_peaks {
        CheckResult::new(id, KMER_TEST, Status::Fail, REASON_PEAKS, data)
    } else if fraction < thresholds.min_peak_fraction {
        CheckResult::new(id, KMER_TEST, Status::Fail, REASON_VOLUME, data)
    } else {
        CheckResult::new(id, KMER_TEST, Status::Pass, REASON_OK, data)
    }
}

/// Survey assembly size.
pub fn check_assembly(sample: &Sample, layout: &SampleLayout, thresholds: &Thresholds) -> CheckResult {
    let id = sample.id.as_str();
    match assembly_size(&layout.survey_stats()) {
        Err(e) => {
            debug!("{}: {}", id, e);
            CheckResult::new(id, ASSEMBLY_TEST, Status::Fail, REASON_NOASSEMBLY, vec![])
        }
        Ok(size) if size < thresholds.min_assembly_size => {
            CheckResult::new(id, ASSEMBLY_TEST, Status::Fail, REASON_SMALL, vec![size.to_string()])
        }
        Ok(size) => CheckResult::new(id, ASSEMBLY_TEST, Status::Pass, REASON_OK, vec![size.to_string()]),
    }
}

pub fn evaluate_sample(sample: &Sample, out_dir: &Path, thresholds: &Thresholds) -> Vec<CheckResult> {
    let layout = SampleLayout::new(out_dir, &sample.id);
    vec![
        check_reads(sample, &layout, thresholds),
        check_kmer(sample, &layout, thresholds),
        check_assembly(sample, &layout, thresholds),
    ]
}

#[derive(Debug, Clone, Default)]
pub struct SurveyEvaluation {
    pub results: Vec<CheckResult>,
    pub passing: Vec<String>,
}

impl SurveyEvaluation {
    pub fn to_table(&self) -> TsvTable {
        TsvTable {
            header: SURVEY_HEADER.iter().map(|h| h.to_string()).collect(),
            rows: self.results.iter().map(|r| r.to_row()).collect(),
        }
    }
}

/// Runs every check on every sample. `force` keeps failing samples too.
///
/// # Arguments
///
/// * `sheet` - Samples to evaluate.
/// * `out_dir` - Run directory holding the per-sample reports.
/// * `thresholds` - Gate values.
/// * `force` - Pass every sample regardless of results.
///
/// # Returns
/// SurveyEvaluation with all results and the passing IDs in sheet order.
pub fn evaluate(sheet: &Samplesheet, out_dir: &Path, thresholds: &Thresholds, force: bool) -> SurveyEvaluation {
    let mut evaluation = SurveyEvaluation::default();
    for sample in sheet.iter() {
        let results = evaluate_sample(sample, out_dir, thresholds);
        let ok = results.iter().all(|r| r.passed());
        if ok || force {
            if !ok {
                warn!("{} failed survey checks but is forced through", sample.id);
            }
            evaluation.passing.push(sample.id.clone());
        } else {
            let failed: Vec<String> = results
                .iter()
                .filter(|r| !r.passed())
                .map(|r| format!("{}:{}", r.test, r.reason))
                .collect();
            info!("{} excluded: {}", sample.id, failed.join(", "));
        }
        evaluation.results.extend(results);
    }
    evaluation
}


/// Run function for the survey stage
///
/// # Arguments
///
/// * `config` - RunConfig struct from main.
///
/// # Returns
/// Result<(), PipelineError>
pub async fn run(config: Arc<RunConfig>) -> Result<(), PipelineError> {
    let sheet = load_samplesheet(&config)?;
    launch_workflow(&config).await?;

    let evaluation = evaluate(&sheet, &config.out_dir, &config.workflow.thresholds, config.args.force);
    write_report(&config, SURVEY_REPORT, &evaluation.to_table())?;

    let mut next = sheet.subset(&evaluation.passing);
    next.upgrade(SampleStage::Normalized, &config.out_dir);
    let next_path = next_samplesheet_path(&config, ASSEMBLY_SAMPLESHEET);
    next.write(&next_path)?;

    info!("Survey: {} of {} samples pass", evaluation.passing.len(), sheet.len());
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn paired(id: &str) -> Sample {
        Sample {
            id: id.to_string(),
            r1: Some(PathBuf::from(format!("/reads/{}_1.fq.gz", id))),
            r2: Some(PathBuf::from(format!("/reads/{}_2.fq.gz", id))),
            ..Default::default()
        }
    }

    fn put(path: &Path, body: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    fn fastqc(layout: &SampleLayout, mate: Mate, reads: u64) {
        put(
            &layout.fastqc_data(mate),
            &format!(">>Basic Statistics\tpass\n#Measure\tValue\nTotal Sequences\t{}\n>>END_MODULE\n", reads),
        );
    }

    fn kat(layout: &SampleLayout, nb_peaks: usize, volumes: &[f64]) {
        let peaks: Vec<String> = volumes.iter().map(|v| format!("{{\"mean\": 30.0, \"volume\": {}}}", v)).collect();
        put(
            &layout.kat_json(),
            &format!("{{\"k\": 27, \"nb_peaks\": {}, \"peaks\": [{}]}}", nb_peaks, peaks.join(", ")),
        );
    }

    #[test]
    fn test_missing_r2_report_fails_reads() {
        let tmp = TempDir::new().unwrap();
        let sample = paired("S1");
        let layout = SampleLayout::new(tmp.path(), "S1");
        fastqc(&layout, Mate::R1, 500_000);

        let result = check_reads(&sample, &layout, &Thresholds::default());
        assert_eq!(result.status, Status::Fail);
        assert_eq!(result.reason, REASON_MISSING);
        assert!(result.data.is_empty());

        fastqc(&layout, Mate::R2, 500_000);
        let result = check_reads(&sample, &layout, &Thresholds::default());
        assert_eq!((result.status, result.reason), (Status::Pass, REASON_OK));
    }

    #[test]
    fn test_too_many_peaks_fails_before_volume() {
        let tmp = TempDir::new().unwrap();
        let sample = paired("S1");
        let layout = SampleLayout::new(tmp.path(), "S1");
        // three peaks with a weak dominant one still reports PEAKS
        kat(&layout, 3, &[500.0, 300.0, 200.0]);

        let result = check_kmer(&sample, &layout, &Thresholds::default());
        assert_eq!((result.status, result.reason), (Status::Fail, REASON_PEAKS));
        assert_eq!(result.data, vec!["3", "0.5000"]);
    }

    #[test]
    fn test_weak_dominant_peak_fails_volume() {
        let tmp = TempDir::new().unwrap();
        let sample = paired("S1");
        let layout = SampleLayout::new(tmp.path(), "S1");
        kat(&layout, 2, &[800.0, 200.0]);

        let result = check_kmer(&sample, &layout, &Thresholds::default());
        assert_eq!((result.status, result.reason), (Status::Fail, REASON_VOLUME));
        assert_eq!(result.data, vec!["2", "0.8000"]);

        let lenient = Thresholds { min_peak_fraction: 0.75, ..Thresholds::default() };
        assert!(check_kmer(&sample, &layout, &lenient).passed());
    }

    #[test]
    fn test_unreadable_kat_report_passes_missing() {
        let tmp = TempDir::new().unwrap();
        let sample = paired("S1");
        let layout = SampleLayout::new(tmp.path(), "S1");
        put(&layout.kat_json(), "not json");

        let result = check_kmer(&sample, &layout, &Thresholds::default());
        assert_eq!((result.status, result.reason), (Status::Pass, REASON_MISSING));
    }

    #[test]
    fn test_no_survey_assembly() {
        let tmp = TempDir::new().unwrap();
        let sample = paired("S1");
        let layout = SampleLayout::new(tmp.path(), "S1");

        let result = check_assembly(&sample, &layout, &Thresholds::default());
        assert_eq!((result.status, result.reason), (Status::Fail, REASON_NOASSEMBLY));

        // stats table without a size column
        put(&layout.survey_stats(), "n_scaffolds\tn_contigs\n12\t12\n");
        let result = check_assembly(&sample, &layout, &Thresholds::default());
        assert_eq!((result.status, result.reason), (Status::Fail, REASON_NOASSEMBLY));

        put(&layout.survey_stats(), "n_scaffolds\tn_contigs\tscaf_bp\tcontig_bp\n12\t12\t4700000\t4700000\n");
        let result = check_assembly(&sample, &layout, &Thresholds::default());
        assert_eq!((result.status, result.reason), (Status::Pass, REASON_OK));
        assert_eq!(result.to_row(), vec!["S1", "assembly", "PASS", "OK", "4700000"]);
    }
}
