use std::path::PathBuf;
use std::collections::HashMap;

use lazy_static::lazy_static;
use log::LevelFilter;
use thiserror::Error;

use crate::cli::Arguments;
use crate::config::settings::WorkflowConfig;

// External software
pub const SNAKEMAKE_TAG: &str = "snakemake";
pub const BEDTOOLS_TAG: &str = "bedtools";
pub const FASTQC_TAG: &str = "fastqc";
pub const BBDUK_TAG: &str = "bbduk.sh";
pub const BBNORM_TAG: &str = "bbnorm.sh";
pub const KAT_TAG: &str = "kat";
pub const TADPOLE_TAG: &str = "tadpole.sh";
pub const STATS_TAG: &str = "stats.sh";
pub const SPADES_TAG: &str = "spades.py";
pub const QUAST_TAG: &str = "quast.py";
pub const BUSCO_TAG: &str = "busco";
pub const BLOBTOOLS_TAG: &str = "blobtools";
pub const BLASTN_TAG: &str = "blastn";
pub const PROKKA_TAG: &str = "prokka";
pub const RATT_TAG: &str = "start.ratt.sh";


lazy_static! {
    /// Minimum versions of the tools this crate talks to directly.
    pub static ref TOOL_VERSIONS: HashMap<&'static str, (u32, u32)> = {
        let mut m = HashMap::new();
        m.insert(SNAKEMAKE_TAG, (7, 0));
        m.insert(BEDTOOLS_TAG, (2, 27));
        m
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BedtoolsSubcommand {
    Subtract,
}

// Static Filenames
pub const FASTQC_DATA: &str = "fastqc_data.txt";
pub const KAT_JSON_SUFFIX: &str = "dist_analysis.json";
pub const KAT_LEGACY_SUFFIX: &str = "kat.hist.txt";
pub const SURVEY_STATS_SUFFIX: &str = "stats.tsv";
pub const QUAST_TRANSPOSED: &str = "transposed_report.tsv";
pub const BUSCO_SUMMARY: &str = "short_summary.txt";
pub const BLOBTOOLS_TABLE_SUFFIX: &str = "blobDB.table.txt";
pub const RATT_REFERENCE_SUFFIX: &str = "reference.gff";

pub const REPORTS_DIR: &str = "reports";
pub const CONFIG_DIR: &str = "config";
pub const PACKAGE_DIR: &str = "package";

pub const SURVEY_REPORT: &str = "survey_report.tsv";
pub const ASSEMBLY_SAMPLESHEET: &str = "assembly_samplesheet.csv";
pub const ANNOTATION_SAMPLESHEET: &str = "annotation_samplesheet.csv";
pub const PACKAGE_SAMPLESHEET: &str = "package_samplesheet.csv";
pub const QUAST_REPORT: &str = "assembly_quast.tsv";
pub const BUSCO_REPORT: &str = "assembly_busco.tsv";
pub const BLOBTOOLS_REPORT: &str = "assembly_blobtools.tsv";
pub const PROKKA_REPORT: &str = "annotation_prokka.tsv";
pub const RATT_REPORT: &str = "annotation_ratt.tsv";
pub const ANNOCMP_REPORT: &str = "annotation_compare.tsv";


// Static Parameters
pub const DEFAULT_MIN_READS: u64 = 100_000;
pub const DEFAULT_MAX_KMER_PEAKS: usize = 2;
pub const DEFAULT_MIN_PEAK_FRACTION: f64 = 0.9;
pub const DEFAULT_MIN_ASSEMBLY_SIZE: u64 = 1_000_000;

pub const NA: &str = "NA";

pub const YAML_EXTS: &[&'static str] = &["yaml", "yml"];


#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Required input not found: {0}")]
    MissingInput(PathBuf),

    #[error("Samplesheet error: {0}")]
    Samplesheet(String),

    #[error("{tool} failed: {error}")]
    ToolExecution { tool: String, error: String },

    #[error("Failed to parse report {path}: {error}")]
    Report { path: PathBuf, error: String },

    #[error("I/O error: {0}")]
    IOError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::IOError(e.to_string())
    }
}


pub struct RunConfig {
    pub cwd: PathBuf,
    pub out_dir: PathBuf,
    pub args: Arguments,
    pub workflow: WorkflowConfig,
    pub cores: usize,
    pub log_level: LevelFilter,
}

impl RunConfig {
    pub fn reports_dir(&self) -> PathBuf {
        self.out_dir.join(REPORTS_DIR)
    }

    pub fn config_dir(&self) -> PathBuf {
        self.out_dir.join(CONFIG_DIR)
    }
}
