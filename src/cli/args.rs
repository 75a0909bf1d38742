use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    Survey,
    Assemble,
    Annotate,
    Package,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Survey => "survey",
            Stage::Assemble => "assemble",
            Stage::Annotate => "annotate",
            Stage::Package => "package",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum Scheduler {
    #[default]
    Local,
    Slurm,
    Lsf,
    Pbs,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Hash)]
pub enum PackageStage {
    Reads,
    Assembly,
    Annotation,
}

impl PackageStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageStage::Reads => "reads",
            PackageStage::Assembly => "assembly",
            PackageStage::Annotation => "annotation",
        }
    }
}

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "bacasm-pipelines", version, about = "Bacterial genome assembly and annotation workflow driver")]
pub struct Arguments {

    #[arg(value_enum)]
    pub stage: Stage,

    #[arg(short = 'v', long = "verbose", action)]
    pub verbose: bool,

    #[arg(short = 'i', long = "samplesheet", help = "Input samplesheet (CSV, or YAML by extension)")]
    pub samplesheet: String,

    #[arg(short = 'o', long = "out", help = "Output directory for all generated files. If not specified, a directory named 'bacasm_YYYYMMDD' will be created in the current working directory.")]
    pub out_dir: Option<String>,

    #[arg(short = 'c', long = "config", help = "Base YAML configuration")]
    pub config: Option<String>,

    #[arg(short = 'w', long = "workflow-dir", default_value = "workflow", help = "Directory holding the <stage>.smk workflow definitions")]
    pub workflow_dir: String,

    #[arg(long, default_value_t = false, help = "Skip the workflow engine and only evaluate/compile reports")]
    pub report_only: bool,

    #[arg(long, default_value_t = false, help = "Pass every sample through the survey gate regardless of check results")]
    pub force: bool,

    #[arg(long = "enterobase-group", help = "Organism to filter against Enterobase criteria (e.g. Salmonella)")]
    pub enterobase_group: Option<String>,

    #[arg(long = "enterobase-criteria", help = "YAML table overriding the built-in Enterobase criteria")]
    pub enterobase_criteria: Option<String>,

    #[arg(long, value_enum, default_value = "local")]
    pub scheduler: Scheduler,

    #[arg(long, help = "Partition (SLURM) or queue (LSF/PBS) for cluster submission")]
    pub partition: Option<String>,

    #[arg(long, default_value_t = 50)]
    pub jobs: usize,

    #[arg(long, help = "Cores for local execution; defaults to detected physical cores")]
    pub cores: Option<usize>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    #[arg(long, default_value_t = false, help = "Unlock a working directory left locked by an interrupted run")]
    pub unlock: bool,

    #[arg(long, default_value = "bacasm")]
    pub prefix: String,

    #[arg(long = "package-stage", value_enum, help = "Outputs to package; repeatable. Defaults to assembly")]
    pub package_stages: Vec<PackageStage>,

    #[arg(long, default_value_t = false)]
    pub no_tar: bool,

    #[arg(long = "run-prokka", overrides_with = "no_prokka")]
    pub run_prokka: bool,

    #[arg(long = "no-prokka")]
    pub no_prokka: bool,

    #[arg(long = "run-ratt")]
    pub run_ratt: bool,

    #[arg(long = "single-cell")]
    pub single_cell: bool,
}

impl Arguments {
    /// Tri-state Prokka toggle: `None` leaves the configured value alone.
    pub fn prokka_override(&self) -> Option<bool> {
        if self.no_prokka {
            Some(false)
        } else if self.run_prokka {
            Some(true)
        } else {
            None
        }
    }
}
