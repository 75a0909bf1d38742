//! Workflow configuration: the YAML handed to the workflow engine for each stage.
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::cli::{Arguments, Stage};
use crate::config::defs::{
    BBDUK_TAG, BBNORM_TAG, BLASTN_TAG, BLOBTOOLS_TAG, BUSCO_TAG, DEFAULT_MAX_KMER_PEAKS,
    DEFAULT_MIN_ASSEMBLY_SIZE, DEFAULT_MIN_PEAK_FRACTION, DEFAULT_MIN_READS, FASTQC_TAG, KAT_TAG,
    PROKKA_TAG, QUAST_TAG, RATT_TAG, SPADES_TAG, STATS_TAG, TADPOLE_TAG,
};


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleResources {
    pub threads: usize,
    pub mem_mb: u64,
    pub time: String,
}

impl Default for RuleResources {
    fn default() -> Self {
        RuleResources {
            threads: 1,
            mem_mb: 4_000,
            time: "01:00:00".to_string(),
        }
    }
}

impl RuleResources {
    fn new(threads: usize, mem_mb: u64, time: &str) -> Self {
        RuleResources { threads, mem_mb, time: time.to_string() }
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub min_reads: u64,
    pub max_kmer_peaks: usize,
    pub min_peak_fraction: f64,
    pub min_assembly_size: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            min_reads: DEFAULT_MIN_READS,
            max_kmer_peaks: DEFAULT_MAX_KMER_PEAKS,
            min_peak_fraction: DEFAULT_MIN_PEAK_FRACTION,
            min_assembly_size: DEFAULT_MIN_ASSEMBLY_SIZE,
        }
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub stage: Option<String>,
    pub samplesheet: Option<PathBuf>,
    pub outdir: Option<PathBuf>,
    pub workflow_dir: Option<PathBuf>,
    pub tools: BTreeMap<String, String>,
    pub resources: BTreeMap<String, RuleResources>,
    pub thresholds: Thresholds,
    pub run_prokka: bool,
    pub run_ratt: bool,
    pub single_cell_mode: bool,
    pub busco_lineage: String,
    pub ratt_reference: Option<PathBuf>,
    pub ratt_transfer_type: String,
    pub adapters: Option<PathBuf>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        let tools = [
            FASTQC_TAG, BBDUK_TAG, BBNORM_TAG, KAT_TAG, TADPOLE_TAG, STATS_TAG, SPADES_TAG,
            QUAST_TAG, BUSCO_TAG, BLOBTOOLS_TAG, BLASTN_TAG, PROKKA_TAG, RATT_TAG,
        ]
            .iter()
            .map(|tag| (tool_key(tag), tag.to_string()))
            .collect();

        let resources = BTreeMap::from([
            ("fastqc".to_string(), RuleResources::new(2, 2_000, "00:30:00")),
            ("trim".to_string(), RuleResources::new(4, 8_000, "01:00:00")),
            ("normalize".to_string(), RuleResources::new(4, 16_000, "01:00:00")),
            ("kat".to_string(), RuleResources::new(4, 16_000, "01:00:00")),
            ("survey_assembly".to_string(), RuleResources::new(4, 16_000, "01:00:00")),
            ("assembly".to_string(), RuleResources::new(8, 32_000, "06:00:00")),
            ("quast".to_string(), RuleResources::new(2, 4_000, "00:30:00")),
            ("busco".to_string(), RuleResources::new(4, 8_000, "01:00:00")),
            ("blobtools".to_string(), RuleResources::new(8, 16_000, "04:00:00")),
            ("prokka".to_string(), RuleResources::new(4, 8_000, "02:00:00")),
            ("ratt".to_string(), RuleResources::new(1, 8_000, "04:00:00")),
        ]);

        WorkflowConfig {
            stage: None,
            samplesheet: None,
            outdir: None,
            workflow_dir: None,
            tools,
            resources,
            thresholds: Thresholds::default(),
            run_prokka: true,
            run_ratt: false,
            single_cell_mode: false,
            busco_lineage: "bacteria_odb10".to_string(),
            ratt_reference: None,
            ratt_transfer_type: "Strain".to_string(),
            adapters: None,
        }
    }
}

/// Config key for an executable tag, e.g. "quast.py" -> "quast", "bbduk.sh" -> "bbduk".
fn tool_key(tag: &str) -> String {
    let stem = tag.split('.').next().unwrap_or(tag);
    match stem {
        "start" => "ratt".to_string(),
        other => other.to_string(),
    }
}

/// Overlays the YAML `resources` mapping onto `resources`, one field at a time.
fn merge_resources(resources: &mut BTreeMap<String, RuleResources>, value: &serde_yaml::Value) -> Result<()> {
    let Some(rules) = value.as_mapping() else {
        return Err(anyhow!("'resources' must be a mapping of rule names"));
    };
    for (rule, fields) in rules {
        let rule = rule
            .as_str()
            .ok_or_else(|| anyhow!("Non-string rule name in 'resources'"))?;
        let Some(fields) = fields.as_mapping() else {
            return Err(anyhow!("Resources for rule '{}' must be a mapping", rule));
        };
        let base = resources.get(rule).cloned().unwrap_or_default();
        let mut merged = match serde_yaml::to_value(&base)? {
            serde_yaml::Value::Mapping(m) => m,
            _ => serde_yaml::Mapping::new(),
        };
        for (field, v) in fields {
            merged.insert(field.clone(), v.clone());
        }
        let merged: RuleResources = serde_yaml::from_value(serde_yaml::Value::Mapping(merged))
            .map_err(|e| anyhow!("Bad resources for rule '{}': {}", rule, e))?;
        debug!("Resources for {}: {:?}", rule, merged);
        resources.insert(rule.to_string(), merged);
    }
    Ok(())
}

impl WorkflowConfig {

    /// Loads a base config. Keys absent from the file keep their defaults.
    /// The tool table is merged entry by entry and each rule's resources
    /// field by field, so a partial rule entry keeps that rule's defaults.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| anyhow!("Cannot open config {}: {}", path.display(), e))?;
        let raw: serde_yaml::Value = serde_yaml::from_reader(file)?;
        let loaded: WorkflowConfig = serde_yaml::from_value(raw.clone())?;

        let mut config = WorkflowConfig::default();
        if let Some(map) = raw.as_mapping() {
            for (key, value) in map {
                match key.as_str() {
                    Some("tools") => config.tools.extend(loaded.tools.clone()),
                    Some("resources") => merge_resources(&mut config.resources, value)?,
                    _ => {}
                }
            }
        }
        let WorkflowConfig { tools, resources, .. } = config;
        Ok(WorkflowConfig { tools, resources, ..loaded })
    }

    /// CLI flags win over anything read from the base YAML.
    pub fn apply_args(&mut self, args: &Arguments) {
        if let Some(run_prokka) = args.prokka_override() {
            self.run_prokka = run_prokka;
        }
        if args.run_ratt {
            self.run_ratt = true;
        }
        if args.single_cell {
            self.single_cell_mode = true;
        }
    }

    /// Settings derived from the stage being run. Applied last.
    pub fn apply_stage(&mut self, stage: Stage, samplesheet: &Path, out_dir: &Path, workflow_dir: &Path) {
        self.stage = Some(stage.as_str().to_string());
        self.samplesheet = Some(samplesheet.to_path_buf());
        self.outdir = Some(out_dir.to_path_buf());
        self.workflow_dir = Some(workflow_dir.to_path_buf());
    }

    /// Persists the merged config as `<dir>/<stage>.yaml`.
    ///
    /// # Arguments
    ///
    /// * `dir` - Output config directory, created if needed.
    ///
    /// # Returns
    /// Path of the written file.
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let name = self.stage.clone().unwrap_or_else(|| "workflow".to_string());
        let path = dir.join(format!("{}.yaml", name));
        let file = File::create(&path)?;
        serde_yaml::to_writer(file, self)?;
        info!("Wrote {} configuration to {}", name, path.display());
        debug!("{:?}", self);
        Ok(path)
    }
}


/// Builds the stage config: defaults, then base YAML, then CLI, then stage settings.
pub fn build_workflow_config(
    args: &Arguments,
    base_config: Option<&Path>,
    samplesheet: &Path,
    out_dir: &Path,
    workflow_dir: &Path,
) -> Result<WorkflowConfig> {
    let mut config = match base_config {
        Some(path) => {
            if !path.exists() {
                return Err(anyhow!("Config file not found: {}", path.display()));
            }
            WorkflowConfig::from_yaml(path)?
        }
        None => WorkflowConfig::default(),
    };
    config.apply_args(args);
    config.apply_stage(args.stage, samplesheet, out_dir, workflow_dir);
    Ok(config)
}
