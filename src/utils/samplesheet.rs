//! Sample registry: sample IDs mapped to their read and derived output paths.
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::defs::PipelineError;
use crate::utils::file::is_yaml;
use crate::utils::layout::{Mate, SampleLayout};

/// How far along the pipeline a sample record has been upgraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum SampleStage {
    #[default]
    Raw,
    Trimmed,
    Normalized,
    Assembled,
    Annotated,
}

impl SampleStage {
    /// Number of CSV columns a record at this stage carries.
    pub fn columns(&self) -> usize {
        match self {
            SampleStage::Raw => 6,
            SampleStage::Trimmed => 9,
            SampleStage::Normalized => 12,
            SampleStage::Assembled => 13,
            SampleStage::Annotated => 16,
        }
    }
}

pub const SAMPLESHEET_COLUMNS: [&str; 16] = [
    "sample_id", "alias", "r1", "r2", "singles", "taxonomy",
    "trim_r1", "trim_r2", "trim_singles",
    "norm_r1", "norm_r2", "norm_singles",
    "assembly",
    "ann_fna", "ann_ffn", "ann_faa",
];

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Sample {
    pub id: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r1: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r2: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub singles: Option<PathBuf>,
    #[serde(default)]
    pub taxonomy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_r1: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_r2: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_singles: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub norm_r1: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub norm_r2: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub norm_singles: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assembly: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ann_fna: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ann_ffn: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ann_faa: Option<PathBuf>,
}

fn opt_path(field: Option<&String>) -> Option<PathBuf> {
    field
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

fn path_str(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl Sample {

    /// Builds a sample from a positional CSV row.
    pub fn from_fields(fields: &[String]) -> Result<Self, PipelineError> {
        if fields.len() < 3 || fields.len() > SAMPLESHEET_COLUMNS.len() {
            return Err(PipelineError::Samplesheet(format!(
                "expected 3 to {} columns, found {} in row {:?}",
                SAMPLESHEET_COLUMNS.len(),
                fields.len(),
                fields
            )));
        }
        let f = |i: usize| fields.get(i);
        Ok(Sample {
            id: fields[0].trim().to_string(),
            alias: f(1).map(|s| s.trim().to_string()).unwrap_or_default(),
            r1: opt_path(f(2)),
            r2: opt_path(f(3)),
            singles: opt_path(f(4)),
            taxonomy: f(5).map(|s| s.trim().to_string()).unwrap_or_default(),
            trim_r1: opt_path(f(6)),
            trim_r2: opt_path(f(7)),
            trim_singles: opt_path(f(8)),
            norm_r1: opt_path(f(9)),
            norm_r2: opt_path(f(10)),
            norm_singles: opt_path(f(11)),
            assembly: opt_path(f(12)),
            ann_fna: opt_path(f(13)),
            ann_ffn: opt_path(f(14)),
            ann_faa: opt_path(f(15)),
        })
    }

    /// Positional fields, truncated to `columns`.
    pub fn to_fields(&self, columns: usize) -> Vec<String> {
        let all = vec![
            self.id.clone(),
            self.alias.clone(),
            path_str(&self.r1),
            path_str(&self.r2),
            path_str(&self.singles),
            self.taxonomy.clone(),
            path_str(&self.trim_r1),
            path_str(&self.trim_r2),
            path_str(&self.trim_singles),
            path_str(&self.norm_r1),
            path_str(&self.norm_r2),
            path_str(&self.norm_singles),
            path_str(&self.assembly),
            path_str(&self.ann_fna),
            path_str(&self.ann_ffn),
            path_str(&self.ann_faa),
        ];
        all.into_iter().take(columns).collect()
    }

    pub fn stage(&self) -> SampleStage {
        if self.ann_fna.is_some() || self.ann_ffn.is_some() || self.ann_faa.is_some() {
            SampleStage::Annotated
        } else if self.assembly.is_some() {
            SampleStage::Assembled
        } else if self.norm_r1.is_some() || self.norm_r2.is_some() || self.norm_singles.is_some() {
            SampleStage::Normalized
        } else if self.trim_r1.is_some() || self.trim_r2.is_some() || self.trim_singles.is_some() {
            SampleStage::Trimmed
        } else {
            SampleStage::Raw
        }
    }

    pub fn is_paired(&self) -> bool {
        self.r2.is_some()
    }

    /// Appends derived paths for every stage up to `stage`. Fields already
    /// set are left alone.
    pub fn upgrade(&mut self, stage: SampleStage, out_dir: &Path) {
        let layout = SampleLayout::new(out_dir, &self.id);
        let paired = self.is_paired();

        if stage >= SampleStage::Trimmed {
            self.trim_r1.get_or_insert_with(|| layout.trimmed(Mate::R1));
            if paired {
                self.trim_r2.get_or_insert_with(|| layout.trimmed(Mate::R2));
            }
            self.trim_singles.get_or_insert_with(|| layout.trimmed(Mate::Singles));
        }
        if stage >= SampleStage::Normalized {
            self.norm_r1.get_or_insert_with(|| layout.normalized(Mate::R1));
            if paired {
                self.norm_r2.get_or_insert_with(|| layout.normalized(Mate::R2));
            }
            self.norm_singles.get_or_insert_with(|| layout.normalized(Mate::Singles));
        }
        if stage >= SampleStage::Assembled {
            self.assembly.get_or_insert_with(|| layout.assembly());
        }
        if stage >= SampleStage::Annotated {
            self.ann_fna.get_or_insert_with(|| layout.prokka("fna"));
            self.ann_ffn.get_or_insert_with(|| layout.prokka("ffn"));
            self.ann_faa.get_or_insert_with(|| layout.prokka("faa"));
        }
    }

    /// Set paths that do not exist on disk.
    pub fn missing_paths(&self) -> Vec<PathBuf> {
        [
            &self.r1, &self.r2, &self.singles,
            &self.trim_r1, &self.trim_r2, &self.trim_singles,
            &self.norm_r1, &self.norm_r2, &self.norm_singles,
            &self.assembly, &self.ann_fna, &self.ann_ffn, &self.ann_faa,
        ]
            .into_iter()
            .flatten()
            .filter(|p| !p.exists())
            .cloned()
            .collect()
    }
}


/// Insertion-ordered sample registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Samplesheet {
    samples: Vec<Sample>,
    index: HashMap<String, usize>,
}

impl Samplesheet {
    pub fn new() -> Self {
        Samplesheet::default()
    }

    /// Adds a sample, rejecting empty or duplicate IDs.
    pub fn insert(&mut self, sample: Sample) -> Result<(), PipelineError> {
        if sample.id.is_empty() {
            return Err(PipelineError::Samplesheet("empty sample ID".to_string()));
        }
        if self.index.contains_key(&sample.id) {
            return Err(PipelineError::Samplesheet(format!("duplicate sample ID {}", sample.id)));
        }
        self.index.insert(sample.id.clone(), self.samples.len());
        self.samples.push(sample);
        Ok(())
    }

    /// Loads a samplesheet, YAML by extension and CSV otherwise.
    ///
    /// # Arguments
    ///
    /// * `path` - Samplesheet file.
    ///
    /// # Returns
    /// Result<Samplesheet, PipelineError>
    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::MissingInput(path.to_path_buf()));
        }
        let sheet = if is_yaml(path) {
            let file = File::open(path)?;
            Self::from_yaml_reader(file)?
        } else {
            let file = File::open(path)?;
            Self::from_csv_reader(file)?
        };
        info!("Loaded {} samples from {}", sheet.len(), path.display());
        Ok(sheet)
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, PipelineError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut sheet = Samplesheet::new();
        for record in csv_reader.records() {
            let record = record.map_err(|e| PipelineError::Samplesheet(e.to_string()))?;
            if record.iter().all(|f| f.is_empty()) {
                continue;
            }
            let fields: Vec<String> = record.iter().map(|f| f.to_string()).collect();
            sheet.insert(Sample::from_fields(&fields)?)?;
        }
        Ok(sheet)
    }

    pub fn from_yaml_reader<R: Read>(reader: R) -> Result<Self, PipelineError> {
        let samples: Vec<Sample> = serde_yaml::from_reader(reader)
            .map_err(|e| PipelineError::Samplesheet(e.to_string()))?;
        let mut sheet = Samplesheet::new();
        for sample in samples {
            sheet.insert(sample)?;
        }
        Ok(sheet)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Sample> {
        self.index.get(id).map(|&i| &self.samples[i])
    }

    pub fn ids(&self) -> Vec<String> {
        self.samples.iter().map(|s| s.id.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn upgrade(&mut self, stage: SampleStage, out_dir: &Path) {
        for sample in self.samples.iter_mut() {
            sample.upgrade(stage, out_dir);
        }
        debug!("Upgraded {} samples to {:?}", self.samples.len(), stage);
    }

    /// New sheet holding only `ids` that are present here, in sheet order.
    pub fn subset<S: AsRef<str>>(&self, ids: &[S]) -> Samplesheet {
        let keep: Vec<&str> = ids.iter().map(|s| s.as_ref()).collect();
        let mut sheet = Samplesheet::new();
        for sample in self.samples.iter().filter(|s| keep.contains(&s.id.as_str())) {
            sheet.index.insert(sample.id.clone(), sheet.samples.len());
            sheet.samples.push(sample.clone());
        }
        sheet
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), PipelineError> {
        let columns = self
            .samples
            .iter()
            .map(|s| s.stage().columns())
            .max()
            .unwrap_or(SampleStage::Raw.columns());

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|e| PipelineError::Samplesheet(e.to_string()))?;

        let mut header: Vec<String> = SAMPLESHEET_COLUMNS[..columns].iter().map(|c| c.to_string()).collect();
        header[0] = format!("#{}", header[0]);
        writer.write_record(&header).map_err(|e| PipelineError::Samplesheet(e.to_string()))?;
        for sample in &self.samples {
            writer
                .write_record(sample.to_fields(columns))
                .map_err(|e| PipelineError::Samplesheet(e.to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_yaml(&self, path: &Path) -> Result<(), PipelineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        serde_yaml::to_writer(file, &self.samples).map_err(|e| PipelineError::Samplesheet(e.to_string()))?;
        Ok(())
    }

    /// Writes the sheet as YAML or CSV depending on `path`'s extension.
    pub fn write(&self, path: &Path) -> Result<(), PipelineError> {
        if is_yaml(path) {
            self.write_yaml(path)?;
        } else {
            self.write_csv(path)?;
        }
        info!("Wrote {} samples to {}", self.len(), path.display());
        Ok(())
    }

    pub fn write_subset<S: AsRef<str>>(&self, ids: &[S], path: &Path) -> Result<(), PipelineError> {
        self.subset(ids).write(path)
    }
}
