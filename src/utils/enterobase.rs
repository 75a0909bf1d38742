//! Enterobase species-level QC criteria and the sample filter built on them.
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::Path;

use anyhow::Result;
use lazy_static::lazy_static;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::defs::PipelineError;
use crate::utils::file::TsvTable;
use crate::utils::quast::{assembly_stats, AssemblyStats};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    pub genus: String,
    pub minsize: u64,
    pub maxsize: u64,
    pub n50: u64,
    pub ncontigs: u64,
    /// Maximum fraction of N bases.
    pub ncount: f64,
    /// Minimum span fraction of the dominant genus.
    pub species_fraction: f64,
}

impl Criteria {
    fn new(genus: &str, minsize: u64, maxsize: u64, n50: u64, ncontigs: u64) -> Self {
        Criteria {
            genus: genus.to_string(),
            minsize,
            maxsize,
            n50,
            ncontigs,
            ncount: 0.03,
            species_fraction: 0.7,
        }
    }

    /// minsize <= size <= maxsize, contigs < ncontigs, N50 > n50, N fraction < ncount.
    pub fn assembly_passes(&self, stats: &AssemblyStats) -> bool {
        self.minsize <= stats.total_length
            && stats.total_length <= self.maxsize
            && stats.contigs < self.ncontigs
            && stats.n50 > self.n50
            && stats.n_fraction() < self.ncount
    }

    pub fn taxonomy_passes(&self, genus: &str, fraction: f64) -> bool {
        genus.eq_ignore_ascii_case(&self.genus) && fraction >= self.species_fraction
    }
}

lazy_static! {
    static ref BUILTIN_CRITERIA: BTreeMap<String, Criteria> = {
        let mut m = BTreeMap::new();
        m.insert("Salmonella".to_string(), Criteria::new("Salmonella", 4_000_000, 5_800_000, 20_000, 600));
        m.insert("Escherichia".to_string(), Criteria::new("Escherichia", 3_700_000, 6_400_000, 20_000, 600));
        m.insert("Shigella".to_string(), Criteria::new("Shigella", 3_700_000, 6_400_000, 20_000, 600));
        m.insert("Yersinia".to_string(), Criteria::new("Yersinia", 3_700_000, 5_500_000, 15_000, 600));
        m.insert("Vibrio".to_string(), Criteria::new("Vibrio", 3_800_000, 6_000_000, 20_000, 600));
        m.insert("Clostridioides".to_string(), Criteria::new("Clostridioides", 3_600_000, 5_000_000, 20_000, 600));
        m.insert("Moraxella".to_string(), Criteria::new("Moraxella", 1_800_000, 2_600_000, 20_000, 600));
        m.insert("Streptococcus".to_string(), Criteria::new("Streptococcus", 1_600_000, 2_600_000, 20_000, 600));
        m.insert("Helicobacter".to_string(), Criteria::new("Helicobacter", 1_400_000, 1_900_000, 20_000, 600));
        m
    };
}

/// Organism name to criteria lookup table.
#[derive(Debug, Clone, PartialEq)]
pub struct CriteriaTable {
    table: BTreeMap<String, Criteria>,
}

impl Default for CriteriaTable {
    fn default() -> Self {
        CriteriaTable { table: BUILTIN_CRITERIA.clone() }
    }
}

impl CriteriaTable {
    pub fn from_yaml(path: &Path) -> Result<Self, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::MissingInput(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let table: BTreeMap<String, Criteria> = serde_yaml::from_reader(file)
            .map_err(|e| PipelineError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Ok(CriteriaTable { table })
    }

    /// Case-insensitive lookup by organism name.
    pub fn get(&self, organism: &str) -> Result<&Criteria, PipelineError> {
        self.table
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(organism))
            .map(|(_, c)| c)
            .ok_or_else(|| {
                PipelineError::InvalidConfig(format!(
                    "No Enterobase criteria for '{}'; known: {}",
                    organism,
                    self.table.keys().cloned().collect::<Vec<_>>().join(", ")
                ))
            })
    }
}


/// Samples from a compiled QUAST report passing the assembly criteria.
/// Rows with unusable values fail and are logged.
pub fn assembly_passing(quast: &TsvTable, criteria: &Criteria) -> BTreeSet<String> {
    let mut passing = BTreeSet::new();
    for row in &quast.rows {
        match assembly_stats(quast, row) {
            Ok(stats) => {
                if criteria.assembly_passes(&stats) {
                    passing.insert(stats.sample);
                } else {
                    debug!("{} fails {} assembly criteria: {:?}", stats.sample, criteria.genus, stats);
                }
            }
            Err(e) => warn!("QUAST row {:?} unusable for Enterobase filter: {}", row.first(), e),
        }
    }
    passing
}

/// Samples from a compiled blobtools report whose dominant genus passes.
pub fn taxonomy_passing(blobtools: &TsvTable, criteria: &Criteria) -> BTreeSet<String> {
    let mut passing = BTreeSet::new();
    for row in &blobtools.rows {
        let sample = blobtools.get(row, "sample");
        let genus = blobtools.get(row, "top_genus");
        let fraction = blobtools.get(row, "top_fraction").and_then(|f| f.parse::<f64>().ok());
        match (sample, genus, fraction) {
            (Some(sample), Some(genus), Some(fraction)) => {
                if criteria.taxonomy_passes(genus, fraction) {
                    passing.insert(sample.to_string());
                } else {
                    debug!("{} fails {} taxonomy criteria: {} at {}", sample, criteria.genus, genus, fraction);
                }
            }
            _ => warn!("Blobtools row {:?} unusable for Enterobase filter", row.first()),
        }
    }
    passing
}

/// Samples passing both the assembly and taxonomy criteria for `organism`, sorted.
///
/// # Arguments
///
/// * `quast` - Compiled QUAST report.
/// * `blobtools` - Compiled blobtools report.
/// * `table` - Criteria lookup.
/// * `organism` - Organism name, e.g. "Salmonella".
///
/// # Returns
/// Result<Vec<String>, PipelineError>; unknown organism is an error.
pub fn enterobase_filter(
    quast: &TsvTable,
    blobtools: &TsvTable,
    table: &CriteriaTable,
    organism: &str,
) -> Result<Vec<String>, PipelineError> {
    let criteria = table.get(organism)?;
    let asm = assembly_passing(quast, criteria);
    let tax = taxonomy_passing(blobtools, criteria);
    let both: Vec<String> = asm.intersection(&tax).cloned().collect();
    info!(
        "Enterobase {}: {} pass assembly, {} pass taxonomy, {} pass both",
        organism,
        asm.len(),
        tax.len(),
        both.len()
    );
    Ok(both)
}
