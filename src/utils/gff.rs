//! GFF3 parsing and the Prokka/RATT annotation summaries built on it.
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use log::warn;

use crate::config::defs::NA;
use crate::utils::file::TsvTable;

/// Feature types counted as annotation content.
pub const ANNOTATION_TYPES: &[&str] = &["CDS", "rRNA", "tRNA", "tmRNA", "repeat_region"];

#[derive(Debug, Clone, PartialEq)]
pub struct GffFeature {
    pub seqid: String,
    pub source: String,
    pub ftype: String,
    pub start: u64,
    pub end: u64,
    pub strand: String,
    pub attributes: String,
}

impl GffFeature {
    pub fn parse_line(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 9 {
            return Err(anyhow!("GFF line has {} columns: {}", fields.len(), line));
        }
        Ok(GffFeature {
            seqid: fields[0].to_string(),
            source: fields[1].to_string(),
            ftype: fields[2].to_string(),
            start: fields[3].parse()?,
            end: fields[4].parse()?,
            strand: fields[6].to_string(),
            attributes: fields[8].trim_end().to_string(),
        })
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start) + 1
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .split(';')
            .filter_map(|kv| kv.split_once('='))
            .find(|(k, _)| k.trim() == key)
            .map(|(_, v)| v.trim())
    }

    /// Identifier used to pair a subtracted fragment with its source feature.
    pub fn key(&self) -> String {
        let id = self
            .attr("ID")
            .or_else(|| self.attr("locus_tag"))
            .or_else(|| self.attr("Name"))
            .unwrap_or(&self.attributes);
        format!("{}\t{}\t{}", self.seqid, self.ftype, id)
    }

    /// GFF3 line; score and phase are written as `.`.
    pub fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t.\t{}\t.\t{}",
            self.seqid, self.source, self.ftype, self.start, self.end, self.strand, self.attributes
        )
    }

    pub fn label(&self) -> String {
        self.attr("locus_tag")
            .or_else(|| self.attr("ID"))
            .or_else(|| self.attr("Name"))
            .unwrap_or(NA)
            .to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gff {
    pub sequence_regions: Vec<(String, u64)>,
    pub features: Vec<GffFeature>,
}

impl Gff {
    pub fn parse(text: &str) -> Result<Self> {
        let mut gff = Gff::default();
        for line in text.lines() {
            if line.starts_with("##FASTA") {
                break;
            }
            if let Some(rest) = line.strip_prefix("##sequence-region") {
                let parts: Vec<&str> = rest.split_whitespace().collect();
                if let &[seqid, start, end] = parts.as_slice() {
                    let start: u64 = start.parse()?;
                    let end: u64 = end.parse()?;
                    gff.sequence_regions.push((seqid.to_string(), end.saturating_sub(start) + 1));
                }
                continue;
            }
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            gff.features.push(GffFeature::parse_line(line)?);
        }
        Ok(gff)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| anyhow!("Cannot read {}: {}", path.display(), e))?;
        Self::parse(&text)
    }

    pub fn count_type(&self, ftype: &str) -> usize {
        self.features.iter().filter(|f| f.ftype == ftype).count()
    }

    pub fn annotation_count(&self) -> usize {
        self.features
            .iter()
            .filter(|f| ANNOTATION_TYPES.contains(&f.ftype.as_str()))
            .count()
    }

    pub fn annotation_features(&self) -> Vec<GffFeature> {
        self.features
            .iter()
            .filter(|f| ANNOTATION_TYPES.contains(&f.ftype.as_str()))
            .cloned()
            .collect()
    }
}

/// Writes `features` as a bare GFF3 file with no sequence section.
pub fn write_features(path: &Path, features: &[GffFeature]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut body = String::from("##gff-version 3\n");
    for f in features {
        body.push_str(&f.to_line());
        body.push('\n');
    }
    fs::write(path, body)?;
    Ok(())
}


fn na_row(sample: &str, width: usize) -> Vec<String> {
    let mut row = vec![sample.to_string()];
    row.extend(std::iter::repeat(NA.to_string()).take(width - 1));
    row
}

/// Per-sample Prokka feature counts.
pub fn compile_prokka_report(reports: &[(String, PathBuf)]) -> TsvTable {
    let mut header = vec!["sample".to_string(), "contigs".to_string(), "bases".to_string()];
    header.extend(ANNOTATION_TYPES.iter().map(|t| t.to_string()));

    let rows = reports
        .iter()
        .map(|(sample, path)| match Gff::from_path(path) {
            Ok(gff) => {
                let mut row = vec![
                    sample.clone(),
                    gff.sequence_regions.len().to_string(),
                    gff.sequence_regions.iter().map(|(_, l)| l).sum::<u64>().to_string(),
                ];
                row.extend(ANNOTATION_TYPES.iter().map(|t| gff.count_type(t).to_string()));
                row
            }
            Err(e) => {
                warn!("Prokka GFF {} unusable: {}", path.display(), e);
                na_row(sample, header.len())
            }
        })
        .collect();

    TsvTable { header, rows }
}

/// transferred / reference as a percentage with two decimals, `NA` for an empty reference.
pub fn transfer_percentage(transferred: usize, reference: usize) -> String {
    if reference == 0 {
        NA.to_string()
    } else {
        format!("{:.2}", transferred as f64 / reference as f64 * 100.0)
    }
}

pub const RATT_HEADER: [&str; 4] = ["sample", "reference_features", "transferred", "pct_transferred"];

/// Per-sample RATT transfer rates from (sample, reference GFF, transferred GFF).
pub fn compile_ratt_report(reports: &[(String, PathBuf, PathBuf)]) -> TsvTable {
    let rows = reports
        .iter()
        .map(|(sample, reference, transferred)| {
            let counts = Gff::from_path(reference)
                .and_then(|r| Gff::from_path(transferred).map(|t| (r.annotation_count(), t.annotation_count())));
            match counts {
                Ok((ref_count, transferred_count)) => vec![
                    sample.clone(),
                    ref_count.to_string(),
                    transferred_count.to_string(),
                    transfer_percentage(transferred_count, ref_count),
                ],
                Err(e) => {
                    warn!("RATT outputs for {} unusable: {}", sample, e);
                    na_row(sample, RATT_HEADER.len())
                }
            }
        })
        .collect();

    TsvTable {
        header: RATT_HEADER.iter().map(|h| h.to_string()).collect(),
        rows,
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaClass {
    /// Predicted by Prokka, untouched by any RATT feature.
    Novel,
    /// Transferred by RATT, untouched by any Prokka feature.
    Unpredicted,
    /// Only part of the feature is covered by the other annotation.
    Partial,
}

impl DeltaClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeltaClass::Novel => "novel",
            DeltaClass::Unpredicted => "unpredicted",
            DeltaClass::Partial => "partial",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationDelta {
    pub feature: GffFeature,
    pub class: DeltaClass,
    /// Percent of the feature covered by the other annotation.
    pub coverage: f64,
}

pub const DELTA_HEADER: [&str; 9] = [
    "sample", "origin", "seqid", "type", "feature", "start", "end", "class", "coverage",
];

impl AnnotationDelta {
    pub fn to_row(&self, sample: &str, origin: &str) -> Vec<String> {
        vec![
            sample.to_string(),
            origin.to_string(),
            self.feature.seqid.clone(),
            self.feature.ftype.clone(),
            self.feature.label(),
            self.feature.start.to_string(),
            self.feature.end.to_string(),
            self.class.as_str().to_string(),
            format!("{:.2}", self.coverage),
        ]
    }
}

/// Classifies the output of an interval subtraction against the features it
/// was computed from. A feature whose single remaining fragment has its
/// original coordinates gets `whole`; any length change is `Partial`.
///
/// # Arguments
///
/// * `originals` - Features fed to the subtraction as the `-a` set.
/// * `remaining` - Fragments the subtraction returned.
/// * `whole` - Class for untouched features (Novel or Unpredicted).
///
/// # Returns
/// Deltas in order of the original features.
pub fn classify_remaining(originals: &[GffFeature], remaining: &[GffFeature], whole: DeltaClass) -> Vec<AnnotationDelta> {
    let mut fragments: HashMap<String, Vec<&GffFeature>> = HashMap::new();
    for frag in remaining {
        fragments.entry(frag.key()).or_default().push(frag);
    }

    let mut deltas = Vec::new();
    for original in originals {
        let Some(frags) = fragments.remove(&original.key()) else {
            continue;
        };
        let untouched = frags.len() == 1
            && frags[0].start == original.start
            && frags[0].end == original.end;
        if untouched {
            deltas.push(AnnotationDelta { feature: original.clone(), class: whole, coverage: 0.0 });
        } else {
            let kept: u64 = frags.iter().map(|f| f.len()).sum();
            let total = original.len();
            let coverage = total.saturating_sub(kept) as f64 / total as f64 * 100.0;
            deltas.push(AnnotationDelta { feature: original.clone(), class: DeltaClass::Partial, coverage });
        }
    }

    for key in fragments.keys() {
        warn!("Subtracted fragment without a source feature: {}", key.replace('\t', " "));
    }
    deltas
}
