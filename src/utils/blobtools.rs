//! Blobtools table parsing: genus span per sample.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use log::warn;

use crate::config::defs::NA;
use crate::utils::file::{read_tsv, TsvTable};

pub const BLOBTOOLS_HEADER: [&str; 7] = [
    "sample", "contigs", "span", "top_genus", "top_fraction", "second_genus", "second_fraction",
];

#[derive(Debug, Clone, PartialEq)]
pub struct TaxonomySummary {
    pub sample: String,
    pub contigs: usize,
    pub span: u64,
    /// (genus, fraction of span), largest first.
    pub ranked: Vec<(String, f64)>,
}

impl TaxonomySummary {
    pub fn top(&self) -> Option<&(String, f64)> {
        self.ranked.first()
    }

    fn to_row(&self) -> Vec<String> {
        let cell = |i: usize| match self.ranked.get(i) {
            Some((genus, frac)) => (genus.clone(), format!("{:.4}", frac)),
            None => (NA.to_string(), NA.to_string()),
        };
        let (g1, f1) = cell(0);
        let (g2, f2) = cell(1);
        vec![self.sample.clone(), self.contigs.to_string(), self.span.to_string(), g1, f1, g2, f2]
    }
}

/// Taxonomy column of a blobtools table, preferring the genus rank.
fn taxon_column(header: &[String]) -> Option<usize> {
    let is_tax = |h: &str| {
        h.rsplit_once(".t.")
            .map(|(_, n)| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false)
    };
    header
        .iter()
        .position(|h| h.starts_with("genus") && is_tax(h))
        .or_else(|| header.iter().position(|h| is_tax(h)))
}

pub fn summarise_table(sample: &str, table: &TsvTable) -> Result<TaxonomySummary> {
    let tax_col = taxon_column(&table.header).ok_or_else(|| anyhow!("No taxonomy column"))?;
    let len_col = table.column("length").ok_or_else(|| anyhow!("No length column"))?;

    let mut spans: HashMap<String, u64> = HashMap::new();
    let mut total = 0u64;
    for row in &table.rows {
        let length: u64 = row
            .get(len_col)
            .and_then(|l| l.parse().ok())
            .ok_or_else(|| anyhow!("Bad length in row {:?}", row))?;
        let taxon = row.get(tax_col).cloned().unwrap_or_else(|| "no-hit".to_string());
        *spans.entry(taxon).or_insert(0) += length;
        total += length;
    }

    let mut ranked: Vec<(String, f64)> = spans
        .into_iter()
        .map(|(genus, span)| {
            let frac = if total > 0 { span as f64 / total as f64 } else { 0.0 };
            (genus, frac)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));

    Ok(TaxonomySummary {
        sample: sample.to_string(),
        contigs: table.rows.len(),
        span: total,
        ranked,
    })
}

pub fn read_table(sample: &str, path: &Path) -> Result<TaxonomySummary> {
    let table = read_tsv(path, true)?;
    summarise_table(sample, &table)
}

/// One row per sample; unusable tables become an `NA` row.
pub fn compile_blobtools_report(reports: &[(String, PathBuf)]) -> TsvTable {
    let rows = reports
        .iter()
        .map(|(sample, path)| match read_table(sample, path) {
            Ok(summary) => summary.to_row(),
            Err(e) => {
                warn!("Blobtools table {} unusable: {}", path.display(), e);
                let mut row = vec![sample.clone()];
                row.extend(std::iter::repeat(NA.to_string()).take(BLOBTOOLS_HEADER.len() - 1));
                row
            }
        })
        .collect();

    TsvTable {
        header: BLOBTOOLS_HEADER.iter().map(|h| h.to_string()).collect(),
        rows,
    }
}
