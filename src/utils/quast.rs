//! QUAST transposed report compilation and per-assembly metric extraction.
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use log::{debug, warn};

use crate::config::defs::NA;
use crate::utils::file::{read_tsv, TsvTable};

pub const ASSEMBLY_COL: &str = "Assembly";
pub const CONTIGS_COL: &str = "# contigs";
pub const TOTAL_LENGTH_COL: &str = "Total length";
pub const N50_COL: &str = "N50";
pub const NS_PER_100KBP_COL: &str = "# N's per 100 kbp";


/// Concatenates per-sample transposed reports under the first file's header.
/// Files with a different column order are re-aligned by name, absent cells
/// become `NA`. The `Assembly` cell is replaced with the sample ID.
///
/// # Arguments
///
/// * `reports` - (sample, transposed_report.tsv) pairs.
///
/// # Returns
/// Result<TsvTable> of the combined report.
pub fn compile_quast_report(reports: &[(String, PathBuf)]) -> Result<TsvTable> {
    let mut combined = TsvTable::default();

    for (sample, path) in reports {
        let table = match read_tsv(path, false) {
            Ok(t) => t,
            Err(e) => {
                warn!("Skipping unreadable QUAST report {}: {}", path.display(), e);
                continue;
            }
        };

        if combined.header.is_empty() {
            combined.header = table.header.clone();
        }

        let aligned = table.header == combined.header;
        if !aligned {
            warn!("QUAST header in {} differs from the first report; aligning by column name", path.display());
        }
        for row in &table.rows {
            let mut out: Vec<String> = if aligned {
                row.clone()
            } else {
                combined
                    .header
                    .iter()
                    .map(|col| table.get(row, col).unwrap_or(NA).to_string())
                    .collect()
            };
            if let Some(i) = combined.column(ASSEMBLY_COL) {
                if let Some(cell) = out.get_mut(i) {
                    *cell = sample.clone();
                }
            }
            combined.rows.push(out);
        }
        debug!("Added {} rows from {}", table.rows.len(), path.display());
    }

    if combined.header.is_empty() {
        return Err(anyhow!("No readable QUAST reports"));
    }
    Ok(combined)
}


/// Metrics the Enterobase filter needs from a compiled QUAST row.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyStats {
    pub sample: String,
    pub total_length: u64,
    pub contigs: u64,
    pub n50: u64,
    pub ns_per_100kbp: f64,
}

impl AssemblyStats {
    /// Fraction of N bases in the assembly.
    pub fn n_fraction(&self) -> f64 {
        self.ns_per_100kbp / 100_000.0
    }
}

fn numeric<T: std::str::FromStr>(table: &TsvTable, row: &[String], col: &str) -> Result<T> {
    let cell = table
        .get(row, col)
        .ok_or_else(|| anyhow!("Missing column '{}'", col))?;
    cell.parse::<T>()
        .map_err(|_| anyhow!("Non-numeric '{}' in column '{}'", cell, col))
}

pub fn assembly_stats(table: &TsvTable, row: &[String]) -> Result<AssemblyStats> {
    Ok(AssemblyStats {
        sample: table
            .get(row, ASSEMBLY_COL)
            .ok_or_else(|| anyhow!("Missing column '{}'", ASSEMBLY_COL))?
            .to_string(),
        total_length: numeric(table, row, TOTAL_LENGTH_COL)?,
        contigs: numeric(table, row, CONTIGS_COL)?,
        n50: numeric(table, row, N50_COL)?,
        ns_per_100kbp: numeric(table, row, NS_PER_100KBP_COL)?,
    })
}
