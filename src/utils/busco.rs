// BUSCO short summary parsing
use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use log::warn;
use regex::Regex;

use crate::config::defs::NA;
use crate::utils::file::TsvTable;

lazy_static! {
    static ref SUMMARY_RE: Regex = Regex::new(
        r"C:([\d.]+)%\[S:([\d.]+)%,D:([\d.]+)%\],F:([\d.]+)%,M:([\d.]+)%,n:(\d+)"
    ).expect("static regex");
    static ref LINEAGE_RE: Regex = Regex::new(r"lineage dataset is:\s*(\S+)").expect("static regex");
}

pub const BUSCO_HEADER: [&str; 8] = [
    "sample", "lineage", "complete", "single", "duplicated", "fragmented", "missing", "total",
];

#[derive(Debug, Clone, PartialEq)]
pub struct BuscoSummary {
    pub lineage: String,
    pub complete: f64,
    pub single: f64,
    pub duplicated: f64,
    pub fragmented: f64,
    pub missing: f64,
    pub total: u64,
}

pub fn parse_summary(text: &str) -> Result<BuscoSummary> {
    let caps = SUMMARY_RE
        .captures(text)
        .ok_or_else(|| anyhow!("No BUSCO result line"))?;
    let pct = |i: usize| -> Result<f64> { Ok(caps[i].parse::<f64>()?) };
    let lineage = LINEAGE_RE
        .captures(text)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| NA.to_string());

    Ok(BuscoSummary {
        lineage,
        complete: pct(1)?,
        single: pct(2)?,
        duplicated: pct(3)?,
        fragmented: pct(4)?,
        missing: pct(5)?,
        total: caps[6].parse()?,
    })
}

/// One row per sample; summaries that cannot be read become an `NA` row.
pub fn compile_busco_report(reports: &[(String, PathBuf)]) -> TsvTable {
    let rows = reports
        .iter()
        .map(|(sample, path)| {
            let parsed = fs::read_to_string(path)
                .map_err(anyhow::Error::from)
                .and_then(|text| parse_summary(&text));
            match parsed {
                Ok(s) => vec![
                    sample.clone(),
                    s.lineage,
                    s.complete.to_string(),
                    s.single.to_string(),
                    s.duplicated.to_string(),
                    s.fragmented.to_string(),
                    s.missing.to_string(),
                    s.total.to_string(),
                ],
                Err(e) => {
                    warn!("BUSCO summary {} unusable: {}", path.display(), e);
                    let mut row = vec![sample.clone()];
                    row.extend(std::iter::repeat(NA.to_string()).take(BUSCO_HEADER.len() - 1));
                    row
                }
            }
        })
        .collect();

    TsvTable {
        header: BUSCO_HEADER.iter().map(|h| h.to_string()).collect(),
        rows,
    }
}
