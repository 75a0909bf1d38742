// FastQC report parsing
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Result};

/// Reads `Total Sequences` from a FastQC `fastqc_data.txt`.
///
/// # Arguments
///
/// * `path` - fastqc_data.txt for a single read file.
///
/// # Returns
/// Result<u64> total read count.
pub fn total_sequences(path: &Path) -> Result<u64> {
    let text = fs::read_to_string(path)?;
    parse_total_sequences(&text).ok_or_else(|| anyhow!("No Total Sequences line in {}", path.display()))
}

fn parse_total_sequences(text: &str) -> Option<u64> {
    text.lines()
        .filter_map(|line| line.strip_prefix("Total Sequences"))
        .next()
        .and_then(|rest| rest.trim().replace(',', "").parse().ok())
}
