// Survey assembly statistics (bbmap stats.sh format=3, or a QUAST-style table)
use std::path::Path;

use anyhow::{anyhow, Result};

use crate::utils::file::read_tsv;

const SIZE_COLUMNS: &[&str] = &["contig_bp", "Total length"];

/// Assembled size in bp from the first data row.
///
/// # Arguments
///
/// * `path` - Statistics TSV with a header row.
///
/// # Returns
/// Result<u64> assembled bases.
pub fn assembly_size(path: &Path) -> Result<u64> {
    let table = read_tsv(path, false)?;
    let row = table
        .rows
        .first()
        .ok_or_else(|| anyhow!("No data rows in {}", path.display()))?;
    let cell = SIZE_COLUMNS
        .iter()
        .find_map(|c| table.get(row, c))
        .ok_or_else(|| anyhow!("No size column in {}", path.display()))?;
    cell.parse::<u64>()
        .map_err(|e| anyhow!("Bad size '{}' in {}: {}", cell, path.display(), e))
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_bbmap_stats() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let p = dir.path().join("S1.stats.tsv");
        fs::write(&p, "n_scaffolds\tn_contigs\tscaf_bp\tcontig_bp\tgap_pct\n152\t152\t4811023\t4810990\t0.001\n")?;
        assert_eq!(assembly_size(&p)?, 4_810_990);
        Ok(())
    }

    #[test]
    fn test_quast_style_and_missing_column() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let p = dir.path().join("q.tsv");
        fs::write(&p, "Assembly\t# contigs\tTotal length\nS1\t80\t2900000\n")?;
        assert_eq!(assembly_size(&p)?, 2_900_000);

        let bad = dir.path().join("bad.tsv");
        fs::write(&bad, "Assembly\tN50\nS1\t1000\n")?;
        assert!(assembly_size(&bad).is_err());
        Ok(())
    }
}
