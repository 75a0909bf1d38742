// KAT k-mer spectrum distribution analysis parsing
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Result};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct KmerSpectrum {
    pub nb_peaks: usize,
    pub volumes: Vec<f64>,
}

impl KmerSpectrum {
    /// Share of the total peak volume held by the largest peak; 0.0 without peaks.
    pub fn dominant_fraction(&self) -> f64 {
        let total: f64 = self.volumes.iter().sum();
        if total <= 0.0 {
            return 0.0;
        }
        let max = self.volumes.iter().cloned().fold(0.0_f64, f64::max);
        max / total
    }
}

/// Parses a `*.dist_analysis.json`. Peak data may sit at the top level or
/// under `coverage` depending on the KAT version.
pub fn parse_json(text: &str) -> Result<KmerSpectrum> {
    let root: Value = serde_json::from_str(text)?;
    let node = if root.get("peaks").is_some() {
        &root
    } else {
        root.get("coverage").ok_or_else(|| anyhow!("No peaks or coverage section"))?
    };

    let peaks = node
        .get("peaks")
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow!("No peaks array"))?;
    let volumes = peaks
        .iter()
        .map(|p| {
            p.get("volume")
                .and_then(|v| v.as_f64())
                .ok_or_else(|| anyhow!("Peak without numeric volume"))
        })
        .collect::<Result<Vec<f64>>>()?;
    let nb_peaks = node
        .get("nb_peaks")
        .and_then(|n| n.as_u64())
        .map(|n| n as usize)
        .unwrap_or(volumes.len());

    Ok(KmerSpectrum { nb_peaks, volumes })
}

/// Parses the peak table printed by older `kat hist` runs.
pub fn parse_legacy(text: &str) -> Result<KmerSpectrum> {
    let mut volume_col: Option<usize> = None;
    let mut volumes = Vec::new();

    for line in text.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match volume_col {
            None => {
                volume_col = tokens.iter().position(|t| t.eq_ignore_ascii_case("volume"));
            }
            Some(col) => {
                if tokens.is_empty() {
                    if !volumes.is_empty() {
                        break;
                    }
                    continue;
                }
                if tokens[0].parse::<usize>().is_err() {
                    if volumes.is_empty() {
                        continue;
                    }
                    break;
                }
                let volume = tokens
                    .get(col)
                    .and_then(|v| v.parse::<f64>().ok())
                    .ok_or_else(|| anyhow!("Bad volume in peak row: {}", line))?;
                volumes.push(volume);
            }
        }
    }

    if volume_col.is_none() {
        return Err(anyhow!("No peak table found"));
    }
    Ok(KmerSpectrum { nb_peaks: volumes.len(), volumes })
}

/// Reads whichever report exists, JSON first.
///
/// # Returns
/// Ok(None) when neither report exists.
pub fn read_spectrum(json_path: &Path, legacy_path: &Path) -> Result<Option<KmerSpectrum>> {
    if json_path.exists() {
        let text = fs::read_to_string(json_path)?;
        return parse_json(&text).map(Some);
    }
    if legacy_path.exists() {
        let text = fs::read_to_string(legacy_path)?;
        return parse_legacy(&text).map(Some);
    }
    Ok(None)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_top_level() -> Result<()> {
        let json = r#"{"k": 27, "nb_peaks": 2, "peaks": [{"mean": 30.1, "volume": 900.0}, {"mean": 60.0, "volume": 100.0}]}"#;
        let s = parse_json(json)?;
        assert_eq!(s.nb_peaks, 2);
        assert!((s.dominant_fraction() - 0.9).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_parse_json_coverage_section() -> Result<()> {
        let json = r#"{"coverage": {"peaks": [{"volume": 5000000}], "est_genome_size": 4800000}}"#;
        let s = parse_json(json)?;
        assert_eq!(s.nb_peaks, 1);
        assert_eq!(s.dominant_fraction(), 1.0);
        Ok(())
    }

    #[test]
    fn test_parse_json_rejects_garbage() {
        assert!(parse_json("not json").is_err());
        assert!(parse_json(r#"{"k": 27}"#).is_err());
    }

    #[test]
    fn test_parse_legacy_table() -> Result<()> {
        let text = "\
K-mer frequency spectra statistics
----------------------------------
Analysing peaks
Index  Left  Mean   Right  StdDev  Max     Volume    Description
1      8     24.5   41     5.6     98000   4700000   1X
2      42    49.0   60     3.2     3000    150000    2X

Estimated genome size: 4.7 Mbp
";
        let s = parse_legacy(text)?;
        assert_eq!(s.nb_peaks, 2);
        assert_eq!(s.volumes, vec![4_700_000.0, 150_000.0]);
        Ok(())
    }

    #[test]
    fn test_empty_spectrum_fraction() {
        let s = KmerSpectrum { nb_peaks: 0, volumes: vec![] };
        assert_eq!(s.dominant_fraction(), 0.0);
    }
}
