//! Where the workflow rules leave per-sample outputs under the run directory.
use std::path::{Path, PathBuf};

use crate::config::defs::{
    BLOBTOOLS_TABLE_SUFFIX, BUSCO_SUMMARY, FASTQC_DATA, KAT_JSON_SUFFIX, KAT_LEGACY_SUFFIX,
    QUAST_TRANSPOSED, RATT_REFERENCE_SUFFIX, SURVEY_STATS_SUFFIX,
};
use crate::utils::file::file_path_manipulator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mate {
    R1,
    R2,
    Singles,
}

impl Mate {
    pub fn tag(&self) -> &'static str {
        match self {
            Mate::R1 => "R1",
            Mate::R2 => "R2",
            Mate::Singles => "RS",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SampleLayout {
    root: PathBuf,
    id: String,
}

impl SampleLayout {
    pub fn new(out_dir: &Path, id: &str) -> Self {
        SampleLayout { root: out_dir.join(id), id: id.to_string() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn named(&self, subdir: &str, suffix: &str, delimiter: &str) -> PathBuf {
        file_path_manipulator(
            Path::new(&self.id),
            Some(&self.root.join(subdir)),
            None,
            Some(suffix),
            delimiter,
        )
    }

    pub fn fastqc_data(&self, mate: Mate) -> PathBuf {
        self.root
            .join("fastqc")
            .join(format!("{}_{}_fastqc", self.id, mate.tag()))
            .join(FASTQC_DATA)
    }

    pub fn kat_json(&self) -> PathBuf {
        self.named("kat", KAT_JSON_SUFFIX, ".")
    }

    pub fn kat_legacy(&self) -> PathBuf {
        self.named("kat", KAT_LEGACY_SUFFIX, ".")
    }

    pub fn survey_stats(&self) -> PathBuf {
        self.named("survey", SURVEY_STATS_SUFFIX, ".")
    }

    pub fn trimmed(&self, mate: Mate) -> PathBuf {
        self.named("trim", &format!("{}.trim.fq.gz", mate.tag()), "_")
    }

    pub fn normalized(&self, mate: Mate) -> PathBuf {
        self.named("norm", &format!("{}.norm.fq.gz", mate.tag()), "_")
    }

    pub fn assembly(&self) -> PathBuf {
        self.named("assembly", "fasta", ".")
    }

    pub fn quast_report(&self) -> PathBuf {
        self.root.join("quast").join(QUAST_TRANSPOSED)
    }

    pub fn busco_summary(&self) -> PathBuf {
        self.root.join("busco").join(BUSCO_SUMMARY)
    }

    pub fn blobtools_table(&self) -> PathBuf {
        self.named("blobtools", BLOBTOOLS_TABLE_SUFFIX, ".")
    }

    /// Prokka output with the given extension (gff, fna, ffn, faa).
    pub fn prokka(&self, ext: &str) -> PathBuf {
        self.named("prokka", ext, ".")
    }

    pub fn ratt_gff(&self) -> PathBuf {
        self.named("ratt", "gff", ".")
    }

    pub fn ratt_reference_gff(&self) -> PathBuf {
        self.named("ratt", RATT_REFERENCE_SUFFIX, ".")
    }
}
