use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use crate::config::defs::YAML_EXTS;


/// Builds an output path from a base name.
///
/// # Arguments
///
/// * `base` - File or sample base name; only its file name is kept when `dir` is given.
/// * `dir` - Optional directory the result is placed in.
/// * `prefix` - Optional prefix joined before the base with `delimiter`.
/// * `suffix` - Optional suffix joined after the base with `delimiter`.
/// * `delimiter` - Joiner for prefix/suffix.
///
/// # Returns
/// PathBuf of the assembled path.
pub fn file_path_manipulator(
    base: &Path,
    dir: Option<&Path>,
    prefix: Option<&str>,
    suffix: Option<&str>,
    delimiter: &str,
) -> PathBuf {
    let name = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut assembled = String::new();
    if let Some(p) = prefix {
        assembled.push_str(p);
        assembled.push_str(delimiter);
    }
    assembled.push_str(&name);
    if let Some(s) = suffix {
        assembled.push_str(delimiter);
        assembled.push_str(s);
    }

    match dir {
        Some(d) => d.join(assembled),
        None => match base.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(assembled),
            _ => PathBuf::from(assembled),
        },
    }
}

/// Absolute version of `path`, relative ones resolved against `cwd`.
pub fn resolve_path(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

pub fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| YAML_EXTS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Header plus rows of a tab-separated report. Lines starting with `#` are
/// skipped unless `header_comment` is set, in which case the last `#` line
/// before data is taken as the header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TsvTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TsvTable {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// Cell lookup by column name; `None` when the column or cell is absent.
    pub fn get<'a>(&self, row: &'a [String], name: &str) -> Option<&'a str> {
        self.column(name).and_then(|i| row.get(i)).map(|s| s.as_str())
    }
}

pub fn read_tsv(path: &Path, header_comment: bool) -> Result<TsvTable> {
    let text = fs::read_to_string(path).map_err(|e| anyhow!("Cannot open {}: {}", path.display(), e))?;

    let comment_header = if header_comment {
        text.lines()
            .take_while(|l| l.starts_with('#') || l.trim().is_empty())
            .filter_map(|l| l.strip_prefix('#'))
            .last()
            .map(|h| h.trim_start_matches('#').trim_start().split('\t').map(|s| s.trim().to_string()).collect())
    } else {
        None
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .comment(Some(b'#'))
        .quoting(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .has_headers(!header_comment)
        .from_reader(text.as_bytes());

    let mut table = TsvTable::default();
    match comment_header {
        Some(header) => table.header = header,
        None if !header_comment => {
            table.header = reader.headers()?.iter().map(|h| h.to_string()).collect();
        }
        None => {}
    }
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        table.rows.push(record.iter().map(|f| f.to_string()).collect());
    }

    if table.header.iter().all(|h| h.is_empty()) {
        return Err(anyhow!("No header found in {}", path.display()));
    }
    Ok(table)
}

/// Writes a TSV report with a single header line, creating parent directories.
pub fn write_tsv<S: AsRef<str>>(path: &Path, header: &[S], rows: &[Vec<String>]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .flexible(true)
        .from_path(path)?;
    writer.write_record(header.iter().map(|h| h.as_ref()))?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}


/// Finds per-sample files under `root` matching `<root>/<sample>/<tail>`.
/// `tail` may contain glob wildcards.
///
/// # Arguments
///
/// * `root` - Run directory with one subdirectory per sample.
/// * `tail` - Path below the sample directory, e.g. `quast/transposed_report.tsv`.
///
/// # Returns
/// (sample, path) pairs sorted by sample, then path.
pub fn glob_sample_files(root: &Path, tail: &str) -> Result<Vec<(String, PathBuf)>> {
    let pattern = root.join("*").join(tail);
    let pattern = pattern
        .to_str()
        .ok_or_else(|| anyhow!("Non UTF-8 path: {}", root.display()))?;

    let mut found = Vec::new();
    for entry in glob::glob(pattern)? {
        let path = entry?;
        let sample = path
            .strip_prefix(root)
            .ok()
            .and_then(|rel| rel.components().next())
            .map(|c| c.as_os_str().to_string_lossy().into_owned());
        if let Some(sample) = sample {
            found.push((sample, path));
        }
    }
    found.sort();
    Ok(found)
}


/// Writes `<file>.md5` next to `file` in `md5sum` format.
///
/// # Returns
/// Path to the sidecar.
pub fn write_md5_sidecar(file: &Path) -> Result<PathBuf> {
    let bytes = fs::read(file)?;
    let digest = md5::compute(&bytes);
    let name = file
        .file_name()
        .ok_or_else(|| anyhow!("No file name in {}", file.display()))?
        .to_string_lossy()
        .into_owned();
    let sidecar = file.with_file_name(format!("{}.md5", name));
    let mut out = File::create(&sidecar)?;
    writeln!(out, "{:x}  {}", digest, name)?;
    Ok(sidecar)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_path_manipulator() {
        let p = file_path_manipulator(Path::new("sampleA"), Some(Path::new("/out")), None, Some("trim.fq.gz"), "_");
        assert_eq!(p, PathBuf::from("/out/sampleA_trim.fq.gz"));

        let p = file_path_manipulator(Path::new("/data/reads.fq"), None, Some("val"), None, "-");
        assert_eq!(p, PathBuf::from("/data/val-reads.fq"));
    }

    #[test]
    fn test_is_yaml() {
        assert!(is_yaml(Path::new("sheet.yaml")));
        assert!(is_yaml(Path::new("sheet.YML")));
        assert!(!is_yaml(Path::new("sheet.csv")));
    }

    #[test]
    fn test_read_tsv_plain_and_comment_header() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let plain = dir.path().join("plain.tsv");
        fs::write(&plain, "a\tb\n1\t2\n\n3\t4\n")?;
        let t = read_tsv(&plain, false)?;
        assert_eq!(t.header, vec!["a", "b"]);
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.get(&t.rows[1], "b"), Some("4"));

        let commented = dir.path().join("blob.txt");
        fs::write(&commented, "## blobtools v1.1\n# name\tlength\n# name\tlength\tgenus.t.6\nctg1\t100\tSalmonella\n")?;
        let t = read_tsv(&commented, true)?;
        assert_eq!(t.header, vec!["name", "length", "genus.t.6"]);
        assert_eq!(t.rows.len(), 1);
        Ok(())
    }

    #[test]
    fn test_read_tsv_keeps_quotes_and_ragged_rows() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("report.tsv");
        fs::write(&path, "# generated\nAssembly\t# contigs\tN50\nS1 \"draft\"\t80\nS2\t90\t70000\n   \n")?;
        let t = read_tsv(&path, false)?;
        assert_eq!(t.header, vec!["Assembly", "# contigs", "N50"]);
        assert_eq!(t.rows[0], vec!["S1 \"draft\"", "80"]);
        assert_eq!(t.get(&t.rows[0], "N50"), None);
        assert_eq!(t.rows.len(), 2);

        let empty = dir.path().join("empty.tsv");
        fs::write(&empty, "")?;
        assert!(read_tsv(&empty, false).is_err());
        assert!(read_tsv(&empty, true).is_err());
        Ok(())
    }

    #[test]
    fn test_glob_sample_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        for s in ["S2", "S1"] {
            let d = dir.path().join(s).join("busco");
            fs::create_dir_all(&d)?;
            fs::write(d.join(format!("short_summary.specific.{}.txt", s)), "x")?;
        }
        fs::create_dir_all(dir.path().join("S3").join("busco"))?;

        let found = glob_sample_files(dir.path(), "busco/short_summary*.txt")?;
        let samples: Vec<&str> = found.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(samples, vec!["S1", "S2"]);
        Ok(())
    }

    #[test]
    fn test_md5_sidecar() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let f = dir.path().join("x.txt");
        fs::write(&f, b"hello")?;
        let side = write_md5_sidecar(&f)?;
        let content = fs::read_to_string(side)?;
        assert_eq!(content, "5d41402abc4b2a76b9719d911017c592  x.txt\n");
        Ok(())
    }
}
