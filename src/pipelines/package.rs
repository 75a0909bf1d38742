//! Packaging stage: links finished outputs into a delivery tree and tars it.
use std::fs::{self, File};
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info, warn};

use crate::cli::PackageStage;
use crate::config::defs::{PipelineError, RunConfig, PACKAGE_DIR};
use crate::pipelines::load_samplesheet;
use crate::utils::file::{resolve_path, write_md5_sidecar};
use crate::utils::layout::{Mate, SampleLayout};
use crate::utils::samplesheet::{Sample, Samplesheet};


/// Source files a sample contributes to a package stage. Paths recorded on
/// the sample win over the default layout.
pub fn stage_files(sample: &Sample, out_dir: &Path, stage: PackageStage) -> Vec<PathBuf> {
    let layout = SampleLayout::new(out_dir, &sample.id);
    let or_layout = |field: &Option<PathBuf>, default: PathBuf| field.clone().unwrap_or(default);
    match stage {
        PackageStage::Reads => {
            let mut files = vec![or_layout(&sample.trim_r1, layout.trimmed(Mate::R1))];
            if sample.is_paired() {
                files.push(or_layout(&sample.trim_r2, layout.trimmed(Mate::R2)));
            }
            files.push(or_layout(&sample.trim_singles, layout.trimmed(Mate::Singles)));
            files
        }
        PackageStage::Assembly => vec![or_layout(&sample.assembly, layout.assembly())],
        PackageStage::Annotation => vec![
            or_layout(&sample.ann_fna, layout.prokka("fna")),
            or_layout(&sample.ann_ffn, layout.prokka("ffn")),
            or_layout(&sample.ann_faa, layout.prokka("faa")),
            layout.prokka("gff"),
        ],
    }
}

/// Sample IDs from an Enterobase pass list, one per line.
pub fn read_pass_list(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .map_err(|e| anyhow!("Cannot read pass list {}: {}", path.display(), e))?;
    Ok(text
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string())
        .collect())
}

/// `<prefix>_<organism>_<stage>`, with `all` when no organism is given.
pub fn package_name(prefix: &str, organism: Option<&str>, stage: PackageStage) -> String {
    format!("{}_{}_{}", prefix, organism.unwrap_or("all"), stage.as_str())
}

fn replace_link(src: &Path, dest: &Path) -> Result<()> {
    if fs::symlink_metadata(dest).is_ok() {
        fs::remove_file(dest)?;
    }
    let target = fs::canonicalize(src)?;
    symlink(&target, dest)?;
    Ok(())
}

/// Links every sample's stage files into `<package_dir>/<sample>/`. Whatever
/// an earlier run left in `package_dir` is removed first, so only samples in
/// `sheet` end up in the package.
///
/// # Arguments
///
/// * `package_dir` - Directory for this package, created if needed.
/// * `sheet` - Samples to package.
/// * `out_dir` - Run directory used for default output paths.
/// * `cwd` - Base for relative paths recorded in the samplesheet.
/// * `stage` - Which outputs to collect.
///
/// # Returns
/// Number of files linked.
pub fn link_stage(package_dir: &Path, sheet: &Samplesheet, out_dir: &Path, cwd: &Path, stage: PackageStage) -> Result<usize> {
    if fs::symlink_metadata(package_dir).is_ok() {
        debug!("Clearing previous package {}", package_dir.display());
        fs::remove_dir_all(package_dir)?;
    }
    let mut linked = 0;
    for sample in sheet.iter() {
        let sample_dir = package_dir.join(&sample.id);
        for src in stage_files(sample, out_dir, stage) {
            let src = resolve_path(&src, cwd);
            if !src.exists() {
                warn!("{}: {} missing; not packaged", sample.id, src.display());
                continue;
            }
            let Some(name) = src.file_name() else {
                continue;
            };
            fs::create_dir_all(&sample_dir)?;
            replace_link(&src, &sample_dir.join(name))?;
            debug!("Linked {}", src.display());
            linked += 1;
        }
    }
    Ok(linked)
}

fn tarball_path(package_dir: &Path) -> Result<PathBuf> {
    let name = package_dir
        .file_name()
        .ok_or_else(|| anyhow!("No directory name in {}", package_dir.display()))?
        .to_string_lossy()
        .into_owned();
    Ok(package_dir.with_file_name(format!("{}.tar.gz", name)))
}

/// Deletes a tarball and md5 sidecar left by an earlier run.
pub fn remove_tarball(package_dir: &Path) -> Result<()> {
    let tarball = tarball_path(package_dir)?;
    let sidecar = tarball.with_extension("gz.md5");
    for path in [tarball, sidecar] {
        if path.exists() {
            fs::remove_file(&path)?;
            debug!("Removed stale {}", path.display());
        }
    }
    Ok(())
}

/// Writes `<package_dir>.tar.gz` with symlinks resolved, plus its md5 sidecar.
///
/// # Returns
/// Path to the tarball.
pub fn write_tarball(package_dir: &Path) -> Result<PathBuf> {
    let tarball = tarball_path(package_dir)?;
    let name = package_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let encoder = GzEncoder::new(File::create(&tarball)?, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(true);
    builder.append_dir_all(&name, package_dir)?;
    builder.into_inner()?.finish()?;

    write_md5_sidecar(&tarball)?;
    Ok(tarball)
}


/// Run function for the packaging stage
///
/// # Arguments
///
/// * `config` - RunConfig struct from main.
///
/// # Returns
/// Result<(), PipelineError>
pub async fn run(config: Arc<RunConfig>) -> Result<(), PipelineError> {
    let mut sheet = load_samplesheet(&config)?;

    let organism = config.args.enterobase_group.as_deref();
    if let Some(group) = organism {
        let list = config.reports_dir().join(format!("enterobase_{}.txt", group));
        if !list.exists() {
            return Err(PipelineError::MissingInput(list));
        }
        let passing = read_pass_list(&list)?;
        sheet = sheet.subset(&passing);
        info!("Packaging {} samples passing Enterobase {}", sheet.len(), group);
    }

    for sample in sheet.iter() {
        let missing = sample.missing_paths();
        if !missing.is_empty() {
            let listed: Vec<String> = missing.iter().map(|p| p.display().to_string()).collect();
            warn!("{}: samplesheet paths not on disk: {}", sample.id, listed.join(", "));
        }
    }

    let stages = if config.args.package_stages.is_empty() {
        vec![PackageStage::Assembly]
    } else {
        config.args.package_stages.clone()
    };

    let package_root = config.out_dir.join(PACKAGE_DIR);
    for stage in stages {
        let name = package_name(&config.args.prefix, organism, stage);
        let package_dir = package_root.join(&name);
        let linked = link_stage(&package_dir, &sheet, &config.out_dir, &config.cwd, stage)?;
        if linked == 0 {
            warn!("Nothing to package for {}", name);
            remove_tarball(&package_dir)?;
            continue;
        }
        info!("Linked {} files into {}", linked, package_dir.display());

        if config.args.no_tar {
            remove_tarball(&package_dir)?;
        } else {
            let tarball = write_tarball(&package_dir)?;
            info!("Wrote {}", tarball.display());
        }
    }
    Ok(())
}
