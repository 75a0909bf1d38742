//! Functions and structs for building and running external command lines

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{anyhow, Result};
use log::{debug, error, info, warn};
use tokio::process::Command;

use crate::config::defs::{PipelineError, RunConfig, BEDTOOLS_TAG, SNAKEMAKE_TAG, TOOL_VERSIONS};


/// Tool-specific settings that turn into an argument list.
pub trait ArgGenerator {
    fn generate_args(&self, config: &RunConfig) -> Result<Vec<String>>;
}


pub mod snakemake {
    use std::path::PathBuf;
    use anyhow::{anyhow, Result};
    use tokio::process::Command;
    use crate::config::defs::{RunConfig, SNAKEMAKE_TAG};
    use crate::config::scheduler::cluster_template;
    use crate::utils::command::ArgGenerator;
    use crate::utils::streams::{read_child_output_to_vec, ChildStream};

    pub async fn snakemake_presence_check() -> Result<String> {
        let mut child = Command::new(SNAKEMAKE_TAG)
            .arg("--version")
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| anyhow!("Failed to spawn {}: {}. Is snakemake installed?", SNAKEMAKE_TAG, e))?;

        let lines = read_child_output_to_vec(&mut child, ChildStream::Stdout).await?;
        child.wait().await?;
        let first_line = lines
            .first()
            .ok_or_else(|| anyhow!("No output from snakemake --version"))?;
        let version = first_line.trim().to_string();
        if version.is_empty() {
            return Err(anyhow!("Empty version number in snakemake --version output"));
        }
        Ok(version)
    }

    #[derive(Debug, Clone)]
    pub struct SnakemakeConfig {
        pub snakefile: PathBuf,
        pub configfile: PathBuf,
        pub unlock: bool,
    }

    impl ArgGenerator for SnakemakeConfig {
        fn generate_args(&self, config: &RunConfig) -> Result<Vec<String>> {
            let args = &config.args;
            let mut args_vec: Vec<String> = Vec::new();
            args_vec.push("--snakefile".to_string());
            args_vec.push(self.snakefile.to_string_lossy().to_string());
            args_vec.push("--configfile".to_string());
            args_vec.push(self.configfile.to_string_lossy().to_string());
            args_vec.push("--directory".to_string());
            args_vec.push(config.out_dir.to_string_lossy().to_string());

            if self.unlock {
                args_vec.push("--unlock".to_string());
                return Ok(args_vec);
            }

            args_vec.push("--rerun-incomplete".to_string());
            args_vec.push("--printshellcmds".to_string());
            match cluster_template(args.scheduler, args.partition.as_deref()) {
                Some(template) => {
                    args_vec.push("--jobs".to_string());
                    args_vec.push(args.jobs.to_string());
                    args_vec.push("--cluster".to_string());
                    args_vec.push(template);
                }
                None => {
                    args_vec.push("--cores".to_string());
                    args_vec.push(config.cores.to_string());
                }
            }
            if args.dry_run {
                args_vec.push("--dry-run".to_string());
            }
            Ok(args_vec)
        }
    }
}


pub mod bedtools {
    use std::path::PathBuf;
    use anyhow::{anyhow, Result};
    use tokio::process::Command;
    use crate::config::defs::{BedtoolsSubcommand, RunConfig, BEDTOOLS_TAG};
    use crate::utils::command::ArgGenerator;
    use crate::utils::streams::{read_child_output_to_vec, ChildStream};

    pub async fn bedtools_presence_check() -> Result<String> {
        let mut child = Command::new(BEDTOOLS_TAG)
            .arg("--version")
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| anyhow!("Failed to spawn {}: {}. Is bedtools installed?", BEDTOOLS_TAG, e))?;

        let lines = read_child_output_to_vec(&mut child, ChildStream::Stdout).await?;
        child.wait().await?;
        let first_line = lines
            .first()
            .ok_or_else(|| anyhow!("No output from bedtools --version"))?;
        let version = first_line
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| anyhow!("Invalid bedtools --version output: {}", first_line))?
            .to_string();
        Ok(version)
    }

    #[derive(Debug, Clone)]
    pub struct BedtoolsConfig {
        pub subcommand: BedtoolsSubcommand,
        pub a: PathBuf,
        pub b: PathBuf,
    }

    impl ArgGenerator for BedtoolsConfig {
        fn generate_args(&self, _config: &RunConfig) -> Result<Vec<String>> {
            let mut args_vec: Vec<String> = Vec::new();
            match self.subcommand {
                BedtoolsSubcommand::Subtract => args_vec.push("subtract".to_string()),
            }
            args_vec.push("-a".to_string());
            args_vec.push(self.a.to_string_lossy().to_string());
            args_vec.push("-b".to_string());
            args_vec.push(self.b.to_string_lossy().to_string());
            Ok(args_vec)
        }
    }
}


pub fn generate_cli(tool: &str, config: &RunConfig, tool_config: Option<&dyn ArgGenerator>) -> Result<Vec<String>> {
    let cmd = match tool {
        SNAKEMAKE_TAG | BEDTOOLS_TAG => tool_config
            .ok_or_else(|| anyhow!("{} requires a tool config", tool))?
            .generate_args(config)?,
        _ => return Err(anyhow!("Unknown tool: {}", tool)),
    };
    Ok(cmd)
}


pub async fn check_version(tool: &str) -> Result<String> {
    let version = match tool {
        SNAKEMAKE_TAG => snakemake::snakemake_presence_check().await,
        BEDTOOLS_TAG => bedtools::bedtools_presence_check().await,
        _ => return Err(anyhow!("Unknown tool: {}", tool)),
    };
    Ok(version?)
}

/// Leading (major, minor) of a version string such as "v2.30.0" or "7.32.4".
pub fn parse_version(version: &str) -> Option<(u32, u32)> {
    let trimmed = version.trim().trim_start_matches('v');
    let mut parts = trimmed.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor: String = parts
        .next()
        .unwrap_or("0")
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let minor = if minor.is_empty() { 0 } else { minor.parse().ok()? };
    Some((major, minor))
}

/// Confirms each tool is present and at least the version in TOOL_VERSIONS.
pub async fn check_versions(tools: Vec<&str>) -> Result<()> {
    for tool in tools {
        let version = check_version(tool).await?;
        if let (Some(found), Some(required)) = (parse_version(&version), TOOL_VERSIONS.get(tool)) {
            if found < *required {
                return Err(anyhow!(
                    "{} version {} is older than required {}.{}",
                    tool, version, required.0, required.1
                ));
            }
        } else {
            warn!("Could not compare {} version '{}'", tool, version);
        }
        info!("{} version: {}", tool, version);
    }
    Ok(())
}


/// Runs a tool to completion, returning stdout lines. stderr is logged.
///
/// # Arguments
///
/// * `tool` - Executable name.
/// * `args` - Argument list.
///
/// # Returns
/// Result<Vec<String>, PipelineError>; non-zero exit is ToolExecution.
pub async fn run_command(tool: &str, args: &[String]) -> Result<Vec<String>, PipelineError> {
    debug!("Running {} {}", tool, args.join(" "));
    let output = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| PipelineError::ToolExecution {
            tool: tool.to_string(),
            error: e.to_string(),
        })?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    for line in stderr.lines() {
        debug!("[{}] {}", tool, line);
    }
    if !output.status.success() {
        let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
        error!("{} exited with {}", tool, output.status);
        return Err(PipelineError::ToolExecution {
            tool: tool.to_string(),
            error: format!(
                "exit status {}: {}",
                output.status,
                tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
            ),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).lines().map(|l| l.to_string()).collect())
}


/// Runs the workflow engine for one stage. Unlocks first when asked.
///
/// # Arguments
///
/// * `config` - RunConfig struct from main.
/// * `snakefile` - Workflow definition for the stage.
/// * `configfile` - Stage YAML written by the config manager.
///
/// # Returns
/// Result<(), PipelineError>
pub async fn run_workflow(config: &RunConfig, snakefile: &Path, configfile: &Path) -> Result<(), PipelineError> {
    if !snakefile.exists() {
        return Err(PipelineError::MissingInput(snakefile.to_path_buf()));
    }
    check_versions(vec![SNAKEMAKE_TAG]).await?;

    if config.args.unlock {
        let unlock = snakemake::SnakemakeConfig {
            snakefile: snakefile.to_path_buf(),
            configfile: configfile.to_path_buf(),
            unlock: true,
        };
        let unlock_args = generate_cli(SNAKEMAKE_TAG, config, Some(&unlock))?;
        info!("Unlocking {}", config.out_dir.display());
        run_command(SNAKEMAKE_TAG, &unlock_args).await?;
    }

    let run = snakemake::SnakemakeConfig {
        snakefile: snakefile.to_path_buf(),
        configfile: configfile.to_path_buf(),
        unlock: false,
    };
    let run_args = generate_cli(SNAKEMAKE_TAG, config, Some(&run))?;
    info!("Starting workflow {}", snakefile.display());
    let stdout = run_command(SNAKEMAKE_TAG, &run_args).await?;
    for line in stdout {
        debug!("[{}] {}", SNAKEMAKE_TAG, line);
    }
    Ok(())
}


/// Features of `a` not overlapped by `b`, via `bedtools subtract`.
pub async fn bedtools_subtract(config: &RunConfig, a: &Path, b: &Path) -> Result<Vec<String>, PipelineError> {
    let bt_config = bedtools::BedtoolsConfig {
        subcommand: crate::config::defs::BedtoolsSubcommand::Subtract,
        a: PathBuf::from(a),
        b: PathBuf::from(b),
    };
    let args = generate_cli(BEDTOOLS_TAG, config, Some(&bt_config))?;
    run_command(BEDTOOLS_TAG, &args).await
}
