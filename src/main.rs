use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use env_logger::Builder;
use log::{LevelFilter, debug, error, info};

use bacasm_pipelines::cli::{self, Arguments, Stage};
use bacasm_pipelines::config::defs::{PipelineError, RunConfig};
use bacasm_pipelines::config::settings::build_workflow_config;
use bacasm_pipelines::pipelines::{annotate, assemble, package, survey};
use bacasm_pipelines::utils::file::resolve_path;
use bacasm_pipelines::utils::system::detect_cores;


#[tokio::main]
async fn main() -> Result<()> {
    let run_start = Instant::now();

    let args = cli::parse();

    let log_level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    println!("\n-------------\n BacAsm\n-------------\n");

    let dir = env::current_dir()?;
    info!("The current directory is {:?}", dir);

    let cores = detect_cores(args.cores);
    debug!("Using {} cores for local execution", cores);

    let out_dir = setup_output_dir(&args, &dir)?;
    info!("Output directory: {}", out_dir.display());

    let samplesheet = resolve_path(Path::new(&args.samplesheet), &dir);
    let workflow_dir = resolve_path(Path::new(&args.workflow_dir), &dir);
    let base_config = args.config.as_ref().map(|c| resolve_path(Path::new(c), &dir));
    let workflow = build_workflow_config(&args, base_config.as_deref(), &samplesheet, &out_dir, &workflow_dir)?;

    let stage = args.stage;
    let run_config = Arc::new(RunConfig {
        cwd: dir,
        out_dir,
        args,
        workflow,
        cores,
        log_level,
    });

    info!("Running stage: {}", stage.as_str());
    if let Err(e) = run_stage(stage, run_config).await {
        error!("Pipeline failed: {} at {} milliseconds.", e, run_start.elapsed().as_millis());
        std::process::exit(1);
    }

    println!("Run complete: {} milliseconds.", run_start.elapsed().as_millis());
    Ok(())
}


async fn run_stage(stage: Stage, run_config: Arc<RunConfig>) -> Result<(), PipelineError> {
    match stage {
        Stage::Survey => survey::run(run_config).await,
        Stage::Assemble => assemble::run(run_config).await,
        Stage::Annotate => annotate::run(run_config).await,
        Stage::Package => package::run(run_config).await,
    }
}

/// Sets up output directory
/// If `out_dir` is specified from args, uses it;
/// otherwise, creates a directory named `<prefix>_YYYYMMDD`.
/// Ensures the directory exists.
///
/// # Arguments
/// * `args` - The parsed command-line arguments.
/// * `cwd` - The current working directory.
/// # Returns
/// path to the output directory.
fn setup_output_dir(args: &Arguments, cwd: &Path) -> Result<PathBuf> {
    let out_dir = match &args.out_dir {
        Some(out) => resolve_path(Path::new(out), cwd),
        None => {
            let timestamp = chrono::Local::now().format("%Y%m%d").to_string();
            cwd.join(format!("{}_{}", args.prefix, timestamp))
        }
    };
    fs::create_dir_all(&out_dir)?;
    Ok(out_dir)
}
