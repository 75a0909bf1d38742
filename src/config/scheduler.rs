//! Execution environment descriptors handed to the workflow engine.
use crate::cli::Scheduler;

const DEFAULT_PARTITION: &str = "normal";

/// Submission template for cluster execution, or `None` when jobs run locally.
/// Braced fields are left for the workflow engine to fill per rule.
///
/// # Arguments
///
/// * `scheduler` - Scheduler family.
/// * `partition` - Partition (SLURM) or queue (LSF/PBS).
///
/// # Returns
/// Option<String> of the submit command template.
pub fn cluster_template(scheduler: Scheduler, partition: Option<&str>) -> Option<String> {
    let partition = partition.unwrap_or(DEFAULT_PARTITION);
    match scheduler {
        Scheduler::Local => None,
        Scheduler::Slurm => Some(format!(
            "sbatch --parsable -p {} -c {{threads}} --mem={{resources.mem_mb}} -t {{resources.time}} -J {{rule}}",
            partition
        )),
        Scheduler::Lsf => Some(format!(
            "bsub -q {} -n {{threads}} -M {{resources.mem_mb}} -R \"rusage[mem={{resources.mem_mb}}] span[hosts=1]\" -W {{resources.time}} -J {{rule}}",
            partition
        )),
        Scheduler::Pbs => Some(format!(
            "qsub -q {} -l select=1:ncpus={{threads}}:mem={{resources.mem_mb}}mb -l walltime={{resources.time}} -N {{rule}}",
            partition
        )),
    }
}
