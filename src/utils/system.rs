// src/utils/system.rs: System functions

use log::{debug, info};
use sysinfo::System;


/// Determines the number of cores handed to the workflow engine for local runs.
///
/// # Arguments
///
/// * `requested` - Cores asked for on the command line, if any.
///
/// # Returns
/// usize core count, never zero and never above the physical core count.
pub fn detect_cores(requested: Option<usize>) -> usize {
    let physical_cores = System::physical_core_count().unwrap_or(1).max(1);
    let cores = cap_cores(requested, physical_cores);
    debug!("Detected {} physical cores; using {}", physical_cores, cores);
    cores
}

fn cap_cores(requested: Option<usize>, physical_cores: usize) -> usize {
    match requested {
        Some(n) if n > physical_cores => {
            info!("Requested {} cores but only {} physical cores found; using {}", n, physical_cores, physical_cores);
            physical_cores
        }
        Some(n) if n > 0 => n,
        _ => physical_cores,
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_cores_bounds() {
        let all = detect_cores(None);
        assert!(all >= 1);
        assert_eq!(detect_cores(Some(1)), 1);
        assert_eq!(detect_cores(Some(0)), all);
        assert!(detect_cores(Some(100_000)) <= all);
    }

    #[test]
    fn test_cap_cores() {
        assert_eq!(cap_cores(None, 8), 8);
        assert_eq!(cap_cores(Some(0), 8), 8);
        assert_eq!(cap_cores(Some(4), 8), 4);
        assert_eq!(cap_cores(Some(8), 8), 8);
        assert_eq!(cap_cores(Some(64), 8), 8);
    }
}
