//! Finds the simulations of a discretization that have imported results.
//!
//! Layout on disk:
//! `{workspace parent}/{delineation}/{discretization}/simulations/{sim}/{sim}_results.gdb`

use crate::error::Error;
use crate::host::TableStore;
use crate::inspect::RESULTS_STORE_SUFFIX;
use glob::Pattern;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

pub const SIMULATIONS_DIR: &str = "simulations";

pub fn simulations_directory(workspace: &Path, delineation: &str, discretization: &str) -> PathBuf {
    workspace
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(delineation)
        .join(discretization)
        .join(SIMULATIONS_DIR)
}

/// Name of a simulation directory, its final path segment.
pub fn simulation_name(simulation_dir: &Path) -> Option<&str> {
    simulation_dir.file_name().and_then(|name| name.to_str())
}

pub fn results_store(simulation_dir: &Path) -> Option<PathBuf> {
    let name = simulation_name(simulation_dir)?;
    Some(simulation_dir.join(format!("{}{}", name, RESULTS_STORE_SUFFIX)))
}

/// Simulation directories whose results store exists, in enumeration order.
pub fn list_eligible_simulations<T: TableStore + ?Sized>(
    store: &T,
    workspace: &Path,
    delineation: &str,
    discretization: &str,
) -> Result<Vec<PathBuf>, Error> {
    let directory = simulations_directory(workspace, delineation, discretization);
    let pattern = format!(
        "{}/*",
        Pattern::escape(&directory.to_string_lossy())
    );

    let mut eligible = Vec::new();
    for entry in glob::glob(&pattern)? {
        let simulation = match entry {
            Ok(path) => path,
            Err(err) => {
                error!("Error reading simulation directory entry: {}", err);
                continue;
            }
        };
        if !simulation.is_dir() {
            continue;
        }

        match results_store(&simulation) {
            Some(results) if store.exists(&results) => {
                debug!("Simulation '{}' has results", simulation.display());
                eligible.push(simulation);
            }
            _ => debug!("Simulation '{}' has no results store", simulation.display()),
        }
    }

    Ok(eligible)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulations_directory_is_beside_workspace() {
        let dir = simulations_directory(Path::new("/agwa/ws.gdb"), "delin1", "ws1");
        assert_eq!(dir, PathBuf::from("/agwa/delin1/ws1/simulations"));
    }

    #[test]
    fn test_results_store_named_after_directory() {
        assert_eq!(
            results_store(Path::new("/agwa/delin1/ws1/simulations/sim_B")),
            Some(PathBuf::from("/agwa/delin1/ws1/simulations/sim_B/sim_B_results.gdb"))
        );
        assert_eq!(simulation_name(Path::new("/a/b/sim_C")), Some("sim_C"));
    }
}
