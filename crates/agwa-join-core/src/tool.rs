//! The "Join Results" tool: parameter refresh and execution.

use crate::catalog;
use crate::config::AppConfig;
use crate::error::Error;
use crate::host::{HostSession, LayerHandle};
use crate::inspect::{self, JoinRecord, LayerJoinState};
use crate::messages::Messenger;
use crate::simulations;
use crate::transition;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Parameter values derived for one discretization. Rebuilt on every refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolParameters {
    pub discretization: Option<String>,
    pub existing_joins_status: String,
    pub existing_joins: Vec<JoinRecord>,
    /// Simulations that can be joined.
    pub simulations: Vec<PathBuf>,
    pub joined_elements: Option<LayerHandle>,
    pub joined_streams: Option<LayerHandle>,
    pub workspace: Option<PathBuf>,
    pub delineation: Option<String>,
    pub debug: bool,
    pub save_intermediate_outputs: bool,
}

impl ToolParameters {
    /// Eligible simulation matching a directory path or a simulation name.
    pub fn find_simulation(&self, name_or_path: &str) -> Option<&PathBuf> {
        let wanted = Path::new(name_or_path);
        self.simulations
            .iter()
            .find(|simulation| simulation.as_path() == wanted)
            .or_else(|| {
                self.simulations
                    .iter()
                    .find(|simulation| simulations::simulation_name(simulation) == Some(name_or_path))
            })
    }
}

#[derive(Debug, Clone, Default)]
pub struct JoinResultsTool {
    debug: bool,
    save_intermediate_outputs: bool,
}

impl JoinResultsTool {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            debug: config.debug,
            save_intermediate_outputs: config.save_intermediate_outputs,
        }
    }

    pub fn discretizations<S: HostSession + ?Sized>(&self, session: &S) -> Result<Vec<String>, Error> {
        catalog::list_discretizations(session)
    }

    /// Derive every parameter for `discretization` from the live session.
    pub fn refresh<S: HostSession + ?Sized>(
        &self,
        session: &S,
        discretization: &str,
        messenger: &dyn Messenger,
    ) -> Result<ToolParameters, Error> {
        let state = inspect::inspect(session, discretization)?;
        let mut params = ToolParameters {
            discretization: Some(discretization.to_string()),
            existing_joins_status: state.status.clone(),
            existing_joins: state.recognized_joins(),
            workspace: state.workspace.clone(),
            debug: self.debug,
            save_intermediate_outputs: self.save_intermediate_outputs,
            ..Default::default()
        };

        for layer_state in [&state.elements, &state.streams] {
            if let LayerJoinState::UnknownJoin { layer_name, alias } = layer_state {
                messenger.warning(&format!(
                    "Layer '{}' is joined to '{}', which is not a results table. It will not be removed.",
                    layer_name, alias
                ));
            }
        }

        match &state.workspace {
            Some(workspace) if session.exists(&catalog::metadata_table(workspace)) => {
                let delineation = catalog::lookup_delineation(session, workspace, discretization)?;
                params.simulations = simulations::list_eligible_simulations(
                    session,
                    workspace,
                    &delineation,
                    discretization,
                )?;
                params.delineation = Some(delineation);
            }
            Some(workspace) => {
                debug!("No {} in {}", catalog::META_DISCRETIZATION, workspace.display());
            }
            None => {
                debug!("No layers found for discretization '{}'", discretization);
            }
        }

        if self.debug {
            messenger.debug(&format!(
                "Discretization '{}': workspace {:?}, delineation {:?}, {} existing join(s), {} eligible simulation(s)",
                discretization,
                params.workspace,
                params.delineation,
                params.existing_joins.len(),
                params.simulations.len()
            ));
        }

        Ok(params)
    }

    /// Replace the discretization's results join with the simulation in `target`.
    ///
    /// Parameters are refreshed first, so the joins removed are the ones in
    /// the map right now and `target` must still be eligible.
    pub fn execute<S: HostSession + ?Sized>(
        &self,
        session: &mut S,
        discretization: &str,
        target: &Path,
        messenger: &dyn Messenger,
    ) -> Result<ToolParameters, Error> {
        let mut params = self.refresh(&*session, discretization, messenger)?;
        if !params.simulations.iter().any(|simulation| simulation == target) {
            return Err(Error::IneligibleSimulation(target.to_path_buf()));
        }

        let outcome = transition::transition(
            session,
            discretization,
            &params.existing_joins,
            target,
            messenger,
        )?;
        info!(
            "Joined '{}' and '{}' to {}",
            outcome.elements,
            outcome.streams,
            target.display()
        );

        params.joined_elements = Some(outcome.elements);
        params.joined_streams = Some(outcome.streams);
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_simulation_by_name_or_path() {
        let params = ToolParameters {
            simulations: vec![
                PathBuf::from("/agwa/d/ws1/simulations/sim_A"),
                PathBuf::from("/agwa/d/ws1/simulations/sim_B"),
            ],
            ..Default::default()
        };
        assert_eq!(
            params.find_simulation("sim_B"),
            Some(&PathBuf::from("/agwa/d/ws1/simulations/sim_B"))
        );
        assert_eq!(
            params.find_simulation("/agwa/d/ws1/simulations/sim_A"),
            Some(&PathBuf::from("/agwa/d/ws1/simulations/sim_A"))
        );
        assert_eq!(params.find_simulation("sim_C"), None);
    }

    #[test]
    fn test_new_copies_flags() {
        let config = AppConfig {
            debug: true,
            save_intermediate_outputs: true,
            ..Default::default()
        };
        let tool = JoinResultsTool::new(&config);
        assert!(tool.debug);
        assert!(tool.save_intermediate_outputs);
    }
}
