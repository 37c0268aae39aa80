//! Replaces a discretization's results join.
//!
//! A transition is staged: [`plan`] checks everything that can be checked
//! without touching the map, then [`apply`] removes the old joins and adds the
//! elements and streams joins. Once the map has been changed, a failing step
//! is reported as [`Error::PartialTransition`]; nothing is rolled back.

use crate::catalog::{elements_dataset, streams_dataset};
use crate::connection;
use crate::error::Error;
use crate::host::{HostSession, JoinRequest, JoinType, LayerHandle, LayerInfo, MapSession};
use crate::inspect::{JoinRecord, RESULTS_STORE_SUFFIX, RESULTS_TABLE};
use crate::messages::Messenger;
use crate::simulations;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const ELEMENT_ID_FIELD: &str = "Element_ID";
pub const STREAM_ID_FIELD: &str = "Stream_ID";

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    pub discretization: String,
    /// Joins to drop, in the order they will be removed.
    pub removals: Vec<JoinRecord>,
    pub simulation_name: String,
    pub results_store: PathBuf,
    pub results_table: PathBuf,
    pub elements_layer: String,
    pub streams_layer: String,
}

impl TransitionPlan {
    /// Elements join then streams join. Streams are keyed by `Stream_ID` but
    /// matched against the same per-element results rows.
    pub fn join_requests(&self) -> [JoinRequest; 2] {
        let request = |layer: &str, local_field: &str| JoinRequest {
            layer: layer.to_string(),
            local_field: local_field.to_string(),
            join_table: self.results_table.clone(),
            join_field: ELEMENT_ID_FIELD.to_string(),
            join_type: JoinType::KeepAll,
            index_join_fields: false,
            rebuild_index: false,
        };
        [
            request(&self.elements_layer, ELEMENT_ID_FIELD),
            request(&self.streams_layer, STREAM_ID_FIELD),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub elements: LayerHandle,
    pub streams: LayerHandle,
}

/// Validate a transition to the simulation in `target` without changing the map.
///
/// Every record must be a results join on the discretization's elements or
/// streams layer, and both join keys must exist on both sides.
pub fn plan<S: HostSession + ?Sized>(
    session: &S,
    discretization: &str,
    existing_joins: &[JoinRecord],
    target: &Path,
) -> Result<TransitionPlan, Error> {
    let simulation_name = simulations::simulation_name(target)
        .ok_or_else(|| Error::InvalidSimulationPath(target.to_path_buf()))?
        .to_string();
    let results_store = target.join(format!("{}{}", simulation_name, RESULTS_STORE_SUFFIX));
    let results_table = results_store.join(RESULTS_TABLE);
    if !session.exists(&results_table) {
        return Err(Error::TableNotFound(results_table));
    }
    if !session
        .table_fields(&results_table)?
        .iter()
        .any(|field| field == ELEMENT_ID_FIELD)
    {
        return Err(Error::FieldNotFound {
            source_name: results_table.display().to_string(),
            field: ELEMENT_ID_FIELD.to_string(),
        });
    }

    let layers = session.layers()?;
    let elements_name = elements_dataset(discretization);
    let streams_name = streams_dataset(discretization);
    let elements_layer = dataset_layer(&layers, &elements_name)?;
    let streams_layer = dataset_layer(&layers, &streams_name)?;

    let mut seen = HashSet::new();
    for record in existing_joins {
        if record.joined_table != RESULTS_TABLE {
            return Err(Error::UnrecognizedJoin {
                layer: record.layer_name.clone(),
                table: record.joined_table.clone(),
            });
        }
        if !layers.iter().any(|layer| layer.name == record.layer_name) {
            return Err(Error::LayerNotFound(record.layer_name.clone()));
        }
        if record.layer_name != elements_layer && record.layer_name != streams_layer {
            return Err(Error::ForeignLayer {
                layer: record.layer_name.clone(),
                discretization: discretization.to_string(),
            });
        }
        if !seen.insert(record.layer_name.as_str()) {
            return Err(Error::DuplicateJoin {
                layer: record.layer_name.clone(),
                join: record.joined_table.clone(),
            });
        }
    }

    require_key(session, &elements_layer, &elements_name, ELEMENT_ID_FIELD)?;
    require_key(session, &streams_layer, &streams_name, STREAM_ID_FIELD)?;

    debug!(
        "Planned transition of '{}' to '{}' with {} removal(s)",
        discretization,
        simulation_name,
        existing_joins.len()
    );

    Ok(TransitionPlan {
        discretization: discretization.to_string(),
        removals: existing_joins.to_vec(),
        simulation_name,
        results_store,
        results_table,
        elements_layer,
        streams_layer,
    })
}

/// First feature layer in map order showing `dataset`, the one the inspector reports.
fn dataset_layer(layers: &[LayerInfo], dataset: &str) -> Result<String, Error> {
    layers
        .iter()
        .find(|layer| {
            layer.is_feature_layer
                && connection::resolve(layer).geodatabase_dataset() == Some(dataset)
        })
        .map(|layer| layer.name.clone())
        .ok_or_else(|| Error::LayerNotFound(dataset.to_string()))
}

// Joined layers qualify base fields with the dataset name.
fn require_key<S: MapSession + ?Sized>(
    session: &S,
    layer: &str,
    dataset: &str,
    key: &str,
) -> Result<(), Error> {
    let qualified = format!("{}.{}", dataset, key);
    if session
        .list_fields(layer)?
        .iter()
        .any(|field| field.name == key || field.name == qualified)
    {
        Ok(())
    } else {
        Err(Error::FieldNotFound {
            source_name: layer.to_string(),
            field: key.to_string(),
        })
    }
}

/// Remove the planned joins, then join elements and streams to the results table.
pub fn apply<S: MapSession + ?Sized>(
    session: &mut S,
    plan: &TransitionPlan,
    messenger: &dyn Messenger,
) -> Result<TransitionOutcome, Error> {
    let mut completed: Vec<String> = Vec::new();

    for record in &plan.removals {
        messenger.message(&format!(
            "Removing join:\n  Layer: '{}'\n  Simulation: '{}'\n  Database: '{}'\n  Table: '{}'\n",
            record.layer_name, record.simulation_name, record.results_database, record.joined_table
        ));
        let step = format!("remove join '{}' from '{}'", record.joined_table, record.layer_name);
        session
            .remove_join(&record.layer_name, &record.joined_table)
            .map_err(|err| step_failed(&completed, &step, err))?;
        info!("Removed join '{}' from '{}'", record.joined_table, record.layer_name);
        completed.push(step);
    }

    let [elements_request, streams_request] = plan.join_requests();
    let elements = add_join(session, plan, &elements_request, messenger, &mut completed)?;
    let streams = add_join(session, plan, &streams_request, messenger, &mut completed)?;

    Ok(TransitionOutcome { elements, streams })
}

/// [`plan`] followed by [`apply`].
pub fn transition<S: HostSession + ?Sized>(
    session: &mut S,
    discretization: &str,
    existing_joins: &[JoinRecord],
    target: &Path,
    messenger: &dyn Messenger,
) -> Result<TransitionOutcome, Error> {
    let plan = plan(&*session, discretization, existing_joins, target)?;
    apply(session, &plan, messenger)
}

fn add_join<S: MapSession + ?Sized>(
    session: &mut S,
    plan: &TransitionPlan,
    request: &JoinRequest,
    messenger: &dyn Messenger,
    completed: &mut Vec<String>,
) -> Result<LayerHandle, Error> {
    messenger.message(&format!(
        "Adding join:\n  Layer: '{}'\n  Simulation: '{}'\n  Database: '{}'\n  Table: '{}'\n",
        request.layer,
        plan.simulation_name,
        plan.results_store.display(),
        RESULTS_TABLE
    ));
    let step = format!("add join '{}' to '{}'", RESULTS_TABLE, request.layer);
    let handle = session
        .add_join(request)
        .map_err(|err| step_failed(completed.as_slice(), &step, err))?;
    info!(
        "Joined '{}' to '{}' on {} = {}",
        request.layer,
        request.join_table.display(),
        request.local_field,
        request.join_field
    );
    completed.push(step);
    Ok(handle)
}

fn step_failed(completed: &[String], step: &str, err: Error) -> Error {
    if completed.is_empty() {
        return err;
    }
    Error::PartialTransition {
        completed: completed.join(", "),
        failed: step.to_string(),
        source: Box::new(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plan() -> TransitionPlan {
        TransitionPlan {
            discretization: "ws1".to_string(),
            removals: vec![],
            simulation_name: "sim_new".to_string(),
            results_store: PathBuf::from("/s/sim_new/sim_new_results.gdb"),
            results_table: PathBuf::from("/s/sim_new/sim_new_results.gdb/results_k2"),
            elements_layer: "ws1_elements".to_string(),
            streams_layer: "ws1_streams".to_string(),
        }
    }

    #[test]
    fn test_join_requests_use_asymmetric_stream_key() {
        let [elements, streams] = sample_plan().join_requests();

        assert_eq!(elements.layer, "ws1_elements");
        assert_eq!(elements.local_field, "Element_ID");
        assert_eq!(elements.join_field, "Element_ID");

        assert_eq!(streams.layer, "ws1_streams");
        assert_eq!(streams.local_field, "Stream_ID");
        assert_eq!(streams.join_field, "Element_ID");

        for request in [&elements, &streams] {
            assert_eq!(request.join_type, JoinType::KeepAll);
            assert!(!request.index_join_fields);
            assert!(!request.rebuild_index);
            assert_eq!(
                request.join_table,
                PathBuf::from("/s/sim_new/sim_new_results.gdb/results_k2")
            );
        }
    }

    #[test]
    fn test_first_failure_is_not_partial() {
        let err = step_failed(&[], "add join", Error::Other("boom".to_string()));
        assert!(matches!(err, Error::Other(_)));
    }

    #[test]
    fn test_later_failure_is_partial() {
        let completed = vec!["remove join 'results_k2' from 'ws1_elements'".to_string()];
        let err = step_failed(&completed, "add join", Error::Other("boom".to_string()));
        match err {
            Error::PartialTransition { completed, failed, .. } => {
                assert!(completed.contains("ws1_elements"));
                assert_eq!(failed, "add join");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
