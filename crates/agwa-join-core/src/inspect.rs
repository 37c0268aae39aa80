//! Works out which join, if any, each discretization layer currently carries.
//!
//! Join presence is read off the layer's field names: a joined layer reports
//! qualified names such as `results_k2.SimulationName`, so the prefix of the
//! *last* field before its first `.` is taken as the join alias. Field names
//! should not otherwise contain a `.`; an unjoined table whose last column
//! does will be reported as joined.

use crate::catalog::{elements_dataset, streams_dataset};
use crate::connection::{self, ConnectionDescriptor};
use crate::error::Error;
use crate::host::{FieldValue, HostSession, LayerInfo};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Table name of a simulation's results inside its results store.
pub const RESULTS_TABLE: &str = "results_k2";
pub const SIMULATION_NAME_FIELD: &str = "SimulationName";
pub const RESULTS_STORE_SUFFIX: &str = "_results.gdb";

pub const REMOVAL_WARNING: &str =
    "**If a new simulation is joined, the following join will be removed.**";

/// Column headings of the existing joins table, matching [`JoinRecord`]'s serialized names.
pub const JOIN_TABLE_COLUMNS: [&str; 4] = ["Layer", "Database", "Table", "Simulation Name"];

/// A join between a discretization layer and a simulation's results table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinRecord {
    #[serde(rename = "Layer")]
    pub layer_name: String,
    #[serde(rename = "Database")]
    pub results_database: String,
    #[serde(rename = "Table")]
    pub joined_table: String,
    #[serde(rename = "Simulation Name")]
    pub simulation_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerJoinState {
    /// No layer for this dataset in the active map.
    Missing,
    Unjoined,
    /// Joined to something other than a results table; left alone.
    UnknownJoin { layer_name: String, alias: String },
    Results(JoinRecord),
}

impl LayerJoinState {
    pub fn record(&self) -> Option<&JoinRecord> {
        match self {
            LayerJoinState::Results(record) => Some(record),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinState {
    pub discretization: String,
    pub elements: LayerJoinState,
    pub streams: LayerJoinState,
    pub workspace: Option<PathBuf>,
    pub status: String,
}

impl JoinState {
    pub fn elements_join(&self) -> Option<&JoinRecord> {
        self.elements.record()
    }

    pub fn streams_join(&self) -> Option<&JoinRecord> {
        self.streams.record()
    }

    /// Recognized joins, elements before streams.
    pub fn recognized_joins(&self) -> Vec<JoinRecord> {
        [&self.elements, &self.streams]
            .into_iter()
            .filter_map(LayerJoinState::record)
            .cloned()
            .collect()
    }
}

/// Join alias encoded in a qualified field name, if any.
pub fn join_alias(field_name: &str) -> Option<&str> {
    let mut parts = field_name.split('.');
    let alias = parts.next()?;
    parts.next()?;
    if alias.is_empty() {
        None
    } else {
        Some(alias)
    }
}

/// Simulation name implied by a results store path, `{sim}_results.gdb`.
pub fn simulation_from_results_store(database: &Path) -> Option<String> {
    database
        .file_name()?
        .to_str()?
        .strip_suffix(RESULTS_STORE_SUFFIX)
        .map(str::to_string)
}

pub fn inspect<S: HostSession + ?Sized>(
    session: &S,
    discretization: &str,
) -> Result<JoinState, Error> {
    let layers = session.layers()?;
    let mut workspace = None;

    let mut states = Vec::with_capacity(2);
    for dataset in [elements_dataset(discretization), streams_dataset(discretization)] {
        let mut matches = layers.iter().filter_map(|layer| {
            if !layer.is_feature_layer {
                return None;
            }
            let descriptor = connection::resolve(layer);
            (descriptor.geodatabase_dataset() == Some(dataset.as_str()))
                .then_some((layer, descriptor))
        });

        let state = match matches.next() {
            Some((layer, descriptor)) => {
                if matches.next().is_some() {
                    debug!("Several layers show '{}', inspecting '{}'", dataset, layer.name);
                }
                record_workspace(&mut workspace, descriptor);
                inspect_layer(session, layer)?
            }
            None => {
                debug!("No layer for dataset '{}' in the active map", dataset);
                LayerJoinState::Missing
            }
        };
        states.push(state);
    }

    let streams = states.pop().unwrap_or(LayerJoinState::Missing);
    let elements = states.pop().unwrap_or(LayerJoinState::Missing);
    let status = status_text(&[&elements, &streams]);

    Ok(JoinState {
        discretization: discretization.to_string(),
        elements,
        streams,
        workspace,
        status,
    })
}

fn record_workspace(workspace: &mut Option<PathBuf>, descriptor: ConnectionDescriptor) {
    if let Some(database) = descriptor.database {
        *workspace = Some(database);
    }
}

fn inspect_layer<S: HostSession + ?Sized>(
    session: &S,
    layer: &LayerInfo,
) -> Result<LayerJoinState, Error> {
    let fields = session.list_fields(&layer.name)?;
    let Some(alias) = fields.last().and_then(|field| join_alias(&field.name)) else {
        return Ok(LayerJoinState::Unjoined);
    };

    if alias != RESULTS_TABLE {
        debug!("Layer '{}' is joined to unrecognized table '{}'", layer.name, alias);
        return Ok(LayerJoinState::UnknownJoin {
            layer_name: layer.name.clone(),
            alias: alias.to_string(),
        });
    }

    let destination = connection::resolve_destination(layer).database;
    let simulation_name = sample_simulation_name(session, layer, alias, destination.as_deref())?;

    Ok(LayerJoinState::Results(JoinRecord {
        layer_name: layer.name.clone(),
        results_database: destination
            .map(|database| database.display().to_string())
            .unwrap_or_default(),
        joined_table: alias.to_string(),
        simulation_name,
    }))
}

// Every results store holds a single simulation, so the first non-null value
// names it.
fn sample_simulation_name<S: HostSession + ?Sized>(
    session: &S,
    layer: &LayerInfo,
    alias: &str,
    database: Option<&Path>,
) -> Result<String, Error> {
    let field = format!("{}.{}", alias, SIMULATION_NAME_FIELD);
    let sampled = session
        .field_values(&layer.name, &field, true)?
        .iter()
        .find_map(FieldValue::as_text);

    if let Some(name) = sampled {
        return Ok(name);
    }

    let fallback = database
        .and_then(simulation_from_results_store)
        .unwrap_or_default();
    warn!(
        "No joined rows carry {} on layer '{}', naming the simulation '{}' from its results store",
        field, layer.name, fallback
    );
    Ok(fallback)
}

fn status_text(states: &[&LayerJoinState]) -> String {
    let mut status = String::new();

    let recognized: Vec<&JoinRecord> = states.iter().filter_map(|state| state.record()).collect();
    if !recognized.is_empty() {
        status.push_str(REMOVAL_WARNING);
        for record in recognized {
            status.push_str(&format!(
                "\n\nInput layer: '{}'\nAGWA simulation: '{}'\nResults database: '{}'\nJoined table: '{}'.",
                record.layer_name, record.simulation_name, record.results_database, record.joined_table
            ));
        }
    }

    for state in states {
        if let LayerJoinState::UnknownJoin { alias, .. } = state {
            if !status.is_empty() {
                status.push_str("\n\n");
            }
            status.push_str(&format!("Joined table name is '{}'.", alias));
        }
    }

    status
}
