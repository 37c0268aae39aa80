//! Discovers the discretizations available in the active map.

use crate::connection;
use crate::error::Error;
use crate::host::{FieldValue, HostSession, TableStore, WhereClause};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Metadata table stored beside every discretization dataset.
pub const META_DISCRETIZATION: &str = "metaDiscretization";
pub const DISCRETIZATION_NAME_FIELD: &str = "DiscretizationName";
pub const DELINEATION_NAME_FIELD: &str = "DelineationName";

pub const ELEMENTS_SUFFIX: &str = "_elements";
pub const STREAMS_SUFFIX: &str = "_streams";

pub fn metadata_table(workspace: &Path) -> PathBuf {
    workspace.join(META_DISCRETIZATION)
}

pub fn elements_dataset(discretization: &str) -> String {
    format!("{}{}", discretization, ELEMENTS_SUFFIX)
}

pub fn streams_dataset(discretization: &str) -> String {
    format!("{}{}", discretization, STREAMS_SUFFIX)
}

/// Candidate discretization name for a dataset: the dataset name with a
/// trailing `_elements` removed.
pub fn discretization_candidate(dataset: &str) -> &str {
    dataset.strip_suffix(ELEMENTS_SUFFIX).unwrap_or(dataset)
}

/// List discretization names in layer order.
///
/// Only feature layers backed by a file geodatabase that carries a
/// `metaDiscretization` table are considered, and a name is listed only when
/// the metadata table has a matching row. The stored name is returned rather
/// than the candidate derived from the dataset. Duplicates are kept.
pub fn list_discretizations<S: HostSession + ?Sized>(session: &S) -> Result<Vec<String>, Error> {
    let mut discretizations = Vec::new();

    for layer in session.layers()? {
        if !layer.is_feature_layer || !layer.supports_connection_properties() {
            continue;
        }
        let descriptor = connection::resolve(&layer);
        if !descriptor.is_file_geodatabase() {
            continue;
        }
        let (Some(workspace), Some(dataset)) =
            (descriptor.database.as_deref(), descriptor.dataset.as_deref())
        else {
            continue;
        };

        let table = metadata_table(workspace);
        if !session.exists(&table) {
            debug!("No {} beside layer '{}'", META_DISCRETIZATION, layer.name);
            continue;
        }

        let candidate = discretization_candidate(dataset);
        let filter = WhereClause::equals(session, workspace, DISCRETIZATION_NAME_FIELD, candidate);
        let rows = session.search(&table, &[DISCRETIZATION_NAME_FIELD], Some(&filter))?;
        for row in rows {
            if let Some(name) = row.first().and_then(FieldValue::as_text) {
                debug!("Layer '{}' belongs to discretization '{}'", layer.name, name);
                discretizations.push(name);
            }
        }
    }

    Ok(discretizations)
}

/// Database backing the elements or streams dataset of `discretization`.
pub fn resolve_workspace<S: HostSession + ?Sized>(
    session: &S,
    discretization: &str,
) -> Result<Option<PathBuf>, Error> {
    let elements = elements_dataset(discretization);
    let streams = streams_dataset(discretization);

    for layer in session.layers()? {
        if !layer.is_feature_layer {
            continue;
        }
        let descriptor = connection::resolve(&layer);
        match descriptor.geodatabase_dataset() {
            Some(dataset) if dataset == elements || dataset == streams => {
                if let Some(database) = descriptor.database {
                    return Ok(Some(database));
                }
            }
            _ => {}
        }
    }

    Ok(None)
}

/// Delineation owning `discretization`, read from the metadata table.
///
/// No matching row is an error. When several rows match, the first one wins.
pub fn lookup_delineation<T: TableStore + ?Sized>(
    store: &T,
    workspace: &Path,
    discretization: &str,
) -> Result<String, Error> {
    let rows = store.read_table(
        &metadata_table(workspace),
        &[DELINEATION_NAME_FIELD, DISCRETIZATION_NAME_FIELD],
    )?;

    let delineations: Vec<String> = rows
        .iter()
        .filter(|row| row.get(1).and_then(FieldValue::as_text).as_deref() == Some(discretization))
        .filter_map(|row| row.first().and_then(FieldValue::as_text))
        .collect();

    match delineations.as_slice() {
        [] => Err(Error::NoOwningDelineation(discretization.to_string())),
        [only] => Ok(only.clone()),
        [first, rest @ ..] => {
            if rest.iter().any(|other| other != first) {
                warn!(
                    "Discretization '{}' is listed under {} delineations, using '{}'",
                    discretization,
                    delineations.len(),
                    first
                );
            }
            Ok(first.clone())
        }
    }
}
