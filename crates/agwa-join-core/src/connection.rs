//! Flattens a layer's connection properties into a [`ConnectionDescriptor`].

use crate::host::{ConnectionProperties, LayerInfo};
use std::path::PathBuf;

/// Workspace factory kind reported for file geodatabase datasets.
pub const FILE_GEODATABASE: &str = "File Geodatabase";

/// Flat view of one layer's data source. Any part may be missing; absence
/// means "not applicable" rather than an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub workspace_factory: Option<String>,
    pub database: Option<PathBuf>,
    pub dataset: Option<String>,
}

impl ConnectionDescriptor {
    pub fn is_file_geodatabase(&self) -> bool {
        self.workspace_factory.as_deref() == Some(FILE_GEODATABASE)
    }

    /// Dataset name, but only for file geodatabase sources.
    pub fn geodatabase_dataset(&self) -> Option<&str> {
        if self.is_file_geodatabase() {
            self.dataset.as_deref()
        } else {
            None
        }
    }
}

/// Descriptor of the layer's base table. A joined layer nests the base under
/// `source`, so one level of nesting is unwrapped when present.
pub fn resolve(layer: &LayerInfo) -> ConnectionDescriptor {
    match &layer.connection_properties {
        Some(top) => describe(top.nested("source").unwrap_or(top)),
        None => ConnectionDescriptor::default(),
    }
}

/// Descriptor of the table joined onto the layer, read from the top-level
/// `destination` branch. Empty for unjoined layers.
pub fn resolve_destination(layer: &LayerInfo) -> ConnectionDescriptor {
    layer
        .connection_properties
        .as_ref()
        .and_then(|top| top.nested("destination"))
        .map(describe)
        .unwrap_or_default()
}

fn describe(properties: &ConnectionProperties) -> ConnectionDescriptor {
    ConnectionDescriptor {
        workspace_factory: properties.text("workspace_factory").map(str::to_string),
        database: properties
            .nested("connection_info")
            .and_then(|info| info.text("database"))
            .map(PathBuf::from),
        dataset: properties.text("dataset").map(str::to_string),
    }
}
