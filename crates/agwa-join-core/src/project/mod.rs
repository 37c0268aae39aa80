//! A map session backed by a project file.
//!
//! The project file lists the active map's layers with their data sources and
//! the joins currently stacked onto them. Join changes are made in memory and
//! written back by [`ProjectSession::save`].

use crate::connection::FILE_GEODATABASE;
use crate::error::Error;
use crate::geodatabase::{split_table_path, FileGeodatabase, GeodatabaseStore, TableView, ViewJoin};
use crate::host::{
    ConnectionProperties, Field, FieldValue, JoinRequest, JoinType, LayerHandle, LayerInfo,
    MapSession, Row, TableStore, WhereClause,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    #[default]
    Feature,
    Raster,
    Group,
    Table,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSource {
    pub workspace_factory: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerJoin {
    /// Join alias, the joined table's name.
    pub name: String,
    pub local_field: String,
    pub table: PathBuf,
    pub join_field: String,
    pub join_type: JoinType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectLayer {
    pub name: String,
    #[serde(default)]
    pub kind: LayerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<LayerSource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub joins: Vec<LayerJoin>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    #[serde(default)]
    pub map: String,
    #[serde(default)]
    pub layers: Vec<ProjectLayer>,
}

pub struct ProjectSession {
    path: Option<PathBuf>,
    project: ProjectFile,
    store: GeodatabaseStore,
}

impl ProjectSession {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        let project: ProjectFile = toml::from_str(&text)?;
        debug!(
            "Loaded project {} (map '{}', {} layers)",
            path.display(),
            project.map,
            project.layers.len()
        );
        Ok(Self {
            path: Some(path.to_path_buf()),
            project,
            store: GeodatabaseStore,
        })
    }

    /// Session over an in-memory project; [`save`](Self::save) is a no-op.
    pub fn from_project(project: ProjectFile) -> Self {
        Self {
            path: None,
            project,
            store: GeodatabaseStore,
        }
    }

    pub fn project(&self) -> &ProjectFile {
        &self.project
    }

    pub fn save(&self) -> Result<(), Error> {
        if let Some(path) = &self.path {
            fs::write(path, toml::to_string_pretty(&self.project)?)?;
            debug!("Saved project {}", path.display());
        }
        Ok(())
    }

    fn layer(&self, name: &str) -> Result<&ProjectLayer, Error> {
        self.project
            .layers
            .iter()
            .find(|layer| layer.name == name)
            .ok_or_else(|| Error::LayerNotFound(name.to_string()))
    }

    fn layer_mut(&mut self, name: &str) -> Result<&mut ProjectLayer, Error> {
        self.project
            .layers
            .iter_mut()
            .find(|layer| layer.name == name)
            .ok_or_else(|| Error::LayerNotFound(name.to_string()))
    }
}

fn table_view(layer: &ProjectLayer) -> Result<TableView, Error> {
    let base = layer
        .source
        .as_ref()
        .and_then(|source| Some(source.database.as_ref()?.join(source.dataset.as_ref()?)))
        .ok_or_else(|| Error::NoDataSource(layer.name.clone()))?;
    Ok(TableView {
        base,
        joins: layer
            .joins
            .iter()
            .map(|join| ViewJoin {
                alias: join.name.clone(),
                table: join.table.clone(),
                local_field: join.local_field.clone(),
                join_field: join.join_field.clone(),
                join_type: join.join_type,
            })
            .collect(),
    })
}

fn describe_source(source: &LayerSource) -> ConnectionProperties {
    let mut properties =
        ConnectionProperties::new().with_text("workspace_factory", source.workspace_factory.clone());
    if let Some(database) = &source.database {
        properties = properties.with_nested(
            "connection_info",
            ConnectionProperties::new().with_text("database", database.display().to_string()),
        );
    }
    if let Some(dataset) = &source.dataset {
        properties = properties.with_text("dataset", dataset.clone());
    }
    properties
}

fn describe_join_table(table: &Path) -> ConnectionProperties {
    let mut properties = ConnectionProperties::new();
    if let Some((gdb, name)) = split_table_path(table) {
        properties = properties
            .with_text("workspace_factory", FILE_GEODATABASE)
            .with_nested(
                "connection_info",
                ConnectionProperties::new().with_text("database", gdb.display().to_string()),
            )
            .with_text("dataset", name);
    }
    properties
}

/// Connection properties in the host's shape: each join wraps what came
/// before it under `source` and puts the joined table under `destination`.
pub fn connection_properties(layer: &ProjectLayer) -> Option<ConnectionProperties> {
    let base = describe_source(layer.source.as_ref()?);
    Some(layer.joins.iter().fold(base, |inner, join| {
        let join_type = match join.join_type {
            JoinType::KeepAll => "left_outer_join",
            JoinType::KeepCommon => "inner_join",
        };
        ConnectionProperties::new()
            .with_text("join_type", join_type)
            .with_text("primary_key", join.local_field.clone())
            .with_text("foreign_key", join.join_field.clone())
            .with_nested("source", inner)
            .with_nested("destination", describe_join_table(&join.table))
    }))
}

impl MapSession for ProjectSession {
    fn layers(&self) -> Result<Vec<LayerInfo>, Error> {
        Ok(self
            .project
            .layers
            .iter()
            .map(|layer| LayerInfo {
                name: layer.name.clone(),
                is_feature_layer: layer.kind == LayerKind::Feature,
                connection_properties: connection_properties(layer),
            })
            .collect())
    }

    fn list_fields(&self, layer: &str) -> Result<Vec<Field>, Error> {
        let view = table_view(self.layer(layer)?)?;
        Ok(self
            .store
            .view_fields(&view)?
            .into_iter()
            .map(|name| Field { name })
            .collect())
    }

    fn field_values(
        &self,
        layer: &str,
        field: &str,
        skip_nulls: bool,
    ) -> Result<Vec<FieldValue>, Error> {
        let view = table_view(self.layer(layer)?)?;
        self.store.view_values(&view, field, skip_nulls)
    }

    fn add_join(&mut self, request: &JoinRequest) -> Result<LayerHandle, Error> {
        let layer = self.layer(&request.layer)?;
        if layer.kind != LayerKind::Feature {
            return Err(Error::Other(format!(
                "Layer '{}' is not a feature layer",
                layer.name
            )));
        }

        let (gdb_path, table) = split_table_path(&request.join_table)
            .ok_or_else(|| Error::TableNotFound(request.join_table.clone()))?;
        if !self.store.exists(&request.join_table) {
            return Err(Error::TableNotFound(request.join_table.clone()));
        }
        if layer.joins.iter().any(|join| join.name == table) {
            return Err(Error::DuplicateJoin {
                layer: layer.name.clone(),
                join: table,
            });
        }

        let view = table_view(layer)?;
        if !self.store.view_has_field(&view, &request.local_field)? {
            return Err(Error::FieldNotFound {
                source_name: layer.name.clone(),
                field: request.local_field.clone(),
            });
        }

        let gdb = FileGeodatabase::open(&gdb_path)?;
        if !gdb
            .table_columns(&table)?
            .iter()
            .any(|column| column == &request.join_field)
        {
            return Err(Error::FieldNotFound {
                source_name: table,
                field: request.join_field.clone(),
            });
        }
        if request.index_join_fields {
            gdb.create_index(&table, &request.join_field)?;
        }
        if request.rebuild_index {
            gdb.reindex(&table)?;
        }

        let layer = self.layer_mut(&request.layer)?;
        layer.joins.push(LayerJoin {
            name: table,
            local_field: request.local_field.clone(),
            table: request.join_table.clone(),
            join_field: request.join_field.clone(),
            join_type: request.join_type,
        });
        info!(
            "Layer '{}' now joined to {}",
            layer.name,
            request.join_table.display()
        );

        Ok(LayerHandle {
            name: layer.name.clone(),
        })
    }

    fn remove_join(&mut self, layer: &str, join_name: &str) -> Result<(), Error> {
        let entry = self.layer_mut(layer)?;
        let position = entry
            .joins
            .iter()
            .position(|join| join.name == join_name)
            .ok_or_else(|| Error::JoinNotFound {
                layer: layer.to_string(),
                join: join_name.to_string(),
            })?;
        entry.joins.remove(position);
        info!("Removed join '{}' from layer '{}'", join_name, layer);
        Ok(())
    }
}

impl TableStore for ProjectSession {
    fn exists(&self, path: &Path) -> bool {
        self.store.exists(path)
    }

    fn delimit_field(&self, workspace: &Path, field: &str) -> String {
        self.store.delimit_field(workspace, field)
    }

    fn search(
        &self,
        table: &Path,
        fields: &[&str],
        filter: Option<&WhereClause>,
    ) -> Result<Vec<Row>, Error> {
        self.store.search(table, fields, filter)
    }

    fn table_fields(&self, table: &Path) -> Result<Vec<String>, Error> {
        self.store.table_fields(table)
    }
}
