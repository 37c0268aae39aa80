#![allow(dead_code)]

use agwa_join_core::connection::FILE_GEODATABASE;
use agwa_join_core::host::{
    ConnectionProperties, Field, FieldValue, JoinRequest, LayerHandle, LayerInfo, MapSession, Row,
    TableStore, WhereClause,
};
use agwa_join_core::Error;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub fn gdb_properties(database: &str, dataset: &str) -> ConnectionProperties {
    ConnectionProperties::new()
        .with_text("workspace_factory", FILE_GEODATABASE)
        .with_nested(
            "connection_info",
            ConnectionProperties::new().with_text("database", database),
        )
        .with_text("dataset", dataset)
}

pub fn joined_properties(
    database: &str,
    dataset: &str,
    join_database: &str,
    join_table: &str,
) -> ConnectionProperties {
    ConnectionProperties::new()
        .with_text("join_type", "left_outer_join")
        .with_nested("source", gdb_properties(database, dataset))
        .with_nested("destination", gdb_properties(join_database, join_table))
}

pub struct FakeLayer {
    pub info: LayerInfo,
    pub fields: Vec<String>,
    pub values: HashMap<String, Vec<FieldValue>>,
}

pub struct FakeTable {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    RemoveJoin { layer: String, join: String },
    AddJoin(JoinRequest),
}

/// In-memory host that records every join call.
///
/// Adding a join appends `{alias}.SimulationName` to the layer's fields, fed
/// from the joined table's rows when that table is registered.
#[derive(Default)]
pub struct FakeSession {
    pub layers: Vec<FakeLayer>,
    pub tables: HashMap<PathBuf, FakeTable>,
    pub calls: Vec<Call>,
    pub fail_add_for: Option<String>,
    pub filters: RefCell<Vec<String>>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layer(
        mut self,
        name: &str,
        properties: Option<ConnectionProperties>,
        fields: &[&str],
    ) -> Self {
        self.layers.push(FakeLayer {
            info: LayerInfo {
                name: name.to_string(),
                is_feature_layer: true,
                connection_properties: properties,
            },
            fields: fields.iter().map(|f| f.to_string()).collect(),
            values: HashMap::new(),
        });
        self
    }

    pub fn with_raster(mut self, name: &str, properties: ConnectionProperties) -> Self {
        self.layers.push(FakeLayer {
            info: LayerInfo {
                name: name.to_string(),
                is_feature_layer: false,
                connection_properties: Some(properties),
            },
            fields: vec![],
            values: HashMap::new(),
        });
        self
    }

    pub fn with_values(mut self, layer: &str, field: &str, values: Vec<FieldValue>) -> Self {
        if let Some(entry) = self.layers.iter_mut().find(|l| l.info.name == layer) {
            entry.values.insert(field.to_string(), values);
        }
        self
    }

    pub fn with_table(mut self, path: &str, columns: &[&str], rows: Vec<Row>) -> Self {
        self.tables.insert(
            PathBuf::from(path),
            FakeTable {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows,
            },
        );
        self
    }

    fn layer(&self, name: &str) -> Result<&FakeLayer, Error> {
        self.layers
            .iter()
            .find(|l| l.info.name == name)
            .ok_or_else(|| Error::LayerNotFound(name.to_string()))
    }

    fn layer_mut(&mut self, name: &str) -> Result<&mut FakeLayer, Error> {
        self.layers
            .iter_mut()
            .find(|l| l.info.name == name)
            .ok_or_else(|| Error::LayerNotFound(name.to_string()))
    }
}

impl MapSession for FakeSession {
    fn layers(&self) -> Result<Vec<LayerInfo>, Error> {
        Ok(self.layers.iter().map(|l| l.info.clone()).collect())
    }

    fn list_fields(&self, layer: &str) -> Result<Vec<Field>, Error> {
        Ok(self
            .layer(layer)?
            .fields
            .iter()
            .map(|name| Field { name: name.clone() })
            .collect())
    }

    fn field_values(
        &self,
        layer: &str,
        field: &str,
        skip_nulls: bool,
    ) -> Result<Vec<FieldValue>, Error> {
        let values = self
            .layer(layer)?
            .values
            .get(field)
            .cloned()
            .unwrap_or_default();
        Ok(values
            .into_iter()
            .filter(|value| !(skip_nulls && value.is_null()))
            .collect())
    }

    fn add_join(&mut self, request: &JoinRequest) -> Result<LayerHandle, Error> {
        self.calls.push(Call::AddJoin(request.clone()));
        if self.fail_add_for.as_deref() == Some(request.layer.as_str()) {
            return Err(Error::Other(format!("cannot join '{}'", request.layer)));
        }

        let alias = request
            .join_table
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let database = request
            .join_table
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let simulation_values: Vec<FieldValue> = self
            .tables
            .get(&request.join_table)
            .map(|table| {
                let index = table.columns.iter().position(|c| c == "SimulationName");
                table
                    .rows
                    .iter()
                    .map(|row| index.map(|i| row[i].clone()).unwrap_or(FieldValue::Null))
                    .collect()
            })
            .unwrap_or_default();

        let layer = self.layer_mut(&request.layer)?;
        let base = layer
            .info
            .connection_properties
            .clone()
            .unwrap_or_default();
        let field = format!("{}.SimulationName", alias);
        layer.fields.push(field.clone());
        layer.values.insert(field, simulation_values);
        layer.info.connection_properties = Some(
            ConnectionProperties::new()
                .with_nested("source", base)
                .with_nested("destination", gdb_properties(&database, &alias)),
        );
        Ok(LayerHandle {
            name: request.layer.clone(),
        })
    }

    fn remove_join(&mut self, layer: &str, join_name: &str) -> Result<(), Error> {
        self.calls.push(Call::RemoveJoin {
            layer: layer.to_string(),
            join: join_name.to_string(),
        });
        let entry = self.layer_mut(layer)?;
        let prefix = format!("{}.", join_name);
        if !entry.fields.iter().any(|f| f.starts_with(&prefix)) {
            return Err(Error::JoinNotFound {
                layer: layer.to_string(),
                join: join_name.to_string(),
            });
        }
        entry.fields.retain(|f| !f.starts_with(&prefix));
        entry.values.retain(|f, _| !f.starts_with(&prefix));
        let source = entry
            .info
            .connection_properties
            .as_ref()
            .and_then(|props| props.nested("source").cloned());
        if let Some(source) = source {
            entry.info.connection_properties = Some(source);
        }
        Ok(())
    }
}

impl TableStore for FakeSession {
    fn exists(&self, path: &Path) -> bool {
        self.tables.contains_key(path)
    }

    fn delimit_field(&self, _workspace: &Path, field: &str) -> String {
        format!("\"{}\"", field)
    }

    fn search(
        &self,
        table: &Path,
        fields: &[&str],
        filter: Option<&WhereClause>,
    ) -> Result<Vec<Row>, Error> {
        let table_data = self
            .tables
            .get(table)
            .ok_or_else(|| Error::TableNotFound(table.to_path_buf()))?;
        let column = |name: &str| {
            table_data
                .columns
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| Error::FieldNotFound {
                    source_name: table.display().to_string(),
                    field: name.to_string(),
                })
        };

        let filter_index = match filter {
            Some(clause) => {
                self.filters.borrow_mut().push(clause.to_sql());
                Some((column(clause.field())?, clause.value().to_string()))
            }
            None => None,
        };
        let projection = fields
            .iter()
            .map(|f| column(f))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(table_data
            .rows
            .iter()
            .filter(|row| match &filter_index {
                Some((index, value)) => row[*index].as_text().as_deref() == Some(value.as_str()),
                None => true,
            })
            .map(|row| projection.iter().map(|i| row[*i].clone()).collect())
            .collect())
    }

    fn table_fields(&self, table: &Path) -> Result<Vec<String>, Error> {
        self.tables
            .get(table)
            .map(|t| t.columns.clone())
            .ok_or_else(|| Error::TableNotFound(table.to_path_buf()))
    }
}

pub fn text(value: &str) -> FieldValue {
    FieldValue::Text(value.to_string())
}
