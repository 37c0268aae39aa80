//! Capabilities consumed from the GIS host.
//!
//! The core never talks to a project or a database directly. Everything it
//! needs goes through [`MapSession`] (layer catalog and join primitives) and
//! [`TableStore`] (existence tests and table scans), so the algorithms can run
//! against the on-disk [`crate::project::ProjectSession`] or a fabricated
//! session in tests.

mod expression;

pub use expression::WhereClause;

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// A single cell read from a table or a layer.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Text rendering of a non-null value.
    pub fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Integer(v) => Some(v.to_string()),
            FieldValue::Real(v) => Some(v.to_string()),
            FieldValue::Text(v) => Some(v.clone()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(text) => write!(f, "{}", text),
            None => write!(f, "<null>"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Real(value)
    }
}

pub type Row = Vec<FieldValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Text(String),
    Nested(ConnectionProperties),
}

/// The loosely-typed connection metadata a host attaches to a layer.
///
/// A joined layer nests its base table under `source` and the joined table
/// under `destination`; an unjoined layer carries `workspace_factory`,
/// `connection_info.database` and `dataset` at the top level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionProperties {
    entries: BTreeMap<String, PropertyValue>,
}

impl ConnectionProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, key: &str, value: impl Into<String>) -> Self {
        self.entries
            .insert(key.to_string(), PropertyValue::Text(value.into()));
        self
    }

    pub fn with_nested(mut self, key: &str, nested: ConnectionProperties) -> Self {
        self.entries
            .insert(key.to_string(), PropertyValue::Nested(nested));
        self
    }

    /// Value of `key` if present and textual.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(PropertyValue::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Sub-structure under `key` if present and nested.
    pub fn nested(&self, key: &str) -> Option<&ConnectionProperties> {
        match self.entries.get(key) {
            Some(PropertyValue::Nested(nested)) => Some(nested),
            _ => None,
        }
    }
}

/// One entry of the active map's layer list.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerInfo {
    pub name: String,
    pub is_feature_layer: bool,
    /// `None` when the layer does not support connection properties.
    pub connection_properties: Option<ConnectionProperties>,
}

impl LayerInfo {
    pub fn supports_connection_properties(&self) -> bool {
        self.connection_properties.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Qualified name, `table.column` once the layer carries a join.
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    /// Outer join: layer rows without a match are kept with null join fields.
    KeepAll,
    KeepCommon,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinRequest {
    pub layer: String,
    pub local_field: String,
    pub join_table: PathBuf,
    pub join_field: String,
    pub join_type: JoinType,
    pub index_join_fields: bool,
    pub rebuild_index: bool,
}

/// Handle to a layer returned by a join operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerHandle {
    pub name: String,
}

impl fmt::Display for LayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Layer catalog and join primitives of the active map.
pub trait MapSession {
    /// Layers in map order.
    fn layers(&self) -> Result<Vec<LayerInfo>, Error>;

    /// Fields of a layer in stored order.
    fn list_fields(&self, layer: &str) -> Result<Vec<Field>, Error>;

    /// Values of one (qualified) field across the layer's joined rows.
    fn field_values(
        &self,
        layer: &str,
        field: &str,
        skip_nulls: bool,
    ) -> Result<Vec<FieldValue>, Error>;

    fn add_join(&mut self, request: &JoinRequest) -> Result<LayerHandle, Error>;

    fn remove_join(&mut self, layer: &str, join_name: &str) -> Result<(), Error>;
}

/// Table existence and row access.
pub trait TableStore {
    fn exists(&self, path: &Path) -> bool;

    /// Field name delimited for use in a where clause against `workspace`.
    fn delimit_field(&self, workspace: &Path, field: &str) -> String;

    fn search(
        &self,
        table: &Path,
        fields: &[&str],
        filter: Option<&WhereClause>,
    ) -> Result<Vec<Row>, Error>;

    /// Field names of a table in stored order.
    fn table_fields(&self, table: &Path) -> Result<Vec<String>, Error>;

    fn read_table(&self, table: &Path, fields: &[&str]) -> Result<Vec<Row>, Error> {
        self.search(table, fields, None)
    }
}

/// Everything a tool invocation needs from the host.
pub trait HostSession: MapSession + TableStore {}

impl<T: MapSession + TableStore> HostSession for T {}
