use super::{delimit_identifier, is_gdb_path, split_table_path, FileGeodatabase};
use crate::error::Error;
use crate::host::{Row, TableStore, WhereClause};
use std::path::Path;
use tracing::debug;

/// [`TableStore`] over file geodatabases on the local filesystem.
///
/// Every call opens the geodatabase it needs; nothing is cached between calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeodatabaseStore;

impl TableStore for GeodatabaseStore {
    fn exists(&self, path: &Path) -> bool {
        if is_gdb_path(path) {
            return FileGeodatabase::is_geodatabase(path);
        }
        match split_table_path(path) {
            Some((gdb, table)) => FileGeodatabase::open(&gdb)
                .and_then(|gdb| gdb.has_table(&table))
                .unwrap_or_else(|err| {
                    debug!("{} treated as missing: {}", path.display(), err);
                    false
                }),
            None => path.exists(),
        }
    }

    fn delimit_field(&self, _workspace: &Path, field: &str) -> String {
        delimit_identifier(field)
    }

    fn search(
        &self,
        table: &Path,
        fields: &[&str],
        filter: Option<&WhereClause>,
    ) -> Result<Vec<Row>, Error> {
        let (gdb, name) =
            split_table_path(table).ok_or_else(|| Error::TableNotFound(table.to_path_buf()))?;
        FileGeodatabase::open(&gdb)?.search(&name, fields, filter)
    }

    fn table_fields(&self, table: &Path) -> Result<Vec<String>, Error> {
        let (gdb, name) =
            split_table_path(table).ok_or_else(|| Error::TableNotFound(table.to_path_buf()))?;
        FileGeodatabase::open(&gdb)?.table_columns(&name)
    }
}
