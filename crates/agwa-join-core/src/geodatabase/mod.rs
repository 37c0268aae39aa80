//! File geodatabases kept as SQLite catalogs.
//!
//! A geodatabase is a directory with a `.gdb` extension holding
//! [`CATALOG_FILE`]; every table of the geodatabase is a table of that
//! catalog, addressed on disk as `{gdb}/{table}`.

mod store;
mod view;

pub use store::GeodatabaseStore;
pub use view::{TableView, ViewJoin};

use crate::error::Error;
use crate::host::{FieldValue, Row, WhereClause};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OpenFlags, ToSql};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const GDB_EXTENSION: &str = "gdb";
pub const CATALOG_FILE: &str = "catalog.sqlite";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    fn sql(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

pub struct FileGeodatabase {
    path: PathBuf,
    conn: Connection,
}

impl FileGeodatabase {
    /// Create the geodatabase directory and catalog if missing, then open it.
    pub fn create(path: &Path) -> Result<Self, Error> {
        if !is_gdb_path(path) {
            return Err(Error::NotAGeodatabase(path.to_path_buf()));
        }
        fs::create_dir_all(path)?;
        let conn = Connection::open(path.join(CATALOG_FILE))?;
        let gdb = FileGeodatabase {
            path: path.to_path_buf(),
            conn,
        };
        gdb.configure_pragmas()?;
        debug!("Created file geodatabase {}", path.display());
        Ok(gdb)
    }

    pub fn open(path: &Path) -> Result<Self, Error> {
        if !Self::is_geodatabase(path) {
            return Err(Error::NotAGeodatabase(path.to_path_buf()));
        }
        let conn = Connection::open_with_flags(
            path.join(CATALOG_FILE),
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let gdb = FileGeodatabase {
            path: path.to_path_buf(),
            conn,
        };
        gdb.configure_pragmas()?;
        Ok(gdb)
    }

    pub fn is_geodatabase(path: &Path) -> bool {
        is_gdb_path(path) && path.join(CATALOG_FILE).is_file()
    }

    fn configure_pragmas(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Table names compare case-insensitively, as geodatabase names do.
    pub fn has_table(&self, name: &str) -> Result<bool, Error> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Column names in stored order.
    pub fn table_columns(&self, name: &str) -> Result<Vec<String>, Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
        let columns: Vec<String> = stmt
            .query_map(params![name], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        if columns.is_empty() {
            return Err(Error::TableNotFound(self.path.join(name)));
        }
        Ok(columns)
    }

    pub fn create_table(&self, name: &str, columns: &[(&str, ColumnType)]) -> Result<(), Error> {
        let definitions: Vec<String> = columns
            .iter()
            .map(|(column, kind)| format!("{} {}", delimit_identifier(column), kind.sql()))
            .collect();
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} ({});",
            delimit_identifier(name),
            definitions.join(", ")
        ))?;
        debug!("Created table {} in {}", name, self.path.display());
        Ok(())
    }

    pub fn insert_rows(&self, table: &str, columns: &[&str], rows: &[Row]) -> Result<usize, Error> {
        let column_list: Vec<String> = columns.iter().map(|c| delimit_identifier(c)).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            delimit_identifier(table),
            column_list.join(", "),
            placeholders.join(", ")
        );

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                stmt.execute(params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    /// Projected rows of `table`, optionally filtered, in storage order.
    pub fn search(
        &self,
        table: &str,
        fields: &[&str],
        filter: Option<&WhereClause>,
    ) -> Result<Vec<Row>, Error> {
        if !self.has_table(table)? {
            return Err(Error::TableNotFound(self.path.join(table)));
        }
        let columns = self.table_columns(table)?;
        for field in fields {
            if !columns.iter().any(|column| column == field) {
                return Err(Error::FieldNotFound {
                    source_name: table.to_string(),
                    field: field.to_string(),
                });
            }
        }

        let projection: Vec<String> = fields.iter().map(|f| delimit_identifier(f)).collect();
        let mut sql = format!(
            "SELECT {} FROM {}",
            projection.join(", "),
            delimit_identifier(table)
        );
        if let Some(filter) = filter {
            sql.push_str(" WHERE ");
            sql.push_str(&filter.to_sql());
        }
        sql.push_str(" ORDER BY rowid");
        debug!("search: {}", sql);

        read_rows(&self.conn, &sql, fields.len())
    }

    pub fn create_index(&self, table: &str, field: &str) -> Result<(), Error> {
        let index = format!("idx_{}_{}", table, field);
        self.conn.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({});",
            delimit_identifier(&index),
            delimit_identifier(table),
            delimit_identifier(field)
        ))?;
        Ok(())
    }

    pub fn reindex(&self, table: &str) -> Result<(), Error> {
        self.conn
            .execute_batch(&format!("REINDEX {};", delimit_identifier(table)))?;
        Ok(())
    }
}

pub(crate) fn read_rows(conn: &Connection, sql: &str, width: usize) -> Result<Vec<Row>, Error> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], |row| {
            (0..width)
                .map(|i| row.get::<_, FieldValue>(i))
                .collect::<rusqlite::Result<Row>>()
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Double-quoted SQL identifier with embedded quotes doubled.
pub fn delimit_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn is_gdb_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(GDB_EXTENSION))
        .unwrap_or(false)
}

/// Split `{gdb}/{table}` into the geodatabase path and the table name.
pub fn split_table_path(path: &Path) -> Option<(PathBuf, String)> {
    let parent = path.parent()?;
    if !is_gdb_path(parent) {
        return None;
    }
    let table = path.file_name()?.to_str()?.to_string();
    Some((parent.to_path_buf(), table))
}

impl FromSql for FieldValue {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(FieldValue::Null),
            ValueRef::Integer(v) => Ok(FieldValue::Integer(v)),
            ValueRef::Real(v) => Ok(FieldValue::Real(v)),
            ValueRef::Text(v) => Ok(FieldValue::Text(String::from_utf8_lossy(v).into_owned())),
            ValueRef::Blob(_) => Err(FromSqlError::InvalidType),
        }
    }
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            FieldValue::Null => ToSqlOutput::Owned(Value::Null),
            FieldValue::Integer(v) => ToSqlOutput::from(*v),
            FieldValue::Real(v) => ToSqlOutput::from(*v),
            FieldValue::Text(v) => ToSqlOutput::from(v.as_str()),
        })
    }
}
