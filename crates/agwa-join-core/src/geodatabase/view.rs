use super::{delimit_identifier, read_rows, split_table_path, FileGeodatabase, GeodatabaseStore, CATALOG_FILE};
use crate::error::Error;
use crate::host::{FieldValue, JoinType};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A table joined onto a [`TableView`].
#[derive(Debug, Clone, PartialEq)]
pub struct ViewJoin {
    pub alias: String,
    pub table: PathBuf,
    pub local_field: String,
    pub join_field: String,
    pub join_type: JoinType,
}

/// A base table plus the joins stacked onto it, as a layer shows it.
#[derive(Debug, Clone, PartialEq)]
pub struct TableView {
    pub base: PathBuf,
    pub joins: Vec<ViewJoin>,
}

struct ViewSource {
    name: String,
    sql_alias: String,
    columns: Vec<String>,
}

struct ViewColumns {
    base: ViewSource,
    joins: Vec<ViewSource>,
}

impl ViewColumns {
    fn fields(&self) -> Vec<String> {
        if self.joins.is_empty() {
            return self.base.columns.clone();
        }
        std::iter::once(&self.base)
            .chain(self.joins.iter())
            .flat_map(|source| {
                source
                    .columns
                    .iter()
                    .map(move |column| format!("{}.{}", source.name, column))
            })
            .collect()
    }

    /// SQL expression for a layer field. Unqualified names address the base table.
    fn column_expr(&self, field: &str) -> Option<String> {
        let expr = |source: &ViewSource, column: &str| {
            format!("{}.{}", source.sql_alias, delimit_identifier(column))
        };

        if self.base.columns.iter().any(|c| c == field) {
            return Some(expr(&self.base, field));
        }
        let (prefix, column) = field.split_once('.')?;
        std::iter::once(&self.base)
            .chain(self.joins.iter())
            .find(|source| source.name == prefix && source.columns.iter().any(|c| c == column))
            .map(|source| expr(source, column))
    }
}

fn table_source(table: &Path, sql_alias: String, name: Option<&str>) -> Result<(PathBuf, ViewSource), Error> {
    let (gdb_path, table_name) =
        split_table_path(table).ok_or_else(|| Error::TableNotFound(table.to_path_buf()))?;
    let gdb = FileGeodatabase::open(&gdb_path)?;
    if !gdb.has_table(&table_name)? {
        return Err(Error::TableNotFound(table.to_path_buf()));
    }
    let columns = gdb.table_columns(&table_name)?;
    Ok((
        gdb_path,
        ViewSource {
            name: name.map(str::to_string).unwrap_or(table_name),
            sql_alias,
            columns,
        },
    ))
}

impl GeodatabaseStore {
    fn describe(&self, view: &TableView) -> Result<ViewColumns, Error> {
        let (_, base) = table_source(&view.base, "b".to_string(), None)?;
        let joins = view
            .joins
            .iter()
            .enumerate()
            .map(|(i, join)| {
                table_source(&join.table, format!("t{}", i), Some(join.alias.as_str())).map(|(_, s)| s)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ViewColumns { base, joins })
    }

    /// Field names of the view: plain base columns when nothing is joined,
    /// `{table}.{column}` for every column once a join is present.
    pub fn view_fields(&self, view: &TableView) -> Result<Vec<String>, Error> {
        Ok(self.describe(view)?.fields())
    }

    pub fn view_has_field(&self, view: &TableView, field: &str) -> Result<bool, Error> {
        Ok(self.describe(view)?.column_expr(field).is_some())
    }

    /// Values of one field over the view's rows, in base table order.
    pub fn view_values(
        &self,
        view: &TableView,
        field: &str,
        skip_nulls: bool,
    ) -> Result<Vec<FieldValue>, Error> {
        let columns = self.describe(view)?;
        let missing = |field: &str| Error::FieldNotFound {
            source_name: view.base.display().to_string(),
            field: field.to_string(),
        };
        let target = columns.column_expr(field).ok_or_else(|| missing(field))?;

        let (base_gdb, base_table) = split_table_path(&view.base)
            .ok_or_else(|| Error::TableNotFound(view.base.clone()))?;
        let gdb = FileGeodatabase::open(&base_gdb)?;

        let mut sql = format!("SELECT {} FROM main.{} AS b", target, delimit_identifier(&base_table));
        for (i, join) in view.joins.iter().enumerate() {
            let (join_gdb, join_table) = split_table_path(&join.table)
                .ok_or_else(|| Error::TableNotFound(join.table.clone()))?;
            let schema = format!("j{}", i);
            gdb.connection().execute(
                &format!("ATTACH DATABASE ?1 AS {}", schema),
                [join_gdb.join(CATALOG_FILE).to_string_lossy().into_owned()],
            )?;

            let local = columns
                .column_expr(&join.local_field)
                .ok_or_else(|| missing(&join.local_field))?;
            let keyword = match join.join_type {
                JoinType::KeepAll => "LEFT JOIN",
                JoinType::KeepCommon => "INNER JOIN",
            };
            sql.push_str(&format!(
                " {} {}.{} AS t{} ON {} = t{}.{}",
                keyword,
                schema,
                delimit_identifier(&join_table),
                i,
                local,
                i,
                delimit_identifier(&join.join_field)
            ));
        }
        if skip_nulls {
            sql.push_str(&format!(" WHERE {} IS NOT NULL", target));
        }
        sql.push_str(" ORDER BY b.rowid");
        debug!("view values: {}", sql);

        let rows = read_rows(gdb.connection(), &sql, 1)?;
        Ok(rows.into_iter().filter_map(|row| row.into_iter().next()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodatabase::ColumnType;
    use tempfile::tempdir;

    fn fixture(root: &Path) -> TableView {
        let ws = FileGeodatabase::create(&root.join("ws.gdb")).unwrap();
        ws.create_table("ws1_elements", &[("Element_ID", ColumnType::Integer), ("Area", ColumnType::Real)])
            .unwrap();
        ws.insert_rows(
            "ws1_elements",
            &["Element_ID", "Area"],
            &[vec![1i64.into(), 10.5f64.into()], vec![2i64.into(), 20.0f64.into()], vec![3i64.into(), 5.0f64.into()]],
        )
        .unwrap();

        let results = FileGeodatabase::create(&root.join("sim_results.gdb")).unwrap();
        results
            .create_table(
                "results_k2",
                &[("Element_ID", ColumnType::Integer), ("SimulationName", ColumnType::Text)],
            )
            .unwrap();
        results
            .insert_rows(
                "results_k2",
                &["Element_ID", "SimulationName"],
                &[vec![2i64.into(), "sim".into()], vec![3i64.into(), "sim".into()]],
            )
            .unwrap();

        TableView {
            base: root.join("ws.gdb").join("ws1_elements"),
            joins: vec![],
        }
    }

    fn results_join(root: &Path, join_type: JoinType) -> ViewJoin {
        ViewJoin {
            alias: "results_k2".to_string(),
            table: root.join("sim_results.gdb").join("results_k2"),
            local_field: "Element_ID".to_string(),
            join_field: "Element_ID".to_string(),
            join_type,
        }
    }

    #[test]
    fn test_unjoined_fields_are_plain() {
        let tmp = tempdir().unwrap();
        let view = fixture(tmp.path());
        assert_eq!(GeodatabaseStore.view_fields(&view).unwrap(), vec!["Element_ID", "Area"]);
    }

    #[test]
    fn test_joined_fields_are_qualified() {
        let tmp = tempdir().unwrap();
        let mut view = fixture(tmp.path());
        view.joins.push(results_join(tmp.path(), JoinType::KeepAll));
        assert_eq!(
            GeodatabaseStore.view_fields(&view).unwrap(),
            vec![
                "ws1_elements.Element_ID",
                "ws1_elements.Area",
                "results_k2.Element_ID",
                "results_k2.SimulationName"
            ]
        );
    }

    #[test]
    fn test_keep_all_retains_unmatched_rows() {
        let tmp = tempdir().unwrap();
        let mut view = fixture(tmp.path());
        view.joins.push(results_join(tmp.path(), JoinType::KeepAll));

        let all = GeodatabaseStore
            .view_values(&view, "results_k2.SimulationName", false)
            .unwrap();
        assert_eq!(all, vec![FieldValue::Null, "sim".into(), "sim".into()]);

        let non_null = GeodatabaseStore
            .view_values(&view, "results_k2.SimulationName", true)
            .unwrap();
        assert_eq!(non_null.len(), 2);
    }

    #[test]
    fn test_keep_common_drops_unmatched_rows() {
        let tmp = tempdir().unwrap();
        let mut view = fixture(tmp.path());
        view.joins.push(results_join(tmp.path(), JoinType::KeepCommon));

        let ids = GeodatabaseStore
            .view_values(&view, "ws1_elements.Element_ID", false)
            .unwrap();
        assert_eq!(ids, vec![FieldValue::Integer(2), FieldValue::Integer(3)]);
    }

    #[test]
    fn test_unknown_field_is_reported() {
        let tmp = tempdir().unwrap();
        let view = fixture(tmp.path());
        let err = GeodatabaseStore.view_values(&view, "results_k2.SimulationName", true).err().unwrap();
        assert!(matches!(err, Error::FieldNotFound { .. }));
    }
}
