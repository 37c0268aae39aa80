use super::TableStore;
use std::fmt;
use std::path::Path;

/// An equality filter for [`TableStore::search`].
///
/// The field name is delimited by the store that will run the query and the
/// literal is quoted here, so callers never splice raw text into a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhereClause {
    field: String,
    delimited_field: String,
    value: String,
}

impl WhereClause {
    pub fn equals<T: TableStore + ?Sized>(
        store: &T,
        workspace: &Path,
        field: &str,
        value: &str,
    ) -> Self {
        Self {
            field: field.to_string(),
            delimited_field: store.delimit_field(workspace, field),
            value: value.to_string(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn to_sql(&self) -> String {
        format!("{} = {}", self.delimited_field, quote_literal(&self.value))
    }
}

impl fmt::Display for WhereClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sql())
    }
}

/// Single-quoted SQL string literal with embedded quotes doubled.
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::host::Row;

    struct BracketStore;

    impl TableStore for BracketStore {
        fn exists(&self, _path: &Path) -> bool {
            false
        }

        fn delimit_field(&self, _workspace: &Path, field: &str) -> String {
            format!("[{}]", field)
        }

        fn search(
            &self,
            _table: &Path,
            _fields: &[&str],
            _filter: Option<&WhereClause>,
        ) -> Result<Vec<Row>, Error> {
            Ok(vec![])
        }

        fn table_fields(&self, table: &Path) -> Result<Vec<String>, Error> {
            Err(Error::TableNotFound(table.to_path_buf()))
        }
    }

    #[test]
    fn test_field_is_delimited_by_store() {
        let clause = WhereClause::equals(&BracketStore, Path::new("/w.gdb"), "DiscretizationName", "ws1");
        assert_eq!(clause.to_sql(), "[DiscretizationName] = 'ws1'");
        assert_eq!(clause.field(), "DiscretizationName");
        assert_eq!(clause.value(), "ws1");
    }

    #[test]
    fn test_literal_quotes_are_escaped() {
        let clause = WhereClause::equals(&BracketStore, Path::new("/w.gdb"), "Name", "o'neil' OR '1'='1");
        assert_eq!(clause.to_sql(), "[Name] = 'o''neil'' OR ''1''=''1'");
    }

    #[test]
    fn test_quote_literal_plain() {
        assert_eq!(quote_literal("sim_2020"), "'sim_2020'");
        assert_eq!(quote_literal(""), "''");
    }
}
