//! In-memory tables and the bulk-copy loader.

use crate::driver::{Connection, RowSink};
use crate::entity::{resolve, ColumnMap, Entity};
use crate::error::DataError;
use crate::executor;
use crate::params::Params;
use crate::query::Dialect;
use crate::value::Value;

/// Ordered column names plus rows of values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl DataTable {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row. Its arity must match the column count.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), DataError> {
        if row.len() != self.columns.len() {
            return Err(DataError::Mapping(format!(
                "row has {} values but the table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Build a table from entities, one column per mapped field.
    pub fn from_entities<E: Entity>(entities: &[E], selection: FieldSelection<'_>) -> Self {
        Self::from_entities_with(entities, selection, &resolve::<E>())
    }

    /// Like [`from_entities`](Self::from_entities), naming the columns after
    /// `columns` instead of the cached mapping.
    pub fn from_entities_with<E: Entity>(
        entities: &[E],
        selection: FieldSelection<'_>,
        columns: &ColumnMap,
    ) -> Self {
        let picked: Vec<(&'static str, String)> = columns
            .iter()
            .filter(|(field, column)| selection.keeps(field, column))
            .map(|(field, column)| (field, column.to_string()))
            .collect();
        let mut table = DataTable::new(picked.iter().map(|(_, c)| c.clone()));
        table.rows = entities
            .iter()
            .map(|e| {
                picked
                    .iter()
                    .map(|(field, _)| e.get(field).unwrap_or_default())
                    .collect()
            })
            .collect();
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Which entity fields become table columns.
///
/// Names match either the field or its column, case-insensitively.
#[derive(Debug, Clone, Copy, Default)]
pub enum FieldSelection<'a> {
    #[default]
    All,
    Only(&'a [&'a str]),
    Except(&'a [&'a str]),
}

impl FieldSelection<'_> {
    fn keeps(&self, field: &str, column: &str) -> bool {
        let listed = |names: &[&str]| {
            names
                .iter()
                .any(|n| n.eq_ignore_ascii_case(field) || n.eq_ignore_ascii_case(column))
        };
        match self {
            FieldSelection::All => true,
            FieldSelection::Only(names) => listed(names),
            FieldSelection::Except(names) => !listed(names),
        }
    }
}

#[derive(Default)]
struct ColumnProbe {
    columns: Vec<String>,
}

impl RowSink for ColumnProbe {
    fn columns(&mut self, columns: &[String]) -> Result<(), DataError> {
        self.columns = columns.to_vec();
        Ok(())
    }

    fn row(&mut self, _row: Vec<Value>) -> Result<(), DataError> {
        Ok(())
    }
}

/// Fail unless `dialect` has a bulk-copy channel.
pub(crate) fn ensure_supported(dialect: Dialect) -> Result<(), DataError> {
    if dialect.supports_bulk_copy() {
        Ok(())
    } else {
        Err(DataError::capability("bulk import", Dialect::SqlServer))
    }
}

/// Copy `data` into `table` over `conn`.
///
/// Every source column must exist in the destination, matched by name.
pub(crate) fn load(conn: &mut dyn Connection, table: &str, data: &DataTable) -> Result<bool, DataError> {
    let mut probe_cmd = executor::command(
        &format!("select * from {table} where 1=0"),
        &Params::new(),
        &Params::new(),
    );
    let mut probe = ColumnProbe::default();
    executor::query(conn, &mut probe_cmd, &mut probe)?;

    let unknown: Vec<&str> = data
        .columns()
        .iter()
        .filter(|c| !probe.columns.iter().any(|d| d.eq_ignore_ascii_case(c)))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(DataError::Mapping(format!(
            "columns {} do not exist in destination table {table}",
            unknown.join(", ")
        )));
    }

    let copied = conn.bulk_copy(table, data)?;
    tracing::debug!(table, rows = copied, "bulk copy finished");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_row_checks_arity() {
        let mut t = DataTable::new(["Name", "Type"]);
        t.push_row(vec![Value::from("a"), Value::Int(1)]).unwrap();
        assert!(matches!(
            t.push_row(vec![Value::from("b")]),
            Err(DataError::Mapping(_))
        ));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_selection() {
        assert!(FieldSelection::Only(&["name"]).keeps("name", "Name"));
        assert!(FieldSelection::Only(&["Name"]).keeps("name", "Name"));
        assert!(!FieldSelection::Except(&["Id"]).keeps("id", "Id"));
        assert!(FieldSelection::All.keeps("x", "X"));
    }

    #[test]
    fn test_secondary_dialect_rejected() {
        assert!(ensure_supported(Dialect::SqlServer).is_ok());
        assert!(matches!(
            ensure_supported(Dialect::MySql),
            Err(DataError::Capability {
                required: Dialect::SqlServer,
                ..
            })
        ));
    }
}
