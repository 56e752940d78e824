//! Command execution and entity materialization.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use crate::driver::{Command, Connection, RowSink};
use crate::entity::{resolve, ColumnMap, Entity, Setter};
use crate::error::DataError;
use crate::params::Params;
use crate::value::Value;

fn log_command(kind: &'static str, command: &Command, started: Instant) {
    tracing::debug!(
        kind,
        sql = %command.text(),
        params = command.parameters().len(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "command executed"
    );
}

/// Build a command with freshly bound parameters.
pub(crate) fn command(text: &str, inputs: &Params, outputs: &Params) -> Command {
    let mut command = Command::new(text);
    command.prepare(inputs, outputs);
    command
}

pub(crate) fn non_query(conn: &mut dyn Connection, command: &mut Command) -> Result<u64, DataError> {
    let started = Instant::now();
    let affected = conn.execute(command)?;
    log_command("non_query", command, started);
    Ok(affected)
}

pub(crate) fn scalar(conn: &mut dyn Connection, command: &mut Command) -> Result<Value, DataError> {
    let started = Instant::now();
    let value = conn.scalar(command)?;
    log_command("scalar", command, started);
    Ok(value)
}

pub(crate) fn query(
    conn: &mut dyn Connection,
    command: &mut Command,
    sink: &mut dyn RowSink,
) -> Result<(), DataError> {
    let started = Instant::now();
    conn.query(command, sink)?;
    log_command("query", command, started);
    Ok(())
}

struct Slot<E> {
    index: usize,
    field: &'static str,
    setter: Option<Setter<E>>,
}

/// Materializes rows into `E`.
///
/// The column → field plan is computed once, when the column set arrives.
pub struct EntityReader<E: Entity> {
    columns: Arc<ColumnMap>,
    plan: Vec<Slot<E>>,
    rows: Vec<E>,
    limit: Option<usize>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> EntityReader<E> {
    pub fn new() -> Self {
        Self::with_columns(resolve::<E>())
    }

    /// Read with a per-call mapping instead of the cached one.
    pub fn with_columns(columns: Arc<ColumnMap>) -> Self {
        Self {
            columns,
            plan: Vec::new(),
            rows: Vec::new(),
            limit: None,
            _entity: PhantomData,
        }
    }

    /// Stop materializing after `limit` rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn into_rows(self) -> Vec<E> {
        self.rows
    }

    pub fn into_first(self) -> Option<E> {
        self.rows.into_iter().next()
    }
}

impl<E: Entity> Default for EntityReader<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> RowSink for EntityReader<E> {
    fn columns(&mut self, columns: &[String]) -> Result<(), DataError> {
        self.plan = self
            .columns
            .iter()
            .filter_map(|(field, column)| {
                columns.iter().position(|c| c == column).map(|index| Slot {
                    index,
                    field,
                    setter: E::setter(field),
                })
            })
            .collect();
        Ok(())
    }

    fn row(&mut self, row: Vec<Value>) -> Result<(), DataError> {
        if self.limit.is_some_and(|limit| self.rows.len() >= limit) {
            return Ok(());
        }
        let mut entity = E::default();
        // Several fields may read the same column.
        for slot in &self.plan {
            let value = match row.get(slot.index) {
                Some(Value::Null) | None => continue,
                Some(cell) => cell.clone(),
            };
            match slot.setter {
                Some(set) => set(&mut entity, value)?,
                None => {
                    entity.assign(slot.field, value)?;
                }
            }
        }
        self.rows.push(entity);
        Ok(())
    }
}

/// Forwards every row to a callback.
pub(crate) struct CallbackReader<F> {
    pub(crate) columns: Vec<String>,
    pub(crate) on_row: F,
}

impl<F> RowSink for CallbackReader<F>
where
    F: FnMut(&[String], &[Value]) -> Result<(), DataError>,
{
    fn columns(&mut self, columns: &[String]) -> Result<(), DataError> {
        self.columns = columns.to_vec();
        Ok(())
    }

    fn row(&mut self, row: Vec<Value>) -> Result<(), DataError> {
        (self.on_row)(&self.columns, &row)
    }
}
