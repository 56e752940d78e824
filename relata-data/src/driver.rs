//! Seams between the engine and a concrete database client.

use crate::bulk::DataTable;
use crate::error::DataError;
use crate::params::{normalize_name, Params};
use crate::query::Dialect;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Name without the `@` sigil.
    pub name: String,
    pub value: Value,
    pub direction: Direction,
}

/// Command text plus its bound parameters.
///
/// [`prepare`](Command::prepare) always rebuilds the parameter list, so a
/// command reused across executions never carries stale parameters.
#[derive(Debug, Clone, Default)]
pub struct Command {
    text: String,
    parameters: Vec<Parameter>,
}

impl Command {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Clear the parameter list, then bind `inputs` and `outputs`.
    pub fn prepare(&mut self, inputs: &Params, outputs: &Params) {
        self.parameters.clear();
        for (params, direction) in [(inputs, Direction::Input), (outputs, Direction::Output)] {
            for (name, value) in params.iter() {
                self.parameters.push(Parameter {
                    name: normalize_name(name).to_string(),
                    value: value.clone(),
                    direction,
                });
            }
        }
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters
            .iter()
            .filter(|p| p.direction == Direction::Input)
    }

    /// Value of a parameter of either direction.
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        let name = normalize_name(name);
        self.parameters
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| &p.value)
    }

    pub fn output(&self, name: &str) -> Option<&Value> {
        let name = normalize_name(name);
        self.parameters
            .iter()
            .find(|p| p.direction == Direction::Output && p.name.eq_ignore_ascii_case(name))
            .map(|p| &p.value)
    }

    /// Store the value a driver read back for an output parameter.
    pub fn set_output(&mut self, name: &str, value: Value) {
        let name = normalize_name(name);
        if let Some(p) = self
            .parameters
            .iter_mut()
            .find(|p| p.direction == Direction::Output && p.name.eq_ignore_ascii_case(name))
        {
            p.value = value;
        }
    }

    pub fn has_outputs(&self) -> bool {
        self.parameters
            .iter()
            .any(|p| p.direction == Direction::Output)
    }
}

/// Receives a result set one row at a time.
///
/// `columns` is called once, before the first row.
pub trait RowSink {
    fn columns(&mut self, columns: &[String]) -> Result<(), DataError>;
    fn row(&mut self, row: Vec<Value>) -> Result<(), DataError>;
}

/// An open connection.
pub trait Connection: Send {
    /// Run a statement and return the affected row count. Output parameters
    /// are written back into `command`.
    fn execute(&mut self, command: &mut Command) -> Result<u64, DataError>;

    /// Stream the first result set into `sink`.
    fn query(&mut self, command: &mut Command, sink: &mut dyn RowSink) -> Result<(), DataError>;

    /// First column of the first row, `Value::Null` for an empty result.
    fn scalar(&mut self, command: &mut Command) -> Result<Value, DataError> {
        let mut first = FirstCell::default();
        self.query(command, &mut first)?;
        Ok(first.value.unwrap_or_default())
    }

    fn begin(&mut self) -> Result<(), DataError>;
    fn commit(&mut self) -> Result<(), DataError>;
    fn rollback(&mut self) -> Result<(), DataError>;

    /// Server-side bulk load of `data` into `table`.
    fn bulk_copy(&mut self, _table: &str, _data: &DataTable) -> Result<u64, DataError> {
        Err(DataError::capability("bulk copy", Dialect::SqlServer))
    }

    fn close(&mut self) -> Result<(), DataError> {
        Ok(())
    }
}

/// Opens connections for one dialect.
pub trait Driver: Send + Sync {
    fn dialect(&self) -> Dialect;
    fn connect(&self, connection_string: &str) -> Result<Box<dyn Connection>, DataError>;
}

#[derive(Default)]
struct FirstCell {
    value: Option<Value>,
}

impl RowSink for FirstCell {
    fn columns(&mut self, _columns: &[String]) -> Result<(), DataError> {
        Ok(())
    }

    fn row(&mut self, row: Vec<Value>) -> Result<(), DataError> {
        if self.value.is_none() {
            self.value = Some(row.into_iter().next().unwrap_or_default());
        }
        Ok(())
    }
}
