//! One connection, one transaction: caller closures and declarative step
//! lists.

use std::collections::HashMap;
use std::sync::Arc;

use crate::database::{finish, Database, Session};
use crate::driver::{Command, Connection};
use crate::entity::{resolve, Entity};
use crate::error::DataError;
use crate::executor::{self, EntityReader};
use crate::params::{normalize_name, Params, ToParams};
use crate::query::Dialect;
use crate::settings::Target;
use crate::value::Value;

/// A running transaction. Handed to the closure passed to
/// [`Database::transaction`].
pub struct Transaction<'a> {
    db: &'a Database,
    conn: &'a mut dyn Connection,
    dialect: Dialect,
}

impl<'a> Transaction<'a> {
    /// Ambient session on this transaction's connection.
    pub fn session(&mut self) -> Session<'_> {
        Session::ambient(self.db, &mut *self.conn, self.dialect)
    }

    pub fn connection(&mut self) -> &mut dyn Connection {
        &mut *self.conn
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Run `steps` in order on this transaction's connection and return
    /// the last step's result.
    pub fn run_steps<E: Entity>(&mut self, steps: &[TransactionStep]) -> Result<Option<StepOutput<E>>, DataError> {
        let mut published: HashMap<String, Published> = HashMap::new();
        let mut command = Command::default();
        let mut last = None;

        for (index, step) in steps.iter().enumerate() {
            let mut params = step.params.clone();
            for input in &step.inputs {
                match published.get(&output_key(input)) {
                    Some(Published::Scalar(value)) => params.insert(input, value.clone()),
                    Some(Published::Tabular) => {
                        return Err(DataError::Binding(format!(
                            "output '{input}' holds rows and cannot be bound as a parameter"
                        )))
                    }
                    None => {}
                }
            }

            command.set_text(step.sql.as_str());
            command.prepare(&params, &Params::new());
            let output = match step.kind {
                StepKind::NonQuery => StepOutput::Affected(executor::non_query(&mut *self.conn, &mut command)?),
                StepKind::Scalar => StepOutput::Scalar(executor::scalar(&mut *self.conn, &mut command)?),
                StepKind::EntityList => {
                    let mut reader = step.reader::<E>();
                    executor::query(&mut *self.conn, &mut command, &mut reader)?;
                    StepOutput::Rows(reader.into_rows())
                }
                StepKind::Entity => {
                    let mut reader = step.reader::<E>().limit(1);
                    executor::query(&mut *self.conn, &mut command, &mut reader)?;
                    StepOutput::Row(reader.into_first())
                }
            };
            tracing::debug!(step = index, kind = ?step.kind, "transaction step finished");

            if let Some(name) = &step.output {
                published.insert(output_key(name), output.publish());
            }
            last = Some(output);
        }
        Ok(last)
    }
}

impl Database {
    /// Run `f` inside a transaction on a fresh connection.
    ///
    /// Commits when `f` returns `Ok`. Rolls back otherwise; a rollback
    /// failure is logged and the original error returned. The connection is
    /// closed on every path.
    pub fn transaction<T, F>(&self, f: F) -> Result<T, DataError>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, DataError>,
    {
        self.transaction_with(&Target::default(), f)
    }

    pub fn transaction_with<T, F>(&self, target: &Target, f: F) -> Result<T, DataError>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, DataError>,
    {
        let settings = target.resolve(self.settings());
        let mut conn = self.open(&settings)?;
        let result = within(conn.as_mut(), |conn| {
            let mut tx = Transaction {
                db: self,
                conn,
                dialect: settings.dialect,
            };
            f(&mut tx)
        });
        let closed = conn.close();
        finish(result, closed)
    }

    /// Run `steps` in one transaction. See [`TransactionStep`].
    pub fn run_steps<E: Entity>(&self, steps: &[TransactionStep]) -> Result<Option<StepOutput<E>>, DataError> {
        self.transaction(|tx| tx.run_steps(steps))
    }

    pub fn run_steps_with<E: Entity>(
        &self,
        target: &Target,
        steps: &[TransactionStep],
    ) -> Result<Option<StepOutput<E>>, DataError> {
        self.transaction_with(target, |tx| tx.run_steps(steps))
    }
}

fn within<T>(
    conn: &mut dyn Connection,
    f: impl FnOnce(&mut dyn Connection) -> Result<T, DataError>,
) -> Result<T, DataError> {
    conn.begin()?;
    match f(&mut *conn).and_then(|value| conn.commit().map(|()| value)) {
        Ok(value) => {
            tracing::info!("transaction committed");
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = conn.rollback() {
                tracing::warn!(error = %rollback_err, cause = %err, "rollback failed");
            }
            Err(err)
        }
    }
}

fn output_key(name: &str) -> String {
    normalize_name(name).to_ascii_lowercase()
}

enum Published {
    Scalar(Value),
    Tabular,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    NonQuery,
    Scalar,
    EntityList,
    Entity,
}

/// One statement of a [`Database::run_steps`] batch.
///
/// `inputs` names parameters to overwrite with the output of an earlier step
/// published under the same name; a name no earlier step published is left
/// as given. `output` publishes this step's result.
///
/// ```ignore
/// let steps = [
///     TransactionStep::scalar("insert into ConfigDic(Name) values(@Name);select @@IDENTITY")
///         .params(params! { "Name" => "heihei" })
///         .output("NewId"),
///     TransactionStep::non_query("update ConfigDic set Description=@D where Id=@NewId")
///         .params(params! { "D" => "x" })
///         .input("NewId"),
/// ];
/// db.run_steps::<ConfigDic>(&steps)?;
/// ```
#[derive(Debug, Clone)]
pub struct TransactionStep {
    pub kind: StepKind,
    pub sql: String,
    pub params: Params,
    pub inputs: Vec<String>,
    pub output: Option<String>,
    /// Field → column redirects used when this step reads entities.
    pub columns: Vec<(String, String)>,
}

impl TransactionStep {
    pub fn new(kind: StepKind, sql: &str) -> Self {
        Self {
            kind,
            sql: sql.to_string(),
            params: Params::new(),
            inputs: Vec::new(),
            output: None,
            columns: Vec::new(),
        }
    }

    pub fn non_query(sql: &str) -> Self {
        Self::new(StepKind::NonQuery, sql)
    }

    pub fn scalar(sql: &str) -> Self {
        Self::new(StepKind::Scalar, sql)
    }

    pub fn entity_list(sql: &str) -> Self {
        Self::new(StepKind::EntityList, sql)
    }

    pub fn entity(sql: &str) -> Self {
        Self::new(StepKind::Entity, sql)
    }

    pub fn params(mut self, params: impl ToParams) -> Self {
        self.params = params.to_params();
        self
    }

    pub fn input(mut self, name: &str) -> Self {
        self.inputs.push(name.to_string());
        self
    }

    pub fn output(mut self, name: &str) -> Self {
        self.output = Some(name.to_string());
        self
    }

    pub fn map_column(mut self, field: &str, column: &str) -> Self {
        self.columns.push((field.to_string(), column.to_string()));
        self
    }

    fn reader<E: Entity>(&self) -> EntityReader<E> {
        if self.columns.is_empty() {
            return EntityReader::new();
        }
        let columns = self
            .columns
            .iter()
            .fold((*resolve::<E>()).clone(), |map, (field, column)| map.with_override(field, column));
        EntityReader::with_columns(Arc::new(columns))
    }
}

/// What a step produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutput<E> {
    Affected(u64),
    Scalar(Value),
    Rows(Vec<E>),
    Row(Option<E>),
}

impl<E> StepOutput<E> {
    fn publish(&self) -> Published {
        match self {
            StepOutput::Affected(n) => Published::Scalar(Value::Int(*n as i64)),
            StepOutput::Scalar(value) => Published::Scalar(value.clone()),
            StepOutput::Rows(_) | StepOutput::Row(_) => Published::Tabular,
        }
    }

    pub fn affected(&self) -> Option<u64> {
        match self {
            StepOutput::Affected(n) => Some(*n),
            _ => None,
        }
    }

    pub fn scalar(&self) -> Option<&Value> {
        match self {
            StepOutput::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_rows(self) -> Vec<E> {
        match self {
            StepOutput::Rows(rows) => rows,
            StepOutput::Row(row) => row.into_iter().collect(),
            _ => Vec::new(),
        }
    }
}
