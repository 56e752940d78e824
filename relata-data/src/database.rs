//! Caller-facing entry points.
//!
//! A [`Database`] holds the default connection settings and the registered
//! drivers. Work goes through a [`Session`], which either opens its own
//! connection for each call (standalone) or borrows one from the caller or
//! from a running transaction (ambient).

use std::collections::HashMap;
use std::sync::Arc;

use crate::bulk::{self, DataTable, FieldSelection};
use crate::driver::{Connection, Driver};
use crate::entity::{resolve, ColumnMap, Entity};
use crate::error::DataError;
use crate::executor::{self, CallbackReader, EntityReader};
use crate::page::{Page, PageRequest, PAGINATION_SQL};
use crate::params::{bind, placeholder_names, Params, ToParams};
use crate::query::{Dialect, Fragment, Predicate, Query};
use crate::settings::{DatabaseSettings, Target};
use crate::value::{convert, FromValue, Value};

/// Default settings plus one driver per dialect.
///
/// Immutable once built; share it behind an `Arc`.
pub struct Database {
    settings: DatabaseSettings,
    drivers: HashMap<Dialect, Arc<dyn Driver>>,
}

impl Database {
    pub fn new(settings: DatabaseSettings) -> Self {
        Self {
            settings,
            drivers: HashMap::new(),
        }
    }

    /// Register `driver` for the dialect it reports. A later registration
    /// for the same dialect replaces the earlier one.
    pub fn with_driver(mut self, driver: impl Driver + 'static) -> Self {
        self.drivers.insert(driver.dialect(), Arc::new(driver));
        self
    }

    pub fn settings(&self) -> &DatabaseSettings {
        &self.settings
    }

    /// Session on the default settings. Every call opens and closes its own
    /// connection.
    pub fn session(&self) -> Session<'_> {
        self.with_target(Target::default())
    }

    /// Session whose connections use `target` instead of the defaults where
    /// it says so.
    pub fn with_target(&self, target: Target) -> Session<'_> {
        Session {
            db: self,
            handle: Handle::Standalone(target),
        }
    }

    /// Session on a connection the caller opened. The engine never commits,
    /// rolls back or closes it.
    pub fn attach<'a>(&'a self, conn: &'a mut dyn Connection, dialect: Dialect) -> Session<'a> {
        Session::ambient(self, conn, dialect)
    }

    pub(crate) fn open(&self, settings: &DatabaseSettings) -> Result<Box<dyn Connection>, DataError> {
        let driver = self.drivers.get(&settings.dialect).ok_or_else(|| {
            DataError::Config(format!("no driver registered for {}", settings.dialect))
        })?;
        let conn = driver.connect(&settings.connection_string)?;
        tracing::trace!(dialect = %settings.dialect, "connection opened");
        Ok(conn)
    }
}

/// Keep the first error: a close failure only surfaces when the work itself
/// succeeded.
pub(crate) fn finish<T>(result: Result<T, DataError>, closed: Result<(), DataError>) -> Result<T, DataError> {
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => Err(err),
        (Err(err), closed) => {
            if let Err(close_err) = closed {
                tracing::warn!(error = %close_err, "failed to close connection");
            }
            Err(err)
        }
    }
}

pub(crate) enum Handle<'a> {
    /// Open, use and close a connection per call.
    Standalone(Target),
    /// Borrowed connection, left open.
    Ambient {
        conn: &'a mut dyn Connection,
        dialect: Dialect,
    },
}

/// Runs operations against one [`Database`].
pub struct Session<'a> {
    db: &'a Database,
    handle: Handle<'a>,
}

impl<'a> Session<'a> {
    pub(crate) fn ambient(db: &'a Database, conn: &'a mut dyn Connection, dialect: Dialect) -> Self {
        Self {
            db,
            handle: Handle::Ambient { conn, dialect },
        }
    }

    /// Dialect the next statement will be written for.
    pub fn dialect(&self) -> Dialect {
        match &self.handle {
            Handle::Standalone(target) => target.dialect.unwrap_or(self.db.settings.dialect),
            Handle::Ambient { dialect, .. } => *dialect,
        }
    }

    pub fn is_ambient(&self) -> bool {
        matches!(self.handle, Handle::Ambient { .. })
    }

    fn run<T>(
        &mut self,
        work: impl FnOnce(&mut dyn Connection) -> Result<T, DataError>,
    ) -> Result<T, DataError> {
        match &mut self.handle {
            Handle::Ambient { conn, .. } => work(&mut **conn),
            Handle::Standalone(target) => {
                let settings = target.resolve(&self.db.settings);
                let mut conn = self.db.open(&settings)?;
                let result = work(conn.as_mut());
                let closed = conn.close();
                finish(result, closed)
            }
        }
    }

    // ── Writes ────────────────────────────────────────────────────────────

    /// `insert into T(a,b) values(@a,@b)` over the fields of `data`, minus
    /// `ignore`. Returns whether a row was written.
    pub fn insert(&mut self, table: &str, data: &dyn ToParams, ignore: &[&str]) -> Result<bool, DataError> {
        let params = bind(data.to_params(), "", &(), ignore)?;
        if params.is_empty() {
            return Err(DataError::Binding(format!(
                "nothing to insert into {table}: every field is ignored or the payload is empty"
            )));
        }
        let sql = insert_sql(table, &params);
        self.run(|conn| {
            let mut command = executor::command(&sql, &params, &Params::new());
            Ok(executor::non_query(conn, &mut command)? > 0)
        })
    }

    /// Insert an entity into its own table. Identity columns are left to the
    /// database.
    pub fn insert_entity<E: Entity>(&mut self, entity: &E) -> Result<bool, DataError> {
        let identity: Vec<&str> = E::fields()
            .iter()
            .filter(|f| f.identity)
            .map(|f| f.column_name())
            .collect();
        self.insert(E::table_name(), entity, &identity)
    }

    /// `update T set a=@a,b=@b where <filter>`.
    ///
    /// The SET list is every field of `data` not named in `ignore`. Names the
    /// filter references but the SET list lacks are read from `data`.
    pub fn update<E: Entity>(
        &mut self,
        data: &dyn ToParams,
        filter: &Predicate<E>,
        ignore: &[&str],
    ) -> Result<bool, DataError> {
        let ignore = ignored_columns::<E>(ignore);
        let ignore: Vec<&str> = ignore.iter().map(String::as_str).collect();
        let assignments = bind(data.to_params(), "", &(), &ignore)?;
        let fragment = filter.translate(self.dialect());
        let sql = format!(
            "update {} set {} where {}",
            E::table_name(),
            set_list(&assignments),
            fragment.sql
        );
        let params = bind_filter(assignments, fragment, data)?;
        self.run(|conn| {
            let mut command = executor::command(&sql, &params, &Params::new());
            Ok(executor::non_query(conn, &mut command)? > 0)
        })
    }

    /// `delete from T where <filter>`, with `@name` references read from
    /// `data`.
    pub fn delete<E: Entity>(&mut self, data: &dyn ToParams, filter: &Predicate<E>) -> Result<bool, DataError> {
        let fragment = filter.translate(self.dialect());
        let sql = format!("delete from {} where {}", E::table_name(), fragment.sql);
        let params = bind_filter(Params::new(), fragment, data)?;
        self.run(|conn| {
            let mut command = executor::command(&sql, &params, &Params::new());
            Ok(executor::non_query(conn, &mut command)? > 0)
        })
    }

    // ── Reads ─────────────────────────────────────────────────────────────

    /// First column of the first row of the query, converted to `K`.
    pub fn first<E: Entity, K: FromValue>(&mut self, query: &Query<'_, E>) -> Result<Option<K>, DataError> {
        let (sql, params) = prepare_select(query, self.dialect(), SelectShape::Rows)?;
        let value = self.run(|conn| {
            let mut command = executor::command(&sql, &params, &Params::new());
            executor::scalar(conn, &mut command)
        })?;
        scalar_into(value)
    }

    /// Whether another row matches.
    ///
    /// With `identity_id == 0` any non-zero first value counts. Otherwise a
    /// match on the row identified by `identity_id` itself does not.
    pub fn exists<E: Entity>(&mut self, query: &Query<'_, E>, identity_id: i64) -> Result<bool, DataError> {
        let found = self.first::<E, i64>(query)?.unwrap_or(0);
        if identity_id == 0 {
            return Ok(found > 0);
        }
        Ok(found != 0 && found != identity_id)
    }

    pub fn count<E: Entity>(&mut self, query: &Query<'_, E>) -> Result<i64, DataError> {
        let (sql, params) = prepare_select(query, self.dialect(), SelectShape::Count)?;
        let value = self.run(|conn| {
            let mut command = executor::command(&sql, &params, &Params::new());
            executor::scalar(conn, &mut command)
        })?;
        Ok(scalar_into(value)?.unwrap_or(0))
    }

    /// First matching row.
    pub fn single<E: Entity>(&mut self, query: &Query<'_, E>) -> Result<Option<E>, DataError> {
        let (sql, params) = prepare_select(query, self.dialect(), SelectShape::Rows)?;
        let reader = reader_for(query).limit(1);
        self.read(&sql, &params, reader).map(EntityReader::into_first)
    }

    /// Every matching row, ordered when the query says so.
    pub fn more<E: Entity>(&mut self, query: &Query<'_, E>) -> Result<Vec<E>, DataError> {
        let (sql, params) = prepare_select(query, self.dialect(), SelectShape::Rows)?;
        let reader = reader_for(query);
        self.read(&sql, &params, reader).map(EntityReader::into_rows)
    }

    fn read<E: Entity>(
        &mut self,
        sql: &str,
        params: &Params,
        mut reader: EntityReader<E>,
    ) -> Result<EntityReader<E>, DataError> {
        self.run(|conn| {
            let mut command = executor::command(sql, params, &Params::new());
            executor::query(conn, &mut command, &mut reader)
        })?;
        Ok(reader)
    }

    // ── Raw SQL ───────────────────────────────────────────────────────────

    pub fn to_entity_list<E: Entity>(&mut self, sql: &str, params: &dyn ToParams) -> Result<Vec<E>, DataError> {
        self.read(sql, &params.to_params(), EntityReader::new())
            .map(EntityReader::into_rows)
    }

    /// Like [`to_entity_list`](Self::to_entity_list), reading fields from the
    /// columns `columns` names instead of the cached mapping.
    pub fn to_entity_list_with<E: Entity>(
        &mut self,
        sql: &str,
        params: &dyn ToParams,
        columns: ColumnMap,
    ) -> Result<Vec<E>, DataError> {
        let reader = EntityReader::with_columns(Arc::new(columns));
        self.read(sql, &params.to_params(), reader)
            .map(EntityReader::into_rows)
    }

    pub fn to_entity<E: Entity>(&mut self, sql: &str, params: &dyn ToParams) -> Result<Option<E>, DataError> {
        self.read(sql, &params.to_params(), EntityReader::new().limit(1))
            .map(EntityReader::into_first)
    }

    /// Affected row count.
    pub fn execute_non_query(&mut self, sql: &str, params: &dyn ToParams) -> Result<u64, DataError> {
        let params = params.to_params();
        self.run(|conn| {
            let mut command = executor::command(sql, &params, &Params::new());
            executor::non_query(conn, &mut command)
        })
    }

    /// Run a statement with output parameters and return their values.
    pub fn execute_with_outputs(
        &mut self,
        sql: &str,
        params: &dyn ToParams,
        outputs: &Params,
    ) -> Result<Params, DataError> {
        let params = params.to_params();
        self.run(|conn| {
            let mut command = executor::command(sql, &params, outputs);
            executor::non_query(conn, &mut command)?;
            Ok(outputs
                .names()
                .map(|name| (name, command.output(name).cloned().unwrap_or_default()))
                .collect())
        })
    }

    /// First column of the first row; `None` for an empty result or NULL.
    pub fn execute_scalar<K: FromValue>(&mut self, sql: &str, params: &dyn ToParams) -> Result<Option<K>, DataError> {
        let params = params.to_params();
        let value = self.run(|conn| {
            let mut command = executor::command(sql, &params, &Params::new());
            executor::scalar(conn, &mut command)
        })?;
        scalar_into(value)
    }

    /// Stream rows to `on_row`, with the column names of the result.
    pub fn execute_reader<F>(&mut self, sql: &str, params: &dyn ToParams, on_row: F) -> Result<(), DataError>
    where
        F: FnMut(&[String], &[Value]) -> Result<(), DataError>,
    {
        let params = params.to_params();
        let mut reader = CallbackReader {
            columns: Vec::new(),
            on_row,
        };
        self.run(|conn| {
            let mut command = executor::command(sql, &params, &Params::new());
            executor::query(conn, &mut command, &mut reader)
        })
    }

    // ── Pages and bulk ────────────────────────────────────────────────────

    /// One page of `E` plus the total row and page counts.
    ///
    /// Runs the built-in pagination script unless the request carries its
    /// own command text. Only SQL Server ships the script.
    ///
    /// The script executes `where_sql` in a nested batch that cannot see the
    /// command's parameters, so a `@name` there is a `Binding` error.
    pub fn paginate<E: Entity>(&mut self, request: &PageRequest) -> Result<Page<E>, DataError> {
        let text = match &request.command_text {
            Some(text) => text.as_str(),
            None if self.dialect().ships_pagination() => {
                if let Some(name) = placeholder_names(&request.where_sql).first() {
                    return Err(DataError::Binding(format!(
                        "@{name} is not visible inside the pagination script; write the filter as literal SQL"
                    )));
                }
                PAGINATION_SQL
            }
            None => return Err(DataError::capability("pagination", Dialect::SqlServer)),
        };
        let inputs = request.inputs();
        let outputs = request.outputs();
        self.run(|conn| {
            let mut command = executor::command(text, &inputs, &outputs);
            let mut reader = EntityReader::<E>::new();
            executor::query(conn, &mut command, &mut reader)?;
            let total = output_count(command.output(&request.total_count_name), &request.total_count_name)?;
            let pages = output_count(command.output(&request.page_count_name), &request.page_count_name)?;
            Ok(Page::new(reader.into_rows(), request, total, pages))
        })
    }

    /// Bulk-copy `data` into `table`. SQL Server only; the check happens
    /// before a connection is opened.
    pub fn bulk_import(&mut self, table: &str, data: &DataTable) -> Result<bool, DataError> {
        bulk::ensure_supported(self.dialect())?;
        self.run(|conn| bulk::load(conn, table, data))
    }

    pub fn bulk_import_entities<E: Entity>(
        &mut self,
        entities: &[E],
        selection: FieldSelection<'_>,
    ) -> Result<bool, DataError> {
        bulk::ensure_supported(self.dialect())?;
        let data = DataTable::from_entities(entities, selection);
        self.run(|conn| bulk::load(conn, E::table_name(), &data))
    }

    /// Like [`bulk_import_entities`](Self::bulk_import_entities), into `table`
    /// with the destination columns named by `columns` instead of the
    /// cached mapping.
    pub fn bulk_import_entities_into<E: Entity>(
        &mut self,
        table: &str,
        entities: &[E],
        selection: FieldSelection<'_>,
        columns: &ColumnMap,
    ) -> Result<bool, DataError> {
        bulk::ensure_supported(self.dialect())?;
        let data = DataTable::from_entities_with(entities, selection, columns);
        self.run(|conn| bulk::load(conn, table, &data))
    }
}

fn insert_sql(table: &str, params: &Params) -> String {
    let columns: Vec<&str> = params.names().collect();
    format!(
        "insert into {table}({}) values(@{})",
        columns.join(","),
        columns.join(",@")
    )
}

fn set_list(params: &Params) -> String {
    params
        .names()
        .map(|name| format!("{name}=@{name}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Ignore names may be given as field or column names; entity payloads are
/// keyed by column.
fn ignored_columns<E: Entity>(ignore: &[&str]) -> Vec<String> {
    let columns = resolve::<E>();
    ignore
        .iter()
        .map(|name| columns.column(name).unwrap_or(name).to_string())
        .collect()
}

/// Add the filter's literal parameters, then read every other name the
/// filter references from `source`.
///
/// A literal placeholder that shares its name with a payload parameter is a
/// `Binding` error rather than a silent overwrite.
fn bind_filter(mut payload: Params, fragment: Fragment, source: &dyn ToParams) -> Result<Params, DataError> {
    if let Some(name) = fragment.params.names().find(|name| payload.contains(name)) {
        return Err(DataError::Binding(format!(
            "filter literal @{name} collides with a payload parameter of the same name"
        )));
    }
    payload.extend(fragment.params);
    bind(payload, &fragment.sql, source, &[])
}

enum SelectShape {
    Rows,
    Count,
}

fn prepare_select<E: Entity>(
    query: &Query<'_, E>,
    dialect: Dialect,
    shape: SelectShape,
) -> Result<(String, Params), DataError> {
    let fragment = query.where_fragment(dialect);
    let where_sql = fragment.as_ref().map(|f| f.sql.as_str());
    let sql = match shape {
        SelectShape::Rows => query.select_sql(dialect, where_sql),
        SelectShape::Count => query.count_sql(dialect, where_sql),
    };
    let params = match fragment {
        Some(fragment) => bind_filter(Params::new(), fragment, query.source_params())?,
        None => Params::new(),
    };
    Ok((sql, params))
}

fn reader_for<E: Entity>(query: &Query<'_, E>) -> EntityReader<E> {
    match query.column_overrides() {
        Some(columns) => EntityReader::with_columns(Arc::new(columns.clone())),
        None => EntityReader::new(),
    }
}

fn scalar_into<K: FromValue>(value: Value) -> Result<Option<K>, DataError> {
    if value.is_null() {
        return Ok(None);
    }
    convert(value, "scalar").map(Some)
}

fn output_count(value: Option<&Value>, name: &str) -> Result<i64, DataError> {
    match value {
        None | Some(Value::Null) => Ok(0),
        Some(value) => convert(value.clone(), name),
    }
}
