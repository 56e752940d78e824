//! Blocking MySQL driver.

use std::sync::Arc;

use relata_data::{Command, Connection, DataError, Dialect, Driver, RowSink};
use sqlx::mysql::MySqlConnection;
use sqlx::Connection as _;
use tokio::runtime::Runtime;

use crate::error::SqlxErrorExt;
use crate::statement::{bind_value, column_names, input_values, rewrite_placeholders, row_values};

/// [`Driver`] for MySQL over sqlx.
///
/// Every call blocks on a private current-thread runtime, so the driver
/// must not be used from inside another tokio runtime's worker thread.
///
/// Output parameters are not supported: a command that declares any fails
/// with a capability error. Bulk copy is SQL Server only.
#[derive(Clone)]
pub struct MySqlDriver {
    runtime: Arc<Runtime>,
}

impl MySqlDriver {
    pub fn new() -> Result<Self, DataError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(DataError::database)?;
        Ok(Self {
            runtime: Arc::new(runtime),
        })
    }
}

impl Driver for MySqlDriver {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn connect(&self, connection_string: &str) -> Result<Box<dyn Connection>, DataError> {
        let conn = self
            .runtime
            .block_on(MySqlConnection::connect(connection_string))
            .map_err(SqlxErrorExt::into_data_error)?;
        Ok(Box::new(SqlxConnection {
            runtime: Arc::clone(&self.runtime),
            conn: Some(conn),
        }))
    }
}

/// Connection handed out by [`MySqlDriver`].
pub struct SqlxConnection {
    runtime: Arc<Runtime>,
    conn: Option<MySqlConnection>,
}

impl SqlxConnection {
    fn live(&mut self) -> Result<&mut MySqlConnection, DataError> {
        self.conn
            .as_mut()
            .ok_or_else(|| DataError::Other("connection is closed".into()))
    }

    fn raw(&mut self, sql: &'static str) -> Result<(), DataError> {
        let runtime = Arc::clone(&self.runtime);
        let conn = self.live()?;
        runtime
            .block_on(sqlx::raw_sql(sql).execute(conn))
            .map_err(SqlxErrorExt::into_data_error)?;
        Ok(())
    }
}

fn reject_outputs(command: &Command) -> Result<(), DataError> {
    if command.has_outputs() {
        return Err(DataError::capability("output parameters", Dialect::SqlServer));
    }
    Ok(())
}

impl Connection for SqlxConnection {
    fn execute(&mut self, command: &mut Command) -> Result<u64, DataError> {
        reject_outputs(command)?;
        let (sql, names) = rewrite_placeholders(command.text());
        let values = input_values(command, &names)?;
        let runtime = Arc::clone(&self.runtime);
        let conn = self.live()?;
        let result = runtime
            .block_on(async {
                let query = values
                    .into_iter()
                    .fold(sqlx::query(&sql), bind_value);
                query.execute(conn).await
            })
            .map_err(SqlxErrorExt::into_data_error)?;
        Ok(result.rows_affected())
    }

    fn query(&mut self, command: &mut Command, sink: &mut dyn RowSink) -> Result<(), DataError> {
        reject_outputs(command)?;
        let (sql, names) = rewrite_placeholders(command.text());
        let values = input_values(command, &names)?;
        let runtime = Arc::clone(&self.runtime);
        let conn = self.live()?;
        let rows = runtime
            .block_on(async {
                let query = values
                    .into_iter()
                    .fold(sqlx::query(&sql), bind_value);
                query.fetch_all(conn).await
            })
            .map_err(SqlxErrorExt::into_data_error)?;

        // An empty result carries no column metadata here.
        let columns = rows.first().map(column_names).unwrap_or_default();
        sink.columns(&columns)?;
        for row in &rows {
            sink.row(row_values(row)?)?;
        }
        Ok(())
    }

    fn begin(&mut self) -> Result<(), DataError> {
        self.raw("START TRANSACTION")
    }

    fn commit(&mut self) -> Result<(), DataError> {
        self.raw("COMMIT")
    }

    fn rollback(&mut self) -> Result<(), DataError> {
        self.raw("ROLLBACK")
    }

    fn close(&mut self) -> Result<(), DataError> {
        match self.conn.take() {
            Some(conn) => {
                self.runtime
                    .block_on(conn.close())
                    .map_err(SqlxErrorExt::into_data_error)?;
                tracing::trace!("mysql connection closed");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relata_data::{params, Params};

    #[test]
    fn test_driver_reports_mysql() {
        let driver = MySqlDriver::new().unwrap();
        assert_eq!(driver.dialect(), Dialect::MySql);
    }

    #[test]
    fn test_malformed_url_fails_to_connect() {
        let driver = MySqlDriver::new().unwrap();
        assert!(driver.connect("not a url").is_err());
    }

    #[test]
    fn test_output_parameters_rejected() {
        let mut command = Command::new("call usp_Count(@Total)");
        command.prepare(&Params::new(), &params! { "Total" => 0 });
        assert!(matches!(
            reject_outputs(&command),
            Err(DataError::Capability {
                required: Dialect::SqlServer,
                ..
            })
        ));
    }
}
