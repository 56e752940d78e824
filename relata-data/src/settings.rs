use relata_core::RelataConfig;

use crate::error::DataError;
use crate::query::Dialect;

/// Where the engine connects by default.
///
/// Fixed when the [`Database`](crate::Database) is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub connection_string: String,
    pub dialect: Dialect,
}

impl DatabaseSettings {
    pub fn new(connection_string: impl Into<String>, dialect: Dialect) -> Self {
        Self {
            connection_string: connection_string.into(),
            dialect,
        }
    }

    /// Read `database.url` (required) and `database.dialect` (defaults to
    /// SQL Server).
    pub fn from_config(config: &RelataConfig) -> Result<Self, DataError> {
        let connection_string: String = config.get("database.url")?;
        let dialect = if config.contains_key("database.dialect") {
            config.get::<String>("database.dialect")?.parse()?
        } else {
            Dialect::default()
        };
        Ok(Self {
            connection_string,
            dialect,
        })
    }
}

/// Per-call replacement for part of the default [`DatabaseSettings`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    pub connection_string: Option<String>,
    pub dialect: Option<Dialect>,
}

impl Target {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = Some(connection_string.into());
        self
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// Fill the gaps from `defaults`.
    pub(crate) fn resolve(&self, defaults: &DatabaseSettings) -> DatabaseSettings {
        DatabaseSettings {
            connection_string: self
                .connection_string
                .clone()
                .unwrap_or_else(|| defaults.connection_string.clone()),
            dialect: self.dialect.unwrap_or(defaults.dialect),
        }
    }
}
