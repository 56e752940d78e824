use crate::query::Dialect;

/// Errors that can occur in the data layer.
#[derive(Debug)]
pub enum DataError {
    /// The operation is not available on the active dialect. Raised before
    /// any connection is opened.
    Capability {
        operation: &'static str,
        required: Dialect,
    },
    /// A parameter referenced by a command could not be resolved.
    Binding(String),
    /// Failure reported by a driver while connecting, executing or committing.
    Database(Box<dyn std::error::Error + Send + Sync>),
    /// Source and destination shapes do not line up (bulk copy columns).
    Mapping(String),
    /// A result value could not be converted into the field type.
    Conversion {
        column: String,
        expected: &'static str,
    },
    NotFound(String),
    Config(String),
    Other(String),
}

impl DataError {
    /// Construct a `Database` variant from any error type.
    ///
    /// Used by driver crates (e.g. `relata-data-sqlx`) to wrap their native
    /// errors.
    pub fn database(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        DataError::Database(Box::new(err))
    }

    pub fn capability(operation: &'static str, required: Dialect) -> Self {
        DataError::Capability {
            operation,
            required,
        }
    }
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::Capability {
                operation,
                required,
            } => write!(f, "{operation} is only supported on {required}"),
            DataError::Binding(msg) => write!(f, "Binding error: {msg}"),
            DataError::Database(err) => write!(f, "Database error: {err}"),
            DataError::Mapping(msg) => write!(f, "Mapping error: {msg}"),
            DataError::Conversion { column, expected } => {
                write!(f, "Cannot convert column '{column}' to {expected}")
            }
            DataError::NotFound(msg) => write!(f, "Not found: {msg}"),
            DataError::Config(msg) => write!(f, "Configuration error: {msg}"),
            DataError::Other(msg) => write!(f, "Data error: {msg}"),
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::Database(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<relata_core::ConfigError> for DataError {
    fn from(err: relata_core::ConfigError) -> Self {
        DataError::Config(err.to_string())
    }
}
