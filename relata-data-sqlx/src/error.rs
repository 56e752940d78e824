use relata_data::DataError;

/// Extension trait for converting `sqlx::Error` into `DataError`.
///
/// Orphan rules forbid `From<sqlx::Error> for DataError` here; use
/// `.into_data_error()` with `map_err` instead.
pub trait SqlxErrorExt {
    fn into_data_error(self) -> DataError;
}

impl SqlxErrorExt for sqlx::Error {
    fn into_data_error(self) -> DataError {
        match &self {
            sqlx::Error::RowNotFound => DataError::NotFound("row not found".into()),
            sqlx::Error::ColumnDecode { index, .. } => DataError::Conversion {
                column: index.clone(),
                expected: "a supported MySQL type",
            },
            _ => DataError::database(self),
        }
    }
}

/// Convenience alias for data-layer results using `DataError`.
pub type SqlxResult<T> = Result<T, DataError>;
