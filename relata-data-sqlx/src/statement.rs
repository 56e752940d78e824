//! `@name` placeholders to MySQL `?` binds, and values in both directions.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use relata_data::{Command, DataError, Value};
use sqlx::mysql::{MySql, MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column as _, Row as _, TypeInfo as _, ValueRef as _};

/// SQL text with every `@name` replaced by `?`, plus the names in bind
/// order. A name used twice is bound twice.
///
/// `@@` system variables and anything inside quotes are left alone.
pub(crate) fn rewrite_placeholders(sql: &str) -> (String, Vec<String>) {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut names = Vec::new();
    let mut i = 0;
    let mut copied = 0;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == b'\\' && quote != b'`' {
                        i += 2;
                        continue;
                    }
                    if bytes[i] == quote {
                        if bytes.get(i + 1) == Some(&quote) {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
                i += 1;
            }
            b'@' if bytes.get(i + 1) == Some(&b'@') => {
                i += 2;
                while i < bytes.len() && is_name_byte(bytes[i]) {
                    i += 1;
                }
            }
            b'@' => {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && is_name_byte(bytes[end]) {
                    end += 1;
                }
                if end == start {
                    i += 1;
                    continue;
                }
                out.push_str(&sql[copied..i]);
                out.push('?');
                names.push(sql[start..end].to_string());
                copied = end;
                i = end;
            }
            _ => i += 1,
        }
    }
    out.push_str(&sql[copied.min(sql.len())..]);
    (out, names)
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Input values for `names`, in order.
pub(crate) fn input_values(command: &Command, names: &[String]) -> Result<Vec<Value>, DataError> {
    names
        .iter()
        .map(|name| {
            command
                .inputs()
                .find(|p| p.name.eq_ignore_ascii_case(name))
                .map(|p| p.value.clone())
                .ok_or_else(|| DataError::Binding(format!("parameter @{name} has no value")))
        })
        .collect()
}

pub(crate) fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: Value,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(b),
        Value::Int(i) => query.bind(i),
        Value::Float(f) => query.bind(f),
        Value::Text(s) => query.bind(s),
        Value::Bytes(b) => query.bind(b),
        Value::DateTime(dt) => query.bind(dt),
    }
}

pub(crate) fn column_names(row: &MySqlRow) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

/// Decode every cell of `row`.
pub(crate) fn row_values(row: &MySqlRow) -> Result<Vec<Value>, DataError> {
    (0..row.len()).map(|index| cell(row, index)).collect()
}

fn cell(row: &MySqlRow, index: usize) -> Result<Value, DataError> {
    let raw = row.try_get_raw(index).map_err(DataError::database)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_ascii_uppercase();
    let column = || row.columns()[index].name().to_string();
    let decoded = match type_family(&type_name) {
        Family::Bool => row.try_get::<bool, _>(index).map(Value::Bool),
        Family::Signed => row.try_get::<i64, _>(index).map(Value::Int),
        Family::Unsigned => {
            let n = row.try_get::<u64, _>(index).map_err(DataError::database)?;
            return i64::try_from(n).map(Value::Int).map_err(|_| DataError::Conversion {
                column: column(),
                expected: "i64",
            });
        }
        Family::Year => row
            .try_get_unchecked::<u16, _>(index)
            .map(|year| Value::Int(i64::from(year))),
        Family::Float => row.try_get::<f32, _>(index).map(|f| Value::Float(f64::from(f))),
        Family::Double => row.try_get::<f64, _>(index).map(Value::Float),
        // Exact digits as text; `FromValue` parses them for numeric fields.
        Family::Decimal => row.try_get_unchecked::<String, _>(index).map(Value::Text),
        Family::Date => row
            .try_get::<NaiveDate, _>(index)
            .map(|date| date.and_hms_opt(0, 0, 0).map_or(Value::Null, Value::DateTime)),
        Family::Time => row
            .try_get::<NaiveTime, _>(index)
            .map(|time| Value::Text(time.to_string())),
        Family::DateTime => row.try_get::<NaiveDateTime, _>(index).map(Value::DateTime),
        Family::Json => row
            .try_get::<serde_json::Value, _>(index)
            .map(|json| Value::Text(json.to_string())),
        Family::Binary => row.try_get_unchecked::<Vec<u8>, _>(index).map(Value::Bytes),
        Family::Text => row.try_get_unchecked::<String, _>(index).map(Value::Text),
    };
    decoded.map_err(|_| DataError::Conversion {
        column: column(),
        expected: "a supported MySQL type",
    })
}

/// How a column of a given MySQL type is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Bool,
    Signed,
    Unsigned,
    Year,
    Float,
    Double,
    Decimal,
    Date,
    Time,
    DateTime,
    Json,
    Binary,
    /// CHAR, VARCHAR, the TEXT types, ENUM and SET.
    Text,
}

fn type_family(name: &str) -> Family {
    match name {
        "BOOLEAN" => Family::Bool,
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => Family::Signed,
        "YEAR" => Family::Year,
        n if n.starts_with("DECIMAL") => Family::Decimal,
        n if n.ends_with("UNSIGNED") => Family::Unsigned,
        "FLOAT" => Family::Float,
        "DOUBLE" => Family::Double,
        "DATE" => Family::Date,
        "TIME" => Family::Time,
        "DATETIME" | "TIMESTAMP" => Family::DateTime,
        "JSON" => Family::Json,
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT" | "GEOMETRY" => {
            Family::Binary
        }
        _ => Family::Text,
    }
}
