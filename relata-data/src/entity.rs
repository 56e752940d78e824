use std::sync::{Arc, Mutex, OnceLock};

use dashmap::DashMap;

use crate::error::DataError;
use crate::params::ToParams;
use crate::value::Value;

/// Reflection-free field writer generated by `#[derive(Entity)]`.
pub type Setter<E> = fn(&mut E, Value) -> Result<(), DataError>;

/// Static description of one entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMeta {
    /// Rust field name.
    pub name: &'static str,
    /// Explicit column name from `#[column("...")]`.
    pub column: Option<&'static str>,
    /// Auto-increment column, skipped by `insert_entity`.
    pub identity: bool,
}

impl FieldMeta {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            column: None,
            identity: false,
        }
    }

    pub const fn column(mut self, column: &'static str) -> Self {
        self.column = Some(column);
        self
    }

    pub const fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    /// The column this field maps to.
    pub fn column_name(&self) -> &'static str {
        self.column.unwrap_or(self.name)
    }
}

/// A record type mapped onto a single table.
///
/// Usually derived:
///
/// ```ignore
/// #[derive(Debug, Default, Entity)]
/// #[table("ConfigDic")]
/// pub struct ConfigDic {
///     #[identity]
///     #[column("Id")]
///     pub id: i64,
///     #[column("Name")]
///     pub name: String,
/// }
/// ```
///
/// Rows are materialized into `Self::default()`; fields whose column is
/// missing from a result keep their default value.
pub trait Entity: ToParams + Default + Send + Sync + 'static {
    fn table_name() -> &'static str;

    /// Fields in declaration order.
    fn fields() -> &'static [FieldMeta];

    /// Fast-path writer for `field`, when one was generated.
    fn setter(_field: &str) -> Option<Setter<Self>> {
        None
    }

    /// Name-based assignment. Returns `Ok(false)` for unknown fields.
    fn assign(&mut self, field: &str, value: Value) -> Result<bool, DataError>;

    /// Read a field by Rust name.
    fn get(&self, field: &str) -> Option<Value>;

    fn identity_field() -> Option<&'static FieldMeta> {
        Self::fields().iter().find(|f| f.identity)
    }
}

/// Field → column mapping of an entity type, in field order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    entries: Vec<(&'static str, String)>,
}

impl ColumnMap {
    pub fn from_fields(fields: &[FieldMeta]) -> Self {
        Self {
            entries: fields
                .iter()
                .map(|f| (f.name, f.column_name().to_string()))
                .collect(),
        }
    }

    /// Copy of this mapping with `field` redirected to `column`.
    ///
    /// Unknown fields are ignored.
    pub fn with_override(mut self, field: &str, column: &str) -> Self {
        if let Some(entry) = self.entries.iter_mut().find(|(f, _)| *f == field) {
            entry.1 = column.to_string();
        }
        self
    }

    pub fn column(&self, field: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, c)| c.as_str())
    }

    pub fn field_for_column(&self, column: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(_, c)| c.eq_ignore_ascii_case(column))
            .map(|(f, _)| *f)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.entries.iter().map(|(f, c)| (*f, c.as_str()))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, c)| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

static COLUMN_MAPS: OnceLock<DashMap<&'static str, Arc<ColumnMap>>> = OnceLock::new();
static BUILD_LOCK: Mutex<()> = Mutex::new(());

/// Column mapping for `E`, built on first use and cached for the process.
pub fn resolve<E: Entity>() -> Arc<ColumnMap> {
    let key = std::any::type_name::<E>();
    let cache = COLUMN_MAPS.get_or_init(DashMap::new);
    if let Some(map) = cache.get(key) {
        return Arc::clone(map.value());
    }

    let _guard = BUILD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(map) = cache.get(key) {
        return Arc::clone(map.value());
    }
    let map = Arc::new(ColumnMap::from_fields(E::fields()));
    tracing::trace!(entity = key, columns = map.len(), "column map built");
    cache.insert(key, Arc::clone(&map));
    map
}
