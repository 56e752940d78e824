//! Named parameter sets and the binder that assembles them for a command.

use std::collections::{BTreeMap, HashMap};

use crate::error::DataError;
use crate::value::Value;

/// Ordered name → value map.
///
/// Names are stored without the `@` sigil and compared ASCII
/// case-insensitively. Inserting an existing name overwrites the value in
/// place and keeps the original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, Value)>,
}

/// Strip surrounding whitespace and any leading `@` sigils.
pub fn normalize_name(name: &str) -> &str {
    name.trim().trim_start_matches('@')
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, name: &str, value: impl Into<Value>) {
        let name = normalize_name(name);
        let value = value.into();
        match self.position(name) {
            Some(idx) => self.entries[idx].1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.position(normalize_name(name))
            .map(|idx| &self.entries[idx].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(normalize_name(name)).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.position(normalize_name(name))
            .map(|idx| self.entries.remove(idx).1)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str, &Value) -> bool) {
        self.entries.retain(|(name, value)| keep(name, value));
    }

    /// Insert every entry of `other`, overwriting names already present.
    pub fn extend(&mut self, other: Params) {
        for (name, value) in other.entries {
            self.insert(&name, value);
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }
}

impl IntoIterator for Params {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: AsRef<str>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.insert(name.as_ref(), value);
        }
        params
    }
}

/// Build a [`Params`] from `name => value` pairs.
///
/// ```ignore
/// let data = params! { "Name" => "heihei", "Description" => "hhaa", "Type" => 10 };
/// ```
#[macro_export]
macro_rules! params {
    () => { $crate::Params::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut params = $crate::Params::new();
        $( params.insert($name, $value); )+
        params
    }};
}

/// A payload that can be turned into named parameters.
///
/// Implemented for keyed maps and, through `#[derive(Entity)]`, for entity
/// types (keyed by column name).
pub trait ToParams {
    fn to_params(&self) -> Params;

    /// Look up a single value by name, case-insensitively.
    fn lookup(&self, name: &str) -> Option<Value> {
        self.to_params().get(name).cloned()
    }
}

impl ToParams for Params {
    fn to_params(&self) -> Params {
        self.clone()
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl ToParams for () {
    fn to_params(&self) -> Params {
        Params::new()
    }
}

impl<T: ToParams + ?Sized> ToParams for &T {
    fn to_params(&self) -> Params {
        (**self).to_params()
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        (**self).lookup(name)
    }
}

impl<K, V, S> ToParams for HashMap<K, V, S>
where
    K: AsRef<str>,
    V: Clone + Into<Value>,
{
    fn to_params(&self) -> Params {
        self.iter().map(|(k, v)| (k.as_ref(), v.clone())).collect()
    }
}

impl<K, V> ToParams for BTreeMap<K, V>
where
    K: AsRef<str>,
    V: Clone + Into<Value>,
{
    fn to_params(&self) -> Params {
        self.iter().map(|(k, v)| (k.as_ref(), v.clone())).collect()
    }
}

impl ToParams for serde_json::Map<String, serde_json::Value> {
    fn to_params(&self) -> Params {
        self.iter().map(|(k, v)| (k.as_str(), Value::from(v))).collect()
    }
}

/// Names referenced as `@name` in a SQL fragment, in order of first
/// appearance and without duplicates.
///
/// `@@` system variables and anything inside quotes or brackets are skipped.
pub fn placeholder_names(sql: &str) -> Vec<String> {
    let bytes = sql.as_bytes();
    let mut names: Vec<String> = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' | b'`' => i = skip_quoted(bytes, i, bytes[i]),
            b'[' => i = skip_quoted(bytes, i, b']'),
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
                if end > start {
                    let name = &sql[start..end];
                    if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                        names.push(name.to_string());
                    }
                }
                i = end.max(start);
            }
            _ => i += 1,
        }
    }
    names
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Index just past the closing `close` byte; doubled closers are escapes.
fn skip_quoted(bytes: &[u8], open: usize, close: u8) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        if bytes[i] == close {
            if bytes.get(i + 1) == Some(&close) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// Assemble the parameters of a command.
///
/// Starts from `payload` minus `ignore`d names, then adds every name
/// referenced by `where_sql` that the payload lacks, fetched from `source`.
/// A referenced name missing from both is a `Binding` error.
pub fn bind(
    payload: Params,
    where_sql: &str,
    source: &dyn ToParams,
    ignore: &[&str],
) -> Result<Params, DataError> {
    let mut params = payload;
    if !ignore.is_empty() {
        params.retain(|name, _| !ignore.iter().any(|i| normalize_name(i).eq_ignore_ascii_case(name)));
    }
    for name in placeholder_names(where_sql) {
        if params.contains(&name) {
            continue;
        }
        let value = source.lookup(&name).ok_or_else(|| {
            DataError::Binding(format!(
                "parameter @{name} is referenced by the filter but missing from the payload"
            ))
        })?;
        params.insert(&name, value);
    }
    Ok(params)
}
