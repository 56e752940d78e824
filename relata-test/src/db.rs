//! In-memory tables and an interpreter for the statement shapes the engine
//! emits.
//!
//! Understood statements:
//!
//! - `insert into T(a,b) values(@a,@b)`
//! - `update T set a=@a,b=@b where <cond>`
//! - `delete from T where <cond>`
//! - `select <*|count(0)|cols> from T [with(nolock)] [where <cond>] [order by col [asc|desc]]`
//! - `select @@IDENTITY` / `select SCOPE_IDENTITY()`
//! - the pagination script
//!
//! `<cond>` is an `AND` chain of `col <op> @param`, `col IS [NOT] NULL` or
//! `1 = 0`. Several statements may be joined with `;`; the last one answers.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use relata_data::{placeholder_names, Command, DataError, DataTable, Value, PAGINATION_SQL};

use crate::driver::{MockError, Reply};

/// One in-memory table.
#[derive(Debug, Clone, PartialEq)]
pub struct MockTable {
    name: String,
    columns: Vec<String>,
    identity: Option<usize>,
    next_id: i64,
    rows: Vec<Vec<Value>>,
}

impl MockTable {
    pub fn new<S: Into<String>>(name: &str, columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.into_iter().map(Into::into).collect(),
            identity: None,
            next_id: 1,
            rows: Vec::new(),
        }
    }

    /// Mark `column` as auto-increment. Unknown columns are ignored.
    pub fn identity(mut self, column: &str) -> Self {
        self.identity = self.index(column);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn index(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
    }

    /// Cell of `row` in `column`.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.index(column)?;
        self.rows.get(row).and_then(|r| r.get(index))
    }

    /// Append a row from named values. Columns not named are NULL; the
    /// identity column is assigned when not named. Returns the identity
    /// value of the new row, or 0 without an identity column.
    pub fn insert<'a>(&mut self, values: impl IntoIterator<Item = (&'a str, Value)>) -> Result<i64, DataError> {
        let mut row = vec![Value::Null; self.columns.len()];
        for (column, value) in values {
            let index = self.index(column).ok_or_else(|| {
                DataError::Other(format!("invalid column name '{column}' in table {}", self.name))
            })?;
            row[index] = value;
        }
        let mut id = 0;
        if let Some(index) = self.identity {
            id = match row[index].as_i64() {
                Some(given) => given,
                None => self.next_id,
            };
            self.next_id = self.next_id.max(id + 1);
            row[index] = Value::Int(id);
        }
        self.rows.push(row);
        Ok(id)
    }
}

/// A set of tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockDb {
    tables: BTreeMap<String, MockTable>,
    last_identity: Option<i64>,
}

impl MockDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `table`, replacing one with the same name.
    pub fn create_table(&mut self, table: MockTable) {
        self.tables.insert(table.name.to_ascii_lowercase(), table);
    }

    pub fn table(&self, name: &str) -> Option<&MockTable> {
        self.tables.get(&unquote(name).to_ascii_lowercase())
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut MockTable, DataError> {
        self.tables
            .get_mut(&unquote(name).to_ascii_lowercase())
            .ok_or_else(|| DataError::Other(format!("invalid object name '{name}'")))
    }

    /// Row count of `name`, 0 for an unknown table.
    pub fn count(&self, name: &str) -> usize {
        self.table(name).map_or(0, MockTable::len)
    }

    /// Insert a row and remember its identity for `select @@IDENTITY`.
    pub fn insert<'a>(
        &mut self,
        table: &str,
        values: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> Result<i64, DataError> {
        let id = self.table_mut(table)?.insert(values)?;
        self.last_identity = Some(id);
        Ok(id)
    }

    /// Append every row of `data`, matching columns by name.
    pub fn copy_in(&mut self, table: &str, data: &DataTable) -> Result<u64, DataError> {
        let target = self.table_mut(table)?;
        for row in data.rows() {
            target.insert(
                data.columns()
                    .iter()
                    .map(String::as_str)
                    .zip(row.iter().cloned()),
            )?;
        }
        Ok(data.len() as u64)
    }

    /// Run `command` against the tables.
    pub fn execute(&mut self, command: &mut Command) -> Result<Reply, DataError> {
        if command.text() == PAGINATION_SQL {
            return self.paginate(command);
        }
        let text = command.text().to_string();
        let mut reply = Reply::Affected(0);
        for statement in text.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            reply = self.statement(statement, command)?;
        }
        Ok(reply)
    }

    fn statement(&mut self, sql: &str, command: &Command) -> Result<Reply, DataError> {
        let lower = sql.to_ascii_lowercase();
        if lower.starts_with("insert into ") {
            self.run_insert(&sql["insert into ".len()..], command)
        } else if lower.starts_with("update ") {
            self.run_update(&sql["update ".len()..], command)
        } else if lower.starts_with("delete from ") {
            self.run_delete(&sql["delete from ".len()..], command)
        } else if lower == "select @@identity" || lower == "select scope_identity()" {
            let id = self.last_identity.map_or(Value::Null, Value::Int);
            Ok(Reply::scalar(id))
        } else if lower.starts_with("select ") {
            self.run_select(&sql["select ".len()..], command)
        } else {
            Err(unsupported(sql))
        }
    }

    fn run_insert(&mut self, rest: &str, command: &Command) -> Result<Reply, DataError> {
        let open = rest.find('(').ok_or_else(|| unsupported(rest))?;
        let close = rest[open..].find(')').map(|i| i + open).ok_or_else(|| unsupported(rest))?;
        let table = rest[..open].trim();
        let columns: Vec<&str> = rest[open + 1..close].split(',').map(unquote).collect();

        let tail = rest[close + 1..].trim();
        let values_start = tail
            .to_ascii_lowercase()
            .find("values")
            .ok_or_else(|| unsupported(rest))?;
        let values = tail[values_start + "values".len()..]
            .trim()
            .trim_start_matches('(')
            .trim_end_matches(')');
        let values = values
            .split(',')
            .map(|token| operand(token, command))
            .collect::<Result<Vec<_>, _>>()?;
        if values.len() != columns.len() {
            return Err(unsupported(rest));
        }
        self.insert(table, columns.into_iter().zip(values))?;
        Ok(Reply::Affected(1))
    }

    fn run_update(&mut self, rest: &str, command: &Command) -> Result<Reply, DataError> {
        let (table, rest) = split_once_ci(rest, " set ").ok_or_else(|| unsupported(rest))?;
        let (assignments, cond) = split_once_ci(rest, " where ").ok_or_else(|| unsupported(rest))?;
        let assignments = assignments
            .split(',')
            .map(|a| {
                let (column, value) = a.split_once('=').ok_or_else(|| unsupported(a))?;
                Ok((unquote(column).to_string(), operand(value, command)?))
            })
            .collect::<Result<Vec<_>, DataError>>()?;
        let target = self.table_mut(table.trim())?;
        let cond = Condition::parse(cond, command)?;
        let mut touched = 0;
        for index in 0..target.rows.len() {
            if !cond.matches(target, &target.rows[index])? {
                continue;
            }
            for (column, value) in &assignments {
                let at = target.index(column).ok_or_else(|| unsupported(column))?;
                target.rows[index][at] = value.clone();
            }
            touched += 1;
        }
        Ok(Reply::Affected(touched))
    }

    fn run_delete(&mut self, rest: &str, command: &Command) -> Result<Reply, DataError> {
        let (table, cond) = split_once_ci(rest, " where ").ok_or_else(|| unsupported(rest))?;
        let target = self.table_mut(table.trim())?;
        let cond = Condition::parse(cond, command)?;
        let before = target.rows.len();
        let mut kept = Vec::with_capacity(before);
        for row in std::mem::take(&mut target.rows) {
            if !cond.matches(target, &row)? {
                kept.push(row);
            }
        }
        target.rows = kept;
        Ok(Reply::Affected((before - target.rows.len()) as u64))
    }

    fn run_select(&self, rest: &str, command: &Command) -> Result<Reply, DataError> {
        let (projection, rest) = split_once_ci(rest, " from ").ok_or_else(|| unsupported(rest))?;
        let (rest, order) = match split_once_ci(rest, " order by ") {
            Some((rest, order)) => (rest, Some(order)),
            None => (rest, None),
        };
        let (table, cond) = match split_once_ci(rest, " where ") {
            Some((table, cond)) => (table, Some(cond)),
            None => (rest, None),
        };
        let table_name = strip_nolock(table);
        let table = self
            .table(table_name)
            .ok_or_else(|| DataError::Other(format!("invalid object name '{table_name}'")))?;

        let mut rows = match cond {
            Some(cond) => filter(table, &Condition::parse(cond, command)?)?,
            None => table.rows.clone(),
        };
        if projection.trim().eq_ignore_ascii_case("count(0)") {
            return Ok(Reply::scalar(rows.len() as i64));
        }
        if let Some(order) = order {
            sort(table, &mut rows, order)?;
        }
        project(table, rows, projection)
    }

    /// Emulates [`PAGINATION_SQL`]. Like the server, it needs `@PageCount`
    /// and `@TotalCount` declared as outputs, and runs `@WhereSql` in a batch
    /// of its own where no command parameter is visible.
    fn paginate(&self, command: &mut Command) -> Result<Reply, DataError> {
        for name in ["PageCount", "TotalCount"] {
            if command.output(name).is_none() {
                return Err(undeclared(name));
            }
        }
        let text = |name: &str| command.parameter(name).map(|v| v.to_string()).unwrap_or_default();
        let number = |name: &str| command.parameter(name).and_then(Value::as_i64).unwrap_or(0);

        let table_name = text("TableName");
        let table = self
            .table(&table_name)
            .ok_or_else(|| DataError::Other(format!("invalid object name '{table_name}'")))?;
        let where_sql = text("WhereSql");
        if let Some(name) = placeholder_names(&where_sql).first() {
            return Err(undeclared(name));
        }
        let mut rows = if where_sql.is_empty() {
            table.rows.clone()
        } else {
            filter(table, &Condition::parse(&where_sql, &Command::default())?)?
        };
        let total = rows.len() as i64;

        let order = match text("OrderSql") {
            order if order.trim().is_empty() => format!("{} desc", text("PrimaryKey")),
            order => order,
        };
        sort(table, &mut rows, &order)?;

        let (index, size) = (number("PageIndex"), number("PageSize"));
        let page: Vec<Vec<Value>> = if size > 0 && index > 0 {
            rows.into_iter()
                .skip(((index - 1) * size) as usize)
                .take(size as usize)
                .collect()
        } else {
            Vec::new()
        };
        let pages = if size > 0 { (total + size - 1) / size } else { 0 };
        let reply = project(table, page, &text("FieldSql"))?;

        command.set_output("TotalCount", Value::Int(total));
        command.set_output("PageCount", Value::Int(pages));
        Ok(reply)
    }
}

fn undeclared(name: &str) -> DataError {
    DataError::database(MockError(format!("must declare the scalar variable @{name}")))
}

fn unsupported(sql: &str) -> DataError {
    DataError::Other(format!("mock database cannot interpret '{}'", sql.trim()))
}

/// Strip `[..]` or backtick quoting and surrounding whitespace.
fn unquote(ident: &str) -> &str {
    let ident = ident.trim();
    ident
        .strip_prefix('[')
        .and_then(|i| i.strip_suffix(']'))
        .or_else(|| ident.strip_prefix('`').and_then(|i| i.strip_suffix('`')))
        .unwrap_or(ident)
}

fn strip_nolock(table: &str) -> &str {
    let table = table.trim();
    let lower = table.to_ascii_lowercase();
    match lower.find("with(nolock)") {
        Some(at) => table[..at].trim(),
        None => table,
    }
}

fn split_once_ci<'a>(s: &'a str, separator: &str) -> Option<(&'a str, &'a str)> {
    let at = s.to_ascii_lowercase().find(separator)?;
    Some((&s[..at], &s[at + separator.len()..]))
}

fn split_ci<'a>(s: &'a str, separator: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut rest = s;
    while let Some((head, tail)) = split_once_ci(rest, separator) {
        parts.push(head);
        rest = tail;
    }
    parts.push(rest);
    parts
}

/// `@name`, a number, a quoted string or `null`.
fn operand(token: &str, command: &Command) -> Result<Value, DataError> {
    let token = token.trim();
    if let Some(name) = token.strip_prefix('@') {
        return command
            .parameter(name)
            .cloned()
            .ok_or_else(|| DataError::Binding(format!("must declare the scalar variable @{name}")));
    }
    if token.eq_ignore_ascii_case("null") {
        return Ok(Value::Null);
    }
    if let Some(text) = token.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        return Ok(Value::Text(text.replace("''", "'")));
    }
    if let Ok(n) = token.parse::<i64>() {
        return Ok(Value::Int(n));
    }
    if let Ok(f) = token.parse::<f64>() {
        return Ok(Value::Float(f));
    }
    Err(unsupported(token))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    IsNull,
    IsNotNull,
}

#[derive(Debug)]
struct Clause {
    column: String,
    op: Op,
    value: Value,
}

#[derive(Debug)]
enum Condition {
    Never,
    All(Vec<Clause>),
}

impl Condition {
    fn parse(sql: &str, command: &Command) -> Result<Self, DataError> {
        let mut clauses = Vec::new();
        for part in split_ci(sql, " and ") {
            let part = part.trim();
            if part.replace(' ', "") == "1=0" {
                return Ok(Condition::Never);
            }
            if part.starts_with('(') {
                return Err(unsupported(part));
            }
            clauses.push(parse_clause(part, command)?);
        }
        Ok(Condition::All(clauses))
    }

    fn matches(&self, table: &MockTable, row: &[Value]) -> Result<bool, DataError> {
        let clauses = match self {
            Condition::Never => return Ok(false),
            Condition::All(clauses) => clauses,
        };
        for clause in clauses {
            let index = table.index(&clause.column).ok_or_else(|| {
                DataError::Other(format!("invalid column name '{}'", clause.column))
            })?;
            let cell = &row[index];
            let ok = match clause.op {
                Op::IsNull => cell.is_null(),
                Op::IsNotNull => !cell.is_null(),
                Op::Like => like(cell, &clause.value),
                op => match compare(cell, &clause.value) {
                    None => false,
                    Some(ordering) => match op {
                        Op::Eq => ordering == Ordering::Equal,
                        Op::Ne => ordering != Ordering::Equal,
                        Op::Lt => ordering == Ordering::Less,
                        Op::Le => ordering != Ordering::Greater,
                        Op::Gt => ordering == Ordering::Greater,
                        Op::Ge => ordering != Ordering::Less,
                        Op::Like | Op::IsNull | Op::IsNotNull => false,
                    },
                },
            };
            if !ok {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn parse_clause(part: &str, command: &Command) -> Result<Clause, DataError> {
    let lower = part.to_ascii_lowercase();
    if let Some(column) = lower.strip_suffix(" is not null").map(|_| &part[..part.len() - " is not null".len()]) {
        return Ok(Clause {
            column: unquote(column).to_string(),
            op: Op::IsNotNull,
            value: Value::Null,
        });
    }
    if let Some(column) = lower.strip_suffix(" is null").map(|_| &part[..part.len() - " is null".len()]) {
        return Ok(Clause {
            column: unquote(column).to_string(),
            op: Op::IsNull,
            value: Value::Null,
        });
    }
    if let Some((column, value)) = split_once_ci(part, " like ") {
        return Ok(Clause {
            column: unquote(column).to_string(),
            op: Op::Like,
            value: operand(value, command)?,
        });
    }
    const OPS: [(&str, Op); 7] = [
        ("<>", Op::Ne),
        ("!=", Op::Ne),
        (">=", Op::Ge),
        ("<=", Op::Le),
        ("=", Op::Eq),
        (">", Op::Gt),
        ("<", Op::Lt),
    ];
    for (symbol, op) in OPS {
        if let Some((column, value)) = part.split_once(symbol) {
            return Ok(Clause {
                column: unquote(column).to_string(),
                op,
                value: operand(value, command)?,
            });
        }
    }
    Err(unsupported(part))
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Text(x), Value::Text(y)) => Some(x.to_lowercase().cmp(&y.to_lowercase())),
        (Value::DateTime(x), Value::DateTime(y)) => Some(x.cmp(y)),
        (Value::Bytes(x), Value::Bytes(y)) => Some(x.cmp(y)),
        _ => as_f64(a)?.partial_cmp(&as_f64(b)?),
    }
}

/// `%` wildcards at either end only.
fn like(cell: &Value, pattern: &Value) -> bool {
    let (Value::Text(cell), Value::Text(pattern)) = (cell, pattern) else {
        return false;
    };
    let cell = cell.to_lowercase();
    let pattern = pattern.to_lowercase();
    match (pattern.strip_prefix('%'), pattern.strip_suffix('%')) {
        (Some(_), Some(_)) => cell.contains(pattern.trim_matches('%')),
        (Some(suffix), None) => cell.ends_with(suffix),
        (None, Some(prefix)) => cell.starts_with(prefix),
        (None, None) => cell == pattern,
    }
}

fn filter(table: &MockTable, cond: &Condition) -> Result<Vec<Vec<Value>>, DataError> {
    let mut rows = Vec::new();
    for row in &table.rows {
        if cond.matches(table, row)? {
            rows.push(row.clone());
        }
    }
    Ok(rows)
}

/// `col [asc|desc]`; ascending when no direction is given.
fn sort(table: &MockTable, rows: &mut [Vec<Value>], order: &str) -> Result<(), DataError> {
    let mut tokens = order.split_whitespace();
    let column = tokens.next().ok_or_else(|| unsupported(order))?;
    let index = table
        .index(unquote(column))
        .ok_or_else(|| DataError::Other(format!("invalid column name '{column}'")))?;
    let descending = tokens.next().is_some_and(|d| d.eq_ignore_ascii_case("desc"));
    rows.sort_by(|a, b| {
        let ordering = match (a[index].is_null(), b[index].is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => compare(&a[index], &b[index]).unwrap_or(Ordering::Equal),
        };
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
    Ok(())
}

fn project(table: &MockTable, rows: Vec<Vec<Value>>, projection: &str) -> Result<Reply, DataError> {
    let projection = projection.trim();
    if projection.is_empty() || projection == "*" {
        return Ok(Reply::Rows {
            columns: table.columns.clone(),
            rows,
        });
    }
    let mut columns = Vec::new();
    let mut indexes = Vec::new();
    for column in projection.split(',').map(unquote) {
        let index = table
            .index(column)
            .ok_or_else(|| DataError::Other(format!("invalid column name '{column}'")))?;
        columns.push(table.columns[index].clone());
        indexes.push(index);
    }
    let rows = rows
        .into_iter()
        .map(|row| indexes.iter().map(|&i| row[i].clone()).collect())
        .collect();
    Ok(Reply::Rows { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use relata_data::params;

    fn db() -> MockDb {
        let mut db = MockDb::new();
        db.create_table(MockTable::new("ConfigDic", ["Id", "Name", "Type"]).identity("Id"));
        for (name, kind) in [("a", 1), ("b", 2), ("c", 2)] {
            db.insert("ConfigDic", [("Name", Value::from(name)), ("Type", Value::Int(kind))])
                .unwrap();
        }
        db
    }

    fn run(db: &mut MockDb, sql: &str, params: relata_data::Params) -> Reply {
        let mut command = Command::new(sql);
        command.prepare(&params, &relata_data::Params::new());
        db.execute(&mut command).unwrap()
    }

    #[test]
    fn test_identity_is_assigned() {
        let db = db();
        let table = db.table("[ConfigDic]").unwrap();
        assert_eq!(table.value(2, "id"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_select_with_filter_and_order() {
        let mut db = db();
        let reply = run(
            &mut db,
            "select [Name] from ConfigDic with(nolock) where [Type] = @p0 order by [Id] desc",
            params! { "p0" => 2 },
        );
        assert_eq!(
            reply,
            Reply::Rows {
                columns: vec!["Name".into()],
                rows: vec![vec![Value::from("c")], vec![Value::from("b")]],
            }
        );
    }

    #[test]
    fn test_update_delete_count() {
        let mut db = db();
        let reply = run(&mut db, "update ConfigDic set Name=@Name where [Id] = @Id", params! { "Name" => "z", "Id" => 1 });
        assert_eq!(reply, Reply::Affected(1));
        assert_eq!(db.table("ConfigDic").unwrap().value(0, "Name"), Some(&Value::from("z")));
        run(&mut db, "delete from ConfigDic where [Type] = @p0", params! { "p0" => 2 });
        assert_eq!(run(&mut db, "select count(0) from ConfigDic", params! {}), Reply::scalar(1));
    }

    #[test]
    fn test_insert_then_identity() {
        let mut db = db();
        let reply = run(
            &mut db,
            "insert into ConfigDic(Name,Type) values(@Name,@Type);select @@IDENTITY",
            params! { "Name" => "d", "Type" => 4 },
        );
        assert_eq!(reply, Reply::scalar(4));
    }

    #[test]
    fn test_empty_where_returns_columns_only() {
        let mut db = db();
        let reply = run(&mut db, "select * from ConfigDic where 1=0", params! {});
        assert!(matches!(reply, Reply::Rows { ref columns, ref rows } if columns.len() == 3 && rows.is_empty()));
    }

    #[test]
    fn test_like_and_null() {
        let mut db = db();
        let reply = run(
            &mut db,
            "select count(0) from ConfigDic where Name LIKE @p0 AND Type IS NOT NULL",
            params! { "p0" => "%b%" },
        );
        assert_eq!(reply, Reply::scalar(1));
    }

    fn page_command(where_sql: &str, outputs: relata_data::Params) -> Command {
        let mut command = Command::new(PAGINATION_SQL);
        let inputs = params! {
            "FieldSql" => "*", "Field" => "", "TableName" => "ConfigDic", "PrimaryKey" => "Id",
            "PageIndex" => 1, "PageSize" => 2, "WhereSql" => where_sql, "OrderSql" => "",
            "Type" => 2,
        };
        command.prepare(&inputs, &outputs);
        command
    }

    #[test]
    fn test_pagination_filter_is_literal() {
        let mut db = db();
        let mut command = page_command("Type = 2", params! { "PageCount" => 0, "TotalCount" => 0 });
        let reply = db.execute(&mut command).unwrap();
        assert!(matches!(reply, Reply::Rows { ref rows, .. } if rows.len() == 2));
        assert_eq!(command.output("TotalCount"), Some(&Value::Int(2)));
        assert_eq!(command.output("PageCount"), Some(&Value::Int(1)));

        let mut command = page_command("Type = @Type", params! { "PageCount" => 0, "TotalCount" => 0 });
        let err = db.execute(&mut command).unwrap_err();
        assert!(err.to_string().contains("@Type"));
    }

    #[test]
    fn test_pagination_needs_its_output_variables() {
        let mut db = db();
        let mut command = page_command("", params! { "Pages" => 0, "Total" => 0 });
        let err = db.execute(&mut command).unwrap_err();
        assert!(matches!(err, DataError::Database(_)));
        assert!(err.to_string().contains("@PageCount"));
    }

    #[test]
    fn test_missing_parameter() {
        let mut db = db();
        let mut command = Command::new("delete from ConfigDic where [Id] = @Id");
        assert!(matches!(db.execute(&mut command), Err(DataError::Binding(_))));
    }
}
