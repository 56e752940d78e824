//! Typed filter, projection and ordering expressions and their translation
//! into SQL fragments.
//!
//! # Example
//!
//! ```ignore
//! let filter = ConfigDic::TYPE.eq(10).and(ConfigDic::NAME.like("hei%"));
//! let fragment = filter.translate(Dialect::SqlServer);
//! assert_eq!(fragment.sql, "[Type] = @p0 AND [Name] LIKE @p1");
//! ```

use std::fmt::Write as _;
use std::marker::PhantomData;
use std::str::FromStr;

use crate::entity::{resolve, ColumnMap, Entity};
use crate::error::DataError;
use crate::params::{Params, ToParams};
use crate::value::Value;

/// SQL dialect spoken by a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    /// Primary dialect. Supports bulk copy, `with(nolock)` and the
    /// pagination template.
    #[default]
    SqlServer,
    MySql,
}

impl Dialect {
    pub fn quote(self, ident: &str) -> String {
        match self {
            Dialect::SqlServer => format!("[{}]", ident.replace(']', "]]")),
            Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
        }
    }

    pub fn supports_bulk_copy(self) -> bool {
        matches!(self, Dialect::SqlServer)
    }

    pub fn supports_nolock(self) -> bool {
        matches!(self, Dialect::SqlServer)
    }

    /// Whether the built-in pagination script runs on this dialect.
    pub fn ships_pagination(self) -> bool {
        matches!(self, Dialect::SqlServer)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::SqlServer => f.write_str("SQL Server"),
            Dialect::MySql => f.write_str("MySQL"),
        }
    }
}

impl FromStr for Dialect {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sql" | "sqlserver" | "mssql" => Ok(Dialect::SqlServer),
            "mysql" => Ok(Dialect::MySql),
            other => Err(DataError::Config(format!("unknown database dialect '{other}'"))),
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }
}

/// Untyped expression tree. Columns refer to Rust field names.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(&'static str),
    /// `@name`, bound from the payload or the query source.
    Param(String),
    /// Bound to a generated `@pN` parameter.
    Literal(Value),
    Compare {
        left: Box<Expr>,
        op: CompareOp,
        right: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
    },
    In {
        expr: Box<Expr>,
        list: Vec<Expr>,
    },
}

/// Operand of a comparison: a literal value, a named parameter or another
/// column.
pub enum Operand<E> {
    Value(Value),
    Param(String),
    Column(Column<E>),
}

impl<E, V: Into<Value>> From<V> for Operand<E> {
    fn from(v: V) -> Self {
        Operand::Value(v.into())
    }
}

impl<E> Operand<E> {
    fn into_expr(self) -> Expr {
        match self {
            Operand::Value(v) => Expr::Literal(v),
            Operand::Param(name) => Expr::Param(name),
            Operand::Column(c) => Expr::Column(c.field),
        }
    }
}

/// Named parameter operand: `ConfigDic::ID.eq(param("Id"))` renders `[Id] = @Id`.
pub fn param<E>(name: &str) -> Operand<E> {
    Operand::Param(crate::params::normalize_name(name).to_string())
}

/// Typed handle on one field of `E`. Generated as associated constants by
/// `#[derive(Entity)]`.
pub struct Column<E> {
    field: &'static str,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Column<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Column<E> {}

impl<E> std::fmt::Debug for Column<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Column").field(&self.field).finish()
    }
}

impl<E> Column<E> {
    pub const fn new(field: &'static str) -> Self {
        Self {
            field,
            _entity: PhantomData,
        }
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    fn compare(self, op: CompareOp, rhs: Operand<E>) -> Predicate<E> {
        Predicate::from_expr(Expr::Compare {
            left: Box::new(Expr::Column(self.field)),
            op,
            right: Box::new(rhs.into_expr()),
        })
    }

    pub fn eq(self, rhs: impl Into<Operand<E>>) -> Predicate<E> {
        self.compare(CompareOp::Eq, rhs.into())
    }

    pub fn ne(self, rhs: impl Into<Operand<E>>) -> Predicate<E> {
        self.compare(CompareOp::Ne, rhs.into())
    }

    pub fn gt(self, rhs: impl Into<Operand<E>>) -> Predicate<E> {
        self.compare(CompareOp::Gt, rhs.into())
    }

    pub fn ge(self, rhs: impl Into<Operand<E>>) -> Predicate<E> {
        self.compare(CompareOp::Ge, rhs.into())
    }

    pub fn lt(self, rhs: impl Into<Operand<E>>) -> Predicate<E> {
        self.compare(CompareOp::Lt, rhs.into())
    }

    pub fn le(self, rhs: impl Into<Operand<E>>) -> Predicate<E> {
        self.compare(CompareOp::Le, rhs.into())
    }

    pub fn like(self, pattern: impl Into<Operand<E>>) -> Predicate<E> {
        Predicate::from_expr(Expr::Like {
            expr: Box::new(Expr::Column(self.field)),
            pattern: Box::new(pattern.into().into_expr()),
        })
    }

    pub fn is_null(self) -> Predicate<E> {
        Predicate::from_expr(Expr::IsNull {
            expr: Box::new(Expr::Column(self.field)),
            negated: false,
        })
    }

    pub fn is_not_null(self) -> Predicate<E> {
        Predicate::from_expr(Expr::IsNull {
            expr: Box::new(Expr::Column(self.field)),
            negated: true,
        })
    }

    pub fn in_list<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Predicate<E> {
        Predicate::from_expr(Expr::In {
            expr: Box::new(Expr::Column(self.field)),
            list: values.into_iter().map(|v| Expr::Literal(v.into())).collect(),
        })
    }

    pub fn asc(self) -> Order<E> {
        Order {
            column: self,
            descending: false,
        }
    }

    pub fn desc(self) -> Order<E> {
        Order {
            column: self,
            descending: true,
        }
    }
}

impl<E> From<Column<E>> for Operand<E> {
    fn from(c: Column<E>) -> Self {
        Operand::Column(c)
    }
}

/// Boolean filter over `E`.
pub struct Predicate<E> {
    expr: Expr,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Predicate<E> {
    fn clone(&self) -> Self {
        Self::from_expr(self.expr.clone())
    }
}

impl<E> std::fmt::Debug for Predicate<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.expr.fmt(f)
    }
}

impl<E> Predicate<E> {
    pub fn from_expr(expr: Expr) -> Self {
        Self {
            expr,
            _entity: PhantomData,
        }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn and(self, other: Predicate<E>) -> Self {
        Self::from_expr(Expr::And(Box::new(self.expr), Box::new(other.expr)))
    }

    pub fn or(self, other: Predicate<E>) -> Self {
        Self::from_expr(Expr::Or(Box::new(self.expr), Box::new(other.expr)))
    }
}

impl<E> std::ops::Not for Predicate<E> {
    type Output = Predicate<E>;

    fn not(self) -> Self::Output {
        Self::from_expr(Expr::Not(Box::new(self.expr)))
    }
}

impl<E: Entity> Predicate<E> {
    pub fn translate(&self, dialect: Dialect) -> Fragment {
        translate_predicate(&self.expr, &resolve::<E>(), E::table_name(), dialect)
    }
}

/// Ordering on a single field.
pub struct Order<E> {
    column: Column<E>,
    descending: bool,
}

impl<E> Order<E> {
    /// Order by `column`, descending unless [`asc`](Column::asc) is used.
    pub fn by(column: Column<E>) -> Self {
        column.desc()
    }

    pub fn is_descending(&self) -> bool {
        self.descending
    }
}

/// SQL text plus the parameters generated for literals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub sql: String,
    pub params: Params,
}

struct Translator<'a> {
    columns: &'a ColumnMap,
    table: String,
    dialect: Dialect,
    sql: String,
    params: Params,
}

impl Translator<'_> {
    fn column(&mut self, field: &str) {
        let column = self.columns.column(field).unwrap_or(field);
        let quoted = self.dialect.quote(column);
        let _ = write!(self.sql, "{}.{}", self.table, quoted);
    }

    fn literal(&mut self, value: &Value) {
        let name = format!("p{}", self.params.len());
        let _ = write!(self.sql, "@{name}");
        self.params.insert(&name, value.clone());
    }

    fn walk(&mut self, expr: &Expr) {
        match expr {
            Expr::Column(field) => self.column(field),
            Expr::Param(name) => {
                let _ = write!(self.sql, "@{name}");
            }
            Expr::Literal(value) => self.literal(value),
            Expr::Compare { left, op, right } => match (op, right.as_ref()) {
                (CompareOp::Eq, Expr::Literal(Value::Null)) => {
                    self.walk(left);
                    self.sql.push_str(" IS NULL");
                }
                (CompareOp::Ne, Expr::Literal(Value::Null)) => {
                    self.walk(left);
                    self.sql.push_str(" IS NOT NULL");
                }
                _ => {
                    self.walk(left);
                    let _ = write!(self.sql, " {} ", op.as_sql());
                    self.walk(right);
                }
            },
            Expr::And(l, r) => {
                self.operand(l, true);
                self.sql.push_str(" AND ");
                self.operand(r, true);
            }
            Expr::Or(l, r) => {
                self.operand(l, false);
                self.sql.push_str(" OR ");
                self.operand(r, false);
            }
            Expr::Not(inner) => {
                self.sql.push_str("NOT (");
                self.walk(inner);
                self.sql.push(')');
            }
            Expr::IsNull { expr, negated } => {
                self.walk(expr);
                self.sql
                    .push_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Expr::Like { expr, pattern } => {
                self.walk(expr);
                self.sql.push_str(" LIKE ");
                self.walk(pattern);
            }
            Expr::In { expr, list } => {
                if list.is_empty() {
                    self.sql.push_str("1 = 0");
                    return;
                }
                self.walk(expr);
                self.sql.push_str(" IN (");
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        self.sql.push_str(", ");
                    }
                    self.walk(item);
                }
                self.sql.push(')');
            }
        }
    }

    /// OR binds looser than AND, so it is parenthesized under an AND.
    fn operand(&mut self, expr: &Expr, inside_and: bool) {
        if inside_and && matches!(expr, Expr::Or(..)) {
            self.sql.push('(');
            self.walk(expr);
            self.sql.push(')');
        } else {
            self.walk(expr);
        }
    }
}

/// Remove every `<table>.` qualifier the walker attached to a column.
pub fn strip_table_prefix(sql: &str, quoted_table: &str) -> String {
    sql.replace(&format!("{quoted_table}."), "")
}

/// Translate a predicate into a WHERE body for `table`.
pub fn translate_predicate(
    expr: &Expr,
    columns: &ColumnMap,
    table: &str,
    dialect: Dialect,
) -> Fragment {
    let quoted_table = dialect.quote(table);
    let mut t = Translator {
        columns,
        table: quoted_table.clone(),
        dialect,
        sql: String::new(),
        params: Params::new(),
    };
    t.walk(expr);
    Fragment {
        sql: strip_table_prefix(&t.sql, &quoted_table),
        params: t.params,
    }
}

/// SELECT list for `fields`; an empty selection is `*`.
pub fn translate_projection(
    fields: &[&'static str],
    columns: &ColumnMap,
    table: &str,
    dialect: Dialect,
) -> String {
    if fields.is_empty() {
        return "*".to_string();
    }
    let quoted_table = dialect.quote(table);
    let qualified = fields
        .iter()
        .map(|f| {
            let column = columns.column(f).unwrap_or(f);
            format!("{quoted_table}.{}", dialect.quote(column))
        })
        .collect::<Vec<_>>()
        .join(",");
    strip_table_prefix(&qualified, &quoted_table)
}

/// ORDER BY target and direction.
pub fn translate_order(
    field: &'static str,
    descending: bool,
    columns: &ColumnMap,
    table: &str,
    dialect: Dialect,
) -> String {
    let quoted_table = dialect.quote(table);
    let column = columns.column(field).unwrap_or(field);
    let target = format!("{quoted_table}.{}", dialect.quote(column));
    let direction = if descending { "desc" } else { "asc" };
    format!("{} {direction}", strip_table_prefix(&target, &quoted_table))
}

/// Parameters of a single-table query: projection, filter, order and the
/// source object that supplies `@name` references.
pub struct Query<'a, E> {
    fields: Vec<&'static str>,
    filter: Option<Predicate<E>>,
    order: Option<Order<E>>,
    source: Option<&'a dyn ToParams>,
    table: Option<String>,
    nolock: bool,
    columns: Option<ColumnMap>,
}

impl<E> Default for Query<'_, E> {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            filter: None,
            order: None,
            source: None,
            table: None,
            nolock: true,
            columns: None,
        }
    }
}

impl<'a, E: Entity> Query<'a, E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the SELECT list. Without it every column is selected.
    pub fn select(mut self, columns: impl IntoIterator<Item = Column<E>>) -> Self {
        self.fields = columns.into_iter().map(|c| c.field).collect();
        self
    }

    pub fn filter(mut self, predicate: Predicate<E>) -> Self {
        self.filter = Some(predicate);
        self
    }

    pub fn order_by(mut self, order: Order<E>) -> Self {
        self.order = Some(order);
        self
    }

    /// Object that `@name` references in the filter are read from.
    pub fn source(mut self, source: &'a dyn ToParams) -> Self {
        self.source = Some(source);
        self
    }

    /// Query another table with the same shape.
    pub fn table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    /// Toggle the `with(nolock)` hint (SQL Server only, on by default).
    pub fn nolock(mut self, nolock: bool) -> Self {
        self.nolock = nolock;
        self
    }

    /// Read `field` from `column` for this query only.
    pub fn map_column(mut self, field: &str, column: &str) -> Self {
        let base = self.columns.take().unwrap_or_else(|| (*resolve::<E>()).clone());
        self.columns = Some(base.with_override(field, column));
        self
    }

    pub fn table_name(&self) -> &str {
        self.table.as_deref().unwrap_or_else(|| E::table_name())
    }

    pub(crate) fn column_overrides(&self) -> Option<&ColumnMap> {
        self.columns.as_ref()
    }

    pub(crate) fn source_params(&self) -> &dyn ToParams {
        self.source.unwrap_or(&())
    }

    /// WHERE body, or `None` when the query has no filter.
    pub fn where_fragment(&self, dialect: Dialect) -> Option<Fragment> {
        let columns = resolve::<E>();
        self.filter
            .as_ref()
            .map(|p| translate_predicate(&p.expr, &columns, self.table_name(), dialect))
    }

    fn tail(&self, dialect: Dialect, where_sql: Option<&str>) -> String {
        let mut sql = String::new();
        if self.nolock && dialect.supports_nolock() {
            sql.push_str(" with(nolock)");
        }
        if let Some(w) = where_sql {
            let _ = write!(sql, " where {w}");
        }
        sql
    }

    /// `select <fields> from T [with(nolock)] [where ...] [order by ...]`.
    pub fn select_sql(&self, dialect: Dialect, where_sql: Option<&str>) -> String {
        let columns = resolve::<E>();
        let table = self.table_name();
        let mut sql = format!(
            "select {} from {table}{}",
            translate_projection(&self.fields, &columns, table, dialect),
            self.tail(dialect, where_sql)
        );
        if let Some(order) = &self.order {
            let _ = write!(
                sql,
                " order by {}",
                translate_order(order.column.field, order.descending, &columns, table, dialect)
            );
        }
        sql
    }

    /// `select count(0) from T [with(nolock)] [where ...]`.
    pub fn count_sql(&self, dialect: Dialect, where_sql: Option<&str>) -> String {
        format!(
            "select count(0) from {}{}",
            self.table_name(),
            self.tail(dialect, where_sql)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::FieldMeta;

    #[derive(Default)]
    struct Msg {
        id: i64,
        open_id: String,
    }

    impl ToParams for Msg {
        fn to_params(&self) -> Params {
            crate::params! { "Id" => self.id, "WxOpenId" => self.open_id.clone() }
        }
    }

    impl Entity for Msg {
        fn table_name() -> &'static str {
            "Wx_UserMessageTB"
        }
        fn fields() -> &'static [FieldMeta] {
            const F: &[FieldMeta] = &[
                FieldMeta::new("id").column("Id").identity(),
                FieldMeta::new("open_id").column("WxOpenId"),
                FieldMeta::new("status").column("Status"),
            ];
            F
        }
        fn assign(&mut self, _: &str, _: Value) -> Result<bool, DataError> {
            Ok(false)
        }
        fn get(&self, _: &str) -> Option<Value> {
            None
        }
    }

    const ID: Column<Msg> = Column::new("id");
    const OPEN_ID: Column<Msg> = Column::new("open_id");
    const STATUS: Column<Msg> = Column::new("status");

    #[test]
    fn test_literals_become_generated_parameters() {
        let f = STATUS.eq(1).and(OPEN_ID.like("o%")).translate(Dialect::SqlServer);
        assert_eq!(f.sql, "[Status] = @p0 AND [WxOpenId] LIKE @p1");
        assert_eq!(f.params.get("p0"), Some(&Value::Int(1)));
        assert_eq!(f.params.len(), 2);
    }

    #[test]
    fn test_output_never_contains_table_prefix() {
        let predicates = [
            ID.eq(param("Id")),
            !(STATUS.gt(0).or(OPEN_ID.is_null())),
            ID.in_list([1, 2, 3]).and(STATUS.ne(OPEN_ID)),
        ];
        for dialect in [Dialect::SqlServer, Dialect::MySql] {
            for p in &predicates {
                let sql = p.translate(dialect).sql;
                assert!(!sql.contains("Wx_UserMessageTB"), "{sql}");
            }
        }
    }

    #[test]
    fn test_or_is_parenthesized_under_and() {
        let f = ID
            .gt(1)
            .and(STATUS.eq(1).or(STATUS.eq(2)))
            .translate(Dialect::MySql);
        assert_eq!(f.sql, "`Id` > @p0 AND (`Status` = @p1 OR `Status` = @p2)");
    }

    #[test]
    fn test_null_literal_renders_is_null() {
        let f = OPEN_ID.eq(Value::Null).translate(Dialect::SqlServer);
        assert_eq!(f.sql, "[WxOpenId] IS NULL");
        assert!(f.params.is_empty());
        let f = OPEN_ID.ne(None::<String>).translate(Dialect::SqlServer);
        assert_eq!(f.sql, "[WxOpenId] IS NOT NULL");
    }

    #[test]
    fn test_select_shapes() {
        let q = Query::<Msg>::new();
        assert_eq!(
            q.select_sql(Dialect::SqlServer, None),
            "select * from Wx_UserMessageTB with(nolock)"
        );
        let q = Query::<Msg>::new()
            .select([ID, OPEN_ID])
            .order_by(Order::by(ID))
            .nolock(false);
        assert_eq!(
            q.select_sql(Dialect::SqlServer, Some("[Status] = @p0")),
            "select [Id],[WxOpenId] from Wx_UserMessageTB where [Status] = @p0 order by [Id] desc"
        );
        assert_eq!(
            Query::<Msg>::new().count_sql(Dialect::MySql, None),
            "select count(0) from Wx_UserMessageTB"
        );
    }

    #[test]
    fn test_ascending_order() {
        let q = Query::<Msg>::new().order_by(STATUS.asc());
        assert!(q.select_sql(Dialect::MySql, None).ends_with("order by `Status` asc"));
    }

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("sql".parse::<Dialect>().unwrap(), Dialect::SqlServer);
        assert_eq!("MsSql".parse::<Dialect>().unwrap(), Dialect::SqlServer);
        assert_eq!("mysql".parse::<Dialect>().unwrap(), Dialect::MySql);
        assert!("oracle".parse::<Dialect>().is_err());
    }
}
