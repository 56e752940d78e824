use serde::{Deserialize, Serialize};

use crate::entity::{resolve, Entity};
use crate::params::Params;
use crate::value::Value;

/// Server-side pagination script for SQL Server.
///
/// Inputs: `@FieldSql`, `@Field`, `@TableName`, `@PrimaryKey`, `@PageIndex`
/// (1-based), `@PageSize`, `@WhereSql`, `@OrderSql`. Outputs: `@PageCount`,
/// `@TotalCount`. An empty `@WhereSql` selects the unfiltered branch; an
/// empty `@OrderSql` orders by the primary key, descending.
pub const PAGINATION_SQL: &str = concat!(
    "declare @Sql varchar(max)\r\n",
    "declare @Sql1 nvarchar(max)\r\n",
    "if @Field = ''\r\n",
    "begin\r\n",
    "set @Field = @FieldSql\r\n",
    "end\r\n",
    "if @OrderSql = ''\r\n",
    "begin\r\n",
    "set @OrderSql = @PrimaryKey + ' desc '\r\n",
    "end\r\n",
    "if (@WhereSql<>'')\r\n",
    "begin\r\n",
    "set @Sql = 'select ' + @FieldSql + ' from (select ROW_NUMBER() over(order by ' + @OrderSql + ') AS RowNums,' + @Field + ' from ' + @TableName + ' with(nolock) where ' + @WhereSql + ') AS T ' + ' where RowNums between ' + Str((@PageIndex-1) * @PageSize + 1) + ' and ' + Str(@PageIndex * @PageSize) + ' order by ' + @OrderSql\r\n",
    "set @Sql1 = N'Select @Count=Count(0) from ['+@TableName+'] with(nolock) where '+@WhereSql\r\n",
    "end\r\n",
    "else\r\n",
    "begin\r\n",
    "set @Sql = 'select ' + @FieldSql + ' from (select ROW_NUMBER() over(order by ' + @OrderSql + ') AS RowNums,' + @Field + ' from ' + @TableName + ' with(nolock)) AS T ' + ' where RowNums between ' + Str((@PageIndex-1) * @PageSize + 1) + ' and ' + Str(@PageIndex * @PageSize) + ' order by ' + @OrderSql\r\n",
    "set @Sql1 = N'Select @Count=Count(0) from ['+@TableName+'] with(nolock)'\r\n",
    "end\r\n",
    "execute sp_executesql @Sql1, N'@Count int output',@Count=@TotalCount output\r\n",
    "set @PageCount = ceiling(convert(float,@TotalCount)/@PageSize)\r\n",
    "print(@Sql)exec (@Sql)\r\n",
);

/// A paged fetch: which rows, in what order, and where the counts go.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub table: String,
    /// Outer SELECT list (`@FieldSql`).
    pub field_sql: String,
    /// Inner SELECT list (`@Field`); empty means "same as `field_sql`".
    pub field: String,
    pub primary_key: String,
    /// 1-based.
    pub page_index: i64,
    pub page_size: i64,
    /// Raw WHERE body; empty for no filter.
    ///
    /// The built-in script runs it in a nested batch, so it must be
    /// self-contained literal SQL. `@name` references are rejected.
    pub where_sql: String,
    /// Raw ORDER BY body; empty for primary key descending.
    pub order_sql: String,
    pub page_count_name: String,
    pub total_count_name: String,
    /// Replaces [`PAGINATION_SQL`], e.g. on MySQL.
    pub command_text: Option<String>,
    /// Extra inputs for a custom `command_text`.
    pub params: Params,
}

impl PageRequest {
    pub fn new(table: &str, primary_key: &str) -> Self {
        Self {
            table: table.to_string(),
            field_sql: "*".to_string(),
            field: String::new(),
            primary_key: primary_key.to_string(),
            page_index: 1,
            page_size: 20,
            where_sql: String::new(),
            order_sql: String::new(),
            page_count_name: "PageCount".to_string(),
            total_count_name: "TotalCount".to_string(),
            command_text: None,
            params: Params::new(),
        }
    }

    /// Defaults table and primary key from `E`'s metadata. The primary key
    /// is the identity field, else the first field.
    pub fn for_entity<E: Entity>() -> Self {
        let map = resolve::<E>();
        let primary_key = E::identity_field()
            .map(|f| f.column_name().to_string())
            .or_else(|| map.columns().next().map(str::to_string))
            .unwrap_or_default();
        Self::new(E::table_name(), &primary_key)
    }

    pub fn page(mut self, page_index: i64, page_size: i64) -> Self {
        self.page_index = page_index;
        self.page_size = page_size;
        self
    }

    pub fn fields(mut self, field_sql: &str) -> Self {
        self.field_sql = field_sql.to_string();
        self
    }

    pub fn inner_fields(mut self, field: &str) -> Self {
        self.field = field.to_string();
        self
    }

    pub fn filter(mut self, where_sql: &str) -> Self {
        self.where_sql = where_sql.to_string();
        self
    }

    pub fn order(mut self, order_sql: &str) -> Self {
        self.order_sql = order_sql.to_string();
        self
    }

    /// Output names for a custom `command_text`. The built-in script only
    /// writes `@PageCount` and `@TotalCount`.
    pub fn count_names(mut self, page_count: &str, total_count: &str) -> Self {
        self.page_count_name = page_count.to_string();
        self.total_count_name = total_count.to_string();
        self
    }

    pub fn command_text(mut self, text: &str) -> Self {
        self.command_text = Some(text.to_string());
        self
    }

    /// Extra input for a custom `command_text`; the built-in script ignores it.
    pub fn param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.insert(name, value);
        self
    }

    /// Input parameters bound to the pagination script.
    pub fn inputs(&self) -> Params {
        let mut inputs = crate::params! {
            "FieldSql" => self.field_sql.as_str(),
            "Field" => self.field.as_str(),
            "TableName" => self.table.as_str(),
            "PrimaryKey" => self.primary_key.as_str(),
            "PageIndex" => self.page_index,
            "PageSize" => self.page_size,
            "WhereSql" => self.where_sql.as_str(),
            "OrderSql" => self.order_sql.as_str(),
        };
        inputs.extend(self.params.clone());
        inputs
    }

    /// Output parameters, initialised to zero.
    pub fn outputs(&self) -> Params {
        let mut outputs = Params::new();
        if !self.page_count_name.is_empty() {
            outputs.insert(&self.page_count_name, 0);
        }
        if !self.total_count_name.is_empty() {
            outputs.insert(&self.total_count_name, 0);
        }
        outputs
    }
}

/// A page of results with pagination metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub content: Vec<T>,
    /// 1-based page index.
    pub page: i64,
    pub size: i64,
    pub total_elements: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: &PageRequest, total_elements: i64, total_pages: i64) -> Self {
        Self {
            content,
            page: request.page_index,
            size: request.page_size,
            total_elements,
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
        }
    }
}
