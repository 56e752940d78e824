extern crate proc_macro;
use proc_macro::TokenStream;

pub(crate) mod crate_path;
pub(crate) mod entity_derive;

/// Derive macro that maps a struct onto a database table.
///
/// Generates `relata_data::Entity` and `relata_data::ToParams` impls plus one typed column handle
/// per field (`TYPE`, `NAME`, ...) for building filters.
///
/// The struct must also implement `Default`; rows are read into a default
/// instance and columns missing from a result leave their field untouched.
///
/// # Struct-level attribute
///
/// | Attribute | Description |
/// |-----------|-------------|
/// | `#[table("...")]` | Table name (default: the struct name) |
///
/// # Field attributes
///
/// | Attribute | Description |
/// |-----------|-------------|
/// | `#[column("...")]` | Column name (default: the field name) |
/// | `#[identity]` | Auto-increment column; left out of inserts, default pager key |
///
/// # Example
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
///     #[column("Type")]
///     pub kind: Option<i32>,
/// }
///
/// let filter = ConfigDic::KIND.eq(10);
/// ```
#[proc_macro_derive(Entity, attributes(table, column, identity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    entity_derive::expand(input)
}
