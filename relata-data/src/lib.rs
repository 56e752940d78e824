//! # relata-data
//!
//! Metadata-driven access to SQL Server and MySQL: typed CRUD, ad-hoc
//! queries, paged listing, bulk import and multi-statement transactions,
//! without hand-written SQL for the common cases.
//!
//! ```ignore
//! use relata_data::prelude::*;
//!
//! #[derive(Debug, Default, Entity)]
//! #[table("ConfigDic")]
//! pub struct ConfigDic {
//!     #[identity]
//!     #[column("Id")]
//!     pub id: i64,
//!     #[column("Name")]
//!     pub name: String,
//! }
//!
//! let db = Database::new(DatabaseSettings::from_config(&config)?).with_driver(driver);
//! let rows = db
//!     .session()
//!     .more(&Query::<ConfigDic>::new().filter(ConfigDic::NAME.like("hei%")))?;
//! ```
//!
//! Connections come from a [`Driver`]; this crate ships none. See
//! `relata-data-sqlx` for MySQL and `relata-test` for an in-memory one.

extern crate self as relata_data;

pub mod bulk;
pub mod database;
pub mod driver;
pub mod entity;
pub mod error;
pub mod executor;
pub mod page;
pub mod params;
pub mod query;
pub mod settings;
pub mod transaction;
pub mod value;

pub use bulk::{DataTable, FieldSelection};
pub use database::{Database, Session};
pub use driver::{Command, Connection, Direction, Driver, Parameter, RowSink};
pub use entity::{resolve, ColumnMap, Entity, FieldMeta, Setter};
pub use error::DataError;
pub use executor::EntityReader;
pub use page::{Page, PageRequest, PAGINATION_SQL};
pub use params::{bind, placeholder_names, Params, ToParams};
pub use query::{param, Column, Dialect, Expr, Fragment, Order, Predicate, Query};
pub use relata_macros::Entity;
pub use settings::{DatabaseSettings, Target};
pub use transaction::{StepKind, StepOutput, Transaction, TransactionStep};
pub use value::{convert, FromValue, Value};

pub mod prelude {
    //! Re-exports of the most commonly used data types.
    pub use crate::{
        param, params, Column, DataError, DataTable, Database, DatabaseSettings, Dialect, Entity,
        FieldSelection, Order, Page, PageRequest, Params, Predicate, Query, Session, StepOutput,
        Target, ToParams, Transaction, TransactionStep, Value,
    };
}
