//! Relata - metadata-driven data access for SQL Server and MySQL.
//!
//! This facade crate re-exports the Relata sub-crates through a single
//! dependency with feature flags:
//!
//! ```ignore
//! use relata::prelude::*;
//!
//! let config = RelataConfig::load("dev")?;
//! let db = Database::new(DatabaseSettings::from_config(&config)?)
//!     .with_driver(MySqlDriver::new()?);
//! ```
//!
//! # Feature flags
//!
//! | Feature | Default | Crate |
//! |---------|---------|-------|
//! | `mysql` | no      | `relata-data-sqlx` (MySQL driver) |
//! | `test`  | no      | `relata-test` (in-memory driver and fixtures) |

// Re-export sub-crates as public modules so they're accessible as
// `relata::relata_core`, `relata::relata_data`, etc.
//
// `#[derive(Entity)]` uses `proc-macro-crate` to detect whether the user
// depends on `relata` or `relata-data` and generates the matching paths.
extern crate self as relata;

pub extern crate relata_core;
pub extern crate relata_data;
pub extern crate relata_macros;

#[cfg(feature = "mysql")]
pub use relata_data_sqlx;

#[cfg(feature = "test")]
pub use relata_test;

pub use relata_core::{init_tracing, init_tracing_with, ConfigError, RelataConfig};
pub use relata_data::*;

/// Unified prelude - import everything with `use relata::prelude::*`.
pub mod prelude {
    pub use relata_core::{ConfigError, RelataConfig};
    pub use relata_data::prelude::*;

    #[cfg(feature = "mysql")]
    pub use relata_data_sqlx::prelude::*;
}
