//! Test support for Relata: an in-memory [`MockDriver`] that interprets the
//! statements the engine emits, plus shared entity fixtures.

mod db;
mod driver;
pub mod fixtures;

pub use db::{MockDb, MockTable};
pub use driver::{MockConnection, MockDriver, MockError, Reply, Stats};
