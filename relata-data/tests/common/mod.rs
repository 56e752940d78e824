#![allow(dead_code)]

use relata_data::prelude::*;
use relata_test::{fixtures, MockDriver};

pub const CONNECTION: &str = "Server=mock;Database=WxUtilDB";

/// SQL Server database with an empty `ConfigDic` and 25 messages.
pub fn sql_server() -> (MockDriver, Database) {
    with_dialect(Dialect::SqlServer)
}

pub fn mysql() -> (MockDriver, Database) {
    with_dialect(Dialect::MySql)
}

fn with_dialect(dialect: Dialect) -> (MockDriver, Database) {
    let driver = MockDriver::new(dialect);
    driver.with_db(|db| {
        db.create_table(fixtures::config_dic_table());
        db.create_table(fixtures::wx_user_messages(25));
    });
    let db = Database::new(DatabaseSettings::new(CONNECTION, dialect)).with_driver(driver.clone());
    (driver, db)
}

/// Seed `ConfigDic` with `(name, type)` rows; ids start at 1.
pub fn seed_dic(driver: &MockDriver, rows: &[(&str, i32)]) {
    driver.with_db(|db| {
        for (name, kind) in rows {
            db.insert(
                "ConfigDic",
                [("Name", Value::from(*name)), ("Type", Value::from(*kind))],
            )
            .unwrap();
        }
    });
}
