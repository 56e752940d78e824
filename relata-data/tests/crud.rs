mod common;

use relata_data::prelude::*;
use relata_data::{resolve, Connection, Driver};
use relata_test::fixtures::ConfigDic;
use relata_test::MockDriver;

#[test]
fn test_insert_map_payload() {
    let (driver, db) = common::sql_server();
    let data = params! { "Name" => "heihei", "Description" => "hhaa", "Type" => 10 };

    assert!(db.session().insert("ConfigDic", &data, &[]).unwrap());

    let command = driver.last_command().unwrap();
    assert_eq!(
        command.text(),
        "insert into ConfigDic(Name,Description,Type) values(@Name,@Description,@Type)"
    );
    assert_eq!(command.parameters().len(), 3);
    assert_eq!(command.parameter("@Type"), Some(&Value::Int(10)));
    assert_eq!(driver.count("ConfigDic"), 1);
}

#[test]
fn test_insert_entity_skips_identity() {
    let (driver, db) = common::sql_server();

    assert!(db
        .session()
        .insert_entity(&ConfigDic::new("heihei", "hhaa", 10))
        .unwrap());

    let command = driver.last_command().unwrap();
    assert_eq!(
        command.text(),
        "insert into ConfigDic(Name,Description,Type) values(@Name,@Description,@Type)"
    );
    assert!(command.parameter("Id").is_none());
}

#[test]
fn test_insert_ignore_list() {
    let (driver, db) = common::sql_server();
    let data = params! { "Name" => "a", "Description" => "b", "Type" => 1 };

    db.session().insert("ConfigDic", &data, &["@description"]).unwrap();

    assert_eq!(
        driver.last_command().unwrap().text(),
        "insert into ConfigDic(Name,Type) values(@Name,@Type)"
    );
}

#[test]
fn test_insert_with_nothing_left_fails_before_connecting() {
    let (driver, db) = common::sql_server();
    let data = params! { "Name" => "a", "Type" => 1 };

    let err = db.session().insert("ConfigDic", &data, &["Name", "type"]).unwrap_err();

    assert!(matches!(err, DataError::Binding(ref msg) if msg.contains("ConfigDic")));
    assert_eq!(driver.stats().opened, 0);
    assert_eq!(driver.count("ConfigDic"), 0);
}

#[test]
fn test_filter_literal_cannot_shadow_a_set_column() {
    let (driver, db) = common::sql_server();
    common::seed_dic(&driver, &[("a", 1), ("b", 2)]);
    let data = params! { "p0" => "x", "Name" => "renamed" };

    let err = db
        .session()
        .update(&data, &ConfigDic::KIND.eq(2), &[])
        .unwrap_err();

    assert!(matches!(err, DataError::Binding(ref msg) if msg.contains("@p0")));
    assert_eq!(driver.stats().opened, 0);
}

#[test]
fn test_single_and_more() {
    let (driver, db) = common::sql_server();
    common::seed_dic(&driver, &[("a", 1), ("b", 2), ("c", 2)]);
    let mut session = db.session();

    let query = Query::<ConfigDic>::new()
        .filter(ConfigDic::KIND.eq(2))
        .order_by(ConfigDic::ID.asc());
    let rows = session.more(&query).unwrap();
    assert_eq!(
        driver.last_command().unwrap().text(),
        "select * from ConfigDic with(nolock) where [Type] = @p0 order by [Id] asc"
    );
    assert_eq!(
        rows.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
        vec!["b", "c"]
    );
    assert_eq!(rows[0].description, None);

    let newest = session
        .single(&Query::<ConfigDic>::new().order_by(Order::by(ConfigDic::ID)))
        .unwrap()
        .unwrap();
    assert_eq!(newest.id, 3);

    let none = session
        .single(&Query::<ConfigDic>::new().filter(ConfigDic::NAME.eq("zzz")))
        .unwrap();
    assert!(none.is_none());
}

#[test]
fn test_update_reads_filter_parameters_from_data() {
    let (driver, db) = common::sql_server();
    common::seed_dic(&driver, &[("a", 1), ("b", 2)]);
    let mut session = db.session();

    let mut row = session
        .single(&Query::<ConfigDic>::new().filter(ConfigDic::NAME.eq("b")))
        .unwrap()
        .unwrap();
    row.name = "renamed".to_string();

    let updated = session
        .update(&row, &ConfigDic::ID.eq(param("Id")), &["id"])
        .unwrap();
    assert!(updated);

    let command = driver.last_command().unwrap();
    assert_eq!(
        command.text(),
        "update ConfigDic set Name=@Name,Description=@Description,Type=@Type where [Id] = @Id"
    );
    assert_eq!(command.parameter("Id"), Some(&Value::Int(2)));
    driver.with_db(|db| {
        let table = db.table("ConfigDic").unwrap();
        assert_eq!(table.value(1, "Name"), Some(&Value::from("renamed")));
        assert_eq!(table.value(0, "Name"), Some(&Value::from("a")));
    });
}

#[test]
fn test_delete() {
    let (driver, db) = common::sql_server();
    common::seed_dic(&driver, &[("a", 1), ("b", 2)]);

    let deleted = db
        .session()
        .delete(&params! { "Id" => 2 }, &ConfigDic::ID.eq(param("Id")))
        .unwrap();

    assert!(deleted);
    assert_eq!(
        driver.last_command().unwrap().text(),
        "delete from ConfigDic where [Id] = @Id"
    );
    assert_eq!(driver.count("ConfigDic"), 1);
}

#[test]
fn test_missing_filter_parameter_fails_before_connecting() {
    let (driver, db) = common::sql_server();

    let err = db
        .session()
        .delete(&(), &ConfigDic::ID.eq(param("Id")))
        .unwrap_err();

    assert!(matches!(err, DataError::Binding(ref msg) if msg.contains("@Id")));
    assert_eq!(driver.stats().opened, 0);
}

#[test]
fn test_count_first_exists() {
    let (driver, db) = common::sql_server();
    common::seed_dic(&driver, &[("a", 1), ("b", 2), ("c", 2)]);
    let mut session = db.session();

    let count = session
        .count(&Query::<ConfigDic>::new().filter(ConfigDic::KIND.eq(2)))
        .unwrap();
    assert_eq!(count, 2);
    assert_eq!(
        driver.last_command().unwrap().text(),
        "select count(0) from ConfigDic with(nolock) where [Type] = @p0"
    );
    assert_eq!(session.count(&Query::<ConfigDic>::new()).unwrap(), 3);

    let source = params! { "Name" => "b" };
    let by_name = Query::<ConfigDic>::new()
        .select([ConfigDic::ID])
        .filter(ConfigDic::NAME.eq(param("Name")))
        .source(&source);
    assert_eq!(session.first::<_, i64>(&by_name).unwrap(), Some(2));

    assert!(session.exists(&by_name, 0).unwrap());
    assert!(!session.exists(&by_name, 2).unwrap());
    assert!(session.exists(&by_name, 3).unwrap());

    let missing = Query::<ConfigDic>::new()
        .select([ConfigDic::ID])
        .filter(ConfigDic::NAME.eq("nobody"));
    assert_eq!(session.first::<_, i64>(&missing).unwrap(), None);
    assert!(!session.exists(&missing, 0).unwrap());
}

#[test]
fn test_nolock_only_on_sql_server() {
    let (driver, db) = common::mysql();

    db.session().count(&Query::<ConfigDic>::new()).unwrap();

    assert_eq!(
        driver.last_command().unwrap().text(),
        "select count(0) from ConfigDic"
    );
}

#[test]
fn test_raw_sql() {
    let (driver, db) = common::sql_server();
    common::seed_dic(&driver, &[("a", 1), ("b", 2), ("c", 2)]);
    let mut session = db.session();
    let by_type = params! { "Type" => 2 };

    let count: Option<i64> = session
        .execute_scalar("select count(0) from ConfigDic where Type = @Type", &by_type)
        .unwrap();
    assert_eq!(count, Some(2));

    let rows: Vec<ConfigDic> = session
        .to_entity_list("select * from ConfigDic where Type = @Type order by Id desc", &by_type)
        .unwrap();
    assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![3, 2]);

    let one: Option<ConfigDic> = session
        .to_entity("select * from ConfigDic where Name = @Name", &params! { "Name" => "a" })
        .unwrap();
    assert_eq!(one.map(|r| r.kind), Some(1));

    let mut names = Vec::new();
    session
        .execute_reader("select Name from ConfigDic", &(), |columns, row| {
            assert_eq!(columns, ["Name".to_string()]);
            names.push(row[0].to_string());
            Ok(())
        })
        .unwrap();
    assert_eq!(names, vec!["a", "b", "c"]);

    let affected = session
        .execute_non_query("delete from ConfigDic where Type = @Type", &by_type)
        .unwrap();
    assert_eq!(affected, 2);
}

#[test]
fn test_column_override_for_one_call() {
    let (driver, db) = common::sql_server();
    driver.with_db(|db| {
        db.insert(
            "ConfigDic",
            [
                ("Name", Value::from("name")),
                ("Description", Value::from("label")),
                ("Type", Value::Int(1)),
            ],
        )
        .unwrap();
    });
    let columns = (*resolve::<ConfigDic>()).clone().with_override("name", "Description");

    let rows: Vec<ConfigDic> = db
        .session()
        .to_entity_list_with("select Id, Description from ConfigDic", &(), columns)
        .unwrap();

    assert_eq!(rows[0].name, "label");
    assert_eq!(rows[0].kind, 0);
    let cached = resolve::<ConfigDic>();
    assert_eq!(cached.column("name"), Some("Name"));
}

#[test]
fn test_query_map_column() {
    let (driver, db) = common::sql_server();
    driver.with_db(|db| {
        db.insert(
            "ConfigDic",
            [("Name", Value::from("n")), ("Description", Value::from("d")), ("Type", Value::Int(1))],
        )
        .unwrap();
    });

    let row = db
        .session()
        .single(&Query::<ConfigDic>::new().map_column("name", "Description"))
        .unwrap()
        .unwrap();

    assert_eq!(row.name, "d");
}

#[test]
fn test_output_parameters() {
    let (driver, db) = common::sql_server();
    common::seed_dic(&driver, &[("a", 1), ("b", 2)]);
    driver.on("exec usp_countdic", |db, command| {
        command.set_output("Total", Value::Int(db.count("ConfigDic") as i64));
        Ok(relata_test::Reply::Affected(0))
    });

    let outputs = db
        .session()
        .execute_with_outputs("exec usp_CountDic", &(), &params! { "Total" => 0 })
        .unwrap();

    assert_eq!(outputs.get("Total"), Some(&Value::Int(2)));
}

#[test]
fn test_standalone_calls_close_their_connections() {
    let (driver, db) = common::sql_server();
    let mut session = db.session();

    session.count(&Query::<ConfigDic>::new()).unwrap();
    session.insert_entity(&ConfigDic::new("a", "b", 1)).unwrap();
    let _ = session.execute_non_query("drop table ConfigDic", &());

    let stats = driver.stats();
    assert_eq!(stats.opened, 3);
    assert_eq!(stats.closed, 3);
}

#[test]
fn test_attached_connection_left_open() {
    let (driver, db) = common::sql_server();
    let mut conn = driver.connect(common::CONNECTION).unwrap();

    {
        let mut session = db.attach(conn.as_mut(), Dialect::SqlServer);
        assert!(session.is_ambient());
        session.insert_entity(&ConfigDic::new("a", "b", 1)).unwrap();
        assert_eq!(session.count(&Query::<ConfigDic>::new()).unwrap(), 1);
    }

    let stats = driver.stats();
    assert_eq!((stats.opened, stats.closed, stats.begun), (1, 0, 0));
    conn.close().unwrap();
    assert_eq!(driver.stats().closed, 1);
}

#[test]
fn test_driver_errors_propagate() {
    let (driver, db) = common::sql_server();
    driver.refuse_connections();

    let err = db.session().count(&Query::<ConfigDic>::new()).unwrap_err();

    assert!(matches!(err, DataError::Database(_)));
}

#[test]
fn test_target_override() {
    let (_, db) = common::sql_server();
    let mysql = MockDriver::new(Dialect::MySql);
    mysql.with_db(|db| db.create_table(relata_test::fixtures::config_dic_table()));
    let db = db.with_driver(mysql.clone());

    db.with_target(Target::new().dialect(Dialect::MySql).connection_string("Server=replica"))
        .count(&Query::<ConfigDic>::new())
        .unwrap();

    assert_eq!(mysql.stats().opened, 1);
    assert_eq!(
        mysql.last_command().unwrap().text(),
        "select count(0) from ConfigDic"
    );
}
