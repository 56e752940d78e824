mod common;

use relata_data::prelude::*;
use relata_test::fixtures::ConfigDic;

fn insert_then_describe() -> Vec<TransactionStep> {
    vec![
        TransactionStep::non_query("insert into ConfigDic(Name,Type) values(@Name,@Type)")
            .params(params! { "Name" => "heihei", "Type" => 10 }),
        TransactionStep::scalar("select @@IDENTITY").output("NewId"),
        TransactionStep::non_query("update ConfigDic set Description=@Description where [Id] = @NewId")
            .params(params! { "Description" => "hhaa", "NewId" => 0 })
            .input("NewId"),
    ]
}

#[test]
fn test_steps_thread_outputs_into_later_inputs() {
    let (driver, db) = common::sql_server();

    let last = db.run_steps::<ConfigDic>(&insert_then_describe()).unwrap();

    assert_eq!(last, Some(StepOutput::Affected(1)));
    let update = driver.last_command().unwrap();
    assert_eq!(update.parameter("NewId"), Some(&Value::Int(1)));
    driver.with_db(|db| {
        let table = db.table("ConfigDic").unwrap();
        assert_eq!(table.value(0, "Description"), Some(&Value::from("hhaa")));
    });
    let stats = driver.stats();
    assert_eq!((stats.opened, stats.closed), (1, 1));
    assert_eq!((stats.begun, stats.committed, stats.rolled_back), (1, 1, 0));
}

#[test]
fn test_failed_step_rolls_back_earlier_steps() {
    let (driver, db) = common::sql_server();
    common::seed_dic(&driver, &[("existing", 1)]);
    driver.fail_on("@@identity", "deadlock victim");

    let err = db.run_steps::<ConfigDic>(&insert_then_describe()).unwrap_err();

    assert!(matches!(err, DataError::Database(ref e) if e.to_string() == "deadlock victim"));
    assert_eq!(driver.count("ConfigDic"), 1);
    let stats = driver.stats();
    assert_eq!((stats.committed, stats.rolled_back, stats.closed), (0, 1, 1));
}

#[test]
fn test_empty_step_list() {
    let (driver, db) = common::sql_server();

    let last = db.run_steps::<ConfigDic>(&[]).unwrap();

    assert_eq!(last, None);
    assert_eq!(driver.stats().committed, 1);
}

#[test]
fn test_unpublished_input_keeps_given_value() {
    let (driver, db) = common::sql_server();
    common::seed_dic(&driver, &[("a", 1), ("b", 2)]);
    let steps = [TransactionStep::scalar("select count(0) from ConfigDic where Type = @Type")
        .params(params! { "Type" => 2 })
        .input("Type")];

    let last = db.run_steps::<ConfigDic>(&steps).unwrap().unwrap();

    assert_eq!(last.scalar(), Some(&Value::Int(1)));
}

#[test]
fn test_row_output_cannot_feed_a_parameter() {
    let (driver, db) = common::sql_server();
    common::seed_dic(&driver, &[("a", 1)]);
    let steps = [
        TransactionStep::entity_list("select * from ConfigDic").output("Rows"),
        TransactionStep::non_query("delete from ConfigDic where [Id] = @Rows")
            .params(params! { "Rows" => 0 })
            .input("Rows"),
    ];

    let err = db.run_steps::<ConfigDic>(&steps).unwrap_err();

    assert!(matches!(err, DataError::Binding(_)));
    assert_eq!(driver.count("ConfigDic"), 1);
    assert_eq!(driver.stats().rolled_back, 1);
}

#[test]
fn test_entity_steps() {
    let (driver, db) = common::sql_server();
    driver.with_db(|db| {
        db.insert(
            "ConfigDic",
            [("Name", Value::from("n")), ("Description", Value::from("label")), ("Type", Value::Int(3))],
        )
        .unwrap();
    });

    let list = db
        .run_steps::<ConfigDic>(&[TransactionStep::entity_list("select * from ConfigDic")])
        .unwrap()
        .unwrap()
        .into_rows();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].kind, 3);

    let step = TransactionStep::entity("select Id, Description from ConfigDic where Id = @Id")
        .params(params! { "Id" => 1 })
        .map_column("name", "Description");
    let row = db.run_steps::<ConfigDic>(&[step]).unwrap();
    match row {
        Some(StepOutput::Row(Some(dic))) => {
            assert_eq!(dic.id, 1);
            assert_eq!(dic.name, "label");
        }
        other => panic!("unexpected step output {other:?}"),
    }
}

#[test]
fn test_closure_commits() {
    let (driver, db) = common::sql_server();

    let id = db
        .transaction(|tx| {
            let mut session = tx.session();
            assert!(session.is_ambient());
            session.insert_entity(&ConfigDic::new("heihei", "hhaa", 10))?;
            session.insert_entity(&ConfigDic::new("haha", "hhaa", 10))?;
            session
                .execute_scalar::<i64>("select @@IDENTITY", &())?
                .ok_or_else(|| DataError::NotFound("identity".into()))
        })
        .unwrap();

    assert_eq!(id, 2);
    assert_eq!(driver.count("ConfigDic"), 2);
    let stats = driver.stats();
    assert_eq!((stats.opened, stats.closed, stats.committed), (1, 1, 1));
}

#[test]
fn test_closure_error_rolls_back() {
    let (driver, db) = common::sql_server();

    let result: Result<(), DataError> = db.transaction(|tx| {
        tx.session().insert_entity(&ConfigDic::new("a", "b", 1))?;
        Err(DataError::Other("abort".into()))
    });

    assert!(matches!(result, Err(DataError::Other(ref m)) if m == "abort"));
    assert_eq!(driver.count("ConfigDic"), 0);
    assert_eq!(driver.stats().rolled_back, 1);
}

#[test]
fn test_rollback_failure_keeps_original_error() {
    let (driver, db) = common::sql_server();
    driver.fail_rollback();

    let result: Result<(), DataError> = db.transaction(|tx| {
        tx.session().insert_entity(&ConfigDic::new("a", "b", 1))?;
        Err(DataError::Other("abort".into()))
    });

    assert!(matches!(result, Err(DataError::Other(ref m)) if m == "abort"));
    assert_eq!(driver.count("ConfigDic"), 0);
    assert_eq!(driver.stats().closed, 1);
}

#[test]
fn test_steps_inside_a_caller_transaction() {
    let (driver, db) = common::sql_server();

    db.transaction(|tx| {
        tx.session().insert_entity(&ConfigDic::new("a", "b", 1))?;
        let count = tx.run_steps::<ConfigDic>(&[TransactionStep::scalar("select count(0) from ConfigDic")])?;
        assert_eq!(count.and_then(|c| c.scalar().cloned()), Some(Value::Int(1)));
        Ok(())
    })
    .unwrap();

    let stats = driver.stats();
    assert_eq!((stats.opened, stats.begun, stats.committed), (1, 1, 1));
}
