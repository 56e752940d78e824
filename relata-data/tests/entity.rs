use std::sync::Arc;
use std::thread;

use relata_data::prelude::*;
use relata_data::{resolve, FieldMeta};
use relata_test::fixtures::{ConfigDic, WxUserMessage};

#[derive(Debug, Default, Entity)]
struct Keyword {
    #[column("Type")]
    r#type: i32,
    r#match: String,
}

#[derive(Debug, Default, Entity)]
#[table("Empty_TB")]
struct Marker;

#[test]
fn test_derived_metadata() {
    assert_eq!(ConfigDic::table_name(), "ConfigDic");
    let fields: Vec<(&str, &str, bool)> = ConfigDic::fields()
        .iter()
        .map(|f: &FieldMeta| (f.name, f.column_name(), f.identity))
        .collect();
    assert_eq!(
        fields,
        vec![
            ("id", "Id", true),
            ("name", "Name", false),
            ("description", "Description", false),
            ("kind", "Type", false),
        ]
    );
    assert_eq!(ConfigDic::identity_field().map(|f| f.name), Some("id"));
    assert_eq!(ConfigDic::KIND.field(), "kind");
}

#[test]
fn test_to_params_keyed_by_column() {
    let dic = ConfigDic::new("heihei", "hhaa", 10);

    let params = dic.to_params();

    assert_eq!(params.names().collect::<Vec<_>>(), vec!["Id", "Name", "Description", "Type"]);
    assert_eq!(params.get("Type"), Some(&Value::Int(10)));
    assert_eq!(dic.lookup("@name"), Some(Value::from("heihei")));
    assert_eq!(dic.lookup("kind"), Some(Value::Int(10)));
    assert_eq!(dic.lookup("Missing"), None);
}

#[test]
fn test_assign_and_get() {
    let mut dic = ConfigDic::default();

    assert!(dic.assign("name", Value::from("x")).unwrap());
    assert!(dic.assign("kind", Value::from("7")).unwrap());
    assert!(!dic.assign("nope", Value::Int(1)).unwrap());
    assert!(matches!(
        dic.assign("kind", Value::from("seven")),
        Err(DataError::Conversion { ref column, .. }) if column == "Type"
    ));

    assert_eq!(dic.get("name"), Some(Value::from("x")));
    assert_eq!(dic.get("kind"), Some(Value::Int(7)));
    assert_eq!(dic.get("description"), Some(Value::Null));
}

#[test]
fn test_raw_identifiers_and_defaults() {
    assert_eq!(Keyword::table_name(), "Keyword");
    let columns = resolve::<Keyword>();
    assert_eq!(columns.column("type"), Some("Type"));
    assert_eq!(columns.column("match"), Some("match"));
    assert_eq!(Keyword::MATCH.field(), "match");

    let mut kw = Keyword::default();
    kw.assign("type", Value::Int(2)).unwrap();
    assert_eq!(kw.r#type, 2);
}

#[test]
fn test_unit_struct_maps_nothing() {
    assert_eq!(Marker::table_name(), "Empty_TB");
    assert!(Marker::fields().is_empty());
    assert!(resolve::<Marker>().is_empty());
    assert!(Marker.to_params().is_empty());
}

#[test]
fn test_mapping_resolved_once_across_threads() {
    let maps: Vec<_> = (0..8)
        .map(|_| thread::spawn(resolve::<WxUserMessage>))
        .collect::<Vec<_>>()
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect();

    assert!(maps.iter().all(|m| Arc::ptr_eq(m, &maps[0])));
    assert_eq!(maps[0].column("open_id"), Some("WxOpenId"));
}

#[test]
fn test_predicates_use_columns_without_table_prefix() {
    let filter = WxUserMessage::OPEN_ID
        .like("open-%")
        .and(WxUserMessage::STATUS.eq(param("Status")))
        .and(WxUserMessage::TOKEN.is_null());

    let mysql = filter.translate(Dialect::MySql);
    let sqlserver = filter.translate(Dialect::SqlServer);

    assert_eq!(mysql.sql, "`WxOpenId` LIKE @p0 AND `Status` = @Status AND `WxToken` IS NULL");
    assert_eq!(sqlserver.sql, "[WxOpenId] LIKE @p0 AND [Status] = @Status AND [WxToken] IS NULL");
    assert_eq!(mysql.params.get("p0"), Some(&Value::from("open-%")));
    assert!(!sqlserver.sql.contains("Wx_UserMessageTB"));
}
