//! Entities and tables shared by the integration tests.

use chrono::NaiveDateTime;
use relata_data::{Entity, Value};

use crate::db::MockTable;

#[derive(Debug, Clone, Default, PartialEq, Entity)]
#[table("ConfigDic")]
pub struct ConfigDic {
    #[identity]
    #[column("Id")]
    pub id: i64,
    #[column("Name")]
    pub name: String,
    #[column("Description")]
    pub description: Option<String>,
    #[column("Type")]
    pub kind: i32,
}

impl ConfigDic {
    pub fn new(name: &str, description: &str, kind: i32) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            description: Some(description.to_string()),
            kind,
        }
    }
}

pub fn config_dic_table() -> MockTable {
    MockTable::new("ConfigDic", ["Id", "Name", "Description", "Type"]).identity("Id")
}

#[derive(Debug, Clone, Default, PartialEq, Entity)]
#[table("Wx_UserMessageTB")]
pub struct WxUserMessage {
    #[identity]
    #[column("Id")]
    pub id: i64,
    #[column("WxOpenId")]
    pub open_id: String,
    #[column("WxToken")]
    pub token: Option<String>,
    #[column("Status")]
    pub status: i32,
    #[column("Message")]
    pub message: Option<String>,
    #[column("CreateTime")]
    pub create_time: Option<NaiveDateTime>,
}

pub fn wx_user_message_table() -> MockTable {
    MockTable::new(
        "Wx_UserMessageTB",
        [
            "Id",
            "WxOpenId",
            "WxToken",
            "Status",
            "CreateTime",
            "Message",
            "ExpireTime",
            "SendTime",
        ],
    )
    .identity("Id")
}

/// `count` messages with ids `1..=count`; even ids have status 1.
pub fn wx_user_messages(count: i64) -> MockTable {
    let mut table = wx_user_message_table();
    for id in 1..=count {
        let inserted = table.insert([
            ("WxOpenId", Value::Text(format!("open-{id:02}"))),
            ("Status", Value::Int(if id % 2 == 0 { 1 } else { 0 })),
            ("Message", Value::Text(format!("message {id}"))),
        ]);
        debug_assert_eq!(inserted.ok(), Some(id));
    }
    table
}
