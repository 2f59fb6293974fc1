use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(rename = "joinedAt", with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(rename = "joinedAt", with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
}

/// Group conversations are addressed with this suffix; anything else is a
/// direct chat.
pub const GROUP_ID_SUFFIX: &str = "@g.us";

pub fn is_group_id(id: &str) -> bool {
    id.ends_with(GROUP_ID_SUFFIX)
}
