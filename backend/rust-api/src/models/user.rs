use serde::{Deserialize, Serialize};

use super::game::GameSummary;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub balance: i64,
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            balance: 0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlayerProfileResponse {
    pub id: String,
    pub name: String,
    pub balance: i64,
    pub own_profile: bool,
    pub games: Vec<GameSummary>,
}
