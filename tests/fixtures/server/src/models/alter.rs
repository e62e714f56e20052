use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlterStatus {
    Active,
    Dormant,
}

#[derive(Serialize)]
pub struct Alter {
    pub id: i64,
    pub name: String,
    pub status: AlterStatus,
    pub group: Option<Group>,
}

#[derive(Serialize)]
pub struct Group {
    pub title: String,
    pub members: Vec<Alter>,
}

#[derive(Serialize, Deserialize)]
pub struct AlterBase {
    pub id: i64,
    #[serde(rename = "label")]
    pub name: String,
}

#[derive(Deserialize)]
pub struct AlterCreate {
    #[serde(flatten)]
    pub base: AlterBase,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct Filters {
    pub q: Option<String>,
    #[serde(default)]
    pub limit: u32,
}

#[derive(Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum AlterEvent {
    Created(Alter),
    Archived,
    Renamed { from: String, to: String },
}

#[derive(Serialize)]
pub struct AlterId(pub i64);

#[derive(Serialize)]
#[serde(tag = "type")]
pub enum Notice {
    Event(AlterEvent),
    Shape {
        #[serde(rename = "type")]
        kind: String,
        alter: AlterId,
    },
}
