use serde::Serialize;

#[derive(Serialize)]
pub struct UserOut {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
}

/// Never returned by any handler.
#[derive(Serialize)]
pub struct InternalOnly {
    pub secret: String,
}
