use serde::Deserialize;

#[derive(Deserialize)]
pub struct Filters {
    pub term: String,
    pub fuzzy: bool,
}
