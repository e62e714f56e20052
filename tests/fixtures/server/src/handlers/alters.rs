use axum::{
    extract::{Path, Query},
    http::StatusCode,
    Json,
};

use crate::models::alter::{Alter, AlterCreate, AlterEvent, Filters, Notice};
use crate::models::search;

pub async fn list_alters(Query(filters): Query<Filters>) -> Json<Vec<Alter>> {
    todo!()
}

pub async fn create_alter(Json(payload): Json<AlterCreate>) -> Json<Alter> {
    todo!()
}

pub async fn get_alter(Path(id): Path<i64>) -> Json<Alter> {
    todo!()
}

pub async fn update_alter(
    Path(id): Path<i64>,
    Json(payload): Json<Option<AlterCreate>>,
) -> Json<Alter> {
    todo!()
}

pub async fn delete_alter(Path(id): Path<i64>) -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn search_alters(Query(query): Query<search::Filters>) -> Json<Vec<Alter>> {
    todo!()
}

pub async fn list_events() -> Json<Vec<AlterEvent>> {
    todo!()
}

pub async fn list_notices() -> Json<Vec<Notice>> {
    todo!()
}
