use axum::{
    extract::{Path, State},
    Json,
};

use super::AppError;
use crate::models::user::UserOut;
use crate::AppState;

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserOut>, AppError> {
    todo!()
}
