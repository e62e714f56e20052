use axum::{
    extract::{Multipart, Path},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

#[derive(Serialize)]
pub struct UploadResult {
    pub id: String,
    pub size: u64,
}

pub async fn upload(mut multipart: Multipart) -> Json<UploadResult> {
    todo!()
}

/// Streams the stored file.
/// @api response=binary
pub async fn download(Path(id): Path<String>) -> impl IntoResponse {
    todo!()
}
