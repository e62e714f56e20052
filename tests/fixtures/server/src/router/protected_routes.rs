use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{alters, files, users};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/{id}", get(users::get_user))
        .route("/alters", get(alters::list_alters).post(alters::create_alter))
        .route(
            "/alters/{id}",
            get(alters::get_alter)
                .put(alters::update_alter)
                .delete(alters::delete_alter),
        )
        .route("/alters/search", get(alters::search_alters))
        .route("/events", get(alters::list_events))
        .route("/notices", get(alters::list_notices))
        .route("/files", post(files::upload))
        .route("/files/{id}", get(files::download))
}
