use axum::{routing::get, Router};

use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().nest(
        "/admin",
        Router::new().route("/audit", get(crate::handlers::admin::list_audit)),
    )
}
