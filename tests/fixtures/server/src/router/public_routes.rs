use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{auth, health};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/auth/login", post(auth::login))
}
