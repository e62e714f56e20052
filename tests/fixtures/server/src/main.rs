mod handlers;
mod models;
mod router;

use axum::Router;

#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(router::public_routes::routes())
        .merge(router::protected_routes::routes())
        .merge(router::admin_routes::routes())
        .with_state(state)
}

#[tokio::main]
async fn main() {
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
    axum::serve(listener, app(todo!())).await.unwrap();
}
