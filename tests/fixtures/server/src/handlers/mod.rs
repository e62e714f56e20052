pub mod admin;
pub mod alters;
pub mod auth;
pub mod files;
pub mod health;
pub mod users;

pub struct AppError(anyhow::Error);
