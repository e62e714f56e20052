pub mod admin_routes;
pub mod protected_routes;
pub mod public_routes;
