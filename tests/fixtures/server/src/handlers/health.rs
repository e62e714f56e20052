/// Liveness check.
///
/// @api response=text
pub async fn health() -> &'static str {
    "ok"
}
