use axum::{extract::Query, Json};

use crate::models::audit::{AuditEntry, Page, Paginated};

pub async fn list_audit(Query(page): Query<Page>) -> Json<Paginated<AuditEntry>> {
    todo!()
}
