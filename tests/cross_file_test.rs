// Handler references are resolved across files through imports and module paths
use client_from_source::extractor::handler::{apply_shape, classify, HandlerIndex};
use client_from_source::extractor::{
    AuthTaint, DeclarationSource, Endpoint, Extractor, HttpMethod, Imports,
};
use client_from_source::parser::ParsedFile;
use client_from_source::type_resolver::Scope;
use pretty_assertions::assert_eq;
use std::path::PathBuf;

fn parsed(path: &str, module: &str, source: &str) -> ParsedFile {
    ParsedFile::from_source(PathBuf::from(path), module, source.to_string())
}

fn workspace() -> Vec<ParsedFile> {
    vec![
        parsed(
            "src/router/protected_routes.rs",
            "crate::router::protected_routes",
            r#"
            use axum::{routing::get, Router};
            use crate::handlers::users;
            use crate::handlers::alters::list_alters;

            pub fn routes() -> Router {
                Router::new()
                    .route("/users/{id}", get(users::get_user))
                    .route("/alters", get(list_alters))
                    .route("/health", get(crate::handlers::health))
                    .route("/ghost", get(users::vanished))
            }
            "#,
        ),
        parsed(
            "src/handlers/users.rs",
            "crate::handlers::users",
            r#"
            use axum::{extract::{Path, State}, Json};
            use crate::models::UserOut;

            pub async fn get_user(State(s): State<AppState>, Path(id): Path<i64>) -> Result<Json<UserOut>, AppError> {
                todo!()
            }
            "#,
        ),
        parsed(
            "src/handlers/alters.rs",
            "crate::handlers::alters",
            r#"
            use axum::{extract::Query, Json};
            use super::super::models::{Alter, Filters};

            pub async fn list_alters(Query(f): Query<Filters>) -> Json<Vec<Alter>> {
                todo!()
            }
            "#,
        ),
        parsed(
            "src/handlers/mod.rs",
            "crate::handlers",
            r#"
            pub mod alters;
            pub mod users;

            pub async fn health() -> &'static str { "ok" }
            "#,
        ),
    ]
}

fn resolve_all(files: &[ParsedFile]) -> Vec<(Endpoint, bool)> {
    let extractor = Extractor::default();
    let imports: Vec<Imports> = files.iter().map(|f| extractor.imports(f)).collect();
    let index = HandlerIndex::new(files, &imports);

    extractor
        .route_registrations(&files[0])
        .iter()
        .map(|registration| {
            let mut endpoint = Endpoint::new(registration, AuthTaint::from_file_name("protected_routes.rs"));
            let resolved = index.resolve(&registration.handler, 0, &extractor);
            let found = resolved.is_some();
            if let Some(resolved) = resolved {
                let scope = Scope::new(
                    index.module_of(resolved.file),
                    index.imports_of(resolved.file),
                    &[],
                );
                apply_shape(&mut endpoint, &classify(&resolved.signature), &scope);
                endpoint.handler = resolved.path;
            }
            (endpoint, found)
        })
        .collect()
}

#[test]
fn test_module_qualified_handler_resolves() {
    let endpoints = resolve_all(&workspace());
    let (user, found) = &endpoints[0];

    assert!(found);
    assert_eq!(user.method, HttpMethod::Get);
    assert_eq!(user.handler, "crate::handlers::users::get_user");
    assert_eq!(user.response_type.as_deref(), Some("crate::models::UserOut"));
    assert!(user.auth_required);
    assert!(!user.is_admin);
}

#[test]
fn test_imported_handler_resolves_with_relative_imports() {
    let endpoints = resolve_all(&workspace());
    let (alters, found) = &endpoints[1];

    assert!(found);
    assert_eq!(alters.handler, "crate::handlers::alters::list_alters");
    assert_eq!(alters.query_type.as_deref(), Some("crate::models::Filters"));
    assert_eq!(
        alters.response_type.as_deref(),
        Some("Vec<crate::models::Alter>")
    );
}

#[test]
fn test_crate_absolute_handler_in_mod_file() {
    let endpoints = resolve_all(&workspace());
    let (health, found) = &endpoints[2];

    assert!(found);
    assert_eq!(health.handler, "crate::handlers::health");
    assert_eq!(health.response_type, None);
}

#[test]
fn test_missing_handler_keeps_reference() {
    let endpoints = resolve_all(&workspace());
    let (ghost, found) = &endpoints[3];

    assert!(!found);
    assert_eq!(ghost.handler, "users::vanished");
    assert_eq!(ghost.path, "/ghost");
    assert_eq!(ghost.response_type, None);
}

#[test]
fn test_handler_in_unparsable_file_is_found_textually() {
    let mut files = workspace();
    files[1] = parsed(
        "src/handlers/users.rs",
        "crate::handlers::users",
        r#"
        use axum::Json;
        use crate::models::UserOut;

        pub async fn get_user(Path(id): Path<i64>) -> Json<UserOut> {
            todo!()
        }

        macro_rules! broken { ( => }
        "#,
    );
    assert!(files[1].syntax_tree.is_none());

    let endpoints = resolve_all(&files);
    let (user, found) = &endpoints[0];
    assert!(found);
    assert_eq!(user.response_type.as_deref(), Some("crate::models::UserOut"));
}
