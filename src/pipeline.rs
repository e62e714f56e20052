//! End-to-end generation: scan, extract, resolve, close over types, emit.
//!
//! Every stage runs to completion before the next starts, since naming needs the
//! complete set of retained definitions.

use crate::closure::ApiModel;
use crate::config::GeneratorConfig;
use crate::extractor::handler::{apply_shape, classify, HandlerIndex};
use crate::extractor::{group_endpoints, AuthTaint, DeclarationSource, Endpoint, Extractor, Imports};
use crate::openapi_builder::{build_document, OpenApiDocument};
use crate::parser::{AstParser, ParsedFile};
use crate::scanner::{FileScanner, SourceFile};
use crate::serializer::{serialize_json, serialize_yaml, write_to_file};
use crate::type_resolver::{DeclaredFile, Scope, TypeResolver};
use crate::typescript::bindings::BindingPlan;
use crate::typescript::client::render_client;
use crate::typescript::types::render_types;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Everything one run produces, before anything is written.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    /// Contents of the client file
    pub client: String,
    /// Contents of the types file
    pub types: String,
    pub openapi: Option<OpenApiDocument>,
    pub endpoint_count: usize,
    pub binding_count: usize,
    pub type_count: usize,
    /// Diagnostics of the whole run, generation warnings included
    pub warnings: Vec<String>,
}

/// Runs the whole pipeline in memory.
///
/// # Errors
///
/// Fails when the server source root does not exist. Every other problem is
/// logged and reported through [`GenerationOutput::warnings`].
pub fn generate(config: &GeneratorConfig) -> Result<GenerationOutput> {
    let mut warnings = Vec::new();

    let source_dir = config.source_dir();
    info!("Scanning {}", source_dir.display());
    let scan = FileScanner::new(source_dir.clone(), "crate")
        .scan()
        .with_context(|| format!("Cannot scan server sources in {}", source_dir.display()))?;
    warnings.extend(scan.warnings);
    let server_file_count = scan.files.len();

    let mut sources: Vec<SourceFile> = scan.files;
    for shared in &config.shared_sources {
        let root = config.server_root.join(&shared.root);
        let mut scanner = FileScanner::new(root.clone(), &shared.crate_name);
        if !shared.files.is_empty() {
            let admitted: BTreeSet<PathBuf> = shared.files.iter().cloned().collect();
            scanner = scanner.with_filter(Box::new(move |relative: &Path| admitted.contains(relative)));
        }
        match scanner.scan() {
            Ok(result) => {
                info!(
                    "Shared source {}: {} files",
                    shared.crate_name,
                    result.files.len()
                );
                warnings.extend(result.warnings);
                sources.extend(result.files);
            }
            Err(e) => {
                let message = format!("Skipping shared source {}: {}", shared.crate_name, e);
                warn!("{}", message);
                warnings.push(message);
            }
        }
    }

    let files = AstParser::parse_files(&sources);
    info!("Parsed {} files", files.len());

    let extractor = Extractor::default();
    let imports: Vec<Imports> = files.iter().map(|f| extractor.imports(f)).collect();
    let declared: Vec<DeclaredFile> = files
        .iter()
        .zip(&imports)
        .map(|(file, imports)| DeclaredFile {
            imports: imports.clone(),
            declarations: extractor.type_declarations(file),
        })
        .collect();

    let route_files = select_route_files(&files, server_file_count, config, &mut warnings);
    let handlers = HandlerIndex::new(&files, &imports);
    let mut endpoints = Vec::new();
    let mut unresolved = Vec::new();

    for idx in route_files {
        let file = &files[idx];
        let taint = AuthTaint::from_file_name(&file.file_name());
        let registrations = extractor.route_registrations(file);
        debug!(
            "{}: {} route registrations",
            file.path.display(),
            registrations.len()
        );

        for registration in &registrations {
            let mut endpoint = Endpoint::new(registration, taint);
            match handlers.resolve(&registration.handler, idx, &extractor) {
                Some(resolved) => {
                    let shape = classify(&resolved.signature);
                    let scope = Scope::new(
                        handlers.module_of(resolved.file),
                        handlers.imports_of(resolved.file),
                        &[],
                    );
                    apply_shape(&mut endpoint, &shape, &scope);
                    endpoint.handler = resolved.path;
                }
                None => {
                    let message = format!(
                        "Handler '{}' of {} {} was not found; its payload types are unknown",
                        registration.handler, registration.method, registration.path
                    );
                    warn!("{}", message);
                    unresolved.push(message);
                }
            }
            endpoints.push(endpoint);
        }
    }
    info!("Extracted {} endpoints", endpoints.len());

    let definitions = TypeResolver::build_definitions(&declared);
    info!("Resolved {} type definitions", definitions.len());

    let modules = group_endpoints(endpoints, config);
    let mut model = ApiModel::build(modules, definitions, &config.type_prefix);
    model.warnings.extend(unresolved);

    let plan = BindingPlan::build(&model);
    let endpoint_count = model.endpoint_count();
    let binding_count = plan.method_count();
    if endpoint_count != binding_count {
        let message = format!(
            "Parsed {} endpoints but generated {} client bindings",
            endpoint_count, binding_count
        );
        warn!("{}", message);
        warnings.push(message);
    }

    let client = render_client(&plan, config);
    let types = render_types(&model, &plan);
    let openapi = config.emit_openapi.then(|| build_document(&model, config));

    let generation_warnings = match &openapi {
        Some(doc) => doc.generation_warnings.clone(),
        None => model.warnings.clone(),
    };
    warnings.extend(generation_warnings);

    Ok(GenerationOutput {
        client,
        types,
        openapi,
        endpoint_count,
        binding_count,
        type_count: model.types.len(),
        warnings,
    })
}

/// Indices of the files whose route registrations are read.
///
/// Without configured route files every server file is a route file.
fn select_route_files(
    files: &[ParsedFile],
    server_file_count: usize,
    config: &GeneratorConfig,
    warnings: &mut Vec<String>,
) -> Vec<usize> {
    let is_server_file = |file: &ParsedFile| file.module_path.split("::").next() == Some("crate");

    let configured = config.route_file_paths();
    if configured.is_empty() {
        debug!("No route files configured; reading all {} server files", server_file_count);
        return files
            .iter()
            .enumerate()
            .filter(|(_, f)| is_server_file(f))
            .map(|(idx, _)| idx)
            .collect();
    }

    let mut selected = Vec::new();
    for route_file in &configured {
        let wanted = canonical(route_file);
        let found = files.iter().position(|f| {
            is_server_file(f) && (f.path == *route_file || canonical(&f.path) == wanted)
        });
        match found {
            Some(idx) => selected.push(idx),
            None => {
                let message = format!("Route file {} was not found", route_file.display());
                warn!("{}", message);
                warnings.push(message);
            }
        }
    }
    selected
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Writes the artifacts of a run and returns the written paths.
pub fn write_outputs(output: &GenerationOutput, config: &GeneratorConfig) -> Result<Vec<PathBuf>> {
    let dir = config.generated_dir();
    let mut written = Vec::new();

    let client_path = dir.join(&config.client_file);
    write_to_file(&output.client, &client_path)?;
    written.push(client_path);

    let types_path = dir.join(&config.types_file);
    write_to_file(&output.types, &types_path)?;
    written.push(types_path);

    if let Some(doc) = &output.openapi {
        let json_path = dir.join(&config.openapi_json_file);
        write_to_file(&serialize_json(doc)?, &json_path)?;
        written.push(json_path);

        if config.emit_yaml {
            let yaml_path = dir.join(&config.openapi_yaml_file);
            write_to_file(&serialize_yaml(doc)?, &yaml_path)?;
            written.push(yaml_path);
        }
    }

    for path in &written {
        info!("Wrote {}", path.display());
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        dir
    }

    fn config_for(dir: &TempDir) -> GeneratorConfig {
        GeneratorConfig {
            server_root: dir.path().to_path_buf(),
            output_dir: dir.path().join("out"),
            ..GeneratorConfig::default()
        }
    }

    #[test]
    fn test_missing_source_root_fails() {
        let config = GeneratorConfig {
            server_root: PathBuf::from("/definitely/not/here"),
            ..GeneratorConfig::default()
        };
        let err = generate(&config).unwrap_err();
        assert!(err
            .chain()
            .any(|cause| cause.to_string().contains("source root does not exist")));
    }

    #[test]
    fn test_configured_route_file_only() {
        let dir = project(&[
            (
                "src/router/protected_routes.rs",
                r#"
                use axum::{routing::get, Router};
                pub fn routes() -> Router { Router::new().route("/me", get(me)) }
                pub async fn me() -> Json<Me> { todo!() }
                #[derive(Serialize)]
                pub struct Me { pub id: i64 }
                "#,
            ),
            (
                "src/router/other.rs",
                r#"pub fn routes() -> Router { Router::new().route("/hidden", get(hidden)) }"#,
            ),
        ]);
        let mut config = config_for(&dir);
        config.route_files = vec![
            PathBuf::from("src/router/protected_routes.rs"),
            PathBuf::from("src/router/missing.rs"),
        ];

        let output = generate(&config).unwrap();
        assert_eq!(output.endpoint_count, 1);
        assert_eq!(output.binding_count, 1);
        assert!(output.client.contains("auth: true,"));
        assert!(output.types.contains("export interface ApiMe {"));
        assert!(output
            .warnings
            .iter()
            .any(|w| w.contains("missing.rs") && w.contains("not found")));
    }

    #[test]
    fn test_write_outputs_respects_yaml_flag() {
        let dir = project(&[("src/lib.rs", "pub struct Empty;")]);
        let mut config = config_for(&dir);
        config.emit_yaml = false;

        let output = generate(&config).unwrap();
        let written = write_outputs(&output, &config).unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["Client.ts", "Types.ts", "openapi.json"]);
        assert!(config.generated_dir().join("Client.ts").exists());
    }
}
