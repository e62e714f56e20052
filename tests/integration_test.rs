use client_from_source::config::GeneratorConfig;
use client_from_source::pipeline::{generate, write_outputs, GenerationOutput};
use client_from_source::serializer::serialize_json;
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn fixture_config(output: &TempDir) -> GeneratorConfig {
    GeneratorConfig {
        server_root: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/server"),
        output_dir: output.path().to_path_buf(),
        route_files: vec![
            PathBuf::from("src/router/public_routes.rs"),
            PathBuf::from("src/router/protected_routes.rs"),
            PathBuf::from("src/router/admin_routes.rs"),
        ],
        ..GeneratorConfig::default()
    }
}

fn run_fixture() -> (GenerationOutput, Value) {
    let output_dir = TempDir::new().unwrap();
    let output = generate(&fixture_config(&output_dir)).unwrap();
    let json = serialize_json(output.openapi.as_ref().unwrap()).unwrap();
    let doc: Value = serde_json::from_str(&json).unwrap();
    (output, doc)
}

#[test]
fn test_every_endpoint_gets_a_binding() {
    let (output, _) = run_fixture();

    assert_eq!(output.endpoint_count, 14);
    assert_eq!(output.binding_count, output.endpoint_count);
    assert!(
        !output.warnings.iter().any(|w| w.contains("was not found")),
        "all handlers resolve: {:?}",
        output.warnings
    );
}

#[test]
fn test_client_module_classes() {
    let (output, _) = run_fixture();
    let client = &output.client;

    for class in [
        "export class AdminApi {",
        "export class AltersApi {",
        "export class EventsApi {",
        "export class FilesApi {",
        "export class MiscApi {",
        "export class NoticesApi {",
        "export class UsersApi {",
    ] {
        assert!(client.contains(class), "missing {}", class);
    }
    assert!(client.contains("export class ApiClient {"));
    assert!(client.contains("import type * as Types from './Types';"));
}

#[test]
fn test_path_parameter_binding() {
    let (output, doc) = run_fixture();

    assert!(output.client.contains(
        "async users_by_id(id: string | number): Promise<HttpResponse<Types.ApiUserOut>> {"
    ));
    assert!(output
        .client
        .contains("url: `/api/users/${encodeURIComponent(String(id))}`,"));

    let get = &doc["paths"]["/users/{id}"]["get"];
    assert_eq!(get["operationId"], "get_user");
    assert_eq!(get["parameters"][0]["name"], "id");
    assert_eq!(get["parameters"][0]["in"], "path");
    assert_eq!(get["parameters"][0]["required"], true);
    assert_eq!(
        get["responses"]["200"]["content"]["application/json"]["schema"]["$ref"],
        "#/components/schemas/ApiUserOut"
    );
}

#[test]
fn test_ambiguous_paths_prefix_the_method() {
    let (output, doc) = run_fixture();
    let client = &output.client;

    assert!(client.contains("async get_alters("));
    assert!(client.contains("async post_alters(body: Types.ApiAlterCreate)"));
    assert!(client.contains("async get_alters_by_id(id: string | number)"));
    assert!(client.contains("async put_alters_by_id(id: string | number, body?: Types.ApiAlterCreate)"));
    assert!(client.contains("async delete_alters_by_id(id: string | number)"));
    assert!(client.contains("async alters_search("));

    let item = &doc["paths"]["/alters/{id}"];
    assert!(item.get("get").is_some());
    assert!(item.get("put").is_some());
    assert!(item.get("delete").is_some());
    assert_eq!(item["put"]["requestBody"]["required"], false);
    assert!(item["delete"].get("requestBody").is_none());
}

#[test]
fn test_auth_follows_route_file() {
    let (output, doc) = run_fixture();

    assert!(doc["paths"]["/health"]["get"].get("security").is_none());
    assert!(doc["paths"]["/auth/login"]["post"].get("security").is_none());
    assert_eq!(
        doc["paths"]["/alters"]["get"]["security"][0]["bearerAuth"],
        Value::Array(Vec::new())
    );
    assert!(doc["paths"]["/admin/audit"]["get"]["description"].is_string());
    assert_eq!(
        doc["components"]["securitySchemes"]["bearerAuth"]["scheme"],
        "bearer"
    );
    assert!(output.client.contains("auth: true,"));
}

#[test]
fn test_response_kinds() {
    let (output, doc) = run_fixture();

    assert!(output
        .client
        .contains("async files_by_id(id: string | number): Promise<HttpResponse<Blob>> {"));
    assert!(output.client.contains("responseType: 'blob',"));
    assert!(output
        .client
        .contains("async health(): Promise<HttpResponse<string>> {"));
    assert!(output.client.contains("async files(body: FormData)"));
    assert!(output.client.contains("formData: body,"));

    let download = &doc["paths"]["/files/{id}"]["get"]["responses"]["200"]["content"];
    assert!(download.get("application/octet-stream").is_some());
    let health = &doc["paths"]["/health"]["get"]["responses"]["200"]["content"];
    assert_eq!(health["text/plain"]["schema"]["type"], "string");
}

#[test]
fn test_flattened_fields_are_inlined() {
    let (output, _) = run_fixture();
    let types = &output.types;

    let start = types.find("export interface ApiAlterCreate {").unwrap();
    let body = &types[start..start + types[start..].find("\n}").unwrap()];
    assert!(body.contains("  id: number;"));
    assert!(body.contains("  label: string;"));
    assert!(body.contains("  notes?: string | null;"));
    assert!(!body.contains("base"));
}

#[test]
fn test_rename_all_and_defaults() {
    let (output, _) = run_fixture();
    let types = &output.types;

    assert!(types.contains("export interface ApiLoginRequest {"));
    assert!(types.contains("  userName: string;"));
    assert!(types.contains("  rememberMe?: boolean;"));
    assert!(types.contains("export type ApiAlterStatus =\n  | 'active'\n  | 'dormant';"));
}

#[test]
fn test_adjacently_tagged_enum() {
    let (output, doc) = run_fixture();

    assert!(output
        .types
        .contains("  | { kind: 'created'; payload: ApiAlter }"));
    assert!(output.types.contains("  | { kind: 'archived' }"));

    let schemas = &doc["components"]["schemas"];
    let event = &schemas["ApiAlterEvent"];
    assert_eq!(event["oneOf"].as_array().unwrap().len(), 3);
    assert_eq!(event["discriminator"]["propertyName"], "kind");
    assert_eq!(
        event["discriminator"]["mapping"]["renamed"],
        "#/components/schemas/ApiAlterEventRenamed"
    );
    assert_eq!(
        schemas["ApiAlterEventCreated"]["properties"]["payload"]["$ref"],
        "#/components/schemas/ApiAlter"
    );
}

#[test]
fn test_internally_tagged_enum_agrees_across_outputs() {
    let (output, doc) = run_fixture();
    let types = &output.types;

    assert!(types.contains("  | ({ 'type': 'Event' } & ApiAlterEvent)\n"));
    assert!(types.contains("  | { 'type': 'Shape'; alter: ApiAlterId };"));

    let schemas = &doc["components"]["schemas"];
    assert_eq!(
        schemas["ApiNoticeEvent"]["allOf"][0]["$ref"],
        "#/components/schemas/ApiAlterEvent"
    );
    assert_eq!(
        schemas["ApiNoticeEvent"]["allOf"][1]["properties"]["type"]["enum"][0],
        "Event"
    );
    let shape = schemas["ApiNoticeShape"]["properties"].as_object().unwrap();
    let keys: Vec<&str> = shape.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["alter", "type"]);
    assert_eq!(shape["type"]["enum"][0], "Shape");
    assert_eq!(
        schemas["ApiNotice"]["discriminator"]["mapping"]["Shape"],
        "#/components/schemas/ApiNoticeShape"
    );

    assert!(output
        .warnings
        .iter()
        .any(|w| w.contains("Variant 'Notice::Shape' declares field 'type'")));
}

#[test]
fn test_newtype_struct_is_transparent() {
    let (output, doc) = run_fixture();

    assert!(output.types.contains("export type ApiAlterId = number;"));
    let id = &doc["components"]["schemas"]["ApiAlterId"];
    assert_eq!(id["type"], "integer");
    assert_eq!(id["format"], "int64");
}

#[test]
fn test_colliding_names_are_disambiguated() {
    let (output, doc) = run_fixture();

    assert!(output.types.contains("export interface ApiModelsAlterFilters {"));
    assert!(output.types.contains("export interface ApiModelsSearchFilters {"));
    assert!(!output.types.contains("export interface ApiFilters {"));
    assert!(output
        .warnings
        .iter()
        .any(|w| w.contains("Type name 'Filters' is declared in 2 modules")));

    let warnings = doc["x-generation-warnings"].as_array().unwrap();
    assert!(warnings
        .iter()
        .any(|w| w.as_str().unwrap().contains("ApiModelsSearchFilters")));

    let search = doc["paths"]["/alters/search"]["get"]["parameters"]
        .as_array()
        .unwrap();
    let names: Vec<&str> = search.iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["term", "fuzzy"]);
}

#[test]
fn test_mutual_references_terminate() {
    let (output, doc) = run_fixture();

    assert!(output.types.contains("  group?: ApiGroup | null;"));
    assert!(output.types.contains("  members: Array<ApiAlter>;"));

    let group = &doc["components"]["schemas"]["ApiGroup"];
    assert_eq!(
        group["properties"]["members"]["items"]["$ref"],
        "#/components/schemas/ApiAlter"
    );
}

#[test]
fn test_unreachable_types_are_pruned() {
    let (output, doc) = run_fixture();

    assert!(!output.types.contains("InternalOnly"));
    assert!(!output.types.contains("AppState"));
    assert!(doc["components"]["schemas"].get("ApiInternalOnly").is_none());
    assert!(output.types.contains("export interface ApiPaginated<T> {"));
    assert!(output.types.contains("export interface ApiAuditEntry {"));
}

#[test]
fn test_well_known_formats() {
    let (_, doc) = run_fixture();
    let entry = &doc["components"]["schemas"]["ApiAuditEntry"]["properties"];

    assert_eq!(entry["id"]["format"], "uuid");
    assert_eq!(entry["at"]["format"], "date-time");
    assert!(entry["details"].get("type").is_none());
}

#[test]
fn test_output_is_deterministic() {
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();

    let first_config = fixture_config(&first_dir);
    let second_config = fixture_config(&second_dir);
    let first = write_outputs(&generate(&first_config).unwrap(), &first_config).unwrap();
    let second = write_outputs(&generate(&second_config).unwrap(), &second_config).unwrap();

    assert_eq!(first.len(), 4);
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.file_name(), b.file_name());
        assert_eq!(fs::read(a).unwrap(), fs::read(b).unwrap());
    }
}

#[test]
fn test_generated_header_and_yaml() {
    let output_dir = TempDir::new().unwrap();
    let config = fixture_config(&output_dir);
    let written = write_outputs(&generate(&config).unwrap(), &config).unwrap();

    let client = fs::read_to_string(&written[0]).unwrap();
    assert!(client.starts_with("// "));
    let yaml = fs::read_to_string(config.generated_dir().join("openapi.yaml")).unwrap();
    assert!(yaml.contains("openapi: 3.0.3"));
    assert!(yaml.contains("/users/{id}:"));
}
