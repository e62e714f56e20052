use crate::closure::{ApiModel, TypeIndex};
use crate::config::GeneratorConfig;
use crate::extractor::{BodyKind, Endpoint, HttpMethod, ResponseKind};
use crate::schema_generator::{AdditionalProperties, Schema, SchemaGenerator};
use crate::type_resolver::{DefinitionKind, RustType};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// OpenAPI version written into every document
pub const OPENAPI_VERSION: &str = "3.0.3";

/// Name of the shared bearer security scheme
pub const BEARER_SCHEME: &str = "bearerAuth";

/// OpenAPI document builder
pub struct OpenApiBuilder<'a> {
    /// OpenAPI info section
    info: Info,
    /// Base URL the paths are relative to
    servers: Vec<Server>,
    /// Paths collection (URL path -> PathItem)
    paths: BTreeMap<String, PathItem>,
    /// Retained definitions, used to expand query structs
    types: &'a TypeIndex,
    /// Schema generator over the same definitions
    generator: SchemaGenerator<'a>,
    /// Operation ids handed out so far
    operation_ids: BTreeSet<String>,
    /// Whether any operation requires authentication
    uses_auth: bool,
    warnings: Vec<String>,
}

/// OpenAPI Info object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    /// API title
    pub title: String,
    /// API version
    pub version: String,
    /// API description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
}

/// OpenAPI PathItem object - represents all operations for a single path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
}

impl PathItem {
    fn slot(&mut self, method: HttpMethod) -> &mut Option<Operation> {
        match method {
            HttpMethod::Get => &mut self.get,
            HttpMethod::Post => &mut self.post,
            HttpMethod::Put => &mut self.put,
            HttpMethod::Delete => &mut self.delete,
            HttpMethod::Patch => &mut self.patch,
            HttpMethod::Options => &mut self.options,
            HttpMethod::Head => &mut self.head,
        }
    }

    /// The operation registered for a method, if any
    pub fn operation(&self, method: HttpMethod) -> Option<&Operation> {
        match method {
            HttpMethod::Get => self.get.as_ref(),
            HttpMethod::Post => self.post.as_ref(),
            HttpMethod::Put => self.put.as_ref(),
            HttpMethod::Delete => self.delete.as_ref(),
            HttpMethod::Patch => self.patch.as_ref(),
            HttpMethod::Options => self.options.as_ref(),
            HttpMethod::Head => self.head.as_ref(),
        }
    }
}

/// OpenAPI Operation object - represents a single API operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "operationId")]
    pub operation_id: String,
    /// Parameters (path, query)
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub parameters: Vec<Parameter>,
    #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    pub responses: BTreeMap<String, Response>,
    /// Security requirements; each maps a scheme name to its scopes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<Vec<BTreeMap<String, Vec<String>>>>,
}

/// OpenAPI Parameter object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// Parameter location (path, query)
    #[serde(rename = "in")]
    pub location: String,
    pub required: bool,
    pub schema: Schema,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explode: Option<bool>,
}

/// OpenAPI RequestBody object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    pub required: bool,
    /// Content types and their schemas
    pub content: BTreeMap<String, MediaType>,
}

/// OpenAPI MediaType object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Schema,
}

/// OpenAPI Response object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<BTreeMap<String, MediaType>>,
}

/// OpenAPI SecurityScheme object (HTTP schemes only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityScheme {
    #[serde(rename = "type")]
    pub scheme_type: String,
    pub scheme: String,
    #[serde(rename = "bearerFormat", skip_serializing_if = "Option::is_none")]
    pub bearer_format: Option<String>,
}

/// OpenAPI Components object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Components {
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub schemas: BTreeMap<String, Schema>,
    #[serde(rename = "securitySchemes", skip_serializing_if = "BTreeMap::is_empty", default)]
    pub security_schemes: BTreeMap<String, SecurityScheme>,
}

/// Complete OpenAPI document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiDocument {
    pub openapi: String,
    pub info: Info,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub servers: Vec<Server>,
    pub paths: BTreeMap<String, PathItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
    /// Non-fatal problems met while generating the whole API surface
    #[serde(
        rename = "x-generation-warnings",
        skip_serializing_if = "Vec::is_empty",
        default
    )]
    pub generation_warnings: Vec<String>,
}

impl<'a> OpenApiBuilder<'a> {
    /// Create a builder whose schemas reference the model's definitions
    pub fn new(model: &'a ApiModel) -> Self {
        debug!("Initializing OpenApiBuilder");
        Self {
            info: Info {
                title: "Generated API".to_string(),
                version: "1.0.0".to_string(),
                description: None,
            },
            servers: Vec::new(),
            paths: BTreeMap::new(),
            types: &model.types,
            generator: SchemaGenerator::new(&model.types),
            operation_ids: BTreeSet::new(),
            uses_auth: false,
            warnings: Vec::new(),
        }
    }

    /// Set custom info for the API
    pub fn with_info(mut self, title: String, version: String, description: Option<String>) -> Self {
        self.info = Info {
            title,
            version,
            description,
        };
        self
    }

    /// Declare the base URL the paths are mounted under
    pub fn with_server(mut self, url: &str) -> Self {
        if !url.is_empty() {
            self.servers = vec![Server {
                url: url.to_string(),
            }];
        }
        self
    }

    /// Add one endpoint as an operation of its path
    pub fn add_endpoint(&mut self, endpoint: &Endpoint, module: &str) {
        debug!("Adding operation: {} {}", endpoint.method, endpoint.path);

        let taken = self
            .paths
            .get(&endpoint.path)
            .is_some_and(|item| item.operation(endpoint.method).is_some());
        if taken {
            let message = format!(
                "Duplicate registration of {} {} (handler '{}'); kept the first in the OpenAPI document",
                endpoint.method, endpoint.path, endpoint.handler
            );
            warn!("{}", message);
            self.warnings.push(message);
            return;
        }

        let mut parameters: Vec<Parameter> = endpoint
            .path_params()
            .into_iter()
            .map(|name| Parameter {
                name,
                location: "path".to_string(),
                required: true,
                schema: Schema::typed("string", None),
                style: None,
                explode: None,
            })
            .collect();
        parameters.extend(self.query_parameters(endpoint));

        let request_body = self.request_body(endpoint);
        let response = self.response(endpoint);
        let mut responses = BTreeMap::new();
        responses.insert("200".to_string(), response);

        let security = if endpoint.auth_required {
            self.uses_auth = true;
            let mut requirement = BTreeMap::new();
            requirement.insert(BEARER_SCHEME.to_string(), Vec::new());
            Some(vec![requirement])
        } else {
            None
        };

        let operation = Operation {
            tags: vec![module.to_string()],
            summary: Some(format!("{} {}", endpoint.method, endpoint.path)),
            description: endpoint
                .is_admin
                .then(|| "Requires administrator privileges.".to_string()),
            operation_id: self.operation_id(endpoint.handler_name()),
            parameters,
            request_body,
            responses,
            security,
        };

        *self
            .paths
            .entry(endpoint.path.clone())
            .or_default()
            .slot(endpoint.method) = Some(operation);
    }

    /// Handler name, numbered when another operation already uses it
    fn operation_id(&mut self, handler: &str) -> String {
        let mut candidate = handler.to_string();
        let mut counter = 2;
        while self.operation_ids.contains(&candidate) {
            candidate = format!("{}_{}", handler, counter);
            counter += 1;
        }
        self.operation_ids.insert(candidate.clone());
        candidate
    }

    fn query_parameters(&mut self, endpoint: &Endpoint) -> Vec<Parameter> {
        let Some(query) = &endpoint.query_type else {
            return Vec::new();
        };

        let types = self.types;
        let def = types
            .find_type(&RustType::parse(query))
            .filter(|d| matches!(d.kind, DefinitionKind::Struct { .. }));
        match def {
            Some(def) => types
                .inlined_fields(def)
                .into_iter()
                .map(|field| Parameter {
                    schema: self.generator.schema_for(&field.parsed_type(), &def.generics),
                    name: field.serialized_name,
                    location: "query".to_string(),
                    required: !field.optional,
                    style: None,
                    explode: None,
                })
                .collect(),
            None => {
                let message = format!(
                    "Query type '{}' of handler '{}' is not a known struct; emitted a free-form query parameter",
                    query, endpoint.handler
                );
                warn!("{}", message);
                self.warnings.push(message);
                vec![Parameter {
                    name: "query".to_string(),
                    location: "query".to_string(),
                    required: false,
                    schema: Schema {
                        schema_type: Some("object".to_string()),
                        additional_properties: Some(AdditionalProperties::Allowed(true)),
                        ..Schema::default()
                    },
                    style: Some("form".to_string()),
                    explode: Some(true),
                }]
            }
        }
    }

    fn request_body(&mut self, endpoint: &Endpoint) -> Option<RequestBody> {
        if endpoint.method.forbids_body() {
            return None;
        }
        let carries_body = endpoint.method.is_mutating()
            || endpoint.body_type.is_some()
            || matches!(endpoint.body_kind, BodyKind::FormData | BodyKind::Binary);
        if !carries_body {
            return None;
        }

        let schema = match (endpoint.body_kind, &endpoint.body_type) {
            (BodyKind::FormData, _) => Schema::typed("object", None),
            (BodyKind::Binary, _) => Schema::typed("string", Some("binary")),
            (_, Some(ty)) => self.generator.schema_for_text(ty, &[]),
            (_, None) => Schema::default(),
        };
        let known = endpoint.body_type.is_some()
            || matches!(endpoint.body_kind, BodyKind::FormData | BodyKind::Binary);

        let mut content = BTreeMap::new();
        content.insert(
            endpoint.body_kind.content_type().to_string(),
            MediaType { schema },
        );
        Some(RequestBody {
            required: known && !endpoint.body_optional,
            content,
        })
    }

    fn response(&mut self, endpoint: &Endpoint) -> Response {
        let (content_type, schema) = match endpoint.response_kind {
            ResponseKind::Binary => (
                "application/octet-stream",
                Schema::typed("string", Some("binary")),
            ),
            ResponseKind::Text => ("text/plain", Schema::typed("string", None)),
            ResponseKind::Form => ("multipart/form-data", Schema::typed("object", None)),
            ResponseKind::Json => {
                let schema = match &endpoint.response_type {
                    Some(ty) => self.generator.schema_for_text(ty, &[]),
                    None => Schema::typed("object", None),
                };
                ("application/json", schema)
            }
        };

        let mut content = BTreeMap::new();
        content.insert(content_type.to_string(), MediaType { schema });
        Response {
            description: "OK".to_string(),
            content: Some(content),
        }
    }

    /// Build the final OpenAPI document; `warnings` are earlier generation warnings
    pub fn build(mut self, warnings: &[String]) -> OpenApiDocument {
        debug!("Building final OpenAPI document");
        self.generator.generate_components();
        let (schemas, schema_warnings) = self.generator.finish();

        let mut security_schemes = BTreeMap::new();
        if self.uses_auth {
            security_schemes.insert(
                BEARER_SCHEME.to_string(),
                SecurityScheme {
                    scheme_type: "http".to_string(),
                    scheme: "bearer".to_string(),
                    bearer_format: Some("JWT".to_string()),
                },
            );
        }

        let components = if schemas.is_empty() && security_schemes.is_empty() {
            None
        } else {
            Some(Components {
                schemas,
                security_schemes,
            })
        };

        let mut generation_warnings = warnings.to_vec();
        for warning in self.warnings.into_iter().chain(schema_warnings) {
            if !generation_warnings.contains(&warning) {
                generation_warnings.push(warning);
            }
        }

        OpenApiDocument {
            openapi: OPENAPI_VERSION.to_string(),
            info: self.info,
            servers: self.servers,
            paths: self.paths,
            components,
            generation_warnings,
        }
    }
}

/// Builds the document for a whole model
pub fn build_document(model: &ApiModel, config: &GeneratorConfig) -> OpenApiDocument {
    let mut builder = OpenApiBuilder::new(model)
        .with_info(config.api_title.clone(), config.api_version.clone(), None)
        .with_server(&config.api_prefix);

    for module in &model.modules {
        for endpoint in &module.endpoints {
            builder.add_endpoint(endpoint, &module.name);
        }
    }

    let document = builder.build(&model.warnings);
    info!(
        "OpenAPI document: {} paths, {} schemas, {} warnings",
        document.paths.len(),
        document
            .components
            .as_ref()
            .map(|c| c.schemas.len())
            .unwrap_or(0),
        document.generation_warnings.len()
    );
    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{ApiModule, AuthTaint, RouteRegistration};
    use crate::type_resolver::{FieldDef, TypeDefinition};
    use pretty_assertions::assert_eq;

    fn endpoint(method: HttpMethod, path: &str, handler: &str) -> Endpoint {
        Endpoint::new(
            &RouteRegistration {
                path: path.to_string(),
                method,
                handler: handler.to_string(),
            },
            AuthTaint::default(),
        )
    }

    fn struct_def(name: &str, fields: Vec<FieldDef>) -> TypeDefinition {
        TypeDefinition {
            name: name.to_string(),
            rust_path: format!("crate::models::{}", name),
            module_path: "crate::models".to_string(),
            original_name: name.to_string(),
            generics: Vec::new(),
            kind: DefinitionKind::Struct { fields },
        }
    }

    fn field(name: &str, ty: &str, optional: bool) -> FieldDef {
        FieldDef {
            ident: name.to_string(),
            rust_type: ty.to_string(),
            serialized_name: name.to_string(),
            optional,
            flatten: false,
        }
    }

    fn model(endpoints: Vec<Endpoint>) -> ApiModel {
        ApiModel::build(
            vec![ApiModule {
                name: "Users".to_string(),
                endpoints,
            }],
            vec![
                struct_def("UserOut", vec![field("id", "i64", false)]),
                struct_def(
                    "ListParams",
                    vec![
                        field("page", "u32", false),
                        field("search", "Option<String>", true),
                    ],
                ),
            ],
            "Api",
        )
    }

    #[test]
    fn test_get_operation_with_path_parameter() {
        let mut get_user = endpoint(HttpMethod::Get, "/users/{id}", "crate::routes::get_user");
        get_user.response_type = Some("crate::models::UserOut".to_string());
        let model = model(vec![get_user]);
        let doc = build_document(&model, &GeneratorConfig::default());

        assert_eq!(doc.openapi, "3.0.3");
        let operation = doc.paths["/users/{id}"].get.as_ref().unwrap();
        assert_eq!(operation.operation_id, "get_user");
        assert_eq!(operation.tags, vec!["Users".to_string()]);
        assert_eq!(operation.parameters.len(), 1);
        assert_eq!(operation.parameters[0].name, "id");
        assert_eq!(operation.parameters[0].location, "path");
        assert!(operation.parameters[0].required);
        assert!(operation.request_body.is_none());
        assert!(operation.security.is_none());

        let schema = &operation.responses["200"].content.as_ref().unwrap()["application/json"].schema;
        assert_eq!(schema, &Schema::reference("ApiUserOut"));
        assert!(doc.components.unwrap().schemas.contains_key("ApiUserOut"));
    }

    #[test]
    fn test_query_fields_expand_to_parameters() {
        let mut list = endpoint(HttpMethod::Get, "/users", "list_users");
        list.query_type = Some("crate::models::ListParams".to_string());
        let model = model(vec![list]);
        let doc = build_document(&model, &GeneratorConfig::default());

        let operation = doc.paths["/users"].get.as_ref().unwrap();
        let names: Vec<(&str, bool)> = operation
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p.required))
            .collect();
        assert_eq!(names, vec![("page", true), ("search", false)]);
        assert!(doc.generation_warnings.is_empty());
    }

    #[test]
    fn test_unresolved_query_is_free_form() {
        let mut list = endpoint(HttpMethod::Get, "/users", "list_users");
        list.query_type = Some("HashMap<String, String>".to_string());
        let model = model(vec![list]);
        let doc = build_document(&model, &GeneratorConfig::default());

        let operation = doc.paths["/users"].get.as_ref().unwrap();
        assert_eq!(operation.parameters.len(), 1);
        assert_eq!(operation.parameters[0].name, "query");
        assert_eq!(operation.parameters[0].style.as_deref(), Some("form"));
        assert_eq!(doc.generation_warnings.len(), 1);
    }

    #[test]
    fn test_body_and_security() {
        let mut create = endpoint(HttpMethod::Post, "/users", "create_user");
        create.body_type = Some("crate::models::UserOut".to_string());
        create.auth_required = true;
        let mut delete = endpoint(HttpMethod::Delete, "/users/{id}", "delete_user");
        delete.body_type = Some("crate::models::UserOut".to_string());
        let model = model(vec![create, delete]);
        let doc = build_document(&model, &GeneratorConfig::default());

        let post = doc.paths["/users"].post.as_ref().unwrap();
        let body = post.request_body.as_ref().unwrap();
        assert!(body.required);
        assert!(body.content.contains_key("application/json"));
        assert_eq!(post.security.as_ref().unwrap()[0].keys().next().unwrap(), BEARER_SCHEME);

        let delete = doc.paths["/users/{id}"].delete.as_ref().unwrap();
        assert!(delete.request_body.is_none());

        let components = doc.components.unwrap();
        assert_eq!(components.security_schemes[BEARER_SCHEME].scheme, "bearer");
    }

    #[test]
    fn test_binary_response_and_duplicate_operation_ids() {
        let mut download = endpoint(HttpMethod::Get, "/files/{id}", "crate::files::download");
        download.response_kind = ResponseKind::Binary;
        let other = endpoint(HttpMethod::Get, "/exports/{id}", "crate::exports::download");
        let model = model(vec![download, other]);
        let doc = build_document(&model, &GeneratorConfig::default());

        let file = doc.paths["/files/{id}"].get.as_ref().unwrap();
        assert!(file.responses["200"]
            .content
            .as_ref()
            .unwrap()
            .contains_key("application/octet-stream"));
        let export = doc.paths["/exports/{id}"].get.as_ref().unwrap();
        assert_eq!(file.operation_id, "download");
        assert_eq!(export.operation_id, "download_2");
    }

    #[test]
    fn test_duplicate_registration_is_a_generation_warning() {
        let first = endpoint(HttpMethod::Get, "/users", "list_users");
        let second = endpoint(HttpMethod::Get, "/users", "list_users_v2");
        let model = model(vec![first, second]);
        let doc = build_document(&model, &GeneratorConfig::default());

        let get = doc.paths["/users"].get.as_ref().unwrap();
        assert_eq!(get.operation_id, "list_users");
        assert_eq!(
            doc.generation_warnings,
            vec![
                "Duplicate registration of GET /users (handler 'list_users_v2'); kept the first in the OpenAPI document"
                    .to_string()
            ]
        );
    }
}
