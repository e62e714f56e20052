//! Declaration extraction from parsed Rust files.
//!
//! Extraction is split by concern: route registrations, handler signatures, public
//! type declarations and `use` imports. Every concern is answered by a
//! [`DeclarationSource`]. The [`syntax::SyntaxExtractor`] reads the `syn` tree and
//! the [`textual::TextualExtractor`] recovers the same information from raw text
//! with balanced scanning and regular expressions. [`Extractor`] combines the two:
//! the syntax tree is preferred and the textual scan fills in what it cannot see,
//! which covers files `syn` rejected as well as declarations and route
//! registrations hidden inside macro invocations.
//!
//! # Example
//!
//! ```no_run
//! use client_from_source::extractor::{DeclarationSource, Extractor};
//! use client_from_source::parser::ParsedFile;
//! use std::path::PathBuf;
//!
//! let file = ParsedFile::from_source(
//!     PathBuf::from("src/router/admin_routes.rs"),
//!     "crate::router::admin_routes",
//!     r#"fn routes() -> Router { Router::new().route("/users", get(list_users)) }"#.into(),
//! );
//! let routes = Extractor::default().route_registrations(&file);
//! println!("Found {} routes", routes.len());
//! ```

pub mod attrs;
pub mod handler;
pub mod syntax;
pub mod textual;

use crate::config::GeneratorConfig;
use crate::parser::ParsedFile;
use attrs::{ApiHints, ContainerAttrs, FieldAttrs};
use log::debug;
use std::collections::BTreeMap;
use std::fmt;

/// Answers the extraction questions for one parsed file.
pub trait DeclarationSource {
    /// Every `(path, method, handler)` triple registered in the file, in source order.
    fn route_registrations(&self, file: &ParsedFile) -> Vec<RouteRegistration>;

    /// The signature of the free function named `name`, if the file defines one.
    fn function_signature(&self, file: &ParsedFile, name: &str) -> Option<FunctionSignature>;

    /// Public struct and enum declarations, including those in inline modules.
    fn type_declarations(&self, file: &ParsedFile) -> Vec<TypeDeclaration>;

    /// `use` imports of the file, keyed by the name they bring into scope.
    fn imports(&self, file: &ParsedFile) -> Imports;
}

/// Syntax-first extraction with a textual retry per concern.
#[derive(Debug, Default)]
pub struct Extractor {
    primary: syntax::SyntaxExtractor,
    fallback: textual::TextualExtractor,
}

impl DeclarationSource for Extractor {
    fn route_registrations(&self, file: &ParsedFile) -> Vec<RouteRegistration> {
        let mut routes = self.primary.route_registrations(file);

        // The text has no nest prefixes, so a registration already seen under a
        // longer path with the same method and handler is not new.
        for recovered in self.fallback.route_registrations(file) {
            let known = routes.iter().any(|r| {
                r.method == recovered.method
                    && r.handler == recovered.handler
                    && r.path.ends_with(&recovered.path)
            });
            if !known {
                debug!(
                    "{}: recovered {} {} from text",
                    file.path.display(),
                    recovered.method,
                    recovered.path
                );
                routes.push(recovered);
            }
        }
        routes
    }

    fn function_signature(&self, file: &ParsedFile, name: &str) -> Option<FunctionSignature> {
        self.primary
            .function_signature(file, name)
            .or_else(|| self.fallback.function_signature(file, name))
    }

    fn type_declarations(&self, file: &ParsedFile) -> Vec<TypeDeclaration> {
        let mut declarations = self.primary.type_declarations(file);

        // Declarations syn cannot see (macro bodies, broken files) come from the text.
        for declaration in self.fallback.type_declarations(file) {
            let known = declarations.iter().any(|d| d.name == declaration.name);
            if !known {
                declarations.push(declaration);
            }
        }
        declarations
    }

    fn imports(&self, file: &ParsedFile) -> Imports {
        if file.syntax_tree.is_some() {
            self.primary.imports(file)
        } else {
            self.fallback.imports(file)
        }
    }
}

/// HTTP methods a route can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    /// Parses a routing function name such as `get` or `post`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "get" => Some(HttpMethod::Get),
            "post" => Some(HttpMethod::Post),
            "put" => Some(HttpMethod::Put),
            "patch" => Some(HttpMethod::Patch),
            "delete" => Some(HttpMethod::Delete),
            "head" => Some(HttpMethod::Head),
            "options" => Some(HttpMethod::Options),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    pub fn lower(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }

    /// Methods whose client call carries a request body.
    pub fn is_mutating(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }

    /// Methods that never get an OpenAPI request body.
    pub fn forbids_body(&self) -> bool {
        matches!(
            self,
            HttpMethod::Get | HttpMethod::Head | HttpMethod::Delete | HttpMethod::Options
        )
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the response body is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseKind {
    #[default]
    Json,
    Binary,
    Text,
    Form,
}

impl ResponseKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Some(ResponseKind::Json),
            "binary" | "blob" | "bytes" | "file" => Some(ResponseKind::Binary),
            "text" | "plain" => Some(ResponseKind::Text),
            "form" | "formdata" | "multipart" => Some(ResponseKind::Form),
            _ => None,
        }
    }
}

/// How the request body is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyKind {
    #[default]
    Json,
    /// `application/x-www-form-urlencoded`
    Form,
    /// `multipart/form-data`
    FormData,
    Binary,
}

impl BodyKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Some(BodyKind::Json),
            "form" | "urlencoded" => Some(BodyKind::Form),
            "formdata" | "multipart" => Some(BodyKind::FormData),
            "binary" | "bytes" | "blob" => Some(BodyKind::Binary),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            BodyKind::Json => "application/json",
            BodyKind::Form => "application/x-www-form-urlencoded",
            BodyKind::FormData => "multipart/form-data",
            BodyKind::Binary => "application/octet-stream",
        }
    }
}

/// A `.route(path, method(handler))` registration as written in source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRegistration {
    /// Normalized path template, e.g. `/users/{id}`
    pub path: String,
    pub method: HttpMethod,
    /// Handler reference exactly as written, e.g. `crate::routes::users::get_user`
    pub handler: String,
}

/// A handler's parameter and return types as source text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionSignature {
    pub name: String,
    pub params: Vec<String>,
    pub return_type: Option<String>,
    pub hints: ApiHints,
}

/// `use` imports of a file: name in scope -> path it stands for.
pub type Imports = BTreeMap<String, String>;

/// A public struct or enum as declared, before type resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDeclaration {
    pub name: String,
    /// Module the declaration lives in (inline `mod` blocks included)
    pub module_path: String,
    /// Type parameter names, lifetimes and const generics excluded
    pub generics: Vec<String>,
    pub attrs: ContainerAttrs,
    pub body: DeclarationBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationBody {
    Struct(Vec<RawField>),
    Enum(Vec<RawVariant>),
    /// Tuple struct; several elements are folded into one tuple type
    Newtype(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawField {
    /// Field identifier with any `r#` prefix removed
    pub ident: String,
    pub ty: String,
    pub attrs: FieldAttrs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawVariant {
    pub ident: String,
    pub attrs: FieldAttrs,
    pub payload: RawPayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawPayload {
    Unit,
    /// Tuple variant; several elements are folded into one tuple type
    Type(String),
    Fields(Vec<RawField>),
}

/// One HTTP operation of the API surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub path: String,
    pub method: HttpMethod,
    /// Handler path as resolved, or as written when resolution failed
    pub handler: String,
    pub auth_required: bool,
    pub is_admin: bool,
    pub query_type: Option<String>,
    pub body_type: Option<String>,
    pub body_optional: bool,
    pub body_kind: BodyKind,
    pub response_type: Option<String>,
    pub response_kind: ResponseKind,
}

impl Endpoint {
    /// An endpoint with nothing known about its payloads yet.
    pub fn new(registration: &RouteRegistration, taint: AuthTaint) -> Self {
        Self {
            path: registration.path.clone(),
            method: registration.method,
            handler: registration.handler.clone(),
            auth_required: taint.auth_required,
            is_admin: taint.is_admin,
            query_type: None,
            body_type: None,
            body_optional: false,
            body_kind: BodyKind::Json,
            response_type: None,
            response_kind: ResponseKind::Json,
        }
    }

    /// Names of the `{param}` placeholders in the path, in order.
    pub fn path_params(&self) -> Vec<String> {
        path_params(&self.path)
    }

    /// The handler's function name.
    pub fn handler_name(&self) -> &str {
        self.handler.rsplit("::").next().unwrap_or(&self.handler)
    }
}

/// Access requirements implied by the file a route is registered in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthTaint {
    pub auth_required: bool,
    pub is_admin: bool,
}

impl AuthTaint {
    /// `protected` and `admin` route files require a session; `admin` also requires admin rights.
    pub fn from_file_name(file_name: &str) -> Self {
        let lower = file_name.to_ascii_lowercase();
        let is_admin = lower.contains("admin");
        Self {
            auth_required: is_admin || lower.contains("protected"),
            is_admin,
        }
    }
}

/// Endpoints sharing a client module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiModule {
    pub name: String,
    pub endpoints: Vec<Endpoint>,
}

/// Groups endpoints into modules by first path segment; modules are sorted by name
/// and endpoints keep their discovery order.
pub fn group_endpoints(endpoints: Vec<Endpoint>, config: &GeneratorConfig) -> Vec<ApiModule> {
    let mut grouped: BTreeMap<String, Vec<Endpoint>> = BTreeMap::new();
    for endpoint in endpoints {
        let module = config.module_for_path(&endpoint.path);
        grouped.entry(module).or_default().push(endpoint);
    }
    grouped
        .into_iter()
        .map(|(name, endpoints)| ApiModule { name, endpoints })
        .collect()
}

/// Rewrites `:id` and `*rest` segments to `{id}` / `{rest}` and joins a nest prefix.
pub fn normalize_path(prefix: &str, path: &str) -> String {
    let joined = if prefix.is_empty() {
        path.to_string()
    } else {
        let prefix = prefix.trim_end_matches('/');
        let rest = path.trim_start_matches('/');
        if rest.is_empty() {
            prefix.to_string()
        } else {
            format!("{}/{}", prefix, rest)
        }
    };

    let segments: Vec<String> = joined
        .split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                format!("{{{}}}", name)
            } else if let Some(name) = segment.strip_prefix('*') {
                format!("{{{}}}", name)
            } else if let Some(name) = segment.strip_prefix("{*") {
                format!("{{{}", name)
            } else {
                segment.to_string()
            }
        })
        .collect();

    let normalized = segments.join("/");
    if normalized.starts_with('/') {
        normalized
    } else {
        format!("/{}", normalized)
    }
}

/// `{param}` names of a path template.
pub fn path_params(path: &str) -> Vec<String> {
    path.split('/')
        .filter_map(|segment| {
            segment
                .strip_prefix('{')
                .and_then(|s| s.strip_suffix('}'))
                .map(|s| s.trim_start_matches('*').to_string())
        })
        .filter(|name| !name.is_empty())
        .collect()
}
