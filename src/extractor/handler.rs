//! Handler resolution and payload classification.
//!
//! A route names its handler by whatever path is in scope at the registration
//! site. [`HandlerIndex`] maps that reference back to the defining file, and
//! [`classify`] reads the handler's extractor parameters and return type to find
//! the query, body and response payloads.

use crate::extractor::{
    BodyKind, DeclarationSource, Endpoint, FunctionSignature, Imports, ResponseKind,
};
use crate::parser::ParsedFile;
use crate::type_resolver::{absolutize, RustType, Scope};
use log::debug;
use std::collections::BTreeMap;

/// Parameter types that never carry a request payload.
const NON_PAYLOAD_EXTRACTORS: &[&str] = &[
    "State",
    "Extension",
    "HeaderMap",
    "TypedHeader",
    "ConnectInfo",
    "Request",
    "Method",
    "Uri",
    "OriginalUri",
    "MatchedPath",
    "Host",
    "CookieJar",
    "PrivateCookieJar",
    "SignedCookieJar",
    "Session",
    "WebSocketUpgrade",
    "RawQuery",
    "Parts",
];

/// Module-path index over parsed files for handler lookup.
pub struct HandlerIndex<'a> {
    files: &'a [ParsedFile],
    imports: &'a [Imports],
    by_module: BTreeMap<&'a str, Vec<usize>>,
}

/// A handler found in source.
#[derive(Debug, Clone)]
pub struct ResolvedHandler {
    /// Fully-qualified function path
    pub path: String,
    /// Index of the defining file
    pub file: usize,
    pub signature: FunctionSignature,
}

impl<'a> HandlerIndex<'a> {
    /// `imports[i]` must hold the imports of `files[i]`.
    pub fn new(files: &'a [ParsedFile], imports: &'a [Imports]) -> Self {
        let mut by_module: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (idx, file) in files.iter().enumerate() {
            by_module.entry(file.module_path.as_str()).or_default().push(idx);
        }
        Self {
            files,
            imports,
            by_module,
        }
    }

    pub fn imports_of(&self, file: usize) -> &Imports {
        &self.imports[file]
    }

    pub fn module_of(&self, file: usize) -> &str {
        &self.files[file].module_path
    }

    /// Resolves a handler reference written in the route file `route_file`.
    ///
    /// Candidate modules are tried in order: the path as qualified through the route
    /// file's scope, then its crate-absolute reading. Within a module the handler may
    /// also live in a same-named or any child submodule. A bare name that matches
    /// nothing else is searched for across every file.
    pub fn resolve(
        &self,
        handler: &str,
        route_file: usize,
        source: &dyn DeclarationSource,
    ) -> Option<ResolvedHandler> {
        let route_module = self.files[route_file].module_path.as_str();
        let imports = &self.imports[route_file];
        let segments: Vec<&str> = handler.split("::").collect();
        let (name, module_segments) = segments.split_last()?;

        let mut candidates: Vec<String> = Vec::new();
        if module_segments.is_empty() {
            candidates.push(route_module.to_string());
            if let Some(target) = imports.get(*name) {
                let target = absolutize(target, route_module);
                if let Some((module, _)) = target.rsplit_once("::") {
                    candidates.push(module.to_string());
                }
            }
        } else {
            let module = module_segments.join("::");
            let scope = Scope::new(route_module, imports, &[]);
            let qualified = scope.qualify_path(&module);
            candidates.push(qualified.clone());
            if qualified == module {
                candidates.push(format!("{}::{}", route_module, module));
                let crate_root = route_module.split("::").next().unwrap_or("crate");
                candidates.push(format!("{}::{}", crate_root, module));
            }
        }

        for module in &candidates {
            if let Some(found) = self.lookup_in_module(module, name, source) {
                return Some(found);
            }
        }

        if module_segments.is_empty() {
            for (idx, file) in self.files.iter().enumerate() {
                if let Some(signature) = source.function_signature(file, name) {
                    debug!("Handler {} found by name in {}", name, file.path.display());
                    return Some(self.resolved(idx, name, signature));
                }
            }
        }

        debug!("Handler {} not found (tried {:?})", handler, candidates);
        None
    }

    fn lookup_in_module(
        &self,
        module: &str,
        name: &str,
        source: &dyn DeclarationSource,
    ) -> Option<ResolvedHandler> {
        let same_named = format!("{}::{}", module, name);
        let child_prefix = format!("{}::", module);

        let exact = self.by_module.get(module).into_iter().flatten();
        let nested = self.by_module.get(same_named.as_str()).into_iter().flatten();
        let children = self
            .by_module
            .range::<str, _>((
                std::ops::Bound::Included(child_prefix.as_str()),
                std::ops::Bound::Unbounded,
            ))
            .take_while(|(m, _)| m.starts_with(&child_prefix))
            .flat_map(|(_, files)| files);

        for &idx in exact.chain(nested).chain(children) {
            if let Some(signature) = source.function_signature(&self.files[idx], name) {
                return Some(self.resolved(idx, name, signature));
            }
        }
        None
    }

    fn resolved(&self, idx: usize, name: &str, signature: FunctionSignature) -> ResolvedHandler {
        ResolvedHandler {
            path: format!("{}::{}", self.files[idx].module_path, name),
            file: idx,
            signature,
        }
    }
}

/// Payloads read off a handler signature, as unqualified type text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerShape {
    pub query: Option<String>,
    pub body: Option<String>,
    pub body_optional: bool,
    pub body_kind: Option<BodyKind>,
    pub response: Option<String>,
    pub response_kind: Option<ResponseKind>,
    /// Parameters that are not recognized extractors; possible bodies
    pub candidates: Vec<String>,
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

/// Classifies a handler's parameters and return type.
pub fn classify(signature: &FunctionSignature) -> HandlerShape {
    let mut shape = HandlerShape::default();

    for param in &signature.params {
        let parsed = RustType::parse(param);
        let (ty, wrapped_optional) = match &parsed {
            RustType::Option(inner) => (inner.as_ref(), true),
            other => (other, false),
        };

        let RustType::Named { path, args } = ty else {
            continue;
        };
        let inner = args.first();

        match last_segment(path) {
            "Json" => {
                if let Some(inner) = inner {
                    shape.body_optional = wrapped_optional || matches!(inner, RustType::Option(_));
                    shape.body = Some(inner.without_option().to_string());
                    shape.body_kind = Some(BodyKind::Json);
                }
            }
            "Form" => {
                if let Some(inner) = inner {
                    shape.body_optional = wrapped_optional;
                    shape.body = Some(inner.without_option().to_string());
                    shape.body_kind = Some(BodyKind::Form);
                }
            }
            "Multipart" => shape.body_kind = Some(BodyKind::FormData),
            "Bytes" | "Body" => shape.body_kind = Some(BodyKind::Binary),
            "Query" => shape.query = inner.map(|t| t.without_option().to_string()),
            "Path" => {}
            name if NON_PAYLOAD_EXTRACTORS.contains(&name) || name.ends_with("State") => {}
            _ => shape.candidates.push(parsed.to_string()),
        }
    }

    if let Some(return_type) = &signature.return_type {
        shape.response = find_json(&RustType::parse(return_type)).map(|t| t.to_string());
    }

    if let Some(kind) = signature.hints.body {
        shape.body_kind = Some(kind);
    }
    shape.response_kind = signature.hints.response;
    shape
}

/// First `Json<T>` payload inside a return type (through `Result`, tuples and aliases).
fn find_json(ty: &RustType) -> Option<&RustType> {
    match ty {
        RustType::Named { path, args } if last_segment(path) == "Json" => args.first(),
        RustType::Named { args, .. } => args.iter().find_map(find_json),
        RustType::Tuple(items) => items.iter().find_map(find_json),
        RustType::Option(inner) => find_json(inner),
        _ => None,
    }
}

/// Fills an endpoint's payload types from its handler's shape.
///
/// Types are qualified in the handler's scope. A parameter that is no known extractor
/// becomes the body when it is the only candidate and the method is mutating.
pub fn apply_shape(endpoint: &mut Endpoint, shape: &HandlerShape, scope: &Scope<'_>) {
    let qualify = |text: &String| RustType::parse(text).qualify(scope).to_string();

    endpoint.query_type = shape.query.as_ref().map(qualify);
    endpoint.body_type = shape.body.as_ref().map(qualify);
    endpoint.body_optional = shape.body_optional;
    endpoint.response_type = shape.response.as_ref().map(qualify);

    if endpoint.body_type.is_none()
        && shape.body_kind.is_none()
        && shape.candidates.len() == 1
        && endpoint.method.is_mutating()
    {
        debug!(
            "{} {}: adopting {} as request body",
            endpoint.method, endpoint.path, shape.candidates[0]
        );
        endpoint.body_type = Some(qualify(&shape.candidates[0]));
    }

    if let Some(kind) = shape.body_kind {
        endpoint.body_kind = kind;
    }
    if let Some(kind) = shape.response_kind {
        endpoint.response_kind = kind;
    }
}
