//! Client method plan shared by the client and types emitters.
//!
//! Names and parameter lists are decided once here so that the client methods and
//! the per-endpoint request/response declarations always agree.

use crate::closure::ApiModel;
use crate::extractor::{BodyKind, Endpoint, HttpMethod, ResponseKind};
use crate::type_resolver::{to_pascal_case, DefinitionKind, RustType};
use crate::typescript::mapping::{identifier, TsMapper};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// Namespace under which the client file imports the types file.
pub const TYPES_NAMESPACE: &str = "Types";

/// A type rendered for both files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TsType {
    /// As written in the types file
    pub local: String,
    /// As written in the client file
    pub client: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryField {
    pub name: String,
    pub ty: TsType,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryBinding {
    /// Fields of a resolved query struct
    Fields(Vec<QueryField>),
    /// Query type that could not be resolved to a struct
    Opaque,
}

impl QueryBinding {
    /// A query object can be omitted when none of its fields is required.
    pub fn all_optional(&self) -> bool {
        match self {
            QueryBinding::Fields(fields) => fields.iter().all(|f| f.optional),
            QueryBinding::Opaque => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyBinding {
    pub ty: TsType,
    pub optional: bool,
    pub kind: BodyKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseBinding {
    pub ty: TsType,
    pub kind: ResponseKind,
}

/// One client method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBinding {
    pub name: String,
    pub method: HttpMethod,
    pub path: String,
    /// `(placeholder, parameter identifier)` in path order
    pub path_params: Vec<(String, String)>,
    pub query: Option<QueryBinding>,
    pub body: Option<BodyBinding>,
    pub response: ResponseBinding,
    pub auth: bool,
    pub handler: String,
    pub request_interface: String,
    pub response_alias: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleBindings {
    pub name: String,
    pub methods: Vec<MethodBinding>,
}

/// Every client method, grouped by module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingPlan {
    pub modules: Vec<ModuleBindings>,
}

impl BindingPlan {
    pub fn build(model: &ApiModel) -> Self {
        let local = TsMapper::new(&model.types);
        let client = TsMapper::with_namespace(&model.types, TYPES_NAMESPACE);
        let render = |text: &str| TsType {
            local: local.map_text(text, &[]),
            client: client.map_text(text, &[]),
        };

        let mut interface_names = BTreeSet::new();
        let modules = model
            .modules
            .iter()
            .map(|module| {
                let ambiguous = ambiguous_paths(&module.endpoints);
                let mut used = BTreeSet::new();
                let methods = module
                    .endpoints
                    .iter()
                    .map(|endpoint| {
                        let base = method_name(
                            &endpoint.path,
                            endpoint.method,
                            ambiguous.contains(endpoint.path.as_str()),
                        );
                        let name = unique_method_name(base, endpoint.method, &mut used);
                        let stem = format!("{}{}", module.name, to_pascal_case(&name));
                        let request_interface =
                            unique_interface(format!("{}Request", stem), &mut interface_names);
                        let response_alias =
                            unique_interface(format!("{}Response", stem), &mut interface_names);

                        MethodBinding {
                            path_params: endpoint
                                .path_params()
                                .into_iter()
                                .map(|p| {
                                    let ident = identifier(&p);
                                    (p, ident)
                                })
                                .collect(),
                            query: query_binding(endpoint, model, &render),
                            body: body_binding(endpoint, &render),
                            response: ResponseBinding {
                                ty: match (&endpoint.response_type, endpoint.response_kind) {
                                    (_, ResponseKind::Binary) => same("Blob"),
                                    (_, ResponseKind::Text) => same("string"),
                                    (_, ResponseKind::Form) => same("FormData"),
                                    (Some(ty), ResponseKind::Json) => render(ty),
                                    (None, ResponseKind::Json) => same("unknown"),
                                },
                                kind: endpoint.response_kind,
                            },
                            name,
                            method: endpoint.method,
                            path: endpoint.path.clone(),
                            auth: endpoint.auth_required,
                            handler: endpoint.handler.clone(),
                            request_interface,
                            response_alias,
                        }
                    })
                    .collect();
                ModuleBindings {
                    name: module.name.clone(),
                    methods,
                }
            })
            .collect();

        let plan = Self { modules };
        debug!("Planned {} client methods", plan.method_count());
        plan
    }

    pub fn method_count(&self) -> usize {
        self.modules.iter().map(|m| m.methods.len()).sum()
    }
}

fn same(ty: &str) -> TsType {
    TsType {
        local: ty.to_string(),
        client: ty.to_string(),
    }
}

fn query_binding(
    endpoint: &Endpoint,
    model: &ApiModel,
    render: &impl Fn(&str) -> TsType,
) -> Option<QueryBinding> {
    let query = endpoint.query_type.as_ref()?;
    let def = model.types.find_type(&RustType::parse(query));
    match def {
        Some(def) if matches!(def.kind, DefinitionKind::Struct { .. }) => Some(QueryBinding::Fields(
            model
                .types
                .inlined_fields(def)
                .into_iter()
                .map(|field| QueryField {
                    ty: render(&field.rust_type),
                    name: field.serialized_name,
                    optional: field.optional,
                })
                .collect(),
        )),
        _ => Some(QueryBinding::Opaque),
    }
}

fn body_binding(endpoint: &Endpoint, render: &impl Fn(&str) -> TsType) -> Option<BodyBinding> {
    let carries_body = endpoint.method.is_mutating()
        || endpoint.body_type.is_some()
        || matches!(endpoint.body_kind, BodyKind::FormData | BodyKind::Binary);
    if !carries_body {
        return None;
    }

    let (ty, optional) = match (endpoint.body_kind, &endpoint.body_type) {
        (BodyKind::FormData, _) => (same("FormData"), endpoint.body_optional),
        (BodyKind::Binary, _) => (same("Blob | ArrayBuffer"), endpoint.body_optional),
        (_, Some(ty)) => (render(ty), endpoint.body_optional),
        (_, None) => (same("unknown"), true),
    };
    Some(BodyBinding {
        ty,
        optional,
        kind: endpoint.body_kind,
    })
}

/// Paths registered for more than one method within a module.
fn ambiguous_paths(endpoints: &[Endpoint]) -> BTreeSet<&str> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for endpoint in endpoints {
        *counts.entry(endpoint.path.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(path, _)| path)
        .collect()
}

/// Derives a method name from a path.
///
/// `{id}` becomes `by_id`, `{user_id}` becomes `by_user`, any other placeholder
/// `by_<name>`; literal segments are kept with non-alphanumerics replaced by `_`.
/// The HTTP method is prepended only when `ambiguous`.
pub fn method_name(path: &str, method: HttpMethod, ambiguous: bool) -> String {
    let mut parts: Vec<String> = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if let Some(param) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            let param = param.trim_start_matches('*');
            let short = if param == "id" {
                "id"
            } else {
                param.strip_suffix("_id").unwrap_or(param)
            };
            parts.push(format!("by_{}", sanitize(short)));
        } else {
            let part = sanitize(segment);
            if !part.is_empty() {
                parts.push(part);
            }
        }
    }

    let base = parts.join("_");
    let name = if base.is_empty() {
        format!("{}_request", method.lower())
    } else if ambiguous {
        format!("{}_{}", method.lower(), base)
    } else {
        base
    };

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{}", name)
    } else {
        name
    }
}

fn sanitize(segment: &str) -> String {
    let replaced: String = segment
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    replaced
        .split('_')
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

fn unique_method_name(base: String, method: HttpMethod, used: &mut BTreeSet<String>) -> String {
    if used.insert(base.clone()) {
        return base;
    }
    let prefix = format!("{}_", method.lower());
    let with_method = if base.starts_with(&prefix) {
        base.clone()
    } else {
        format!("{}{}", prefix, base)
    };
    if used.insert(with_method.clone()) {
        return with_method;
    }
    let mut n = 2;
    loop {
        let numbered = format!("{}_{}", with_method, n);
        if used.insert(numbered.clone()) {
            return numbered;
        }
        n += 1;
    }
}

fn unique_interface(candidate: String, used: &mut BTreeSet<String>) -> String {
    if used.insert(candidate.clone()) {
        return candidate;
    }
    let mut n = 2;
    loop {
        let numbered = format!("{}{}", candidate, n);
        if used.insert(numbered.clone()) {
            return numbered;
        }
        n += 1;
    }
}
