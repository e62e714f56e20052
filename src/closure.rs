//! Reachability and naming of the emitted type set.
//!
//! Only definitions reachable from an endpoint's query, body or response type are
//! emitted. Reachability is computed first, over the original names; emitted names
//! are assigned afterwards by a pure pass that resolves collisions.

use crate::extractor::{ApiModule, Endpoint};
use crate::type_resolver::{to_pascal_case, DefinitionKind, FieldDef, RustType, TypeDefinition};
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Lookup structure over a set of definitions.
#[derive(Debug, Clone, Default)]
pub struct TypeIndex {
    definitions: Vec<TypeDefinition>,
    by_path: HashMap<String, usize>,
    by_simple_name: HashMap<String, Vec<usize>>,
}

impl TypeIndex {
    pub fn new(definitions: Vec<TypeDefinition>) -> Self {
        let mut by_path = HashMap::new();
        let mut by_simple_name: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, def) in definitions.iter().enumerate() {
            by_path.insert(def.rust_path.clone(), idx);
            by_simple_name
                .entry(def.original_name.clone())
                .or_default()
                .push(idx);
        }
        Self {
            definitions,
            by_path,
            by_simple_name,
        }
    }

    pub fn definitions(&self) -> &[TypeDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Finds the definition a type path refers to.
    ///
    /// Exact paths win. Otherwise the simple name decides, and among several
    /// definitions sharing it the one with the longest common module prefix.
    pub fn find(&self, path: &str) -> Option<&TypeDefinition> {
        if let Some(&idx) = self.by_path.get(path) {
            return Some(&self.definitions[idx]);
        }

        let simple = path.rsplit("::").next().unwrap_or(path);
        let candidates = self.by_simple_name.get(simple)?;
        let best = candidates
            .iter()
            .copied()
            .max_by_key(|&idx| {
                let shared = common_prefix_segments(&self.definitions[idx].rust_path, path);
                // earlier definitions win ties
                (shared, std::cmp::Reverse(idx))
            })?;
        Some(&self.definitions[best])
    }

    /// Definition referenced by a named type, if any.
    pub fn find_type(&self, ty: &RustType) -> Option<&TypeDefinition> {
        match ty {
            RustType::Named { path, .. } => self.find(path),
            _ => None,
        }
    }

    /// A struct's fields with `flatten` fields replaced by the flattened struct's own fields.
    ///
    /// Flattened types that are not known structs stay as ordinary fields. A struct
    /// that is already being inlined is not entered again, so cyclic flattening
    /// terminates.
    pub fn inlined_fields(&self, def: &TypeDefinition) -> Vec<FieldDef> {
        let mut out = Vec::new();
        let mut visiting = vec![def.rust_path.clone()];
        if let DefinitionKind::Struct { fields } = &def.kind {
            self.inline_into(fields, false, &mut visiting, &mut out);
        }
        out
    }

    fn inline_into(
        &self,
        fields: &[FieldDef],
        force_optional: bool,
        visiting: &mut Vec<String>,
        out: &mut Vec<FieldDef>,
    ) {
        for field in fields {
            if field.flatten {
                let ty = field.parsed_type();
                let optional = matches!(ty, RustType::Option(_));
                if let Some(nested) = self.find_type(ty.without_option()) {
                    if let DefinitionKind::Struct { fields: nested_fields } = &nested.kind {
                        if !visiting.contains(&nested.rust_path) {
                            visiting.push(nested.rust_path.clone());
                            self.inline_into(nested_fields, force_optional || optional, visiting, out);
                            visiting.pop();
                            continue;
                        }
                    }
                }
            }

            let mut field = field.clone();
            field.optional |= force_optional;
            out.push(field);
        }
    }
}

fn common_prefix_segments(a: &str, b: &str) -> usize {
    a.split("::")
        .zip(b.split("::"))
        .take_while(|(x, y)| x == y)
        .count()
}

/// Everything reachable from the endpoints' payload types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Closure {
    /// Paths of reached definitions
    pub reached: BTreeSet<String>,
    /// Referenced paths that matched no definition
    pub unresolved: BTreeSet<String>,
}

impl Closure {
    /// Follows field and variant payload types, generic arguments included, to a fixed point.
    pub fn compute(endpoints: &[Endpoint], index: &TypeIndex) -> Self {
        let mut closure = Closure::default();
        let mut queue: Vec<RustType> = endpoints
            .iter()
            .flat_map(|e| [&e.query_type, &e.body_type, &e.response_type])
            .flatten()
            .map(|text| RustType::parse(text))
            .collect();

        while let Some(ty) = queue.pop() {
            for path in ty.referenced_paths() {
                match index.find(&path) {
                    Some(def) => {
                        if closure.reached.insert(def.rust_path.clone()) {
                            queue.extend(def.member_types());
                        }
                    }
                    None => {
                        closure.unresolved.insert(path);
                    }
                }
            }
        }

        debug!(
            "Closure: {} reachable, {} unresolved",
            closure.reached.len(),
            closure.unresolved.len()
        );
        closure
    }

    pub fn is_empty(&self) -> bool {
        self.reached.is_empty()
    }

    /// Keeps definitions in the closure; an empty closure keeps everything.
    pub fn retain(&self, definitions: Vec<TypeDefinition>) -> Vec<TypeDefinition> {
        if self.is_empty() {
            return definitions;
        }
        definitions
            .into_iter()
            .filter(|def| {
                self.reached.contains(&def.rust_path) || self.unresolved.contains(&def.original_name)
            })
            .collect()
    }
}

/// Outcome of name assignment.
#[derive(Debug, Clone)]
pub struct Naming {
    pub definitions: Vec<TypeDefinition>,
    pub warnings: Vec<String>,
}

/// Assigns emitted names.
///
/// A name declared once becomes `prefix + Name`. Names declared in several modules
/// get the title-cased last two module segments inserted before the name, and any
/// collision left after that gets a numeric suffix starting at 2.
pub fn assign_names(mut definitions: Vec<TypeDefinition>, prefix: &str) -> Naming {
    definitions.sort_by(|a, b| a.rust_path.cmp(&b.rust_path));

    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (idx, def) in definitions.iter().enumerate() {
        let key = to_pascal_case(&def.original_name).to_lowercase();
        groups.entry(key).or_default().push(idx);
    }

    let mut used: BTreeSet<String> = BTreeSet::new();
    let mut warnings = Vec::new();

    for indices in groups.values() {
        if indices.len() == 1 {
            let idx = indices[0];
            let candidate = format!("{}{}", prefix, to_pascal_case(&definitions[idx].original_name));
            definitions[idx].name = unique(candidate, &mut used);
            continue;
        }

        let mut assigned = Vec::new();
        for &idx in indices {
            let def = &definitions[idx];
            let candidate = format!(
                "{}{}{}",
                prefix,
                module_suffix(&def.module_path),
                to_pascal_case(&def.original_name)
            );
            let name = unique(candidate, &mut used);
            assigned.push(format!("{} as {}", def.rust_path, name));
            definitions[idx].name = name;
        }

        let warning = format!(
            "Type name '{}' is declared in {} modules; disambiguated: {}",
            definitions[indices[0]].original_name,
            indices.len(),
            assigned.join(", ")
        );
        info!("{}", warning);
        warnings.push(warning);
    }

    Naming {
        definitions,
        warnings,
    }
}

/// Title-cased last two module segments, `crate` excluded.
fn module_suffix(module_path: &str) -> String {
    let segments: Vec<&str> = module_path
        .split("::")
        .filter(|s| *s != "crate" && !s.is_empty())
        .collect();
    let start = segments.len().saturating_sub(2);
    segments[start..]
        .iter()
        .map(|s| to_pascal_case(s))
        .collect()
}

fn unique(candidate: String, used: &mut BTreeSet<String>) -> String {
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

/// The API surface handed to the emitters.
#[derive(Debug, Clone)]
pub struct ApiModel {
    pub modules: Vec<ApiModule>,
    /// Retained definitions, carrying their emitted names
    pub types: TypeIndex,
    pub warnings: Vec<String>,
}

impl ApiModel {
    /// Computes the closure, keeps reachable definitions and names them.
    pub fn build(modules: Vec<ApiModule>, definitions: Vec<TypeDefinition>, prefix: &str) -> Self {
        let endpoints: Vec<Endpoint> = modules
            .iter()
            .flat_map(|m| m.endpoints.iter().cloned())
            .collect();

        let full_index = TypeIndex::new(definitions);
        let closure = Closure::compute(&endpoints, &full_index);
        let total = full_index.len();
        let retained = closure.retain(full_index.definitions);
        info!("Retained {} of {} type definitions", retained.len(), total);

        let naming = assign_names(retained, prefix);
        Self {
            modules,
            types: TypeIndex::new(naming.definitions),
            warnings: naming.warnings,
        }
    }

    pub fn endpoint_count(&self) -> usize {
        self.modules.iter().map(|m| m.endpoints.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{AuthTaint, HttpMethod, RouteRegistration};
    use crate::type_resolver::{Tagging, VariantDef, VariantPayload};
    use pretty_assertions::assert_eq;

    fn field(name: &str, ty: &str) -> FieldDef {
        FieldDef {
            ident: name.to_string(),
            rust_type: ty.to_string(),
            serialized_name: name.to_string(),
            optional: RustType::parse(ty).is_optional(),
            flatten: false,
        }
    }

    fn strukt(module: &str, name: &str, fields: Vec<FieldDef>) -> TypeDefinition {
        TypeDefinition {
            name: name.to_string(),
            rust_path: format!("{}::{}", module, name),
            module_path: module.to_string(),
            original_name: name.to_string(),
            generics: Vec::new(),
            kind: DefinitionKind::Struct { fields },
        }
    }

    fn endpoint(response: &str) -> Endpoint {
        let mut e = Endpoint::new(
            &RouteRegistration {
                path: "/x".to_string(),
                method: HttpMethod::Get,
                handler: "h".to_string(),
            },
            AuthTaint::default(),
        );
        e.response_type = Some(response.to_string());
        e
    }

    #[test]
    fn test_closure_follows_fields_and_generic_args() {
        let index = TypeIndex::new(vec![
            strukt("crate::models", "Page", vec![field("items", "Vec<T>")]),
            strukt("crate::models", "User", vec![field("role", "crate::models::Role")]),
            strukt("crate::models", "Role", vec![field("name", "String")]),
            strukt("crate::models", "Unused", vec![]),
        ]);

        let closure = Closure::compute(
            &[endpoint("crate::models::Page<crate::models::User>")],
            &index,
        );
        let reached: Vec<&str> = closure.reached.iter().map(String::as_str).collect();
        assert_eq!(
            reached,
            vec!["crate::models::Page", "crate::models::Role", "crate::models::User"]
        );
        assert!(closure.unresolved.contains("T"));

        let kept = closure.retain(index.definitions().to_vec());
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn test_closure_terminates_on_mutual_references() {
        let index = TypeIndex::new(vec![
            strukt("crate::a", "A", vec![field("b", "Option<crate::b::B>")]),
            strukt("crate::b", "B", vec![field("a", "Vec<crate::a::A>")]),
        ]);
        let closure = Closure::compute(&[endpoint("crate::a::A")], &index);
        assert_eq!(closure.reached.len(), 2);
    }

    #[test]
    fn test_closure_follows_variant_payloads() {
        let event = TypeDefinition {
            kind: DefinitionKind::Enum {
                variants: vec![VariantDef {
                    ident: "Created".to_string(),
                    discriminant: "Created".to_string(),
                    payload: VariantPayload::Type("crate::models::User".to_string()),
                }],
                tagging: Tagging::External,
            },
            ..strukt("crate::models", "Event", vec![])
        };
        let index = TypeIndex::new(vec![event, strukt("crate::models", "User", vec![])]);
        let closure = Closure::compute(&[endpoint("crate::models::Event")], &index);
        assert!(closure.reached.contains("crate::models::User"));
    }

    #[test]
    fn test_empty_closure_keeps_everything() {
        let defs = vec![strukt("crate::models", "A", vec![])];
        let closure = Closure::default();
        assert_eq!(closure.retain(defs.clone()), defs);
    }

    #[test]
    fn test_find_prefers_closest_module() {
        let index = TypeIndex::new(vec![
            strukt("crate::routes::alters", "Filters", vec![]),
            strukt("crate::routes::users", "Filters", vec![]),
        ]);
        let found = index.find("crate::routes::users::handlers::Filters").unwrap();
        assert_eq!(found.rust_path, "crate::routes::users::Filters");
        assert!(index.find("Nope").is_none());
    }

    #[test]
    fn test_assign_names_disambiguates_collisions() {
        let naming = assign_names(
            vec![
                strukt("crate::routes::users", "Filters", vec![]),
                strukt("crate::routes::alters", "Filters", vec![]),
                strukt("crate::models", "UserOut", vec![]),
            ],
            "Api",
        );
        let names: Vec<&str> = naming.definitions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["ApiUserOut", "ApiRoutesAltersFilters", "ApiRoutesUsersFilters"]
        );
        assert_eq!(naming.warnings.len(), 1);
        assert!(naming.warnings[0].contains("Filters"));
    }

    #[test]
    fn test_assign_names_numeric_suffix() {
        let naming = assign_names(
            vec![
                strukt("crate::a::x::y", "Item", vec![]),
                strukt("crate::b::x::y", "Item", vec![]),
            ],
            "Api",
        );
        let names: Vec<&str> = naming.definitions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["ApiXYItem", "ApiXYItem2"]);
    }

    #[test]
    fn test_inlined_fields_flatten_and_cycles() {
        let mut inner = field("inner", "crate::m::Inner");
        inner.flatten = true;
        let mut back = field("outer", "Option<crate::m::Outer>");
        back.flatten = true;

        let index = TypeIndex::new(vec![
            strukt("crate::m", "Outer", vec![field("id", "i64"), inner]),
            strukt("crate::m", "Inner", vec![field("x", "i32"), field("y", "i32"), back]),
        ]);

        let outer = index.find("crate::m::Outer").unwrap();
        let fields = index.inlined_fields(outer);
        let names: Vec<&str> = fields.iter().map(|f| f.serialized_name.as_str()).collect();
        assert_eq!(names, vec!["id", "x", "y", "outer"]);
        assert!(fields[3].flatten, "cyclic flatten is kept as a plain field");
    }
}
