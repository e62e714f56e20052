use crate::closure::TypeIndex;
use crate::type_resolver::{Primitive, RustType};

/// TypeScript words that must be quoted when used as property names in generated code.
const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete",
    "do", "else", "enum", "export", "extends", "false", "finally", "for", "function", "if",
    "import", "in", "instanceof", "new", "null", "return", "super", "switch", "this", "throw",
    "true", "try", "typeof", "var", "void", "while", "with", "type", "interface", "let",
    "package", "private", "protected", "public", "static", "yield",
];

/// Name of the JSON value alias declared in the types file.
pub const JSON_VALUE: &str = "ApiJsonValue";

/// Maps Rust types onto TypeScript type expressions.
///
/// With a namespace set, references to emitted declarations are written as
/// `Namespace.Name`, which is how the client file refers to the types file.
#[derive(Debug, Clone, Copy)]
pub struct TsMapper<'a> {
    index: &'a TypeIndex,
    namespace: Option<&'a str>,
}

impl<'a> TsMapper<'a> {
    pub fn new(index: &'a TypeIndex) -> Self {
        Self {
            index,
            namespace: None,
        }
    }

    pub fn with_namespace(index: &'a TypeIndex, namespace: &'a str) -> Self {
        Self {
            index,
            namespace: Some(namespace),
        }
    }

    /// Qualifies a declared name with the namespace, if any.
    pub fn reference(&self, name: &str) -> String {
        match self.namespace {
            Some(ns) => format!("{}.{}", ns, name),
            None => name.to_string(),
        }
    }

    /// Maps type text; `generics` are the type parameters in scope.
    pub fn map_text(&self, text: &str, generics: &[String]) -> String {
        self.map(&RustType::parse(text), generics)
    }

    pub fn map(&self, ty: &RustType, generics: &[String]) -> String {
        match ty {
            RustType::Unit => "null".to_string(),
            RustType::Primitive(p) if p.is_numeric() => "number".to_string(),
            RustType::Primitive(Primitive::Bool) => "boolean".to_string(),
            RustType::Primitive(_) => "string".to_string(),
            RustType::Json => self.reference(JSON_VALUE),
            RustType::Option(inner) => {
                let inner = self.map(inner, generics);
                if inner.ends_with(" | null") {
                    inner
                } else {
                    format!("{} | null", inner)
                }
            }
            RustType::List(inner) => format!("Array<{}>", self.map(inner, generics)),
            RustType::Map { key, value, .. } => {
                let key = match key.as_ref() {
                    RustType::Primitive(p) if p.is_numeric() => "number",
                    _ => "string",
                };
                format!("Record<{}, {}>", key, self.map(value, generics))
            }
            RustType::Tuple(items) => {
                let items: Vec<String> = items.iter().map(|i| self.map(i, generics)).collect();
                format!("[{}]", items.join(", "))
            }
            RustType::Named { path, args } => {
                if args.is_empty() && generics.iter().any(|g| g == path) {
                    return path.clone();
                }
                let Some(def) = self.index.find(path) else {
                    return self.reference(JSON_VALUE);
                };
                let name = self.reference(&def.name);
                if def.generics.is_empty() {
                    return name;
                }
                let mapped: Vec<String> = (0..def.generics.len())
                    .map(|i| match args.get(i) {
                        Some(arg) => self.map(arg, generics),
                        None => "unknown".to_string(),
                    })
                    .collect();
                format!("{}<{}>", name, mapped.join(", "))
            }
            RustType::Opaque(_) => "unknown".to_string(),
        }
    }
}

/// Renders a property key, quoting it when it is reserved or not an identifier.
pub fn property_key(name: &str) -> String {
    if is_identifier(name) && !RESERVED.contains(&name) {
        name.to_string()
    } else {
        string_literal(name)
    }
}

pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Single-quoted TypeScript string literal.
pub fn string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Turns an arbitrary name into a valid identifier; used for client parameters.
pub fn identifier(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if RESERVED.contains(&ident.as_str()) {
        ident.push('_');
    }
    ident
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_resolver::{DefinitionKind, TypeDefinition};

    fn index() -> TypeIndex {
        let def = |name: &str, generics: &[&str]| TypeDefinition {
            name: format!("Api{}", name),
            rust_path: format!("crate::models::{}", name),
            module_path: "crate::models".to_string(),
            original_name: name.to_string(),
            generics: generics.iter().map(|g| g.to_string()).collect(),
            kind: DefinitionKind::Struct { fields: Vec::new() },
        };
        TypeIndex::new(vec![def("User", &[]), def("Page", &["T"])])
    }

    #[test]
    fn test_map_scalars_and_containers() {
        let index = index();
        let mapper = TsMapper::new(&index);
        assert_eq!(mapper.map_text("u64", &[]), "number");
        assert_eq!(mapper.map_text("Uuid", &[]), "string");
        assert_eq!(mapper.map_text("Option<Option<bool>>", &[]), "boolean | null");
        assert_eq!(mapper.map_text("Vec<(String, i32)>", &[]), "Array<[string, number]>");
        assert_eq!(
            mapper.map_text("HashMap<String, Vec<u8>>", &[]),
            "Record<string, Array<number>>"
        );
        assert_eq!(mapper.map_text("serde_json::Value", &[]), "ApiJsonValue");
    }

    #[test]
    fn test_map_named_types() {
        let index = index();
        let mapper = TsMapper::with_namespace(&index, "Types");
        assert_eq!(mapper.map_text("crate::models::User", &[]), "Types.ApiUser");
        assert_eq!(
            mapper.map_text("crate::models::Page<crate::models::User>", &[]),
            "Types.ApiPage<Types.ApiUser>"
        );
        assert_eq!(mapper.map_text("crate::models::Page", &[]), "Types.ApiPage<unknown>");
        assert_eq!(mapper.map_text("crate::other::Missing", &[]), "Types.ApiJsonValue");
        assert_eq!(mapper.map_text("T", &["T".to_string()]), "T");
    }

    #[test]
    fn test_property_keys() {
        assert_eq!(property_key("name"), "name");
        assert_eq!(property_key("type"), "'type'");
        assert_eq!(property_key("created-at"), "'created-at'");
        assert_eq!(identifier("user-id"), "user_id");
        assert_eq!(identifier("default"), "default_");
    }
}
