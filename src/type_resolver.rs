//! Type model: parsed Rust type expressions and resolved serde definitions.
//!
//! [`RustType`] is the structural view of a type expression as written in a field
//! or signature. [`TypeResolver`] turns the raw declarations collected by the
//! extractors into [`TypeDefinition`]s whose field types are fully qualified and
//! whose serialized names, optionality and enum tagging follow serde's rules.

use crate::extractor::{DeclarationBody, Imports, RawField, RawPayload, TypeDeclaration};
use crate::lexer::{matching_close, split_top_level};
use log::debug;
use std::collections::BTreeSet;
use std::fmt;

/// Scalar types with a fixed wire representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    String,
    Char,
    Bool,
    I8,
    I16,
    I32,
    I64,
    I128,
    Isize,
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
    F32,
    F64,
    Uuid,
    DateTime,
    NaiveDateTime,
    NaiveDate,
    NaiveTime,
}

impl Primitive {
    fn from_name(name: &str) -> Option<Self> {
        let primitive = match name {
            "String" | "str" => Primitive::String,
            "char" => Primitive::Char,
            "bool" => Primitive::Bool,
            "i8" => Primitive::I8,
            "i16" => Primitive::I16,
            "i32" => Primitive::I32,
            "i64" => Primitive::I64,
            "i128" => Primitive::I128,
            "isize" => Primitive::Isize,
            "u8" => Primitive::U8,
            "u16" => Primitive::U16,
            "u32" => Primitive::U32,
            "u64" => Primitive::U64,
            "u128" => Primitive::U128,
            "usize" => Primitive::Usize,
            "f32" => Primitive::F32,
            "f64" => Primitive::F64,
            "Uuid" => Primitive::Uuid,
            "DateTime" => Primitive::DateTime,
            "NaiveDateTime" => Primitive::NaiveDateTime,
            "NaiveDate" => Primitive::NaiveDate,
            "NaiveTime" => Primitive::NaiveTime,
            _ => return None,
        };
        Some(primitive)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Primitive::String => "String",
            Primitive::Char => "char",
            Primitive::Bool => "bool",
            Primitive::I8 => "i8",
            Primitive::I16 => "i16",
            Primitive::I32 => "i32",
            Primitive::I64 => "i64",
            Primitive::I128 => "i128",
            Primitive::Isize => "isize",
            Primitive::U8 => "u8",
            Primitive::U16 => "u16",
            Primitive::U32 => "u32",
            Primitive::U64 => "u64",
            Primitive::U128 => "u128",
            Primitive::Usize => "usize",
            Primitive::F32 => "f32",
            Primitive::F64 => "f64",
            Primitive::Uuid => "Uuid",
            Primitive::DateTime => "DateTime",
            Primitive::NaiveDateTime => "NaiveDateTime",
            Primitive::NaiveDate => "NaiveDate",
            Primitive::NaiveTime => "NaiveTime",
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(
            self,
            Primitive::String
                | Primitive::Char
                | Primitive::Bool
                | Primitive::Uuid
                | Primitive::DateTime
                | Primitive::NaiveDateTime
                | Primitive::NaiveDate
                | Primitive::NaiveTime
        )
    }
}

/// Structural view of a Rust type expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RustType {
    Unit,
    Primitive(Primitive),
    /// `serde_json::Value`
    Json,
    Option(Box<RustType>),
    /// `Vec`, `VecDeque`, sets, slices and arrays
    List(Box<RustType>),
    Map {
        key: Box<RustType>,
        value: Box<RustType>,
        ordered: bool,
    },
    Tuple(Vec<RustType>),
    /// A user type or generic parameter, possibly with type arguments
    Named { path: String, args: Vec<RustType> },
    /// Anything that has no wire shape we can describe (`impl Trait`, fn types)
    Opaque(String),
}

impl RustType {
    /// Parses a type expression.
    ///
    /// References, lifetimes and smart pointers (`Box`, `Arc`, `Rc`, `Cow`) are
    /// transparent; slices, arrays and a trailing `[]` become lists.
    pub fn parse(text: &str) -> RustType {
        let mut t = text.trim();

        loop {
            if let Some(rest) = t.strip_prefix('&') {
                t = rest.trim_start();
            } else if t.starts_with('\'') {
                let end = t.find(char::is_whitespace).unwrap_or(t.len());
                t = t[end..].trim_start();
            } else if let Some(rest) = t.strip_prefix("mut ") {
                t = rest.trim_start();
            } else {
                break;
            }
        }

        if t.is_empty() {
            return RustType::Opaque(String::new());
        }
        if t.starts_with("impl ") || t.starts_with("dyn ") || t.starts_with("fn(") {
            return RustType::Opaque(t.to_string());
        }

        if t.starts_with('(') && matching_close(t, 0, true) == Some(t.len() - 1) {
            let inner = &t[1..t.len() - 1];
            let parts = split_top_level(inner, ',', true);
            if parts.is_empty() {
                return RustType::Unit;
            }
            if parts.len() == 1 && !inner.trim_end().ends_with(',') {
                return RustType::parse(&parts[0]);
            }
            return RustType::Tuple(parts.iter().map(|p| RustType::parse(p)).collect());
        }

        if t.starts_with('[') && matching_close(t, 0, true) == Some(t.len() - 1) {
            let inner = &t[1..t.len() - 1];
            let element = split_top_level(inner, ';', true)
                .into_iter()
                .next()
                .unwrap_or_default();
            return RustType::List(Box::new(RustType::parse(&element)));
        }

        if let Some(element) = t.strip_suffix("[]") {
            return RustType::List(Box::new(RustType::parse(element)));
        }

        let (base, args) = match t.find('<') {
            Some(lt) if t.ends_with('>') && matching_close(t, lt, true) == Some(t.len() - 1) => {
                let args = split_top_level(&t[lt + 1..t.len() - 1], ',', true)
                    .into_iter()
                    .filter(|arg| !arg.starts_with('\''))
                    .map(|arg| RustType::parse(&arg))
                    .collect();
                (t[..lt].trim(), args)
            }
            _ => (t, Vec::new()),
        };

        let base = base.trim_start_matches("::");
        let base: String = base.chars().filter(|c| !c.is_whitespace()).collect();
        let valid = !base.is_empty()
            && base
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == ':');
        if !valid {
            return RustType::Opaque(t.to_string());
        }

        RustType::named(&base, args)
    }

    /// Classifies a path with arguments, recognizing std containers and well-known scalars.
    ///
    /// Paths rooted in the user's crate (`crate::`, `self::`, `super::`) are never
    /// reinterpreted, so a user type named `Value` stays a user type.
    pub fn named(path: &str, mut args: Vec<RustType>) -> RustType {
        let user_path =
            path.starts_with("crate::") || path.starts_with("self::") || path.starts_with("super::");
        if user_path {
            return RustType::Named {
                path: path.to_string(),
                args,
            };
        }

        let last = path.rsplit("::").next().unwrap_or(path);
        match (last, args.len()) {
            ("Option", 1) => RustType::Option(Box::new(args.remove(0))),
            ("Vec" | "VecDeque" | "LinkedList" | "HashSet" | "BTreeSet" | "IndexSet", 1) => {
                RustType::List(Box::new(args.remove(0)))
            }
            ("HashMap" | "BTreeMap" | "IndexMap", 2) => {
                let value = args.remove(1);
                let key = args.remove(0);
                RustType::Map {
                    key: Box::new(key),
                    value: Box::new(value),
                    ordered: last != "HashMap",
                }
            }
            ("Box" | "Arc" | "Rc" | "Cow", 1) => args.remove(0),
            ("Value", 0) if path.starts_with("serde_json::") => RustType::Json,
            ("DateTime", _) => RustType::Primitive(Primitive::DateTime),
            (name, 0) => match Primitive::from_name(name) {
                Some(primitive) => RustType::Primitive(primitive),
                None => RustType::Named {
                    path: path.to_string(),
                    args,
                },
            },
            _ => RustType::Named {
                path: path.to_string(),
                args,
            },
        }
    }

    /// True if an `Option` appears anywhere in the type tree.
    pub fn is_optional(&self) -> bool {
        match self {
            RustType::Option(_) => true,
            RustType::List(inner) => inner.is_optional(),
            RustType::Map { key, value, .. } => key.is_optional() || value.is_optional(),
            RustType::Tuple(items) => items.iter().any(RustType::is_optional),
            RustType::Named { args, .. } => args.iter().any(RustType::is_optional),
            _ => false,
        }
    }

    /// Paths of every named type in the tree, outermost first.
    pub fn referenced_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths(&self, out: &mut Vec<String>) {
        match self {
            RustType::Named { path, args } => {
                out.push(path.clone());
                for arg in args {
                    arg.collect_paths(out);
                }
            }
            RustType::Option(inner) | RustType::List(inner) => inner.collect_paths(out),
            RustType::Map { key, value, .. } => {
                key.collect_paths(out);
                value.collect_paths(out);
            }
            RustType::Tuple(items) => {
                for item in items {
                    item.collect_paths(out);
                }
            }
            _ => {}
        }
    }

    /// Rewrites every named path relative to `scope` into a fully-qualified one.
    pub fn qualify(&self, scope: &Scope<'_>) -> RustType {
        match self {
            RustType::Named { path, args } => {
                let args = args.iter().map(|a| a.qualify(scope)).collect();
                RustType::named(&scope.qualify_path(path), args)
            }
            RustType::Option(inner) => RustType::Option(Box::new(inner.qualify(scope))),
            RustType::List(inner) => RustType::List(Box::new(inner.qualify(scope))),
            RustType::Map {
                key,
                value,
                ordered,
            } => RustType::Map {
                key: Box::new(key.qualify(scope)),
                value: Box::new(value.qualify(scope)),
                ordered: *ordered,
            },
            RustType::Tuple(items) => RustType::Tuple(items.iter().map(|i| i.qualify(scope)).collect()),
            other => other.clone(),
        }
    }

    /// Strips one `Option` layer.
    pub fn without_option(&self) -> &RustType {
        match self {
            RustType::Option(inner) => inner,
            other => other,
        }
    }
}

impl fmt::Display for RustType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RustType::Unit => f.write_str("()"),
            RustType::Primitive(p) => f.write_str(p.name()),
            RustType::Json => f.write_str("serde_json::Value"),
            RustType::Option(inner) => write!(f, "Option<{}>", inner),
            RustType::List(inner) => write!(f, "Vec<{}>", inner),
            RustType::Map {
                key,
                value,
                ordered,
            } => {
                let name = if *ordered { "BTreeMap" } else { "HashMap" };
                write!(f, "{}<{}, {}>", name, key, value)
            }
            RustType::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                write!(f, "({})", parts.join(", "))
            }
            RustType::Named { path, args } => {
                if args.is_empty() {
                    f.write_str(path)
                } else {
                    let parts: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                    write!(f, "{}<{}>", path, parts.join(", "))
                }
            }
            RustType::Opaque(text) => f.write_str(text),
        }
    }
}

/// Name-resolution context of a declaration or handler.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub module_path: &'a str,
    pub imports: &'a Imports,
    pub generics: &'a [String],
}

impl<'a> Scope<'a> {
    pub fn new(module_path: &'a str, imports: &'a Imports, generics: &'a [String]) -> Self {
        Self {
            module_path,
            imports,
            generics,
        }
    }

    /// Qualifies a path as it would be resolved inside this scope.
    ///
    /// Generic parameters stay bare. Multi-segment paths whose first segment is
    /// neither a keyword nor an import are assumed to be absolute already.
    pub fn qualify_path(&self, path: &str) -> String {
        let mut segments = path.split("::");
        let Some(first) = segments.next() else {
            return path.to_string();
        };
        let rest: Vec<&str> = segments.collect();

        if rest.is_empty() && self.generics.iter().any(|g| g == first) {
            return path.to_string();
        }

        match first {
            "crate" | "self" | "super" => absolutize(path, self.module_path),
            _ => {
                if let Some(target) = self.imports.get(first) {
                    let base = absolutize(target, self.module_path);
                    if rest.is_empty() {
                        base
                    } else {
                        format!("{}::{}", base, rest.join("::"))
                    }
                } else if rest.is_empty() {
                    if Primitive::from_name(first).is_some() {
                        first.to_string()
                    } else {
                        format!("{}::{}", self.module_path, first)
                    }
                } else {
                    path.to_string()
                }
            }
        }
    }
}

/// Resolves `crate::`, `self::` and `super::` prefixes against `module_path`.
///
/// `crate` maps to the first segment of `module_path`, so declarations of a
/// secondary crate keep that crate's name.
pub fn absolutize(path: &str, module_path: &str) -> String {
    let mut base: Vec<&str> = module_path.split("::").collect();
    let crate_root = base.first().copied().unwrap_or("crate");
    let mut segments: Vec<&str> = path.split("::").collect();

    match segments.first().copied() {
        Some("crate") => {
            segments[0] = crate_root;
            segments.join("::")
        }
        Some("self") => {
            segments.remove(0);
            base.extend(segments);
            base.join("::")
        }
        Some("super") => {
            while segments.first() == Some(&"super") {
                segments.remove(0);
                if base.len() > 1 {
                    base.pop();
                }
            }
            base.extend(segments);
            base.join("::")
        }
        _ => path.to_string(),
    }
}

/// `system-requests` -> `SystemRequests`, `user_out` -> `UserOut`.
///
/// Splits on `_`, `-`, `/`, `:` and whitespace and upper-cases the first letter of
/// every part; the rest of each part is kept as written.
pub fn to_pascal_case(value: &str) -> String {
    value
        .split(|c: char| c == '_' || c == '-' || c == '/' || c == ':' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// serde `rename_all` conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameRule {
    Lower,
    Upper,
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    Kebab,
    ScreamingKebab,
}

impl RenameRule {
    pub fn parse(value: &str) -> Option<Self> {
        let rule = match value {
            "lowercase" => RenameRule::Lower,
            "UPPERCASE" => RenameRule::Upper,
            "PascalCase" => RenameRule::Pascal,
            "camelCase" => RenameRule::Camel,
            "snake_case" => RenameRule::Snake,
            "SCREAMING_SNAKE_CASE" => RenameRule::ScreamingSnake,
            "kebab-case" => RenameRule::Kebab,
            "SCREAMING-KEBAB-CASE" => RenameRule::ScreamingKebab,
            _ => return None,
        };
        Some(rule)
    }

    /// Applies the rule to a `snake_case` field identifier.
    pub fn apply_to_field(&self, field: &str) -> String {
        match self {
            RenameRule::Lower | RenameRule::Snake => field.to_string(),
            RenameRule::Upper | RenameRule::ScreamingSnake => field.to_ascii_uppercase(),
            RenameRule::Pascal => {
                let mut out = String::new();
                let mut capitalize = true;
                for c in field.chars() {
                    if c == '_' {
                        capitalize = true;
                    } else if capitalize {
                        out.push(c.to_ascii_uppercase());
                        capitalize = false;
                    } else {
                        out.push(c);
                    }
                }
                out
            }
            RenameRule::Camel => {
                let pascal = RenameRule::Pascal.apply_to_field(field);
                lowercase_first(&pascal)
            }
            RenameRule::Kebab => field.replace('_', "-"),
            RenameRule::ScreamingKebab => field.to_ascii_uppercase().replace('_', "-"),
        }
    }

    /// Applies the rule to a `PascalCase` variant identifier.
    pub fn apply_to_variant(&self, variant: &str) -> String {
        match self {
            RenameRule::Pascal => variant.to_string(),
            RenameRule::Lower => variant.to_ascii_lowercase(),
            RenameRule::Upper => variant.to_ascii_uppercase(),
            RenameRule::Camel => lowercase_first(variant),
            RenameRule::Snake => {
                let mut snake = String::new();
                for (i, c) in variant.char_indices() {
                    if c.is_uppercase() && i > 0 {
                        snake.push('_');
                    }
                    snake.push(c.to_ascii_lowercase());
                }
                snake
            }
            RenameRule::ScreamingSnake => RenameRule::Snake
                .apply_to_variant(variant)
                .to_ascii_uppercase(),
            RenameRule::Kebab => RenameRule::Snake.apply_to_variant(variant).replace('_', "-"),
            RenameRule::ScreamingKebab => RenameRule::ScreamingSnake
                .apply_to_variant(variant)
                .replace('_', "-"),
        }
    }
}

fn lowercase_first(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// How an enum's variants appear on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tagging {
    /// `{"Variant": payload}` or `"Variant"` for unit variants
    External,
    /// `{"tag": "Variant", ...payload fields}`
    Internal { tag: String },
    /// `{"tag": "Variant", "content": payload}`
    Adjacent { tag: String, content: String },
    /// The payload alone
    Untagged,
}

/// A resolved serde type, ready for closure computation and emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    /// Emitted name; equal to `original_name` until names are assigned
    pub name: String,
    /// Fully-qualified path, e.g. `crate::models::User`
    pub rust_path: String,
    pub module_path: String,
    pub original_name: String,
    pub generics: Vec<String>,
    pub kind: DefinitionKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionKind {
    Struct { fields: Vec<FieldDef> },
    Enum { variants: Vec<VariantDef>, tagging: Tagging },
    /// Tuple struct, serialized as its element (or as an array for several)
    Newtype { rust_type: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub ident: String,
    /// Canonical, fully-qualified type text
    pub rust_type: String,
    pub serialized_name: String,
    pub optional: bool,
    pub flatten: bool,
}

impl FieldDef {
    pub fn parsed_type(&self) -> RustType {
        RustType::parse(&self.rust_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDef {
    pub ident: String,
    /// Serialized variant name
    pub discriminant: String,
    pub payload: VariantPayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantPayload {
    Unit,
    Type(String),
    Fields(Vec<FieldDef>),
}

impl TypeDefinition {
    pub fn is_unit_enum(&self) -> bool {
        match &self.kind {
            DefinitionKind::Enum { variants, .. } => {
                variants.iter().all(|v| v.payload == VariantPayload::Unit)
            }
            DefinitionKind::Struct { .. } | DefinitionKind::Newtype { .. } => false,
        }
    }

    /// Every type expression the definition refers to.
    pub fn member_types(&self) -> Vec<RustType> {
        match &self.kind {
            DefinitionKind::Struct { fields } => fields.iter().map(FieldDef::parsed_type).collect(),
            DefinitionKind::Enum { variants, .. } => variants
                .iter()
                .flat_map(|variant| match &variant.payload {
                    VariantPayload::Unit => Vec::new(),
                    VariantPayload::Type(ty) => vec![RustType::parse(ty)],
                    VariantPayload::Fields(fields) => {
                        fields.iter().map(FieldDef::parsed_type).collect()
                    }
                })
                .collect(),
            DefinitionKind::Newtype { rust_type } => vec![RustType::parse(rust_type)],
        }
    }
}

/// Declarations of one source file together with its imports.
#[derive(Debug, Clone)]
pub struct DeclaredFile {
    pub imports: Imports,
    pub declarations: Vec<TypeDeclaration>,
}

/// Builds [`TypeDefinition`]s from raw declarations.
pub struct TypeResolver;

impl TypeResolver {
    /// Resolves every declaration of every file.
    ///
    /// # Returns
    ///
    /// Definitions in input order; a path declared twice keeps its first declaration.
    pub fn build_definitions(files: &[DeclaredFile]) -> Vec<TypeDefinition> {
        let mut seen = BTreeSet::new();
        let mut definitions = Vec::new();

        for file in files {
            for declaration in &file.declarations {
                let rust_path = format!("{}::{}", declaration.module_path, declaration.name);
                if !seen.insert(rust_path.clone()) {
                    debug!("Duplicate declaration of {} ignored", rust_path);
                    continue;
                }
                let scope = Scope::new(
                    &declaration.module_path,
                    &file.imports,
                    &declaration.generics,
                );
                definitions.push(Self::build_definition(declaration, rust_path, &scope));
            }
        }

        debug!("Resolved {} type definitions", definitions.len());
        definitions
    }

    fn build_definition(
        declaration: &TypeDeclaration,
        rust_path: String,
        scope: &Scope<'_>,
    ) -> TypeDefinition {
        let rename_all = declaration
            .attrs
            .rename_all
            .as_deref()
            .and_then(RenameRule::parse);

        let kind = match &declaration.body {
            DeclarationBody::Struct(fields) => DefinitionKind::Struct {
                fields: Self::build_fields(fields, rename_all, scope),
            },
            DeclarationBody::Newtype(ty) => DefinitionKind::Newtype {
                rust_type: RustType::parse(ty).qualify(scope).to_string(),
            },
            DeclarationBody::Enum(variants) => {
                let variants = variants
                    .iter()
                    .filter(|v| !v.attrs.skip)
                    .map(|variant| {
                        let discriminant = variant.attrs.rename.clone().unwrap_or_else(|| {
                            rename_all
                                .map(|rule| rule.apply_to_variant(&variant.ident))
                                .unwrap_or_else(|| variant.ident.clone())
                        });
                        let payload = match &variant.payload {
                            RawPayload::Unit => VariantPayload::Unit,
                            RawPayload::Type(ty) => {
                                VariantPayload::Type(RustType::parse(ty).qualify(scope).to_string())
                            }
                            RawPayload::Fields(fields) => {
                                VariantPayload::Fields(Self::build_fields(fields, None, scope))
                            }
                        };
                        VariantDef {
                            ident: variant.ident.clone(),
                            discriminant,
                            payload,
                        }
                    })
                    .collect();
                DefinitionKind::Enum {
                    variants,
                    tagging: Self::tagging(&declaration.attrs),
                }
            }
        };

        TypeDefinition {
            name: declaration.name.clone(),
            rust_path,
            module_path: declaration.module_path.clone(),
            original_name: declaration.name.clone(),
            generics: declaration.generics.clone(),
            kind,
        }
    }

    fn build_fields(
        fields: &[RawField],
        rename_all: Option<RenameRule>,
        scope: &Scope<'_>,
    ) -> Vec<FieldDef> {
        fields
            .iter()
            .filter(|f| !f.attrs.skip)
            .map(|field| {
                let ty = RustType::parse(&field.ty).qualify(scope);
                let serialized_name = field.attrs.rename.clone().unwrap_or_else(|| {
                    rename_all
                        .map(|rule| rule.apply_to_field(&field.ident))
                        .unwrap_or_else(|| field.ident.clone())
                });
                FieldDef {
                    ident: field.ident.clone(),
                    optional: ty.is_optional()
                        || field.attrs.default
                        || field.attrs.skip_serializing_if.is_some(),
                    rust_type: ty.to_string(),
                    serialized_name,
                    flatten: field.attrs.flatten,
                }
            })
            .collect()
    }

    fn tagging(attrs: &crate::extractor::attrs::ContainerAttrs) -> Tagging {
        match (&attrs.tag, &attrs.content) {
            (Some(tag), Some(content)) => Tagging::Adjacent {
                tag: tag.clone(),
                content: content.clone(),
            },
            (Some(tag), None) => Tagging::Internal { tag: tag.clone() },
            _ if attrs.untagged => Tagging::Untagged,
            _ => Tagging::External,
        }
    }
}
