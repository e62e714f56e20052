use crate::closure::TypeIndex;
use crate::type_resolver::{
    to_pascal_case, DefinitionKind, FieldDef, Primitive, RustType, Tagging, TypeDefinition,
    VariantDef, VariantPayload,
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Prefix of every component reference.
pub const COMPONENT_PREFIX: &str = "#/components/schemas/";

/// Schema generator - converts resolved Rust types to OpenAPI schemas
pub struct SchemaGenerator<'a> {
    /// Retained definitions, already named
    index: &'a TypeIndex,
    /// Component schemas by name
    schemas: BTreeMap<String, Schema>,
    /// Names that belong to definitions, reserved before variant components are added
    reserved: BTreeSet<String>,
    /// Non-fatal problems met while generating
    warnings: Vec<String>,
}

/// OpenAPI Schema object, restricted to the keywords the generator emits
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Reference to a component schema
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// The type of the schema (string, integer, object, array, etc.)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    /// Format for primitive types (e.g., "int32", "uuid", "date-time")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    /// Properties for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Schema>>,
    /// Required property names for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// Items schema for array types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    /// Value schema for map types
    #[serde(rename = "additionalProperties", skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<AdditionalProperties>,
    /// Allowed string values
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(rename = "oneOf", skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<Schema>>,
    #[serde(rename = "allOf", skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<Discriminator>,
}

/// `additionalProperties` is either a flag or a schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<Schema>),
}

/// OpenAPI Discriminator object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discriminator {
    #[serde(rename = "propertyName")]
    pub property_name: String,
    /// Discriminant value -> component reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping: Option<BTreeMap<String, String>>,
}

impl Schema {
    /// A `$ref` to the named component
    pub fn reference(name: &str) -> Self {
        Self {
            reference: Some(format!("{}{}", COMPONENT_PREFIX, name)),
            ..Self::default()
        }
    }

    /// A schema of the given type and optional format
    pub fn typed(schema_type: &str, format: Option<&str>) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            format: format.map(str::to_string),
            ..Self::default()
        }
    }

    /// An object schema with properties, required names listed only when any
    pub fn object(properties: BTreeMap<String, Schema>, required: Vec<String>) -> Self {
        Self {
            schema_type: Some("object".to_string()),
            properties: Some(properties),
            required: if required.is_empty() {
                None
            } else {
                Some(required)
            },
            ..Self::default()
        }
    }

    /// A string schema accepting a single value
    pub fn constant(value: &str) -> Self {
        Self {
            schema_type: Some("string".to_string()),
            enum_values: Some(vec![value.to_string()]),
            ..Self::default()
        }
    }

    /// Marks the schema nullable; a `$ref` is wrapped in `allOf`
    fn into_nullable(self) -> Self {
        if self.reference.is_some() {
            Self {
                all_of: Some(vec![self]),
                nullable: Some(true),
                ..Self::default()
            }
        } else {
            Self {
                nullable: Some(true),
                ..self
            }
        }
    }

    /// Whether the schema has no constraints at all
    pub fn is_free_form(&self) -> bool {
        *self == Self::default()
    }
}

impl<'a> SchemaGenerator<'a> {
    /// Create a generator over the retained definitions
    pub fn new(index: &'a TypeIndex) -> Self {
        debug!("Initializing SchemaGenerator with {} definitions", index.len());
        Self {
            index,
            schemas: BTreeMap::new(),
            reserved: index.definitions().iter().map(|d| d.name.clone()).collect(),
            warnings: Vec::new(),
        }
    }

    /// Generate the component schema of every definition
    pub fn generate_components(&mut self) {
        let index = self.index;
        for def in index.definitions() {
            let schema = self.definition_schema(def);
            self.schemas.insert(def.name.clone(), schema);
        }
    }

    /// Schema for a type expression; `generics` are the type parameters in scope
    pub fn schema_for(&mut self, ty: &RustType, generics: &[String]) -> Schema {
        match ty {
            RustType::Unit => Schema::default(),
            RustType::Primitive(primitive) => primitive_schema(*primitive),
            RustType::Json => Schema::default(),
            RustType::Option(inner) => {
                let inner = self.schema_for(inner, generics);
                if inner.nullable == Some(true) || inner.is_free_form() {
                    inner
                } else {
                    inner.into_nullable()
                }
            }
            RustType::List(inner) => Schema {
                schema_type: Some("array".to_string()),
                items: Some(Box::new(self.schema_for(inner, generics))),
                ..Schema::default()
            },
            RustType::Map { value, .. } => Schema {
                schema_type: Some("object".to_string()),
                additional_properties: Some(AdditionalProperties::Schema(Box::new(
                    self.schema_for(value, generics),
                ))),
                ..Schema::default()
            },
            RustType::Tuple(items) => {
                let items: Vec<Schema> = items.iter().map(|i| self.schema_for(i, generics)).collect();
                Schema {
                    schema_type: Some("array".to_string()),
                    items: Some(Box::new(Schema {
                        one_of: Some(items),
                        ..Schema::default()
                    })),
                    ..Schema::default()
                }
            }
            RustType::Named { path, args } => {
                if args.is_empty() && generics.iter().any(|g| g == path) {
                    return Schema::default();
                }
                match self.index.find(path) {
                    Some(def) => Schema::reference(&def.name),
                    None => {
                        self.warn(format!(
                            "Type '{}' is not a known definition; rendered as a free-form schema",
                            path
                        ));
                        Schema::default()
                    }
                }
            }
            RustType::Opaque(_) => Schema::default(),
        }
    }

    /// Schema for type text; see [`SchemaGenerator::schema_for`]
    pub fn schema_for_text(&mut self, text: &str, generics: &[String]) -> Schema {
        self.schema_for(&RustType::parse(text), generics)
    }

    /// Take the generated schemas and the warnings collected along the way
    pub fn finish(self) -> (BTreeMap<String, Schema>, Vec<String>) {
        (self.schemas, self.warnings)
    }

    fn warn(&mut self, message: String) {
        if !self.warnings.contains(&message) {
            warn!("{}", message);
            self.warnings.push(message);
        }
    }

    fn definition_schema(&mut self, def: &TypeDefinition) -> Schema {
        debug!("Generating schema for {} ({})", def.name, def.rust_path);
        match &def.kind {
            DefinitionKind::Struct { .. } => {
                let fields = self.index.inlined_fields(def);
                self.fields_schema(&fields, &def.generics)
            }
            DefinitionKind::Enum { variants, .. } if def.is_unit_enum() => Schema {
                schema_type: Some("string".to_string()),
                enum_values: Some(variants.iter().map(|v| v.discriminant.clone()).collect()),
                ..Schema::default()
            },
            DefinitionKind::Enum { variants, tagging } => match tagging {
                Tagging::External => self.external_enum(def, variants),
                Tagging::Untagged => self.untagged_enum(def, variants),
                Tagging::Internal { tag } => self.internal_enum(def, variants, tag),
                Tagging::Adjacent { tag, content } => {
                    self.adjacent_enum(def, variants, tag, content)
                }
            },
            DefinitionKind::Newtype { rust_type } => self.schema_for_text(rust_type, &def.generics),
        }
    }

    fn fields_schema(&mut self, fields: &[FieldDef], generics: &[String]) -> Schema {
        let mut properties = BTreeMap::new();
        let mut required = Vec::new();
        for field in fields {
            let schema = self.schema_for(&field.parsed_type(), generics);
            properties.insert(field.serialized_name.clone(), schema);
            if !field.optional {
                required.push(field.serialized_name.clone());
            }
        }
        Schema::object(properties, required)
    }

    fn payload_schema(&mut self, payload: &VariantPayload, generics: &[String]) -> Option<Schema> {
        match payload {
            VariantPayload::Unit => None,
            VariantPayload::Type(ty) => Some(self.schema_for_text(ty, generics)),
            VariantPayload::Fields(fields) => Some(self.fields_schema(fields, generics)),
        }
    }

    fn external_enum(&mut self, def: &TypeDefinition, variants: &[VariantDef]) -> Schema {
        let one_of = variants
            .iter()
            .map(|variant| match self.payload_schema(&variant.payload, &def.generics) {
                None => Schema::constant(&variant.discriminant),
                Some(payload) => {
                    let mut properties = BTreeMap::new();
                    properties.insert(variant.discriminant.clone(), payload);
                    Schema::object(properties, vec![variant.discriminant.clone()])
                }
            })
            .collect();
        Schema {
            one_of: Some(one_of),
            ..Schema::default()
        }
    }

    fn untagged_enum(&mut self, def: &TypeDefinition, variants: &[VariantDef]) -> Schema {
        let one_of = variants
            .iter()
            .map(|variant| {
                self.payload_schema(&variant.payload, &def.generics)
                    .unwrap_or_else(|| Schema::constant(&variant.discriminant))
            })
            .collect();
        Schema {
            one_of: Some(one_of),
            ..Schema::default()
        }
    }

    fn internal_enum(&mut self, def: &TypeDefinition, variants: &[VariantDef], tag: &str) -> Schema {
        let index = self.index;
        let mut one_of = Vec::new();
        let mut mapping = BTreeMap::new();

        for variant in variants {
            let tag_schema = || {
                let mut properties = BTreeMap::new();
                properties.insert(tag.to_string(), Schema::constant(&variant.discriminant));
                Schema::object(properties, vec![tag.to_string()])
            };

            let schema = match &variant.payload {
                VariantPayload::Unit => tag_schema(),
                VariantPayload::Fields(fields) => {
                    if fields.iter().any(|f| f.serialized_name == tag) {
                        self.warn(format!(
                            "Variant '{}::{}' declares field '{}' which collides with the enum tag; the tag property was kept",
                            def.original_name, variant.ident, tag
                        ));
                    }
                    let remaining: Vec<FieldDef> = fields
                        .iter()
                        .filter(|f| f.serialized_name != tag)
                        .cloned()
                        .collect();
                    let mut schema = self.fields_schema(&remaining, &def.generics);
                    let tag_only = tag_schema();
                    if let (Some(properties), Some(tag_properties)) =
                        (schema.properties.as_mut(), tag_only.properties)
                    {
                        properties.extend(tag_properties);
                    }
                    let mut required = schema.required.take().unwrap_or_default();
                    required.insert(0, tag.to_string());
                    schema.required = Some(required);
                    schema
                }
                VariantPayload::Type(ty) => {
                    let parsed = RustType::parse(ty);
                    match index.find_type(&parsed) {
                        Some(payload_def) => {
                            let collides = match &payload_def.kind {
                                DefinitionKind::Struct { .. } => index
                                    .inlined_fields(payload_def)
                                    .iter()
                                    .any(|f| f.serialized_name == tag),
                                DefinitionKind::Enum { .. } | DefinitionKind::Newtype { .. } => false,
                            };
                            if collides {
                                self.warn(format!(
                                    "Variant '{}::{}' payload '{}' declares field '{}' which collides with the enum tag; kept the reference composition",
                                    def.original_name, variant.ident, payload_def.name, tag
                                ));
                            }
                            Schema {
                                all_of: Some(vec![
                                    self.schema_for(&parsed, &def.generics),
                                    tag_schema(),
                                ]),
                                ..Schema::default()
                            }
                        }
                        None => {
                            self.warn(format!(
                                "Fell back to nesting payload under 'payload' for variant '{}::{}' ({})",
                                def.original_name, variant.ident, ty
                            ));
                            let mut schema = tag_schema();
                            let payload = self.schema_for(&parsed, &def.generics);
                            if let Some(properties) = schema.properties.as_mut() {
                                properties.insert("payload".to_string(), payload);
                            }
                            schema.required = Some(vec![tag.to_string(), "payload".to_string()]);
                            schema
                        }
                    }
                }
            };

            let name = self.variant_component(def, variant);
            mapping.insert(variant.discriminant.clone(), format!("{}{}", COMPONENT_PREFIX, name));
            self.schemas.insert(name.clone(), schema);
            one_of.push(Schema::reference(&name));
        }

        tagged_union(one_of, tag, mapping)
    }

    fn adjacent_enum(
        &mut self,
        def: &TypeDefinition,
        variants: &[VariantDef],
        tag: &str,
        content: &str,
    ) -> Schema {
        let mut one_of = Vec::new();
        let mut mapping = BTreeMap::new();

        for variant in variants {
            let mut properties = BTreeMap::new();
            let mut required = vec![tag.to_string()];
            properties.insert(tag.to_string(), Schema::constant(&variant.discriminant));
            if let Some(payload) = self.payload_schema(&variant.payload, &def.generics) {
                properties.insert(content.to_string(), payload);
                required.push(content.to_string());
            }

            let name = self.variant_component(def, variant);
            mapping.insert(variant.discriminant.clone(), format!("{}{}", COMPONENT_PREFIX, name));
            self.schemas.insert(name.clone(), Schema::object(properties, required));
            one_of.push(Schema::reference(&name));
        }

        tagged_union(one_of, tag, mapping)
    }

    /// `{Enum}{Variant}`, numbered when the name is already taken
    fn variant_component(&mut self, def: &TypeDefinition, variant: &VariantDef) -> String {
        let base = format!("{}{}", def.name, to_pascal_case(&variant.ident));
        let mut candidate = base.clone();
        let mut counter = 2;
        while self.reserved.contains(&candidate) || self.schemas.contains_key(&candidate) {
            candidate = format!("{}{}", base, counter);
            counter += 1;
        }
        self.reserved.insert(candidate.clone());
        candidate
    }
}

fn tagged_union(one_of: Vec<Schema>, tag: &str, mapping: BTreeMap<String, String>) -> Schema {
    Schema {
        one_of: Some(one_of),
        discriminator: Some(Discriminator {
            property_name: tag.to_string(),
            mapping: Some(mapping),
        }),
        ..Schema::default()
    }
}

/// Convert a primitive type to an OpenAPI schema
fn primitive_schema(primitive: Primitive) -> Schema {
    let (schema_type, format) = match primitive {
        Primitive::String | Primitive::Char => ("string", None),
        Primitive::Bool => ("boolean", None),
        Primitive::I8 | Primitive::I16 | Primitive::I32 | Primitive::U8 | Primitive::U16 => {
            ("integer", Some("int32"))
        }
        Primitive::I64
        | Primitive::I128
        | Primitive::Isize
        | Primitive::U32
        | Primitive::U64
        | Primitive::U128
        | Primitive::Usize => ("integer", Some("int64")),
        Primitive::F32 => ("number", Some("float")),
        Primitive::F64 => ("number", Some("double")),
        Primitive::Uuid => ("string", Some("uuid")),
        Primitive::DateTime | Primitive::NaiveDateTime => ("string", Some("date-time")),
        Primitive::NaiveDate => ("string", Some("date")),
        Primitive::NaiveTime => ("string", Some("time")),
    };
    Schema::typed(schema_type, format)
}
