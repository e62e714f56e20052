use crate::closure::{ApiModel, TypeIndex};
use crate::type_resolver::{
    DefinitionKind, FieldDef, RustType, Tagging, TypeDefinition, VariantDef, VariantPayload,
};
use crate::typescript::bindings::{BindingPlan, QueryBinding};
use crate::typescript::mapping::{property_key, string_literal, TsMapper, JSON_VALUE};
use crate::typescript::GENERATED_HEADER;

/// Renders the types file: shared aliases, every retained definition sorted by
/// name, then the per-endpoint request and response declarations.
pub fn render_types(model: &ApiModel, plan: &BindingPlan) -> String {
    let mut out = String::new();
    out.push_str(GENERATED_HEADER);
    out.push_str(&format!(
        "export type {0} = null | boolean | number | string | {0}[] | {{ [key: string]: {0} }};\n",
        JSON_VALUE
    ));
    out.push_str(
        "export type QueryInput = Record<string, string | number | boolean | null | undefined>;\n",
    );

    let mapper = TsMapper::new(&model.types);
    let mut definitions: Vec<&TypeDefinition> = model.types.definitions().iter().collect();
    definitions.sort_by(|a, b| a.name.cmp(&b.name));

    for def in definitions {
        out.push('\n');
        render_definition(&mut out, def, &model.types, &mapper);
    }

    render_endpoint_shapes(&mut out, plan);
    out
}

fn type_params(def: &TypeDefinition) -> String {
    if def.generics.is_empty() {
        String::new()
    } else {
        format!("<{}>", def.generics.join(", "))
    }
}

fn render_definition(out: &mut String, def: &TypeDefinition, index: &TypeIndex, mapper: &TsMapper) {
    match &def.kind {
        DefinitionKind::Struct { .. } => {
            let fields = index.inlined_fields(def);
            out.push_str(&format!("export interface {}{} {{\n", def.name, type_params(def)));
            for field in &fields {
                out.push_str(&format!("  {};\n", member(field, mapper, &def.generics)));
            }
            out.push_str("}\n");
        }
        DefinitionKind::Enum { variants, tagging } => {
            if variants.is_empty() {
                out.push_str(&format!("export type {}{} = never;\n", def.name, type_params(def)));
                return;
            }
            let arms: Vec<String> = if def.is_unit_enum() {
                variants
                    .iter()
                    .map(|v| string_literal(&v.discriminant))
                    .collect()
            } else {
                variants
                    .iter()
                    .map(|v| variant_arm(v, tagging, index, mapper, &def.generics))
                    .collect()
            };
            out.push_str(&format!("export type {}{} =\n", def.name, type_params(def)));
            let last = arms.len() - 1;
            for (i, arm) in arms.iter().enumerate() {
                let end = if i == last { ";" } else { "" };
                out.push_str(&format!("  | {}{}\n", arm, end));
            }
        }
        DefinitionKind::Newtype { rust_type } => {
            out.push_str(&format!(
                "export type {}{} = {};\n",
                def.name,
                type_params(def),
                mapper.map_text(rust_type, &def.generics)
            ));
        }
    }
}

fn member(field: &FieldDef, mapper: &TsMapper, generics: &[String]) -> String {
    let marker = if field.optional { "?" } else { "" };
    format!(
        "{}{}: {}",
        property_key(&field.serialized_name),
        marker,
        mapper.map_text(&field.rust_type, generics)
    )
}

fn inline_object(fields: &[FieldDef], mapper: &TsMapper, generics: &[String]) -> String {
    let members: Vec<String> = fields.iter().map(|f| member(f, mapper, generics)).collect();
    if members.is_empty() {
        "{}".to_string()
    } else {
        format!("{{ {} }}", members.join("; "))
    }
}

/// TypeScript for one variant of an enum with payloads.
fn variant_arm(
    variant: &VariantDef,
    tagging: &Tagging,
    index: &TypeIndex,
    mapper: &TsMapper,
    generics: &[String],
) -> String {
    let name = string_literal(&variant.discriminant);
    let payload = match &variant.payload {
        VariantPayload::Unit => None,
        VariantPayload::Type(ty) => Some(mapper.map_text(ty, generics)),
        VariantPayload::Fields(fields) => Some(inline_object(fields, mapper, generics)),
    };

    match tagging {
        Tagging::External => match payload {
            None => name,
            Some(payload) => format!("{{ {}: {} }}", property_key(&variant.discriminant), payload),
        },
        Tagging::Internal { tag } => {
            let tag_member = format!("{}: {}", property_key(tag), name);
            match &variant.payload {
                VariantPayload::Unit => format!("{{ {} }}", tag_member),
                VariantPayload::Fields(fields) => {
                    // The tag wins over a field of the same serialized name.
                    let mut members = vec![tag_member];
                    members.extend(
                        fields
                            .iter()
                            .filter(|f| f.serialized_name != *tag)
                            .map(|f| member(f, mapper, generics)),
                    );
                    format!("{{ {} }}", members.join("; "))
                }
                VariantPayload::Type(ty) => {
                    let known = index.find_type(&RustType::parse(ty)).is_some();
                    let payload = payload.unwrap_or_default();
                    if known {
                        format!("({{ {} }} & {})", tag_member, payload)
                    } else {
                        format!("{{ {}; payload: {} }}", tag_member, payload)
                    }
                }
            }
        }
        Tagging::Adjacent { tag, content } => {
            let tag_member = format!("{}: {}", property_key(tag), name);
            match payload {
                None => format!("{{ {} }}", tag_member),
                Some(payload) => {
                    format!("{{ {}; {}: {} }}", tag_member, property_key(content), payload)
                }
            }
        }
        Tagging::Untagged => payload.unwrap_or(name),
    }
}

fn render_endpoint_shapes(out: &mut String, plan: &BindingPlan) {
    for module in &plan.modules {
        for method in &module.methods {
            let mut members: Vec<String> = method
                .path_params
                .iter()
                .map(|(_, ident)| format!("{}: string | number", ident))
                .collect();

            match &method.query {
                Some(QueryBinding::Fields(fields)) => {
                    let inner: Vec<String> = fields
                        .iter()
                        .map(|f| {
                            let marker = if f.optional { "?" } else { "" };
                            format!("{}{}: {}", property_key(&f.name), marker, f.ty.local)
                        })
                        .collect();
                    let marker = if fields.iter().all(|f| f.optional) { "?" } else { "" };
                    members.push(format!("query{}: {{ {} }}", marker, inner.join("; ")));
                }
                Some(QueryBinding::Opaque) => members.push("query?: QueryInput".to_string()),
                None => {}
            }

            if let Some(body) = &method.body {
                let marker = if body.optional { "?" } else { "" };
                members.push(format!("body{}: {}", marker, body.ty.local));
            }

            out.push('\n');
            out.push_str(&format!("/** {} {} */\n", method.method, method.path));
            if members.is_empty() {
                out.push_str(&format!("export type {} = Record<string, never>;\n", method.request_interface));
            } else {
                out.push_str(&format!("export interface {} {{\n", method.request_interface));
                for m in &members {
                    out.push_str(&format!("  {};\n", m));
                }
                out.push_str("}\n");
            }
            out.push_str(&format!(
                "export type {} = {};\n",
                method.response_alias, method.response.ty.local
            ));
        }
    }
}
