use crate::extractor::attrs::{is_cfg_test, ApiHints, ContainerAttrs, FieldAttrs};
use crate::extractor::{
    normalize_path, DeclarationBody, DeclarationSource, FunctionSignature, HttpMethod, Imports,
    RawField, RawPayload, RawVariant, RouteRegistration, TypeDeclaration,
};
use crate::parser::ParsedFile;
use log::debug;
use quote::ToTokens;
use syn::visit::Visit;
use syn::{Expr, ExprMethodCall, Lit};

/// Extracts declarations from the `syn` syntax tree.
#[derive(Debug, Default)]
pub struct SyntaxExtractor;

impl DeclarationSource for SyntaxExtractor {
    fn route_registrations(&self, file: &ParsedFile) -> Vec<RouteRegistration> {
        let Some(tree) = &file.syntax_tree else {
            return Vec::new();
        };
        let mut visitor = RouteVisitor::default();
        visitor.visit_file(tree);
        debug!(
            "{}: {} route registrations in syntax tree",
            file.path.display(),
            visitor.routes.len()
        );
        visitor.routes
    }

    fn function_signature(&self, file: &ParsedFile, name: &str) -> Option<FunctionSignature> {
        let tree = file.syntax_tree.as_ref()?;
        find_fn(&tree.items, name)
    }

    fn type_declarations(&self, file: &ParsedFile) -> Vec<TypeDeclaration> {
        let Some(tree) = &file.syntax_tree else {
            return Vec::new();
        };
        let mut out = Vec::new();
        collect_types(&tree.items, &file.module_path, &mut out);
        out
    }

    fn imports(&self, file: &ParsedFile) -> Imports {
        let mut imports = Imports::new();
        if let Some(tree) = &file.syntax_tree {
            for item in &tree.items {
                if let syn::Item::Use(item_use) = item {
                    collect_use_tree(&item_use.tree, "", &mut imports);
                }
            }
        }
        imports
    }
}

/// Visitor collecting `.route(...)` registrations, with `.nest(...)` prefixes applied
/// to routers built inline.
#[derive(Default)]
struct RouteVisitor {
    routes: Vec<RouteRegistration>,
    prefix: String,
}

impl<'ast> Visit<'ast> for RouteVisitor {
    fn visit_expr_method_call(&mut self, node: &'ast ExprMethodCall) {
        let method = node.method.to_string();

        if method == "nest" && node.args.len() == 2 {
            if let Some(path) = string_literal(&node.args[0]) {
                self.visit_expr(&node.receiver);
                let nested = normalize_path(&self.prefix, &path);
                let saved = std::mem::replace(&mut self.prefix, nested);
                self.visit_expr(&node.args[1]);
                self.prefix = saved;
                return;
            }
        }

        if method == "route" && node.args.len() == 2 {
            if let Some(path) = string_literal(&node.args[0]) {
                // Registrations earlier in the chain come first.
                self.visit_expr(&node.receiver);

                let path = normalize_path(&self.prefix, &path);
                let mut handlers = Vec::new();
                collect_method_chain(&node.args[1], &mut handlers);
                for (method, handler) in handlers {
                    self.routes.push(RouteRegistration {
                        path: path.clone(),
                        method,
                        handler,
                    });
                }
                return;
            }
        }

        syn::visit::visit_expr_method_call(self, node);
    }
}

/// Collects `(method, handler)` pairs from `get(a).post(b).layer(...)`.
fn collect_method_chain(expr: &Expr, out: &mut Vec<(HttpMethod, String)>) {
    match expr {
        Expr::MethodCall(call) => {
            collect_method_chain(&call.receiver, out);
            if let Some(method) = HttpMethod::parse(&call.method.to_string()) {
                if let Some(handler) = call.args.first().and_then(handler_path) {
                    out.push((method, handler));
                }
            }
        }
        Expr::Call(call) => {
            if let Expr::Path(func) = &*call.func {
                let name = func
                    .path
                    .segments
                    .last()
                    .map(|s| s.ident.to_string())
                    .unwrap_or_default();
                if let Some(method) = HttpMethod::parse(&name) {
                    if let Some(handler) = call.args.first().and_then(handler_path) {
                        out.push((method, handler));
                    }
                }
            }
        }
        Expr::Paren(paren) => collect_method_chain(&paren.expr, out),
        Expr::Group(group) => collect_method_chain(&group.expr, out),
        _ => {}
    }
}

fn handler_path(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Path(path) => Some(
            path.path
                .segments
                .iter()
                .map(|s| s.ident.to_string())
                .collect::<Vec<_>>()
                .join("::"),
        ),
        _ => None,
    }
}

fn string_literal(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Lit(lit) => match &lit.lit {
            Lit::Str(s) => Some(s.value()),
            _ => None,
        },
        _ => None,
    }
}

fn find_fn(items: &[syn::Item], name: &str) -> Option<FunctionSignature> {
    for item in items {
        match item {
            syn::Item::Fn(item_fn) if item_fn.sig.ident == name => {
                return Some(signature_of(&item_fn.sig, &item_fn.attrs));
            }
            syn::Item::Mod(item_mod) => {
                if let Some((_, nested)) = &item_mod.content {
                    if let Some(found) = find_fn(nested, name) {
                        return Some(found);
                    }
                }
            }
            _ => {}
        }
    }
    None
}

fn signature_of(sig: &syn::Signature, attrs: &[syn::Attribute]) -> FunctionSignature {
    let params = sig
        .inputs
        .iter()
        .filter_map(|input| match input {
            syn::FnArg::Typed(pat_type) => Some(type_to_string(&pat_type.ty)),
            syn::FnArg::Receiver(_) => None,
        })
        .collect();

    let return_type = match &sig.output {
        syn::ReturnType::Default => None,
        syn::ReturnType::Type(_, ty) => Some(type_to_string(ty)),
    };

    let mut hints = ApiHints::default();
    for attr in attrs {
        if attr.path().is_ident("doc") {
            if let syn::Meta::NameValue(nv) = &attr.meta {
                if let Expr::Lit(lit) = &nv.value {
                    if let Lit::Str(s) = &lit.lit {
                        hints.absorb_doc(&s.value());
                    }
                }
            }
        } else if attr.path().is_ident("api") {
            hints.absorb_attribute(&attribute_text(attr));
        }
    }

    FunctionSignature {
        name: sig.ident.to_string(),
        params,
        return_type,
        hints,
    }
}

/// Renders an attribute body (`serde(rename = "x")`) from its tokens.
fn attribute_text(attr: &syn::Attribute) -> String {
    attr.meta.to_token_stream().to_string()
}

fn attribute_texts(attrs: &[syn::Attribute]) -> Vec<String> {
    attrs.iter().map(attribute_text).collect()
}

fn is_public(vis: &syn::Visibility) -> bool {
    matches!(vis, syn::Visibility::Public(_))
}

fn collect_types(items: &[syn::Item], module_path: &str, out: &mut Vec<TypeDeclaration>) {
    for item in items {
        match item {
            syn::Item::Struct(item) if is_public(&item.vis) => {
                let body = match &item.fields {
                    syn::Fields::Named(named) => DeclarationBody::Struct(raw_fields(&named.named)),
                    syn::Fields::Unnamed(unnamed) => {
                        DeclarationBody::Newtype(tuple_text(unnamed.unnamed.iter().map(|f| &f.ty)))
                    }
                    syn::Fields::Unit => {
                        debug!("Skipping unit struct {}", item.ident);
                        continue;
                    }
                };
                out.push(TypeDeclaration {
                    name: item.ident.to_string(),
                    module_path: module_path.to_string(),
                    generics: generic_names(&item.generics),
                    attrs: ContainerAttrs::from_attributes(&attribute_texts(&item.attrs)),
                    body,
                });
            }
            syn::Item::Enum(item) if is_public(&item.vis) => {
                let variants = item
                    .variants
                    .iter()
                    .map(|variant| RawVariant {
                        ident: variant.ident.to_string(),
                        attrs: FieldAttrs::from_attributes(&attribute_texts(&variant.attrs)),
                        payload: match &variant.fields {
                            syn::Fields::Unit => RawPayload::Unit,
                            syn::Fields::Named(named) => RawPayload::Fields(raw_fields(&named.named)),
                            syn::Fields::Unnamed(unnamed) => {
                                RawPayload::Type(tuple_text(unnamed.unnamed.iter().map(|f| &f.ty)))
                            }
                        },
                    })
                    .collect();
                out.push(TypeDeclaration {
                    name: item.ident.to_string(),
                    module_path: module_path.to_string(),
                    generics: generic_names(&item.generics),
                    attrs: ContainerAttrs::from_attributes(&attribute_texts(&item.attrs)),
                    body: DeclarationBody::Enum(variants),
                });
            }
            syn::Item::Mod(item_mod) => {
                let cfg_test = item_mod
                    .attrs
                    .iter()
                    .any(|attr| is_cfg_test(&attribute_text(attr)));
                if let (Some((_, nested)), false) = (&item_mod.content, cfg_test) {
                    let nested_path = format!("{}::{}", module_path, item_mod.ident);
                    collect_types(nested, &nested_path, out);
                }
            }
            _ => {}
        }
    }
}

/// One element as its own type text, several as a tuple.
fn tuple_text<'t>(types: impl Iterator<Item = &'t syn::Type>) -> String {
    let types: Vec<String> = types.map(type_to_string).collect();
    if types.len() == 1 {
        types[0].clone()
    } else {
        format!("({})", types.join(", "))
    }
}

fn raw_fields(fields: &syn::punctuated::Punctuated<syn::Field, syn::token::Comma>) -> Vec<RawField> {
    fields
        .iter()
        .filter_map(|field| {
            let ident = field.ident.as_ref()?.to_string();
            Some(RawField {
                ident: ident.trim_start_matches("r#").to_string(),
                ty: type_to_string(&field.ty),
                attrs: FieldAttrs::from_attributes(&attribute_texts(&field.attrs)),
            })
        })
        .collect()
}

fn generic_names(generics: &syn::Generics) -> Vec<String> {
    generics
        .type_params()
        .map(|param| param.ident.to_string())
        .collect()
}

/// Records every name a `use` tree brings into scope.
pub fn collect_use_tree(tree: &syn::UseTree, prefix: &str, imports: &mut Imports) {
    let join = |segment: &str| {
        if prefix.is_empty() {
            segment.to_string()
        } else {
            format!("{}::{}", prefix, segment)
        }
    };

    match tree {
        syn::UseTree::Path(path) => {
            collect_use_tree(&path.tree, &join(&path.ident.to_string()), imports);
        }
        syn::UseTree::Name(name) => {
            let ident = name.ident.to_string();
            if ident == "self" {
                if let Some(last) = prefix.rsplit("::").next() {
                    imports.insert(last.to_string(), prefix.to_string());
                }
            } else {
                imports.insert(ident.clone(), join(&ident));
            }
        }
        syn::UseTree::Rename(rename) => {
            let ident = rename.ident.to_string();
            let target = if ident == "self" {
                prefix.to_string()
            } else {
                join(&ident)
            };
            imports.insert(rename.rename.to_string(), target);
        }
        syn::UseTree::Group(group) => {
            for item in &group.items {
                collect_use_tree(item, prefix, imports);
            }
        }
        syn::UseTree::Glob(_) => {}
    }
}

/// Canonical text of a type: references and lifetimes dropped, `::` without spaces.
pub fn type_to_string(ty: &syn::Type) -> String {
    match ty {
        syn::Type::Path(type_path) => path_to_string(&type_path.path),
        syn::Type::Reference(reference) => type_to_string(&reference.elem),
        syn::Type::Paren(paren) => type_to_string(&paren.elem),
        syn::Type::Group(group) => type_to_string(&group.elem),
        syn::Type::Slice(slice) => format!("[{}]", type_to_string(&slice.elem)),
        syn::Type::Array(array) => format!("[{}]", type_to_string(&array.elem)),
        syn::Type::Tuple(tuple) => {
            let items: Vec<String> = tuple.elems.iter().map(type_to_string).collect();
            format!("({})", items.join(", "))
        }
        other => other.to_token_stream().to_string(),
    }
}

fn path_to_string(path: &syn::Path) -> String {
    path.segments
        .iter()
        .map(|segment| {
            let ident = segment.ident.to_string();
            match &segment.arguments {
                syn::PathArguments::AngleBracketed(args) => {
                    let types: Vec<String> = args
                        .args
                        .iter()
                        .filter_map(|arg| match arg {
                            syn::GenericArgument::Type(ty) => Some(type_to_string(ty)),
                            _ => None,
                        })
                        .collect();
                    if types.is_empty() {
                        ident
                    } else {
                        format!("{}<{}>", ident, types.join(", "))
                    }
                }
                syn::PathArguments::Parenthesized(args) => {
                    format!("{}{}", ident, args.to_token_stream())
                }
                syn::PathArguments::None => ident,
            }
        })
        .collect::<Vec<_>>()
        .join("::")
}
