use crate::extractor::attrs::{is_cfg_test, ApiHints, ContainerAttrs, FieldAttrs};
use crate::extractor::syntax::collect_use_tree;
use crate::extractor::{
    normalize_path, DeclarationBody, DeclarationSource, FunctionSignature, HttpMethod, Imports,
    RawField, RawPayload, RawVariant, RouteRegistration, TypeDeclaration,
};
use crate::lexer::{find_top_level, matching_close, peel_attributes, skip_trivia, split_top_level};
use crate::parser::ParsedFile;
use log::debug;
use regex::Regex;
use std::sync::LazyLock;

static ROUTE_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.\s*route\s*\(").expect("route regex is valid"));

static HANDLER_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:::)?[A-Za-z_][A-Za-z0-9_]*(?:\s*::\s*[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("handler regex is valid")
});

static USE_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?use\s+[^;]+;").expect("use regex is valid")
});

static ITEM_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(pub(?:\s*\([^)]*\))?\s+)?(struct|enum|mod)\s+(?:r#)?([A-Za-z_][A-Za-z0-9_]*)")
        .expect("item header regex is valid")
});

static FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(?:pub(?:\s*\([^)]*\))?\s+)?(?:r#)?([A-Za-z_][A-Za-z0-9_]*)\s*:\s*(.+)$")
        .expect("field regex is valid")
});

static VARIANT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^([A-Za-z_][A-Za-z0-9_]*)\s*(.*)$").expect("variant regex is valid")
});

/// Recovers declarations from raw source text.
///
/// Used when `syn` rejected a file, and for constructs the syntax tree does not
/// expose such as route tables built inside macro invocations. Every rule works on
/// balanced byte ranges so nested generics, closures and string literals cannot
/// derail it.
#[derive(Debug, Default)]
pub struct TextualExtractor;

impl DeclarationSource for TextualExtractor {
    fn route_registrations(&self, file: &ParsedFile) -> Vec<RouteRegistration> {
        let source = &file.source;
        let mut routes = Vec::new();

        for found in ROUTE_CALL.find_iter(source) {
            let line_start = source[..found.start()].rfind('\n').map_or(0, |i| i + 1);
            if source[line_start..found.start()].contains("//") {
                continue;
            }
            let open = found.end() - 1;
            let Some(close) = matching_close(source, open, false) else {
                continue;
            };
            let args = split_top_level(&source[open + 1..close], ',', false);
            if args.len() < 2 {
                continue;
            }
            let Some(path) = string_literal(&args[0]) else {
                continue;
            };

            let path = normalize_path("", &path);
            for (method, handler) in method_chain(&args[1]) {
                routes.push(RouteRegistration {
                    path: path.clone(),
                    method,
                    handler,
                });
            }
        }

        debug!(
            "{}: {} route registrations recovered from text",
            file.path.display(),
            routes.len()
        );
        routes
    }

    fn function_signature(&self, file: &ParsedFile, name: &str) -> Option<FunctionSignature> {
        let source = &file.source;
        let pattern = Regex::new(&format!(r"\bfn\s+{}\b", regex::escape(name))).ok()?;

        for found in pattern.find_iter(source) {
            let mut pos = skip_trivia(source, found.end());
            if source[pos..].starts_with('<') {
                pos = skip_trivia(source, matching_close(source, pos, true)? + 1);
            }
            if !source[pos..].starts_with('(') {
                continue;
            }
            let close = matching_close(source, pos, false)?;

            let params = split_top_level(&source[pos + 1..close], ',', true)
                .iter()
                .filter_map(|param| parameter_type(param))
                .collect();

            let after = skip_trivia(source, close + 1);
            let return_type = source[after..].strip_prefix("->").map(|rest| {
                let end = [
                    find_top_level(rest, "{", true),
                    find_top_level(rest, " where", true),
                    find_top_level(rest, ";", true),
                ]
                .into_iter()
                .flatten()
                .min()
                .unwrap_or(rest.len());
                rest[..end].trim().to_string()
            });

            return Some(FunctionSignature {
                name: name.to_string(),
                params,
                return_type,
                hints: preceding_hints(source, found.start()),
            });
        }
        None
    }

    fn type_declarations(&self, file: &ParsedFile) -> Vec<TypeDeclaration> {
        let mut out = Vec::new();
        scan_items(&file.source, &file.module_path, &mut out);
        out
    }

    fn imports(&self, file: &ParsedFile) -> Imports {
        let mut imports = Imports::new();
        for found in USE_ITEM.find_iter(&file.source) {
            match syn::parse_str::<syn::ItemUse>(found.as_str().trim()) {
                Ok(item) => collect_use_tree(&item.tree, "", &mut imports),
                Err(e) => debug!("Unreadable use statement {:?}: {}", found.as_str(), e),
            }
        }
        imports
    }
}

fn string_literal(text: &str) -> Option<String> {
    text.trim()
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .map(str::to_string)
}

/// Splits `get(a).post(b).layer(x)` into method/handler pairs.
fn method_chain(chain: &str) -> Vec<(HttpMethod, String)> {
    let mut pairs = Vec::new();

    for segment in split_top_level(chain, '.', false) {
        let Some(open) = segment.find('(') else {
            continue;
        };
        let name = segment[..open].rsplit("::").next().unwrap_or("").trim();
        let Some(method) = HttpMethod::parse(name) else {
            continue;
        };
        let Some(close) = matching_close(&segment, open, false) else {
            continue;
        };
        let Some(handler) = split_top_level(&segment[open + 1..close], ',', false)
            .into_iter()
            .next()
        else {
            continue;
        };
        if HANDLER_PATH.is_match(&handler) {
            let handler: String = handler.chars().filter(|c| !c.is_whitespace()).collect();
            pairs.push((method, handler.trim_start_matches("::").to_string()));
        }
    }
    pairs
}

/// `Json(body): Json<CreateUser>` -> `Json<CreateUser>`; `self` receivers are dropped.
fn parameter_type(param: &str) -> Option<String> {
    let text = peel_attributes(param).rest;
    let mut offset = 0;
    loop {
        let colon = offset + find_top_level(&text[offset..], ":", true)?;
        // `a::b` in a pattern is a path, not the type ascription
        if text[colon..].starts_with("::") {
            offset = colon + 2;
            continue;
        }
        return Some(text[colon + 1..].trim().to_string());
    }
}

/// Hints from the attributes and doc comments directly above a function.
fn preceding_hints(source: &str, fn_start: usize) -> ApiHints {
    let mut hints = ApiHints::default();
    let line_start = source[..fn_start].rfind('\n').map(|i| i + 1).unwrap_or(0);

    for line in source[..line_start].lines().rev() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.ends_with('}') || trimmed.ends_with(';') {
            break;
        }
        if let Some(doc) = trimmed.strip_prefix("///") {
            hints.absorb_doc(doc);
        } else if let Some(attr) = trimmed.strip_prefix("#[").and_then(|a| a.strip_suffix(']')) {
            hints.absorb_attribute(attr);
        }
    }
    hints
}

/// Walks top-level items, recursing into inline modules.
fn scan_items(text: &str, module_path: &str, out: &mut Vec<TypeDeclaration>) {
    let mut pos = 0;

    while pos < text.len() {
        let start = skip_trivia(text, pos);
        if start >= text.len() {
            break;
        }

        // The item extends to its first top-level `;` or past its first top-level block.
        let rest = &text[start..];
        let semi = find_top_level(rest, ";", false);
        let brace = find_top_level(rest, "{", false);
        // Unbalanced text is skipped a line at a time so later items survive it.
        let (item_end, body) = match (brace, semi) {
            (Some(b), s) if s.map_or(true, |s| b < s) => match matching_close(rest, b, false) {
                Some(close) => (start + close + 1, Some((start + b + 1, start + close))),
                None => {
                    pos = next_line(text, start + b);
                    continue;
                }
            },
            (_, Some(s)) => (start + s + 1, None),
            _ => {
                pos = next_line(text, start);
                continue;
            }
        };

        let item_text = &text[start..item_end];
        let peeled = peel_attributes(item_text);
        if let (Some(caps), Some((body_start, body_end))) = (ITEM_HEADER.captures(peeled.rest), body) {
            let is_pub = caps.get(1).is_some_and(|v| v.as_str().trim() == "pub");
            let kind = &caps[2];
            let name = caps[3].to_string();
            let body_text = &text[body_start..body_end];
            let header_end = peeled.rest.find('{').unwrap_or(peeled.rest.len());
            let header = &peeled.rest[caps.get(0).map_or(0, |m| m.end())..header_end];

            match kind {
                "mod" if !peeled.attributes.iter().any(|a| is_cfg_test(a)) => {
                    scan_items(body_text, &format!("{}::{}", module_path, name), out);
                }
                "struct" if is_pub => out.push(TypeDeclaration {
                    name,
                    module_path: module_path.to_string(),
                    generics: generic_names(header),
                    attrs: ContainerAttrs::from_attributes(&peeled.attributes),
                    body: DeclarationBody::Struct(parse_fields(body_text)),
                }),
                "enum" if is_pub => out.push(TypeDeclaration {
                    name,
                    module_path: module_path.to_string(),
                    generics: generic_names(header),
                    attrs: ContainerAttrs::from_attributes(&peeled.attributes),
                    body: DeclarationBody::Enum(parse_variants(body_text)),
                }),
                _ => {}
            }
        } else if let Some(caps) = ITEM_HEADER.captures(peeled.rest) {
            let is_pub = caps.get(1).is_some_and(|v| v.as_str().trim() == "pub");
            if is_pub && &caps[2] == "struct" {
                let header = &peeled.rest[caps.get(0).map_or(0, |m| m.end())..];
                if let Some(element) = tuple_struct_element(header) {
                    out.push(TypeDeclaration {
                        name: caps[3].to_string(),
                        module_path: module_path.to_string(),
                        generics: generic_names(header),
                        attrs: ContainerAttrs::from_attributes(&peeled.attributes),
                        body: DeclarationBody::Newtype(element),
                    });
                }
            }
        }

        pos = item_end;
    }
}

/// Element type of `<T>(pub Vec<T>);`, folded into a tuple when there are several.
fn tuple_struct_element(header: &str) -> Option<String> {
    let open = find_top_level(header, "(", true)?;
    let close = matching_close(header, open, true)?;
    let types: Vec<String> = split_top_level(&header[open + 1..close], ',', true)
        .iter()
        .map(|element| strip_visibility(peel_attributes(element).rest).to_string())
        .filter(|ty| !ty.is_empty())
        .collect();
    match types.len() {
        0 => None,
        1 => types.into_iter().next(),
        _ => Some(format!("({})", types.join(", "))),
    }
}

fn strip_visibility(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("pub") else {
        return text;
    };
    if rest.starts_with('(') {
        return matching_close(rest, 0, false).map_or(text, |close| rest[close + 1..].trim());
    }
    if rest.starts_with(char::is_whitespace) {
        return rest.trim();
    }
    text
}

fn next_line(text: &str, from: usize) -> usize {
    text[from..]
        .find('\n')
        .map_or(text.len(), |n| from + n + 1)
}

/// Type parameter names from the text following an item name, e.g. `<T: Clone, 'a>`.
fn generic_names(header: &str) -> Vec<String> {
    let header = header.trim_start();
    if !header.starts_with('<') {
        return Vec::new();
    }
    let Some(close) = matching_close(header, 0, true) else {
        return Vec::new();
    };
    split_top_level(&header[1..close], ',', true)
        .into_iter()
        .filter(|param| !param.starts_with('\'') && !param.starts_with("const "))
        .map(|param| {
            let end = param
                .find(|c: char| c == ':' || c == '=' || c.is_whitespace())
                .unwrap_or(param.len());
            param[..end].to_string()
        })
        .collect()
}

fn parse_fields(body: &str) -> Vec<RawField> {
    split_top_level(body, ',', true)
        .iter()
        .filter_map(|chunk| {
            let peeled = peel_attributes(chunk);
            let caps = FIELD.captures(peeled.rest)?;
            Some(RawField {
                ident: caps[1].to_string(),
                ty: caps[2].trim().to_string(),
                attrs: FieldAttrs::from_attributes(&peeled.attributes),
            })
        })
        .collect()
}

fn parse_variants(body: &str) -> Vec<RawVariant> {
    split_top_level(body, ',', true)
        .iter()
        .filter_map(|chunk| {
            let peeled = peel_attributes(chunk);
            let caps = VARIANT.captures(peeled.rest)?;
            let rest = caps[2].trim();

            let payload = if rest.starts_with('(') {
                let close = matching_close(rest, 0, true)?;
                let types = split_top_level(&rest[1..close], ',', true);
                match types.len() {
                    0 => RawPayload::Unit,
                    1 => RawPayload::Type(types[0].clone()),
                    _ => RawPayload::Type(format!("({})", types.join(", "))),
                }
            } else if rest.starts_with('{') {
                let close = matching_close(rest, 0, true)?;
                RawPayload::Fields(parse_fields(&rest[1..close]))
            } else {
                RawPayload::Unit
            };

            Some(RawVariant {
                ident: caps[1].to_string(),
                attrs: FieldAttrs::from_attributes(&peeled.attributes),
                payload,
            })
        })
        .collect()
}
