//! `#[serde(...)]` and `#[api(...)]` attribute interpretation.
//!
//! Both extractors hand attribute bodies over as text (the syntax extractor renders
//! the token stream, the textual one slices the source), so a single parser serves
//! both.

use crate::lexer::{matching_close, split_top_level};
use regex::Regex;
use std::sync::LazyLock;

static DOC_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@api\s+(\w+)\s*=\s*"?([\w-]+)"?"#).expect("doc hint regex is valid")
});

/// A `key`, `key = "value"` or `key(...)` entry of an attribute argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaItem {
    pub key: String,
    pub value: Option<String>,
    /// Entries of a `key(...)` list
    pub nested: Vec<MetaItem>,
}

/// Parses `rename = "x", default, rename_all(serialize = "camelCase")`.
pub fn parse_meta_list(text: &str) -> Vec<MetaItem> {
    split_top_level(text, ',', false)
        .iter()
        .filter_map(|entry| parse_meta_item(entry))
        .collect()
}

fn parse_meta_item(entry: &str) -> Option<MetaItem> {
    let key_end = entry
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(entry.len());
    let key = entry[..key_end].to_string();
    if key.is_empty() {
        return None;
    }

    let rest = entry[key_end..].trim_start();
    let mut item = MetaItem {
        key,
        value: None,
        nested: Vec::new(),
    };

    if let Some(value) = rest.strip_prefix('=') {
        item.value = Some(unquote(value.trim()));
    } else if rest.starts_with('(') {
        if let Some(close) = matching_close(rest, 0, false) {
            item.nested = parse_meta_list(&rest[1..close]);
        }
    }
    Some(item)
}

fn unquote(value: &str) -> String {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}

/// Returns the argument text of `name(...)` when `attribute` is that attribute.
///
/// `attribute` is an attribute body without `#[` and `]`, e.g. `serde(rename = "a")`.
pub fn attribute_args<'a>(attribute: &'a str, name: &str) -> Option<&'a str> {
    let rest = attribute.trim().strip_prefix(name)?.trim_start();
    if !rest.starts_with('(') {
        return None;
    }
    let close = matching_close(rest, 0, false)?;
    Some(&rest[1..close])
}

/// True for `cfg(test)` and `cfg(any(test, ...))`-style attributes.
pub fn is_cfg_test(attribute: &str) -> bool {
    match attribute_args(attribute, "cfg") {
        Some(args) => args.split(|c: char| !c.is_alphanumeric() && c != '_').any(|w| w == "test"),
        None => false,
    }
}

/// Value of a `key = "v"` entry, or of the `serialize = "v"` entry of `key(...)`.
fn serialize_value(item: &MetaItem) -> Option<String> {
    if let Some(value) = &item.value {
        return Some(value.clone());
    }
    item.nested
        .iter()
        .find(|n| n.key == "serialize")
        .and_then(|n| n.value.clone())
}

/// Serde attributes of a struct or enum.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerAttrs {
    pub rename_all: Option<String>,
    pub tag: Option<String>,
    pub content: Option<String>,
    pub untagged: bool,
}

impl ContainerAttrs {
    /// Folds one attribute body into the collected attributes.
    pub fn absorb(&mut self, attribute: &str) {
        let Some(args) = attribute_args(attribute, "serde") else {
            return;
        };
        for item in parse_meta_list(args) {
            match item.key.as_str() {
                "rename_all" => self.rename_all = serialize_value(&item),
                "tag" => self.tag = item.value,
                "content" => self.content = item.value,
                "untagged" => self.untagged = true,
                _ => {}
            }
        }
    }

    pub fn from_attributes<S: AsRef<str>>(attributes: &[S]) -> Self {
        let mut attrs = Self::default();
        for attribute in attributes {
            attrs.absorb(attribute.as_ref());
        }
        attrs
    }
}

/// Serde attributes of a field or enum variant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldAttrs {
    pub rename: Option<String>,
    pub flatten: bool,
    pub skip: bool,
    pub default: bool,
    pub skip_serializing_if: Option<String>,
}

impl FieldAttrs {
    pub fn absorb(&mut self, attribute: &str) {
        let Some(args) = attribute_args(attribute, "serde") else {
            return;
        };
        for item in parse_meta_list(args) {
            match item.key.as_str() {
                "rename" => self.rename = serialize_value(&item),
                "flatten" => self.flatten = true,
                "skip" | "skip_serializing" => self.skip = true,
                "default" => self.default = true,
                "skip_serializing_if" => self.skip_serializing_if = item.value,
                _ => {}
            }
        }
    }

    pub fn from_attributes<S: AsRef<str>>(attributes: &[S]) -> Self {
        let mut attrs = Self::default();
        for attribute in attributes {
            attrs.absorb(attribute.as_ref());
        }
        attrs
    }
}

/// Per-handler overrides from `#[api(...)]` or `/// @api key=value` doc lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiHints {
    pub response: Option<super::ResponseKind>,
    pub body: Option<super::BodyKind>,
}

impl ApiHints {
    /// Reads an `api(...)` attribute body.
    pub fn absorb_attribute(&mut self, attribute: &str) {
        let Some(args) = attribute_args(attribute, "api") else {
            return;
        };
        for item in parse_meta_list(args) {
            if let Some(value) = item.value {
                self.set(&item.key, &value);
            }
        }
    }

    /// Reads `@api` hints from a doc comment line.
    pub fn absorb_doc(&mut self, line: &str) {
        for caps in DOC_HINT.captures_iter(line) {
            self.set(&caps[1], &caps[2]);
        }
    }

    fn set(&mut self, key: &str, value: &str) {
        match key {
            "response" => {
                if let Some(kind) = super::ResponseKind::parse(value) {
                    self.response = Some(kind);
                }
            }
            "body" | "request" => {
                if let Some(kind) = super::BodyKind::parse(value) {
                    self.body = Some(kind);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{BodyKind, ResponseKind};

    #[test]
    fn test_parse_meta_list() {
        let items = parse_meta_list(r#"rename = "a,b", default, rename_all(serialize = "camelCase")"#);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].value.as_deref(), Some("a,b"));
        assert_eq!(items[1].key, "default");
        assert_eq!(items[2].nested[0].key, "serialize");
    }

    #[test]
    fn test_container_attrs() {
        let attrs = ContainerAttrs::from_attributes(&[
            "derive(Serialize)",
            r#"serde(tag = "kind", content = "payload")"#,
            r#"serde(rename_all = "snake_case")"#,
        ]);
        assert_eq!(attrs.tag.as_deref(), Some("kind"));
        assert_eq!(attrs.content.as_deref(), Some("payload"));
        assert_eq!(attrs.rename_all.as_deref(), Some("snake_case"));
        assert!(!attrs.untagged);
    }

    #[test]
    fn test_field_attrs() {
        let attrs = FieldAttrs::from_attributes(&[
            r#"serde(rename = "type", skip_serializing_if = "Option::is_none")"#,
            "serde(flatten)",
        ]);
        assert_eq!(attrs.rename.as_deref(), Some("type"));
        assert_eq!(attrs.skip_serializing_if.as_deref(), Some("Option::is_none"));
        assert!(attrs.flatten);
        assert!(!attrs.skip);
    }

    #[test]
    fn test_token_stream_rendering_is_accepted() {
        // syn renders attribute tokens with spaces around punctuation
        let attrs = FieldAttrs::from_attributes(&["serde (rename = \"x\" , default)"]);
        assert_eq!(attrs.rename.as_deref(), Some("x"));
        assert!(attrs.default);
    }

    #[test]
    fn test_api_hints() {
        let mut hints = ApiHints::default();
        hints.absorb_attribute(r#"api(response = "binary")"#);
        hints.absorb_doc(" Upload an avatar. @api body=formdata");
        assert_eq!(hints.response, Some(ResponseKind::Binary));
        assert_eq!(hints.body, Some(BodyKind::FormData));
    }

    #[test]
    fn test_is_cfg_test() {
        assert!(is_cfg_test("cfg(test)"));
        assert!(is_cfg_test("cfg(any(test, feature = \"x\"))"));
        assert!(!is_cfg_test("cfg(feature = \"testing\")"));
        assert!(!is_cfg_test("derive(Debug)"));
    }
}
