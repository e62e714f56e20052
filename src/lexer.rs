//! Bracket-balancing helpers for source and type text.
//!
//! The textual extractors and the type parser both need to split text on a
//! separator or find a closing delimiter while ignoring anything nested inside
//! parentheses, brackets, braces, string and character literals and comments.
//! Angle brackets are only tracked on request: they nest in type text but are
//! comparison operators in expression code.

/// Visits every character outside literals and comments.
///
/// The callback receives the byte offset, the character and the nesting depth:
/// an opening delimiter is reported at the depth *before* it opens, a closing one
/// at the depth *after* it closes, so both ends of a top-level group report 0.
/// Returning `false` stops the walk.
fn walk(text: &str, angles: bool, mut visit: impl FnMut(usize, char, usize) -> bool) {
    let bytes = text.as_bytes();
    let mut depth: usize = 0;
    let mut prev = '\0';
    let mut i = 0;

    while i < text.len() {
        let Some(c) = text[i..].chars().next() else {
            break;
        };
        let next = bytes.get(i + 1).copied().unwrap_or(b'\0');

        match c {
            '/' if next == b'/' => {
                i = text[i..].find('\n').map(|n| i + n + 1).unwrap_or(text.len());
                continue;
            }
            '/' if next == b'*' => {
                i = text[i + 2..]
                    .find("*/")
                    .map(|n| i + 2 + n + 2)
                    .unwrap_or(text.len());
                continue;
            }
            '"' => {
                i = skip_string(text, i + 1);
                prev = '"';
                continue;
            }
            'r' if !is_ident_char(prev) && (next == b'"' || next == b'#') => {
                if let Some(end) = skip_raw_string(text, i + 1) {
                    i = end;
                    prev = '"';
                    continue;
                }
            }
            '\'' => {
                if let Some(end) = char_literal_end(text, i) {
                    i = end;
                    prev = '\'';
                    continue;
                }
            }
            '(' | '[' | '{' => {
                if !visit(i, c, depth) {
                    return;
                }
                depth += 1;
                prev = c;
                i += c.len_utf8();
                continue;
            }
            '<' if angles => {
                if !visit(i, c, depth) {
                    return;
                }
                depth += 1;
                prev = c;
                i += 1;
                continue;
            }
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                if !visit(i, c, depth) {
                    return;
                }
                prev = c;
                i += 1;
                continue;
            }
            '>' if angles && prev != '-' && prev != '=' => {
                depth = depth.saturating_sub(1);
                if !visit(i, c, depth) {
                    return;
                }
                prev = c;
                i += 1;
                continue;
            }
            _ => {}
        }

        if !visit(i, c, depth) {
            return;
        }
        prev = c;
        i += c.len_utf8();
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Returns the offset just past the closing quote of a string starting at `start`.
fn skip_string(text: &str, start: usize) -> usize {
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return start + offset + 1;
        }
    }
    text.len()
}

/// Skips `r"..."` / `r#"..."#`; `start` points just past the `r`.
fn skip_raw_string(text: &str, start: usize) -> Option<usize> {
    let rest = &text[start..];
    let hashes = rest.chars().take_while(|c| *c == '#').count();
    if !rest[hashes..].starts_with('"') {
        return None;
    }
    let terminator = format!("\"{}", "#".repeat(hashes));
    let body_start = start + hashes + 1;
    Some(
        text[body_start..]
            .find(&terminator)
            .map(|n| body_start + n + terminator.len())
            .unwrap_or(text.len()),
    )
}

/// Distinguishes `'x'` / `'\n'` literals from lifetimes; returns the end offset of a literal.
fn char_literal_end(text: &str, start: usize) -> Option<usize> {
    let rest = &text[start + 1..];
    let mut chars = rest.char_indices();
    let (_, first) = chars.next()?;
    if first == '\\' {
        let close = rest[1..].find('\'')?;
        // escapes are short: '\n', '\'', '\u{1F600}'
        if close <= 9 {
            return Some(start + 1 + 1 + close + 1);
        }
        return None;
    }
    let (second_idx, second) = chars.next()?;
    if second == '\'' {
        return Some(start + 1 + second_idx + 1);
    }
    None
}

/// Splits `text` on `sep` occurring at nesting depth 0; parts are trimmed and empty parts dropped.
pub fn split_top_level(text: &str, sep: char, angles: bool) -> Vec<String> {
    let mut parts = Vec::new();
    let mut last = 0;
    walk(text, angles, |i, c, depth| {
        if c == sep && depth == 0 {
            parts.push(text[last..i].trim().to_string());
            last = i + c.len_utf8();
        }
        true
    });
    parts.push(text[last..].trim().to_string());
    parts.retain(|p| !p.is_empty());
    parts
}

/// Finds the delimiter closing the one at byte offset `open`.
pub fn matching_close(text: &str, open: usize, angles: bool) -> Option<usize> {
    let mut found = None;
    let mut seen_open = false;
    walk(&text[open..], angles, |i, c, depth| {
        if i == 0 {
            seen_open = true;
            return true;
        }
        if depth == 0 && matches!(c, ')' | ']' | '}' | '>') {
            found = Some(open + i);
            return false;
        }
        true
    });
    if seen_open {
        found
    } else {
        None
    }
}

/// Byte offset of the first occurrence of `needle` at depth 0.
pub fn find_top_level(text: &str, needle: &str, angles: bool) -> Option<usize> {
    let mut found = None;
    walk(text, angles, |i, _, depth| {
        if depth == 0 && text[i..].starts_with(needle) {
            found = Some(i);
            return false;
        }
        true
    });
    found
}

/// Skips whitespace and comments (including doc comments) starting at `pos`.
pub fn skip_trivia(text: &str, mut pos: usize) -> usize {
    loop {
        let rest = &text[pos..];
        let trimmed = rest.trim_start();
        pos += rest.len() - trimmed.len();
        if trimmed.starts_with("//") {
            pos = text[pos..]
                .find('\n')
                .map(|n| pos + n + 1)
                .unwrap_or(text.len());
        } else if trimmed.starts_with("/*") {
            pos = text[pos + 2..]
                .find("*/")
                .map(|n| pos + 2 + n + 2)
                .unwrap_or(text.len());
        } else {
            return pos;
        }
    }
}

/// Leading `#[...]` attributes of an item or field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peeled<'a> {
    /// Attribute bodies without the surrounding `#[` and `]`
    pub attributes: Vec<String>,
    /// Doc comment lines without the `///` marker
    pub docs: Vec<String>,
    /// Text after the attributes
    pub rest: &'a str,
}

/// Splits leading attributes and doc comments off a chunk of item text.
pub fn peel_attributes(text: &str) -> Peeled<'_> {
    let mut attributes = Vec::new();
    let mut docs = Vec::new();
    let mut pos = 0;

    loop {
        let rest = &text[pos..];
        let trimmed = rest.trim_start();
        pos += rest.len() - trimmed.len();

        if let Some(doc) = trimmed.strip_prefix("///") {
            let line_end = doc.find('\n').unwrap_or(doc.len());
            docs.push(doc[..line_end].trim().to_string());
            pos += 3 + line_end;
        } else if trimmed.starts_with("//") || trimmed.starts_with("/*") {
            pos = skip_trivia(text, pos);
        } else if trimmed.starts_with("#[") || trimmed.starts_with("#![") {
            let open = pos + trimmed.find('[').unwrap_or(1);
            match matching_close(text, open, false) {
                Some(close) => {
                    attributes.push(text[open + 1..close].trim().to_string());
                    pos = close + 1;
                }
                None => break,
            }
        } else {
            break;
        }
    }

    Peeled {
        attributes,
        docs,
        rest: text[pos..].trim(),
    }
}
