//! Comma-separated list grammar used by list-valued query parameters.
//!
//! Items are separated by commas. A double-quoted segment is taken verbatim, so
//! `"Psychology, Pathological",Frogs` yields two items. `\"` is a literal quote
//! inside or outside a quoted segment. Unquoted whitespace around an item is
//! trimmed and empty items are dropped.

/// Split a raw parameter value into its list items.
pub fn parse_list(input: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    // Byte length of `current` up to its last character that survives trimming.
    let mut keep = 0;
    let mut in_quotes = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
                keep = current.len();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => finish_item(&mut items, &mut current, &mut keep),
            c if !in_quotes && c.is_whitespace() => {
                if !current.is_empty() {
                    current.push(c);
                }
            }
            c => {
                current.push(c);
                keep = current.len();
            }
        }
    }
    finish_item(&mut items, &mut current, &mut keep);

    items
}

fn finish_item(items: &mut Vec<String>, current: &mut String, keep: &mut usize) {
    current.truncate(*keep);
    if !current.is_empty() {
        items.push(std::mem::take(current));
    }
    current.clear();
    *keep = 0;
}

/// Render items so that [`parse_list`] reads them back unchanged.
///
/// Items containing commas, quotes or whitespace are quoted, with embedded
/// quotes escaped. Trailing backslashes go after the closing quote so they
/// cannot escape it. Empty items cannot be represented and are skipped.
pub fn encode_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(AsRef::as_ref)
        .filter(|item| !item.is_empty())
        .map(encode_item)
        .collect::<Vec<_>>()
        .join(",")
}

fn encode_item(item: &str) -> String {
    let needs_quotes = item
        .chars()
        .any(|c| c == ',' || c == '"' || c.is_whitespace());

    if needs_quotes {
        let body = item.trim_end_matches('\\');
        let trailing = &item[body.len()..];
        format!("\"{}\"{trailing}", body.replace('"', "\\\""))
    } else {
        item.to_string()
    }
}
