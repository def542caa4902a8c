//! Small parsing helpers shared by the rule loader and the batch front-ends.

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

/// Field delimiter of rule-table lines: `source::target::script::priority`.
pub(crate) const FIELD_DELIMITER: &str = "::";

static UNICODE_ESCAPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\u([0-9A-Fa-f]{4})|\\U([0-9A-Fa-f]{8})").unwrap()
});

/// Returns `true` for lines the loaders ignore: blank lines and `#` comments.
pub(crate) fn is_comment_or_blank(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Splits a rule-table line on `::` and trims each field.
pub(crate) fn split_rule_fields(line: &str) -> Vec<&str> {
    line.split(FIELD_DELIMITER).map(str::trim).collect()
}

/// Extracts the value of `::slot value` from a double-colon delimited list.
///
/// ```text
/// ::script-name Arabic ::direction right-to-left
/// ```
///
/// `slot_value_in_double_colon_del_list(line, "direction")` yields `right-to-left`.
/// The value runs up to the next ` ::` (or the end of the line) and is trimmed.
pub(crate) fn slot_value_in_double_colon_del_list<'a>(line: &'a str, slot: &str) -> Option<&'a str> {
    let marker = format!("::{slot}");
    let mut search_from = 0;

    while let Some(found) = line[search_from..].find(&marker) {
        let value_start = search_from + found + marker.len();
        let rest = &line[value_start..];
        // `::script` must not match `::script-name`.
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            let value_end = rest.find("::").unwrap_or(rest.len());
            let value = rest[..value_end].trim();
            return if value.is_empty() { None } else { Some(value) };
        }
        search_from = value_start;
    }
    None
}

/// Splits a `a,b;c` style list into trimmed, non-empty items.
pub(crate) fn split_list_value(value: &str) -> Vec<String> {
    value
        .split([',', ';'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Decodes `\uXXXX` and `\UXXXXXXXX` escapes. Invalid code points are left as written.
pub fn decode_unicode_escapes(s: &str) -> Cow<'_, str> {
    UNICODE_ESCAPE_RE.replace_all(s, |caps: &Captures| {
        let hex = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    })
}
