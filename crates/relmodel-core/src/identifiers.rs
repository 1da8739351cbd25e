//! SQL identifier validation and naming helpers.
//!
//! Table and column names come from tag text, so they are checked before
//! they are spliced into statement text.

use regex::Regex;
use std::sync::OnceLock;

fn identifier_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| match Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$") {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!(error = %e, "identifier pattern failed to compile");
            None
        }
    })
    .as_ref()
}

/// Whether `name` is a plain SQL identifier.
///
/// Returns `false` for everything if the pattern could not be compiled.
pub fn is_valid_identifier(name: &str) -> bool {
    identifier_regex().is_some_and(|re| re.is_match(name))
}

/// Whether `list` is a comma-separated list of plain identifiers, as used by
/// tuple predicate keys (`"a,b"`). Whitespace around names is allowed.
pub fn is_valid_identifier_list(list: &str) -> bool {
    !list.is_empty() && list.split(',').all(|part| is_valid_identifier(part.trim()))
}

/// Convert a Rust field name into its default column name.
///
/// `relatedID` becomes `related_id`, `NotTaggedField` becomes
/// `not_tagged_field`; names that are already snake case are unchanged.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                None | Some('_') => false,
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(char::is_lowercase),
                Some(_) => false,
            };
            if boundary {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers() {
        assert!(is_valid_identifier("rowid"));
        assert!(is_valid_identifier("_private1"));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier("a b"));
        assert!(!is_valid_identifier("x; drop table y"));
        assert!(!is_valid_identifier(""));
    }

    #[test]
    fn test_identifier_lists() {
        assert!(is_valid_identifier_list("first_id,second_id"));
        assert!(is_valid_identifier_list("a, b"));
        assert!(!is_valid_identifier_list("a,,b"));
        assert!(!is_valid_identifier_list(""));
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(to_snake_case("field"), "field");
        assert_eq!(to_snake_case("not_tagged_field"), "not_tagged_field");
        assert_eq!(to_snake_case("NotTaggedField"), "not_tagged_field");
        assert_eq!(to_snake_case("relatedID"), "related_id");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("field2Name"), "field2_name");
    }
}
