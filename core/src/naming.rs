#![deny(missing_docs)]

//! # Naming Utilities
//!
//! Helper functions for deriving resource and group names from tags and
//! paths: capitalization, English singular/plural forms and the collapsed
//! path form used for grouping and sorting.

use heck::ToUpperCamelCase;
use regex::Regex;
use std::sync::OnceLock;

const UNCOUNTABLE: [&str; 10] = [
    "data",
    "equipment",
    "fish",
    "information",
    "metadata",
    "money",
    "news",
    "series",
    "sheep",
    "species",
];

/// (singular, plural)
const IRREGULAR: [(&str, &str); 7] = [
    ("person", "people"),
    ("man", "men"),
    ("child", "children"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("tooth", "teeth"),
    ("foot", "feet"),
];

/// Upper-cases the first character.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Turns a tag or path segment into a singular UpperCamelCase name.
///
/// e.g. `pets` -> `Pet`, `store-orders` -> `StoreOrder`
pub fn classify(s: &str) -> String {
    capitalize(&singularize(&s.replace('-', "_").to_upper_camel_case()))
}

/// Singular form of the last word of `word`.
pub fn singularize(word: &str) -> String {
    let lower = word.to_lowercase();
    if UNCOUNTABLE.iter().any(|u| lower.ends_with(u)) {
        return word.to_string();
    }
    for (singular, plural) in IRREGULAR {
        if lower.ends_with(plural) {
            return replace_suffix(word, plural.len(), singular);
        }
    }

    if lower.ends_with("ies") && word.len() > 3 {
        return replace_suffix(word, 3, "y");
    }
    for suffix in ["sses", "xes", "zes", "ches", "shes"] {
        if lower.ends_with(suffix) {
            return replace_suffix(word, 2, "");
        }
    }
    for suffix in ["ss", "us", "is"] {
        if lower.ends_with(suffix) {
            return word.to_string();
        }
    }
    if lower.ends_with('s') && word.len() > 1 {
        return replace_suffix(word, 1, "");
    }
    word.to_string()
}

/// Plural form of the last word of `word`.
pub fn pluralize(word: &str) -> String {
    let lower = word.to_lowercase();
    if UNCOUNTABLE.iter().any(|u| lower.ends_with(u)) {
        return word.to_string();
    }
    for (singular, plural) in IRREGULAR {
        if lower.ends_with(singular) {
            return replace_suffix(word, singular.len(), plural);
        }
    }

    let mut chars = lower.chars().rev();
    let last = chars.next();
    let before = chars.next();
    match (before, last) {
        (Some(b), Some('y')) if !"aeiou".contains(b) => replace_suffix(word, 1, "ies"),
        (_, Some('s' | 'x' | 'z')) => format!("{}es", word),
        (Some('c' | 's'), Some('h')) => format!("{}es", word),
        (_, Some(_)) => format!("{}s", word),
        (_, None) => String::new(),
    }
}

/// Replaces the last `len` bytes, keeping the case of the first replaced
/// character.
fn replace_suffix(word: &str, len: usize, replacement: &str) -> String {
    let split = word.len() - len;
    let (stem, old) = word.split_at(split);
    let upper = old.chars().next().is_some_and(char::is_uppercase);
    let replacement = if upper {
        capitalize(replacement)
    } else {
        replacement.to_string()
    };
    format!("{}{}", stem, replacement)
}

/// Removes separators and collapses each `{param}` segment to `_`.
///
/// e.g. `/pets/{id}/walk` -> `pets_walk`
pub fn compress_path(path: &str) -> String {
    static PARAM_RE: OnceLock<Regex> = OnceLock::new();
    let param_re =
        PARAM_RE.get_or_init(|| Regex::new(r"\{[^/{}]+\}").expect("Invalid regex constant"));
    param_re.replace_all(path, "_").replace('/', "")
}

/// First non-empty segment of a path.
pub fn first_segment(path: &str) -> &str {
    path.trim_start_matches('/').split('/').next().unwrap_or("")
}

/// Derives an operation name from the method and path when `operationId` is
/// missing.
///
/// e.g. `get /pets/{id}` -> `getPetsId`
pub fn derive_operation_id(method: &str, path: &str) -> String {
    format!("{}{}", method.to_lowercase(), path.to_upper_camel_case())
}
