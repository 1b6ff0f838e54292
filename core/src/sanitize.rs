#![deny(missing_docs)]

//! # Injection Blocklist
//!
//! Description documents end up inside generated source code, so string
//! content that looks like a code-injection attempt is either rejected or
//! stripped before it reaches the pipeline.

use regex::Regex;
use std::sync::OnceLock;

fn blocklist() -> &'static [Regex] {
    static BLOCKLIST: OnceLock<Vec<Regex>> = OnceLock::new();
    BLOCKLIST.get_or_init(|| {
        [
            r"\*/",
            r"/\*",
            r"(?i)\Weval\s*\(",
            r"(?i)\Wexec\s*\(",
            r"(?i)\Wfunction\s*\(",
            r"(?i)\Wsystem\s*\(",
            r"(?i)<script>",
            r"(?i)\Wtry\s*\{",
            r"\);",
            r"(?i)=end",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("Invalid regex constant"))
        .collect()
    })
}

/// Strips every blocklisted pattern from `value`.
///
/// Returns `None` when the value is clean, or the stripped value otherwise.
pub fn strip_injection(value: &str) -> Option<String> {
    let mut cleaned = value.to_string();
    for re in blocklist() {
        if re.is_match(&cleaned) {
            cleaned = re.replace_all(&cleaned, "").into_owned();
        }
    }
    (cleaned != value).then_some(cleaned)
}
