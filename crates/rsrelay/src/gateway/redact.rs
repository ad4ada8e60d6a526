//! Credential masking for diagnostic output.

use std::collections::BTreeMap;

use reqwest::header::HeaderMap;

/// Replacement written in place of credential-bearing header values.
pub const MASK: &str = "[MASKED]";

/// Header names (lowercase) whose values are never logged in clear.
pub const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-csrf-token",
    "x-xsrf-token",
    "csrf-token",
    "php-auth-pw",
    "basic-auth-password",
];

pub fn is_sensitive(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|sensitive| sensitive.eq_ignore_ascii_case(name))
}

/// Render headers for logging, one entry per name with all of its values,
/// masking every value of a sensitive header.
pub fn mask_headers(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        let rendered = if is_sensitive(name.as_str()) {
            MASK.to_string()
        } else {
            String::from_utf8_lossy(value.as_bytes()).into_owned()
        };
        out.entry(name.as_str().to_string())
            .or_default()
            .push(rendered);
    }
    out
}
