//! Per-document normalization of raw search hits.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Key under which the remote API nests each hit's package data.
pub const PAYLOAD_KEY: &str = "package_search_response";

const PACKAGE_PATH_URL: &str = "package_path_url";
const MATCH_PATH_URL: &str = "match_path_url";
const MATCH_CONTEXT: &str = "match_context";

/// A search hit with its storage URLs made local and its match highlighted.
///
/// `package_path_url` and `match_path_url` are always present when
/// serialized (possibly `null`); `match_context` is always a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedDocument {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    pub package_path_url: Option<String>,
    pub match_path_url: Option<String>,
    pub match_context: String,
}

/// Rewrites remote storage URLs and highlights query terms.
#[derive(Debug, Clone)]
pub struct ResultTransformer {
    remote_base: String,
    local_base: String,
    highlight_open: String,
    highlight_close: String,
}

impl ResultTransformer {
    pub fn new(remote_base: impl Into<String>) -> Self {
        Self {
            remote_base: remote_base.into().trim_end_matches('/').to_string(),
            local_base: "/".to_string(),
            highlight_open: "<em>".to_string(),
            highlight_close: "</em>".to_string(),
        }
    }

    #[must_use]
    pub fn with_local_base(mut self, local_base: impl Into<String>) -> Self {
        self.local_base = local_base.into();
        self
    }

    #[must_use]
    pub fn with_markers(mut self, open: impl Into<String>, close: impl Into<String>) -> Self {
        self.highlight_open = open.into();
        self.highlight_close = close.into();
        self
    }

    pub fn remote_base(&self) -> &str {
        &self.remote_base
    }

    /// Normalize one raw hit.
    pub fn normalize(&self, raw: Value, term: &str) -> NormalizedDocument {
        self.normalize_with(raw, &self.highlighter(term))
    }

    /// Normalize a batch of hits, compiling the term pattern once.
    pub fn normalize_all(&self, docs: Vec<Value>, term: &str) -> Vec<NormalizedDocument> {
        let highlighter = self.highlighter(term);
        docs.into_iter()
            .map(|raw| self.normalize_with(raw, &highlighter))
            .collect()
    }

    fn normalize_with(&self, raw: Value, highlighter: &Highlighter<'_>) -> NormalizedDocument {
        let mut root = match raw {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        // Context is taken from the unwrapped payload first, then from the root.
        let root_context = take_string(&mut root, MATCH_CONTEXT);
        let mut fields = match root.remove(PAYLOAD_KEY) {
            Some(Value::Object(payload)) => payload,
            _ => root,
        };
        let context = take_string(&mut fields, MATCH_CONTEXT)
            .filter(|c| !c.is_empty())
            .or(root_context)
            .unwrap_or_default();

        let package_path_url = take_string(&mut fields, PACKAGE_PATH_URL).map(|u| self.rewrite_url(&u));
        let match_path_url = take_string(&mut fields, MATCH_PATH_URL).map(|u| self.rewrite_url(&u));

        NormalizedDocument {
            fields,
            package_path_url,
            match_path_url,
            match_context: highlighter.apply(&context),
        }
    }

    /// Replace the remote base URL prefix with the local base.
    ///
    /// Already-local paths are returned unchanged, so rewriting twice is the
    /// same as rewriting once.
    pub fn rewrite_url(&self, url: &str) -> String {
        rewrite_prefix(url, &self.remote_base, &self.local_base)
    }

    /// Wrap every case-insensitive literal occurrence of `term` in `text`.
    pub fn highlight(&self, text: &str, term: &str) -> String {
        self.highlighter(term).apply(text)
    }

    fn highlighter(&self, term: &str) -> Highlighter<'_> {
        let regex = if term.is_empty() {
            None
        } else {
            Regex::new(&format!("(?i){}", regex::escape(term)))
                .inspect_err(|e| warn!(error = %e, "Search term cannot be highlighted"))
                .ok()
        };
        Highlighter {
            regex,
            open: &self.highlight_open,
            close: &self.highlight_close,
        }
    }
}

struct Highlighter<'a> {
    regex: Option<Regex>,
    open: &'a str,
    close: &'a str,
}

impl Highlighter<'_> {
    fn apply(&self, text: &str) -> String {
        match &self.regex {
            Some(regex) if !text.is_empty() => regex
                .replace_all(text, |caps: &regex::Captures<'_>| {
                    format!("{}{}{}", self.open, &caps[0], self.close)
                })
                .into_owned(),
            _ => text.to_string(),
        }
    }
}

/// Swap a `remote_base` prefix for `local_base`, joining with a single `/`.
///
/// The prefix must end on a path boundary; anything else is returned as is.
pub fn rewrite_prefix(url: &str, remote_base: &str, local_base: &str) -> String {
    let remote_base = remote_base.trim_end_matches('/');
    match url.strip_prefix(remote_base) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('?') => {
            format!(
                "{}/{}",
                local_base.trim_end_matches('/'),
                rest.trim_start_matches('/')
            )
        }
        _ => url.to_string(),
    }
}

/// Remove `key` and return it if it held a string. Other JSON types count as absent.
fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}
