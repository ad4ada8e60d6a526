//! Build metadata reported by `GET /version` and `rsrelay version`.
//!
//! `BUILD_COMMIT` and `BUILD_DATE` are read from the build environment; both
//! report `unknown` when unset.

use serde::Serialize;

pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const COMMIT: &str = or_unknown(option_env!("BUILD_COMMIT"));
pub const BUILD_DATE: &str = or_unknown(option_env!("BUILD_DATE"));

const fn or_unknown(value: Option<&'static str>) -> &'static str {
    match value {
        Some(v) => v,
        None => "unknown",
    }
}

/// User-agent sent to the remote API when the config does not override it.
pub fn default_user_agent() -> String {
    format!("RSUI/{VERSION}")
}

/// What is running, and how it introduces itself to the remote API.
#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub commit: &'static str,
    pub build_date: &'static str,
    pub user_agent: String,
}

impl BuildInfo {
    /// Metadata of this binary, reporting `user_agent` as sent upstream.
    pub fn current(user_agent: impl Into<String>) -> Self {
        Self {
            name: NAME,
            version: VERSION,
            commit: COMMIT,
            build_date: BUILD_DATE,
            user_agent: user_agent.into(),
        }
    }
}
