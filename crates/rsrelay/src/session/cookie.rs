//! Auth-cookie renewal.
//!
//! The remote API rotates its auth cookie on responses. Renewal is a separate,
//! explicit step: the gateway extracts the renewed cookie from the response
//! headers and then applies it to the session.

use chrono::{DateTime, Duration, Utc};
use reqwest::header::{HeaderMap, SET_COOKIE};

use super::Session;

/// A renewed auth cookie found on a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewedCookie {
    pub value: String,
    /// Absent when the cookie carried neither `Max-Age` nor a parseable `Expires`.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Find the auth cookie named `cookie_name` among the `Set-Cookie` headers.
///
/// Empty values (cookie deletion) are not treated as renewals. When several
/// headers set the cookie, the last one wins. `Max-Age` takes precedence over
/// `Expires`.
pub fn extract_renewed_cookie(
    headers: &HeaderMap,
    cookie_name: &str,
    now: DateTime<Utc>,
) -> Option<RenewedCookie> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|raw| parse_set_cookie(raw, cookie_name, now))
        .last()
}

/// Overwrite the session's cookie (and expiry, when the cookie carries one).
pub fn apply_renewal(session: &mut Session, renewed: RenewedCookie) {
    session.auth_cookie = Some(renewed.value);
    if let Some(expires_at) = renewed.expires_at {
        session.expires_at = Some(expires_at);
    }
}

fn parse_set_cookie(raw: &str, cookie_name: &str, now: DateTime<Utc>) -> Option<RenewedCookie> {
    let mut parts = raw.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    if name.trim() != cookie_name {
        return None;
    }

    let value = value.trim().trim_matches('"');
    if value.is_empty() {
        return None;
    }

    let mut expires = None;
    let mut max_age = None;
    for attr in parts {
        let (key, val) = attr.split_once('=').unwrap_or((attr, ""));
        let val = val.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "expires" => expires = parse_cookie_date(val),
            "max-age" => max_age = val.parse::<i64>().ok(),
            _ => {}
        }
    }

    let expires_at = match max_age {
        Some(secs) => Some(now + Duration::seconds(secs)),
        None => expires,
    };

    Some(RenewedCookie {
        value: value.to_string(),
        expires_at,
    })
}

/// Parse a cookie `Expires` date (`Wed, 21 Oct 2015 07:28:00 GMT`, or the
/// legacy dashed `Wed, 21-Oct-2015 07:28:00 GMT`).
fn parse_cookie_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc2822(&value.replace('-', " ")))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
