//! Redirect response construction.
//!
//! Every outcome of the callback flow, success or failure, leaves through
//! here as a 302 to the frontend. The redirect is one-time and secret-bearing,
//! so it is always marked fully non-cacheable.

use std::collections::HashMap;

use crate::auth::OAuthError;

use super::{CallbackResponse, HeaderEntry};

/// Cookie name the frontend reads to gate UI.
pub const COOKIE_NAME: &str = "google_oauth_access_token";
/// 7 days.
pub const COOKIE_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;

const CACHE_CONTROL: &str = "no-cache, no-store, must-revalidate";

/// Whether Set-Cookie carries the Secure attribute.
///
/// Development deliberately omits Secure so the cookie survives plain-HTTP
/// localhost; production must always set it. The divergence is carried as an
/// explicit mode so it cannot happen by accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieMode {
    Production,
    Development,
}

/// Session cookie attributes for the success redirect.
#[derive(Debug, Clone)]
pub struct CookieSpec {
    pub name: String,
    pub value: String,
    pub max_age_secs: u64,
    pub path: String,
    pub same_site: &'static str,
    pub secure: bool,
    /// The frontend's page script reads this cookie, so it is never host-only.
    pub http_only: bool,
}

impl CookieSpec {
    /// The standard session cookie: 7-day Max-Age, Path=/, SameSite=Lax,
    /// script-readable, Secure per mode.
    pub fn session(value: impl Into<String>, mode: CookieMode) -> Self {
        Self {
            name: COOKIE_NAME.to_string(),
            value: value.into(),
            max_age_secs: COOKIE_MAX_AGE_SECS,
            path: "/".to_string(),
            same_site: "Lax",
            secure: mode == CookieMode::Production,
            http_only: false,
        }
    }

    fn to_header_value(&self) -> String {
        let mut parts = vec![
            format!("{}={}", self.name, self.value),
            format!("Max-Age={}", self.max_age_secs),
            format!("Path={}", self.path),
            format!("SameSite={}", self.same_site),
        ];
        if self.secure {
            parts.push("Secure".to_string());
        }
        if self.http_only {
            parts.push("HttpOnly".to_string());
        }
        parts.join("; ")
    }
}

/// Build the redirect response: `base_url` plus an optional `oauth_error`
/// query parameter, plus an optional Set-Cookie.
pub fn build_redirect(
    base_url: &str,
    error: Option<&OAuthError>,
    cookie: Option<&CookieSpec>,
) -> CallbackResponse {
    let location = match error {
        Some(err) => {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .append_pair("oauth_error", err.code())
                .finish();
            format!("{base_url}?{query}")
        }
        None => base_url.to_string(),
    };

    let mut headers = HashMap::new();
    headers.insert(
        "location".to_string(),
        vec![HeaderEntry::new("Location", location)],
    );
    headers.insert(
        "cache-control".to_string(),
        vec![HeaderEntry::new("Cache-Control", CACHE_CONTROL)],
    );
    if let Some(cookie) = cookie {
        headers.insert(
            "set-cookie".to_string(),
            vec![HeaderEntry::new("Set-Cookie", cookie.to_header_value())],
        );
    }

    CallbackResponse {
        status: "302".to_string(),
        status_description: "Found".to_string(),
        headers,
    }
}
