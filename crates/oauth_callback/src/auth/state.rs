//! Query-string parsing and state-blob decoding.
//!
//! The `state` parameter is an opaque base64 blob the frontend builds before
//! redirecting to the provider. It carries the PKCE code verifier and a CSRF
//! token, which is how the flow survives without server-side session storage.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

use super::OAuthError;

/// Structured record recovered from the `state` query parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePayload {
    /// CSRF token the frontend generated at flow start. Round-tripped through
    /// the provider but not compared against an independently stored nonce
    /// here; the only binding is the opaque state blob itself.
    #[serde(default)]
    pub csrf: String,
    /// PKCE code verifier, required for the token exchange.
    #[serde(default)]
    pub verifier: String,
}

/// Parse a raw query string into decoded key/value pairs.
///
/// Percent-decodes both sides. Pairs without `=` are skipped rather than
/// errored; duplicate keys are last-write-wins. The flow never relies on
/// duplicates.
pub fn parse_query(raw: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in raw.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        params.insert(
            percent_decode_str(key).decode_utf8_lossy().into_owned(),
            percent_decode_str(value).decode_utf8_lossy().into_owned(),
        );
    }
    params
}

/// Decode the opaque state blob: base64, then UTF-8, then JSON.
///
/// Every decoding sub-failure collapses to [`OAuthError::InvalidState`]; a
/// structurally valid payload with a missing or empty verifier is
/// [`OAuthError::NoVerifier`]. Pure function, safe to call repeatedly.
pub fn decode_state(state: &str) -> Result<StatePayload, OAuthError> {
    let bytes = STANDARD.decode(state).map_err(|_| OAuthError::InvalidState)?;
    let text = String::from_utf8(bytes).map_err(|_| OAuthError::InvalidState)?;
    let payload: StatePayload =
        serde_json::from_str(&text).map_err(|_| OAuthError::InvalidState)?;
    if payload.verifier.is_empty() {
        return Err(OAuthError::NoVerifier);
    }
    Ok(payload)
}

/// Inverse of [`decode_state`]: JSON-encode the payload and wrap it in
/// standard base64, matching what the frontend sends at flow start.
pub fn encode_state(payload: &StatePayload) -> String {
    // Two plain string fields; serialization cannot fail.
    let json = serde_json::to_string(payload).expect("state payload serializes");
    STANDARD.encode(json)
}
