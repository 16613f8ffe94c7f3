//! Wire types for the edge host's origin-request events and responses.
//!
//! The host delivers a wrapped HTTP request where each header name maps to a
//! list of `{key, value}` pairs, and expects responses with headers in the
//! same shape. Nothing here outlives a single invocation.

pub mod response;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::auth::OAuthError;

/// Origin-request event as delivered by the edge host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackEvent {
    #[serde(rename = "Records")]
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub cf: CfRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CfRecord {
    pub request: EdgeRequest,
}

/// The inner HTTP request of an origin-request event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRequest {
    pub uri: String,
    #[serde(default)]
    pub querystring: String,
    #[serde(default)]
    pub headers: HashMap<String, Vec<HeaderEntry>>,
    pub method: String,
}

/// One value of a possibly multi-valued header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub key: String,
    pub value: String,
}

impl HeaderEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Immutable view of the inbound request, constructed once per invocation.
#[derive(Debug, Clone)]
pub struct CallbackRequest {
    pub path: String,
    pub raw_query: String,
    pub method: String,
    headers: HashMap<String, Vec<HeaderEntry>>,
}

impl CallbackRequest {
    pub fn new(
        path: impl Into<String>,
        raw_query: impl Into<String>,
        method: impl Into<String>,
        headers: HashMap<String, Vec<HeaderEntry>>,
    ) -> Self {
        Self {
            path: path.into(),
            raw_query: raw_query.into(),
            method: method.into(),
            headers,
        }
    }

    /// Extract the single wrapped request from an event. An event without a
    /// record is a host-contract violation and maps to the internal error.
    pub fn from_event(event: CallbackEvent) -> Result<Self, OAuthError> {
        let request = event
            .records
            .into_iter()
            .next()
            .map(|record| record.cf.request)
            .ok_or(OAuthError::Internal)?;
        Ok(Self {
            path: request.uri,
            raw_query: request.querystring,
            method: request.method,
            headers: request.headers,
        })
    }

    /// First value of a header, case-insensitive. The host lowercases header
    /// names in the map; multi-valued headers keep their order.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|entries| entries.first())
            .map(|entry| entry.value.as_str())
    }
}

/// Redirect-class response in the host's wire shape. The sole observable
/// output of the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub status: String,
    #[serde(rename = "statusDescription")]
    pub status_description: String,
    pub headers: HashMap<String, Vec<HeaderEntry>>,
}

impl CallbackResponse {
    /// First value of a response header, by lowercase name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|entries| entries.first())
            .map(|entry| entry.value.as_str())
    }
}
