//! Edge OAuth Callback Service
//!
//! Handles the server half of a browser OAuth 2.0 Authorization Code + PKCE
//! flow at the CDN edge: parses the provider redirect, recovers the PKCE
//! verifier from the opaque state blob, exchanges the authorization code for
//! an access token and sends the browser back to the frontend with a session
//! cookie.
//!
//! # Features
//! - CloudFront-shaped origin-request event model (list-of-pairs headers)
//! - Linear callback state machine with a closed, redirect-only error taxonomy
//! - Form-encoded token exchange under a hard 4s timeout (5s host ceiling)
//! - Pluggable config resolution with single-flight process-lifetime caching
//! - Optional local development server behind the `dev-server` feature

pub mod auth;
pub mod edge;
pub mod handler;

#[cfg(feature = "dev-server")]
pub mod server;

pub use auth::config::{CachedResolver, ConfigResolver, OAuthConfig, SecretStoreResolver};
pub use auth::exchange::{TokenExchanger, TokenGrant};
pub use auth::state::{decode_state, encode_state, parse_query, StatePayload};
pub use auth::OAuthError;
pub use edge::response::{build_redirect, CookieMode, CookieSpec};
pub use edge::{CallbackEvent, CallbackRequest, CallbackResponse};
pub use handler::CallbackHandler;

pub mod error {
    use anyhow::Error;
    pub type Result<T> = std::result::Result<T, Error>;
}
