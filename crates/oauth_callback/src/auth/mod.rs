//! OAuth protocol pieces: state decoding, PKCE material, token exchange and
//! config resolution.

pub mod config;
pub mod exchange;
pub mod pkce;
pub mod state;

use thiserror::Error;

/// Terminal failure taxonomy for the callback flow.
///
/// Every variant resolves to a redirect carrying `oauth_error=<code>`; nothing
/// here is ever surfaced to the browser as a raised fault. The enum is
/// exhaustive on purpose: the top-level catch-all is the `Internal` transition,
/// not a blanket handler, so the full set of outcomes stays reviewable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OAuthError {
    /// The provider itself sent an `error` query parameter; its code is passed
    /// through to the frontend unchanged.
    #[error("provider returned error '{0}'")]
    Provider(String),

    #[error("no authorization code in callback")]
    NoCode,

    #[error("no state parameter in callback")]
    NoState,

    /// State blob failed base64, UTF-8 or JSON decoding. Sub-causes are
    /// deliberately collapsed so parsing internals never leak into the
    /// redirect URL.
    #[error("state parameter could not be decoded")]
    InvalidState,

    /// State decoded cleanly but carried no PKCE verifier.
    #[error("state parameter has no code verifier")]
    NoVerifier,

    /// Token endpoint rejected the exchange with a parseable error code
    /// (e.g. `invalid_grant`), passed through to the frontend.
    #[error("token exchange rejected: '{0}'")]
    Exchange(String),

    /// Token endpoint rejected the exchange and the error body was not
    /// parseable JSON.
    #[error("token exchange failed with unparseable error body")]
    TokenExchangeFailed,

    /// Transport-level failure reaching the provider: timeout, DNS,
    /// connection reset.
    #[error("network failure reaching token endpoint")]
    NetworkError,

    /// Provider answered 2xx but the body had no access token.
    #[error("token response contained no access token")]
    NoToken,

    /// Anything unanticipated, including config resolver failure.
    #[error("internal error handling callback")]
    Internal,
}

impl OAuthError {
    /// The `oauth_error` query value the frontend receives.
    pub fn code(&self) -> &str {
        match self {
            Self::Provider(code) | Self::Exchange(code) => code,
            Self::NoCode => "no_code",
            Self::NoState => "no_state",
            Self::InvalidState => "invalid_state",
            Self::NoVerifier => "no_verifier",
            Self::TokenExchangeFailed => "token_exchange_failed",
            Self::NetworkError => "network_error",
            Self::NoToken => "no_token",
            Self::Internal => "internal_error",
        }
    }
}
