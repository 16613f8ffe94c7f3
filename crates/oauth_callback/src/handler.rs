//! Callback orchestration.
//!
//! A linear state machine over one invocation: provider error check, code and
//! state presence, state decode, redirect-URI reconstruction, config
//! resolution, token exchange, token validation, success redirect. Each
//! failure is terminal and leaves as a redirect carrying its error code; the
//! handler never lets a fault reach the browser as a blank error page.

use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::config::{ConfigResolver, DEFAULT_FRONTEND_URL};
use crate::auth::exchange::TokenExchanger;
use crate::auth::state::{decode_state, parse_query};
use crate::auth::OAuthError;
use crate::edge::response::{build_redirect, CookieMode, CookieSpec};
use crate::edge::{CallbackEvent, CallbackRequest, CallbackResponse};

/// Path this handler is mounted on. The reconstructed redirect_uri must end
/// with this, since providers check redirect_uri equality at exchange time.
pub const CALLBACK_PATH: &str = "/oauth/callback";

const DEFAULT_HOST: &str = "localhost:5173";

/// The callback state machine, with its collaborators injected.
pub struct CallbackHandler {
    resolver: Arc<dyn ConfigResolver>,
    exchanger: TokenExchanger,
    cookie_mode: CookieMode,
}

impl CallbackHandler {
    pub fn new(resolver: Arc<dyn ConfigResolver>, cookie_mode: CookieMode) -> Self {
        Self::with_exchanger(resolver, cookie_mode, TokenExchanger::new())
    }

    /// Exchanger injection is the seam tests use to point at a mock endpoint.
    pub fn with_exchanger(
        resolver: Arc<dyn ConfigResolver>,
        cookie_mode: CookieMode,
        exchanger: TokenExchanger,
    ) -> Self {
        Self {
            resolver,
            exchanger,
            cookie_mode,
        }
    }

    /// Entry point for the edge host. Always produces a redirect, whatever
    /// happens inside.
    pub async fn handle(&self, event: CallbackEvent) -> CallbackResponse {
        let request = match CallbackRequest::from_event(event) {
            Ok(request) => request,
            Err(err) => {
                warn!("malformed edge event");
                return build_redirect(DEFAULT_FRONTEND_URL, Some(&err), None);
            }
        };

        match self.run(&request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(code = err.code(), "callback terminated: {err}");
                let frontend_url = self.best_effort_frontend_url(&request).await;
                build_redirect(&frontend_url, Some(&err), None)
            }
        }
    }

    async fn run(&self, request: &CallbackRequest) -> Result<CallbackResponse, OAuthError> {
        let params = parse_query(&request.raw_query);

        // Provider-supplied error wins over everything else present.
        if let Some(error) = params.get("error") {
            let description = params
                .get("error_description")
                .map(String::as_str)
                .unwrap_or("unknown");
            warn!(error = %error, description, "provider returned an error");
            return Err(OAuthError::Provider(error.clone()));
        }

        let code = params
            .get("code")
            .filter(|code| !code.is_empty())
            .ok_or(OAuthError::NoCode)?;
        let state = params
            .get("state")
            .filter(|state| !state.is_empty())
            .ok_or(OAuthError::NoState)?;

        let payload = decode_state(state)?;

        let redirect_uri = self.redirect_uri(request);

        let config = self.resolver.resolve(request).await?;

        let grant = self
            .exchanger
            .exchange(code, &payload.verifier, &redirect_uri, &config)
            .await?;

        let Some(access_token) = grant.access_token else {
            return Err(OAuthError::NoToken);
        };

        info!("oauth callback completed");
        let cookie = CookieSpec::session(access_token, self.cookie_mode);
        Ok(build_redirect(&config.frontend_url, None, Some(&cookie)))
    }

    /// Rebuild this callback's own absolute URL from the Host header. It must
    /// byte-match what the frontend sent at authorization time, so it is
    /// derived from the request rather than configured. Scheme is `http` only
    /// for loopback hosts.
    fn redirect_uri(&self, request: &CallbackRequest) -> String {
        let host = request.header("host").unwrap_or(DEFAULT_HOST);
        let scheme = if host.contains("localhost") || host.contains("127.0.0.1") {
            "http"
        } else {
            "https"
        };
        format!("{scheme}://{host}{CALLBACK_PATH}")
    }

    /// Frontend URL for error redirects. Config may itself be the thing that
    /// failed; fall back to the hard-coded default so the browser still lands
    /// somewhere. Repeat resolution is cheap behind the cached resolver.
    async fn best_effort_frontend_url(&self, request: &CallbackRequest) -> String {
        match self.resolver.resolve(request).await {
            Ok(config) => config.frontend_url,
            Err(_) => DEFAULT_FRONTEND_URL.to_string(),
        }
    }
}
