//! Config resolution seam.
//!
//! The orchestrator only depends on the [`ConfigResolver`] capability; where
//! the config comes from differs per deployment. Production fetches a JSON
//! document from a managed secret store and memoizes it for the process
//! lifetime; development reads request headers injected by the local server
//! (compiled in only with the `dev-server` feature, since anyone who can set
//! headers could otherwise inject credentials).

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::error;

use crate::edge::CallbackRequest;

use super::OAuthError;

/// Fallback when config cannot be resolved at all; error redirects still need
/// somewhere to land.
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";

/// The secret fetch has its own bound so that, combined with the 4s exchange
/// cap, the invocation stays under the host's 5s ceiling when warm.
const SECRET_FETCH_TIMEOUT: Duration = Duration::from_secs(2);

/// OAuth client credentials plus the frontend to redirect to. Never persisted
/// by the core, never logged.
#[derive(Clone, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
}

fn default_frontend_url() -> String {
    DEFAULT_FRONTEND_URL.to_string()
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("frontend_url", &self.frontend_url)
            .finish()
    }
}

/// Capability the orchestrator uses to obtain OAuth config. Failure maps to
/// `internal_error`, never a crash.
#[async_trait]
pub trait ConfigResolver: Send + Sync {
    async fn resolve(&self, request: &CallbackRequest) -> Result<OAuthConfig, OAuthError>;
}

/// Production resolver: fetches the config document from a managed secret
/// store endpoint over HTTPS. Wrap in [`CachedResolver`] so warm instances
/// fetch once.
pub struct SecretStoreResolver {
    client: reqwest::Client,
    endpoint: String,
}

impl SecretStoreResolver {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(SECRET_FETCH_TIMEOUT)
            .build()
            .expect("reqwest client");
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ConfigResolver for SecretStoreResolver {
    async fn resolve(&self, _request: &CallbackRequest) -> Result<OAuthConfig, OAuthError> {
        let response = self.client.get(&self.endpoint).send().await.map_err(|err| {
            error!("secret store unreachable: {err}");
            OAuthError::Internal
        })?;

        if !response.status().is_success() {
            error!(status = %response.status(), "secret store returned failure");
            return Err(OAuthError::Internal);
        }

        response.json::<OAuthConfig>().await.map_err(|_| {
            // Detail withheld: the decode error could echo document content.
            error!("secret store document malformed");
            OAuthError::Internal
        })
    }
}

/// Development resolver: reads config from request headers the local server
/// injects. Trusts client-reachable headers, so it only exists behind the
/// `dev-server` feature and never ships to the edge.
#[cfg(feature = "dev-server")]
pub struct HeaderConfigResolver;

#[cfg(feature = "dev-server")]
#[async_trait]
impl ConfigResolver for HeaderConfigResolver {
    async fn resolve(&self, request: &CallbackRequest) -> Result<OAuthConfig, OAuthError> {
        Ok(OAuthConfig {
            client_id: request.header("x-oauth-client-id").unwrap_or_default().to_string(),
            client_secret: request
                .header("x-oauth-client-secret")
                .unwrap_or_default()
                .to_string(),
            frontend_url: request
                .header("x-oauth-frontend-url")
                .unwrap_or(DEFAULT_FRONTEND_URL)
                .to_string(),
        })
    }
}

/// Process-lifetime read-through cache around any resolver.
///
/// First populate is single-flight: concurrent invocations on a cold instance
/// await one underlying fetch. Errors are not cached; the next invocation
/// retries. The config is immutable once populated, so readers never race a
/// writer afterwards.
pub struct CachedResolver<R> {
    inner: R,
    cell: OnceCell<OAuthConfig>,
}

impl<R> CachedResolver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cell: OnceCell::new(),
        }
    }
}

#[async_trait]
impl<R: ConfigResolver> ConfigResolver for CachedResolver<R> {
    async fn resolve(&self, request: &CallbackRequest) -> Result<OAuthConfig, OAuthError> {
        self.cell
            .get_or_try_init(|| self.inner.resolve(request))
            .await
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request() -> CallbackRequest {
        CallbackRequest::new("/oauth/callback", "", "GET", HashMap::new())
    }

    fn config() -> OAuthConfig {
        OAuthConfig {
            client_id: "id".into(),
            client_secret: "secret".into(),
            frontend_url: "http://localhost:5173".into(),
        }
    }

    struct CountingResolver {
        calls: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl ConfigResolver for CountingResolver {
        async fn resolve(&self, _request: &CallbackRequest) -> Result<OAuthConfig, OAuthError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && call == 0 {
                return Err(OAuthError::Internal);
            }
            Ok(config())
        }
    }

    #[tokio::test]
    async fn cached_resolver_fetches_once() {
        let resolver = CachedResolver::new(CountingResolver {
            calls: AtomicUsize::new(0),
            fail_first: false,
        });
        let first = resolver.resolve(&request()).await.unwrap();
        let second = resolver.resolve(&request()).await.unwrap();
        assert_eq!(first.client_id, second.client_id);
        assert_eq!(resolver.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cached_resolver_does_not_cache_errors() {
        let resolver = CachedResolver::new(CountingResolver {
            calls: AtomicUsize::new(0),
            fail_first: true,
        });
        assert_eq!(
            resolver.resolve(&request()).await.unwrap_err(),
            OAuthError::Internal
        );
        assert!(resolver.resolve(&request()).await.is_ok());
        assert_eq!(resolver.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn secret_store_resolver_parses_document() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/secret/oauth-config")
            .with_status(200)
            .with_body(
                r#"{"client_id":"cid","client_secret":"cs","frontend_url":"https://app.example.com"}"#,
            )
            .create_async()
            .await;

        let resolver = SecretStoreResolver::new(format!("{}/secret/oauth-config", server.url()));
        let config = resolver.resolve(&request()).await.unwrap();
        assert_eq!(config.client_id, "cid");
        assert_eq!(config.frontend_url, "https://app.example.com");
    }

    #[tokio::test]
    async fn secret_store_failure_is_internal_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/secret/oauth-config")
            .with_status(500)
            .create_async()
            .await;

        let resolver = SecretStoreResolver::new(format!("{}/secret/oauth-config", server.url()));
        assert_eq!(
            resolver.resolve(&request()).await.unwrap_err(),
            OAuthError::Internal
        );
    }

    #[tokio::test]
    async fn secret_store_malformed_document_is_internal_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/secret/oauth-config")
            .with_status(200)
            .with_body("not a config")
            .create_async()
            .await;

        let resolver = SecretStoreResolver::new(format!("{}/secret/oauth-config", server.url()));
        assert_eq!(
            resolver.resolve(&request()).await.unwrap_err(),
            OAuthError::Internal
        );
    }

    #[test]
    fn debug_never_prints_the_secret() {
        let config = OAuthConfig {
            client_id: "id".into(),
            client_secret: "hunter2".into(),
            frontend_url: "http://localhost:5173".into(),
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"), "{rendered}");
        assert!(rendered.contains("<redacted>"));
    }
}
