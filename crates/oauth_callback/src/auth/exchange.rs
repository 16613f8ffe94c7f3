//! Authorization-code-for-token exchange against the provider.
//!
//! This flow is a confidential client that also sends the PKCE verifier, so
//! the form body carries both the client secret and `code_verifier`. Every
//! failure mode resolves to an [`OAuthError`]; nothing propagates a raw
//! transport or decode error past this boundary.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::auth::config::OAuthConfig;

use super::OAuthError;

pub const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Hard cap on the exchange POST, under the host's 5s execution ceiling. A
/// provider hang must surface as `network_error` before the host kills the
/// invocation without a response.
pub const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(4);

/// Successful token response. Fields beyond the access token are passed
/// through without interpretation.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// HTTP client for the provider's token endpoint.
pub struct TokenExchanger {
    client: reqwest::Client,
    token_url: String,
}

impl TokenExchanger {
    pub fn new() -> Self {
        Self::custom(GOOGLE_TOKEN_ENDPOINT, EXCHANGE_TIMEOUT)
    }

    /// Endpoint and timeout overrides are for tests pointing at a local mock.
    pub fn custom(token_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        Self {
            client,
            token_url: token_url.into(),
        }
    }

    /// Exchange an authorization code for an access token.
    ///
    /// Non-2xx responses surface the provider's own `error` code when the
    /// body is parseable JSON, `token_exchange_failed` otherwise. Transport
    /// failures (timeout, DNS, reset) become `network_error`.
    pub async fn exchange(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
        config: &OAuthConfig,
    ) -> Result<TokenGrant, OAuthError> {
        let form = [
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        let response = match self.client.post(&self.token_url).form(&form).send().await {
            Ok(response) => response,
            Err(err) => {
                // reqwest errors never carry the form body, so this is safe
                warn!("token exchange transport failure: {err}");
                return Err(OAuthError::NetworkError);
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let err = provider_error_code(&body);
            warn!(%status, code = err.code(), "token endpoint rejected exchange");
            return Err(err);
        }

        match response.json::<TokenGrant>().await {
            Ok(grant) => Ok(grant),
            Err(err) => {
                warn!("token response body was not valid JSON: {err}");
                Err(OAuthError::NetworkError)
            }
        }
    }
}

impl Default for TokenExchanger {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a non-2xx provider body to its `error` code, or the generic code when
/// the body is not JSON or lacks an `error` field.
fn provider_error_code(body: &str) -> OAuthError {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => match value.get("error").and_then(Value::as_str) {
            Some(code) => OAuthError::Exchange(code.to_string()),
            None => OAuthError::TokenExchangeFailed,
        },
        Err(_) => OAuthError::TokenExchangeFailed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn config() -> OAuthConfig {
        OAuthConfig {
            client_id: "client-1".into(),
            client_secret: "secret-1".into(),
            frontend_url: "http://localhost:5173".into(),
        }
    }

    #[tokio::test]
    async fn successful_exchange_sends_full_form_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("client_id".into(), "client-1".into()),
                Matcher::UrlEncoded("client_secret".into(), "secret-1".into()),
                Matcher::UrlEncoded("code".into(), "auth-code".into()),
                Matcher::UrlEncoded("code_verifier".into(), "verifier-x".into()),
                Matcher::UrlEncoded(
                    "redirect_uri".into(),
                    "https://example.com/oauth/callback".into(),
                ),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token":"T","token_type":"Bearer","expires_in":3599}"#)
            .create_async()
            .await;

        let exchanger =
            TokenExchanger::custom(format!("{}/token", server.url()), EXCHANGE_TIMEOUT);
        let grant = exchanger
            .exchange(
                "auth-code",
                "verifier-x",
                "https://example.com/oauth/callback",
                &config(),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(grant.access_token.as_deref(), Some("T"));
        assert_eq!(grant.token_type.as_deref(), Some("Bearer"));
        assert_eq!(grant.expires_in, Some(3599));
    }

    #[tokio::test]
    async fn passthrough_fields_survive() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token":"T","scope":"openid","id_token":"jwt"}"#)
            .create_async()
            .await;

        let exchanger =
            TokenExchanger::custom(format!("{}/token", server.url()), EXCHANGE_TIMEOUT);
        let grant = exchanger
            .exchange("c", "v", "https://x/oauth/callback", &config())
            .await
            .unwrap();
        assert_eq!(grant.extra["scope"], "openid");
        assert_eq!(grant.extra["id_token"], "jwt");
    }

    #[tokio::test]
    async fn provider_error_code_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant","error_description":"Bad code"}"#)
            .create_async()
            .await;

        let exchanger =
            TokenExchanger::custom(format!("{}/token", server.url()), EXCHANGE_TIMEOUT);
        let err = exchanger
            .exchange("c", "v", "https://x/oauth/callback", &config())
            .await
            .unwrap_err();
        assert_eq!(err, OAuthError::Exchange("invalid_grant".into()));
    }

    #[tokio::test]
    async fn unparseable_error_body_is_generic() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(502)
            .with_body("Bad Gateway")
            .create_async()
            .await;

        let exchanger =
            TokenExchanger::custom(format!("{}/token", server.url()), EXCHANGE_TIMEOUT);
        let err = exchanger
            .exchange("c", "v", "https://x/oauth/callback", &config())
            .await
            .unwrap_err();
        assert_eq!(err, OAuthError::TokenExchangeFailed);
    }

    #[tokio::test]
    async fn json_error_body_without_error_field_is_generic() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"message":"nope"}"#)
            .create_async()
            .await;

        let exchanger =
            TokenExchanger::custom(format!("{}/token", server.url()), EXCHANGE_TIMEOUT);
        let err = exchanger
            .exchange("c", "v", "https://x/oauth/callback", &config())
            .await
            .unwrap_err();
        assert_eq!(err, OAuthError::TokenExchangeFailed);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_network_error() {
        // Nothing listens on this port.
        let exchanger = TokenExchanger::custom(
            "http://127.0.0.1:9/token",
            Duration::from_millis(500),
        );
        let err = exchanger
            .exchange("c", "v", "https://x/oauth/callback", &config())
            .await
            .unwrap_err();
        assert_eq!(err, OAuthError::NetworkError);
    }

    #[tokio::test]
    async fn hung_endpoint_times_out_as_network_error() {
        // Accepts the connection and never responds.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _conn = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let exchanger = TokenExchanger::custom(
            format!("http://{addr}/token"),
            Duration::from_millis(300),
        );
        let start = std::time::Instant::now();
        let err = exchanger
            .exchange("c", "v", "https://x/oauth/callback", &config())
            .await
            .unwrap_err();
        assert_eq!(err, OAuthError::NetworkError);
        assert!(start.elapsed() < Duration::from_secs(2), "must not hang");
    }

    #[tokio::test]
    async fn non_json_success_body_is_network_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let exchanger =
            TokenExchanger::custom(format!("{}/token", server.url()), EXCHANGE_TIMEOUT);
        let err = exchanger
            .exchange("c", "v", "https://x/oauth/callback", &config())
            .await
            .unwrap_err();
        assert_eq!(err, OAuthError::NetworkError);
    }
}
