//! PKCE verifier/challenge generation and the provider authorization URL.
//!
//! In the deployed flow the browser generates this material before redirecting
//! to the provider; the handler only ever consumes the verifier it gets back
//! inside the state blob. The generator lives here for the development login
//! endpoint and for building realistic state blobs in tests.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::Rng;
use sha2::{Digest, Sha256};

pub const GOOGLE_AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// PKCE verifier and its S256 challenge.
#[derive(Debug, Clone)]
pub struct PkceVerifier {
    pub verifier: String,
    pub challenge: String,
}

impl PkceVerifier {
    /// Generate a new random verifier (43 URL-safe base64 chars, within the
    /// RFC 7636 43-128 range) and its SHA-256 challenge.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let random_bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
        let verifier = URL_SAFE_NO_PAD.encode(&random_bytes);
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self { verifier, challenge }
    }
}

/// Build the Google authorization URL carrying the PKCE challenge and the
/// encoded state blob.
pub fn authorization_url(
    client_id: &str,
    redirect_uri: &str,
    state: &str,
    challenge: &str,
) -> String {
    let mut url = url::Url::parse(GOOGLE_AUTH_ENDPOINT).expect("valid authorization endpoint");
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", "openid email profile")
        .append_pair("code_challenge", challenge)
        .append_pair("code_challenge_method", "S256")
        .append_pair("state", state);
    url.to_string()
}
