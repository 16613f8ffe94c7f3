//! Local development server.
//!
//! Simulates the edge deployment on one port: serves the single-page app from
//! a static directory and adapts plain HTTP requests on the callback path
//! into the edge event shape the handler consumes. OAuth secrets come from
//! environment variables and are injected as `x-oauth-*` headers on the
//! synthetic event, which is exactly why this module sits behind the
//! `dev-server` feature and never ships to the edge.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    body::Body,
    extract::{RawQuery, State},
    http::{HeaderMap, Response, StatusCode},
    response::{IntoResponse, Json, Redirect},
    routing::get,
    Router,
};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::info;

use crate::auth::config::HeaderConfigResolver;
use crate::auth::pkce::{authorization_url, PkceVerifier};
use crate::auth::state::{encode_state, StatePayload};
use crate::edge::response::CookieMode;
use crate::edge::{CallbackEvent, CallbackResponse, CfRecord, EdgeRequest, EventRecord, HeaderEntry};
use crate::handler::{CallbackHandler, CALLBACK_PATH};

/// Development configuration, read once at startup. No Debug derive: the
/// client secret stays out of log output even here.
#[derive(Clone)]
pub struct DevSettings {
    pub client_id: String,
    pub client_secret: String,
    pub port: u16,
    pub frontend_url: String,
    pub static_dir: PathBuf,
}

impl DevSettings {
    /// Environment contract matches the original dev tooling:
    /// `GOOGLE_OAUTH_CLIENT_ID`, `GOOGLE_OAUTH_CLIENT_SECRET`, optional
    /// `PORT` (default 5173) and `STATIC_DIR` (default `./site`).
    pub fn from_env() -> anyhow::Result<Self> {
        let client_id =
            env::var("GOOGLE_OAUTH_CLIENT_ID").context("GOOGLE_OAUTH_CLIENT_ID not set")?;
        let client_secret =
            env::var("GOOGLE_OAUTH_CLIENT_SECRET").context("GOOGLE_OAUTH_CLIENT_SECRET not set")?;
        let port = env::var("PORT")
            .ok()
            .and_then(|port| port.parse().ok())
            .unwrap_or(5173);
        let static_dir = env::var("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./site"));
        Ok(Self {
            client_id,
            client_secret,
            port,
            frontend_url: format!("http://localhost:{port}"),
            static_dir,
        })
    }
}

/// Application state shared across dev routes.
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<CallbackHandler>,
    pub settings: Arc<DevSettings>,
}

/// Build the dev router: callback adapter, login initiation, health check and
/// static SPA serving with an index.html fallback for client-side routing.
pub fn router(state: AppState) -> Router {
    let static_dir = state.settings.static_dir.clone();
    let spa = ServeDir::new(&static_dir)
        .not_found_service(ServeFile::new(static_dir.join("index.html")));

    Router::new()
        .route(CALLBACK_PATH, get(oauth_callback))
        .route("/oauth/login", get(oauth_login))
        .route("/health", get(health))
        .fallback_service(spa)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the development server.
pub async fn start_server(settings: DevSettings) -> anyhow::Result<()> {
    let handler = Arc::new(CallbackHandler::new(
        Arc::new(HeaderConfigResolver),
        CookieMode::Development,
    ));
    let settings = Arc::new(settings);
    let addr = format!("127.0.0.1:{}", settings.port);
    let app = router(AppState {
        handler,
        settings: settings.clone(),
    });

    let listener = TcpListener::bind(&addr).await?;
    info!("development server listening on http://{addr}");
    info!("  GET  http://{addr}/              - static site");
    info!("  GET  http://{addr}/oauth/login    - start OAuth flow");
    info!("  GET  http://{addr}{CALLBACK_PATH} - OAuth token exchange");
    info!("  GET  http://{addr}/health         - health check");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Adapt the plain HTTP request into the edge event shape, invoke the
/// handler, and translate its response back.
async fn oauth_callback(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response<Body> {
    let event = build_event(&state.settings, query.unwrap_or_default(), &headers);
    let callback = state.handler.handle(event).await;
    into_http_response(callback)
}

/// Flow initiation, standing in for the frontend's script: generate PKCE and
/// CSRF material, pack it into the state blob, redirect to the provider.
async fn oauth_login(State(state): State<AppState>) -> Redirect {
    let pkce = PkceVerifier::generate();
    let csrf: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    let blob = encode_state(&StatePayload {
        csrf,
        verifier: pkce.verifier.clone(),
    });
    let redirect_uri = format!("{}{CALLBACK_PATH}", state.settings.frontend_url);
    let url = authorization_url(&state.settings.client_id, &redirect_uri, &blob, &pkce.challenge);
    Redirect::temporary(&url)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "client_id_configured": !state.settings.client_id.is_empty(),
        "client_secret_configured": !state.settings.client_secret.is_empty(),
    }))
}

fn build_event(settings: &DevSettings, querystring: String, headers: &HeaderMap) -> CallbackEvent {
    let mut cf_headers: HashMap<String, Vec<HeaderEntry>> = HashMap::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            cf_headers
                .entry(name.as_str().to_ascii_lowercase())
                .or_default()
                .push(HeaderEntry::new(name.as_str(), value));
        }
    }

    // Config injection the deployed stack gets from the secret store.
    cf_headers.insert(
        "x-oauth-client-id".to_string(),
        vec![HeaderEntry::new("X-OAuth-Client-Id", &settings.client_id)],
    );
    cf_headers.insert(
        "x-oauth-client-secret".to_string(),
        vec![HeaderEntry::new(
            "X-OAuth-Client-Secret",
            &settings.client_secret,
        )],
    );
    cf_headers.insert(
        "x-oauth-frontend-url".to_string(),
        vec![HeaderEntry::new(
            "X-OAuth-Frontend-URL",
            &settings.frontend_url,
        )],
    );

    CallbackEvent {
        records: vec![EventRecord {
            cf: CfRecord {
                request: EdgeRequest {
                    uri: CALLBACK_PATH.to_string(),
                    querystring,
                    headers: cf_headers,
                    method: "GET".to_string(),
                },
            },
        }],
    }
}

fn into_http_response(callback: CallbackResponse) -> Response<Body> {
    let status = callback
        .status
        .parse::<u16>()
        .ok()
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut builder = Response::builder().status(status);
    for entries in callback.headers.values() {
        for entry in entries {
            builder = builder.header(entry.key.as_str(), entry.value.as_str());
        }
    }
    builder
        .body(Body::empty())
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
