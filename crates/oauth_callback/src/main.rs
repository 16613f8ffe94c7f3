// Development server binary
//
// Serves the single-page app and simulates the edge callback handler locally.
// The deployed artifact is the library handler behind the CDN; this binary is
// only built with the dev-server feature and never ships.

use oauth_callback::server::{start_server, DevSettings};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let settings = DevSettings::from_env()?;
    info!(
        client_id = %settings.client_id,
        static_dir = %settings.static_dir.display(),
        "starting development server"
    );

    start_server(settings).await
}
