use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xinsight_api_rest::AppState;
use xinsight_core::constants::DEFAULT_REST_ADDR;
use xinsight_core::{CoreConfig, HttpAnalysisClient};

/// Main entry point for the X-Insight page shell
///
/// Resolves configuration once, builds the inference client and serves the REST page shell.
///
/// # Environment Variables
/// - `XINSIGHT_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `XINSIGHT_ANALYSIS_URL`: inference service base URL
/// - `XINSIGHT_ANALYSIS_TIMEOUT_SECS`: optional request timeout
/// - `XINSIGHT_MAX_UPLOAD_BYTES`: intake size limit
/// - `XINSIGHT_PREVIEW_DIR`: directory for upload previews
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - configuration is invalid or the preview directory cannot be created,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("xinsight_run=info".parse()?)
                .add_directive("xinsight_core=info".parse()?)
                .add_directive("xinsight_api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr =
        std::env::var("XINSIGHT_REST_ADDR").unwrap_or_else(|_| DEFAULT_REST_ADDR.into());

    let cfg = Arc::new(CoreConfig::from_env()?);
    let client = Arc::new(HttpAnalysisClient::new(&cfg)?);

    tracing::info!("++ Starting X-Insight REST on {}", rest_addr);
    tracing::info!("++ Analysis endpoint {}", client.endpoint());

    let state = AppState::new(cfg, client)?;
    xinsight_api_rest::serve(&rest_addr, state).await
}
