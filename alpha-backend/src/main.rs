//! alpha-backend
//!
//! HTTP service for zk-email and Binance account onboarding.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use alpha_backend::{serve, AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "alpha_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;
    serve(config).await
}
