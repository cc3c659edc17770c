//! Rumormill - forum thread acquisition and toxicity research system.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rumormill=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    rumormill::cli::run().await
}
