use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ogp_feed::config::Config;
use ogp_feed::db::Database;
use ogp_feed::fetcher::{run, Fetcher};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries only the JSON document
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ogp_feed=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config = Config::load("feed.toml")?;
    info!("Loaded configuration for {}", config.feed_url);

    let fetcher = Fetcher::new(config.content_type)?;

    // Initialize database
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:ogp_feed.db?mode=rwc".to_string());
    let db = Database::new(&database_url).await?;
    db.seed(&config.media).await?;
    info!("Database initialized");

    let stdout = std::io::stdout();
    run(&fetcher, &db, &config.feed_url, &mut stdout.lock()).await;

    Ok(())
}
