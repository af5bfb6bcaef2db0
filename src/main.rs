use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;

use harvester::config::Config;
use harvester::scraper::Scraper;
use harvester::storage::{Database, DatabaseError};

#[derive(Parser, Debug)]
#[command(name = "harvester", about = "Background RSS polling service")]
struct Args {
    /// Path to the config file
    #[arg(long, value_name = "FILE", default_value = "harvester.toml")]
    config: PathBuf,

    /// Register a feed source and exit
    #[arg(long, value_name = "URL")]
    add_feed: Option<String>,

    /// Display title for --add-feed (defaults to the URL)
    #[arg(long, requires = "add_feed")]
    title: Option<String>,

    /// Print the most recent posts and exit
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = Config::load(&args.config).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let db = match Database::open(&config.database_path).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of harvester appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    // One-shot registration path; feed rows normally arrive through the
    // store from elsewhere.
    if let Some(feed_url) = &args.add_feed {
        let parsed = url::Url::parse(feed_url)
            .with_context(|| format!("Invalid feed URL: {}", feed_url))?;
        anyhow::ensure!(
            matches!(parsed.scheme(), "http" | "https"),
            "Feed URL must be http or https, got '{}'",
            parsed.scheme()
        );

        let title = args.title.as_deref().unwrap_or(feed_url);
        let id = db
            .insert_source(feed_url, title, None)
            .await
            .context("Failed to register feed")?;
        println!("Registered feed {} ({})", id, feed_url);
        return Ok(());
    }

    if args.list {
        let posts = db.recent_posts(20).await.context("Failed to list posts")?;
        if posts.is_empty() {
            println!("No posts yet.");
        }
        for post in posts {
            let published = chrono::DateTime::from_timestamp(post.published_at, 0)
                .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| post.published_at.to_string());
            println!("[{}] {} — {}", published, post.title, post.url);
        }
        return Ok(());
    }

    let source_count = db.count_sources().await.context("Failed to count feeds")?;
    tracing::info!(feeds = source_count, database = %config.database_path, "Starting harvester");
    if source_count == 0 {
        eprintln!("Warning: no feeds registered. Add one with --add-feed <URL>.");
    }

    let client = reqwest::Client::new();
    let scraper = Scraper::new(
        db,
        client,
        Duration::from_secs(config.interval_seconds),
        config.concurrency,
        Duration::from_secs(config.request_timeout_seconds),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = shutdown_tx.send(true);
    });

    scraper.run(shutdown_rx).await;

    tracing::info!("Stopped");
    Ok(())
}

/// Block until SIGINT or SIGTERM.
///
/// On non-Unix platforms only Ctrl+C is handled.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down gracefully"),
            _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT, shutting down gracefully"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Received Ctrl+C, shutting down gracefully");
    }
}
