//! thumbwatch server entry point.
//!
//! Boots the MCP server on stdio transport and, unless disabled, the
//! background scan scheduler. Logging goes to stderr to avoid interfering
//! with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use thumbwatch_core::{
    AppConfig, CacheDb, HistoryRetention, ImageSource, Rebuilder, Scheduler, SchedulerConfig, StatusService,
    ThumbnailGenerator,
};
use thumbwatch_media::{FsImageSource, ImageThumbnailGenerator};
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    tracing::info!(
        gallery_root = %config.gallery_root.display(),
        thumbs_dir = %config.thumbs_dir.display(),
        db_path = %config.db_path.display(),
        "Starting thumbwatch server on stdio transport"
    );

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open cache database {}", config.db_path.display()))?;

    let source: Arc<dyn ImageSource> =
        Arc::new(FsImageSource::new(&config.gallery_root).exclude(&config.thumbs_dir));
    let generator: Arc<dyn ThumbnailGenerator> = Arc::new(ImageThumbnailGenerator::new(
        &config.gallery_root,
        &config.thumbs_dir,
        config.thumbnail_size,
    ));

    let status = StatusService::new(db.clone(), source.clone(), config.batch_limit, config.batch_concurrency);
    let rebuilder = Rebuilder::new(db.clone(), source.clone(), generator);
    let retention = HistoryRetention::new(db.clone(), config.retention_hours);

    let scheduler = Scheduler::new(
        db.clone(),
        source,
        status.clone(),
        rebuilder.clone(),
        SchedulerConfig {
            interval: config.scan_interval(),
            concurrency: config.scan_concurrency,
            prune_orphans: config.prune_orphans,
        },
    );
    if config.scheduler_enabled {
        scheduler.start();
    } else {
        tracing::info!("scheduler disabled by configuration");
    }

    let handler = handler::ThumbwatchServer::new(db, status, rebuilder, retention);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
