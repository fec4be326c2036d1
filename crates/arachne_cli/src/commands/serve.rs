//! Serve command implementation.

use super::replay::frame_files;
use anyhow::{Context, Result};
use arachne_labeler::{
    FrameIngestor, HttpModerator, IngestOutcome, LabelReport, Labeler, LabelerConfig,
    XrpcBlobFetcher,
};
use arachne_server::{HttpServer, LabelLog, MemoryLabelLog, ServerConfig, SubscriptionServer};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Options for the serve command.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// Listen address.
    pub bind: SocketAddr,
    /// Maximum cursor distance behind the tail.
    pub max_lookback: u64,
    /// Directory of captured frames to label while serving.
    pub frames: Option<PathBuf>,
    /// Moderation and blob settings.
    pub labeler: LabelerConfig,
}

/// Totals from replaying a frame directory through the labeler.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestTotals {
    /// Frames read.
    pub frames: usize,
    /// Frames dropped as unreadable.
    pub dropped: usize,
    /// Created posts seen.
    pub posts: usize,
    /// Combined labeling results.
    pub report: LabelReport,
}

/// Feeds every frame in `dir`, in name order, through `ingestor`.
pub async fn ingest_dir(ingestor: &FrameIngestor, dir: &Path) -> Result<IngestTotals> {
    let mut totals = IngestTotals::default();
    for path in frame_files(dir)? {
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let outcome = ingestor.ingest(&bytes).await;
        totals.frames += 1;
        if outcome.is_dropped() {
            totals.dropped += 1;
        }
        if let IngestOutcome::Processed { posts, report, .. } = outcome {
            totals.posts += posts;
            totals.report.merge(report);
        }
    }
    Ok(totals)
}

fn live_ingestor(
    config: &LabelerConfig,
    post_log: Arc<dyn LabelLog>,
    image_log: Arc<dyn LabelLog>,
) -> Result<FrameIngestor> {
    let moderator = HttpModerator::new(config).context("Failed to configure moderation client")?;
    let fetcher = XrpcBlobFetcher::new(config).context("Failed to configure blob fetcher")?;
    Ok(FrameIngestor::new(Labeler::new(
        Arc::new(moderator),
        Arc::new(fetcher),
        post_log,
        image_log,
    )))
}

/// Runs the serve command until interrupted.
pub async fn run(options: ServeOptions) -> Result<()> {
    let post_log: Arc<dyn LabelLog> = Arc::new(MemoryLabelLog::new());
    let image_log: Arc<dyn LabelLog> = Arc::new(MemoryLabelLog::new());

    if let Some(dir) = options.frames.clone() {
        let ingestor = live_ingestor(&options.labeler, post_log.clone(), image_log.clone())?;
        tokio::spawn(async move {
            match ingest_dir(&ingestor, &dir).await {
                Ok(totals) => info!(
                    frames = totals.frames,
                    dropped = totals.dropped,
                    posts = totals.posts,
                    labeled = totals.report.labeled,
                    failed = totals.report.failed,
                    transient = totals.report.transient,
                    "finished replaying captured frames"
                ),
                Err(e) => warn!(error = %e, "frame replay stopped"),
            }
        });
    }

    let config = ServerConfig::new(options.bind).with_max_allowed_lookback(options.max_lookback);
    let server = HttpServer::new(SubscriptionServer::new(config, post_log));
    server
        .serve_with_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutting down");
            }
        })
        .await?;
    Ok(())
}
