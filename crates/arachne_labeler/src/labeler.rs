//! Labeling of created posts.

use crate::blob::BlobFetcher;
use crate::error::LabelerResult;
use crate::moderation::{is_supported_media_type, normalize_verdict, Moderator};
use arachne_protocol::{CreatedRecord, Image, Label, Post};
use arachne_server::LabelLog;
use chrono::{SecondsFormat, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to the images of one post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelReport {
    /// Images whose labels were both appended.
    pub labeled: usize,
    /// Images with a media type the moderator cannot read.
    pub skipped: usize,
    /// Images where fetching, classifying or appending failed.
    pub failed: usize,
    /// Failures that could succeed if the post were labeled again.
    /// Also counted in `failed`.
    pub transient: usize,
}

impl LabelReport {
    /// Total images seen.
    pub fn images(&self) -> usize {
        self.labeled + self.skipped + self.failed
    }

    /// Adds another report's counts to this one.
    pub fn merge(&mut self, other: LabelReport) {
        self.labeled += other.labeled;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.transient += other.transient;
    }
}

/// Classifies the images of created posts and publishes their labels.
///
/// Each image yields two labels with the same verdict: one keyed by the
/// post's content hash on the post log, one keyed by the image's content
/// hash on the image log. Both carry the post URI.
pub struct Labeler {
    moderator: Arc<dyn Moderator>,
    fetcher: Arc<dyn BlobFetcher>,
    post_log: Arc<dyn LabelLog>,
    image_log: Arc<dyn LabelLog>,
}

impl Labeler {
    /// Creates a labeler from its collaborators.
    pub fn new(
        moderator: Arc<dyn Moderator>,
        fetcher: Arc<dyn BlobFetcher>,
        post_log: Arc<dyn LabelLog>,
        image_log: Arc<dyn LabelLog>,
    ) -> Self {
        Self {
            moderator,
            fetcher,
            post_log,
            image_log,
        }
    }

    /// Returns the post label log.
    pub fn post_log(&self) -> &Arc<dyn LabelLog> {
        &self.post_log
    }

    /// Returns the image label log.
    pub fn image_log(&self) -> &Arc<dyn LabelLog> {
        &self.image_log
    }

    /// Labels every image of `post`, in embed order.
    ///
    /// Failures are logged and counted. Labels already appended for earlier
    /// images stay in place.
    pub async fn label_post(&self, post: &CreatedRecord<Post>) -> LabelReport {
        let mut report = LabelReport::default();
        let images = post.record.images();
        if images.is_empty() {
            return report;
        }
        debug!(uri = %post.uri, images = images.len(), "labeling post");

        for (idx, image) in images.iter().enumerate() {
            let mime_type = image.blob.mime_type.as_str();
            if !is_supported_media_type(mime_type) {
                debug!(uri = %post.uri, idx, mime_type, "skipping unsupported media type");
                report.skipped += 1;
                continue;
            }
            match self.label_image(post, image).await {
                Ok(verdict) => {
                    info!(uri = %post.uri, image = %image.blob.content_hash, verdict = %verdict, "labeled image");
                    report.labeled += 1;
                }
                Err(e) => {
                    let transient = e.is_transient();
                    warn!(uri = %post.uri, image = %image.blob.content_hash, transient, error = %e, "failed to label image");
                    report.failed += 1;
                    if transient {
                        report.transient += 1;
                    }
                }
            }
        }
        report
    }

    async fn label_image(&self, post: &CreatedRecord<Post>, image: &Image) -> LabelerResult<String> {
        let image_cid = &image.blob.content_hash;
        let bytes = self.fetcher.fetch(&post.author, image_cid).await?;
        let raw = self.moderator.classify(&bytes, &image.blob.mime_type).await?;
        let verdict = normalize_verdict(&raw);

        let uri = post.uri.to_string();
        let cts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

        let post_label = Label::new(
            post.author.as_str(),
            uri.as_str(),
            Some(post.cid.clone()),
            verdict.as_str(),
            cts.as_str(),
        );
        self.post_log.append(&post.cid.to_string(), post_label)?;

        let image_label = Label::new(
            post.author.as_str(),
            uri,
            Some(image_cid.clone()),
            verdict.as_str(),
            cts,
        );
        self.image_log.append(&image_cid.to_string(), image_label)?;

        Ok(verdict)
    }
}
