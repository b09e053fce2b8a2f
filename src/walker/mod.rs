//! Traversal of every image position of one post
//!
//! The walker visits positions `1..=total` strictly in order on a single
//! session. Failures at one position are recorded and never stop the walk;
//! only reaching the post itself and counting its images can fail the run.

use crate::error::{Error, Result};
use crate::fetcher::ImageFetcher;
use crate::resolver::SelectorResolver;
use crate::session::PageSession;
use crate::types::{DownloadOutcome, ImageIndex, PostReference, RunSummary};
use crate::utils::image_path;
use std::path::Path;
use std::time::Duration;

/// Drives a session across the positions of a post
pub struct PostWalker<'a, F: ImageFetcher> {
    resolver: &'a SelectorResolver,
    fetcher: &'a F,
    navigation_timeout: Duration,
}

impl<'a, F: ImageFetcher> PostWalker<'a, F> {
    /// Create a walker; each navigation is bounded by `navigation_timeout`
    pub fn new(resolver: &'a SelectorResolver, fetcher: &'a F, navigation_timeout: Duration) -> Self {
        Self {
            resolver,
            fetcher,
            navigation_timeout,
        }
    }

    /// Download every image of `post` into `output_dir`
    ///
    /// `output_dir` must already exist. Returns an error only when the post
    /// page cannot be reached or its image count cannot be determined.
    pub async fn walk<S: PageSession>(
        &self,
        session: &S,
        post: &PostReference,
        output_dir: &Path,
    ) -> Result<RunSummary> {
        self.navigate(session, post.base_url().as_str()).await?;
        let total = self.resolver.discover_image_count(session).await?;
        tracing::info!(post_id = %post, total, "Found {} images in post", total);

        let mut summary = RunSummary::new(post, output_dir.to_path_buf(), total);

        for index in ImageIndex::all(total) {
            let url = post.image_url(index);
            tracing::info!(post_id = %post, index = %index, total, url = %url, "Visiting image {}/{}", index, total);

            let (resolved, outcome) = self.visit(session, &url, index, output_dir).await;
            match &outcome {
                DownloadOutcome::Saved { path, bytes } => {
                    tracing::info!(index = %index, path = %path.display(), bytes, "Saved image");
                }
                DownloadOutcome::ExtractionFailed { reason } => {
                    tracing::warn!(index = %index, reason = %reason, "No image address for position");
                }
                DownloadOutcome::FetchFailed { reason } => {
                    tracing::warn!(index = %index, reason = %reason, "Image download failed");
                }
            }
            summary.record(index, resolved, outcome);
        }

        summary.finish();
        Ok(summary)
    }

    /// One position: navigate, extract, fetch
    async fn visit<S: PageSession>(
        &self,
        session: &S,
        url: &str,
        index: ImageIndex,
        output_dir: &Path,
    ) -> (Option<String>, DownloadOutcome) {
        if let Err(e) = self.navigate(session, url).await {
            return (
                None,
                DownloadOutcome::ExtractionFailed {
                    reason: e.to_string(),
                },
            );
        }

        let Some(image_url) = self.resolver.extract_image_url(session).await else {
            return (
                None,
                DownloadOutcome::ExtractionFailed {
                    reason: "no image address found on page".to_string(),
                },
            );
        };
        tracing::debug!(index = %index, image_url = %image_url, "Found image address");

        let destination = image_path(output_dir, index);
        let outcome = match self.fetcher.fetch(&image_url, &destination).await {
            Ok(bytes) => DownloadOutcome::Saved {
                path: destination,
                bytes,
            },
            Err(e) => DownloadOutcome::FetchFailed {
                reason: e.to_string(),
            },
        };
        (Some(image_url), outcome)
    }

    async fn navigate<S: PageSession>(&self, session: &S, url: &str) -> Result<()> {
        match tokio::time::timeout(self.navigation_timeout, session.navigate(url)).await {
            Ok(result) => result,
            Err(_) => Err(Error::NavigationTimeout {
                url: url.to_string(),
                timeout: self.navigation_timeout,
            }),
        }
    }
}
