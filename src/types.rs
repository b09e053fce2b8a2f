//! Core types for carousel-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

use crate::error::{Error, Result};

/// Path segments that precede the post identifier in a post address
const POST_PATH_MARKERS: [&str; 2] = ["p", "reel"];

/// Identifier and base address of one post
///
/// Derived once from the caller's address and never modified afterwards. The
/// identifier names the output directory; the base address is the page every
/// per-image navigation is built from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostReference {
    id: String,
    base_url: Url,
}

impl PostReference {
    /// Parse a post address such as `https://www.instagram.com/p/DEcJnGD/`
    ///
    /// The identifier is the path segment right after `/p/` (or `/reel/`).
    /// Query string and fragment of the input are dropped from the base address.
    ///
    /// # Examples
    ///
    /// ```
    /// use carousel_dl::types::PostReference;
    ///
    /// let post = PostReference::parse("https://www.instagram.com/p/ABC123/?utm_source=x").unwrap();
    /// assert_eq!(post.id(), "ABC123");
    /// assert_eq!(post.base_url().as_str(), "https://www.instagram.com/p/ABC123/");
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidPostUrl {
            url: input.to_string(),
            reason: reason.to_string(),
        };

        let mut url = Url::parse(input.trim()).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("only http and https addresses are supported"));
        }

        let id = {
            let mut segments = url
                .path_segments()
                .ok_or_else(|| invalid("address has no path"))?;
            segments
                .by_ref()
                .find(|segment| POST_PATH_MARKERS.contains(segment))
                .ok_or_else(|| invalid("no /p/ or /reel/ segment in path"))?;
            segments.next().unwrap_or_default().to_string()
        };
        if id.is_empty() {
            return Err(invalid("post identifier is empty"));
        }

        url.set_query(None);
        url.set_fragment(None);

        Ok(Self { id, base_url: url })
    }

    /// Post identifier, used as the output directory name
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Post address without query or fragment
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Address of the presentation state for one carousel position
    ///
    /// ```
    /// use carousel_dl::types::{ImageIndex, PostReference};
    ///
    /// let post = PostReference::parse("https://www.instagram.com/p/ABC123/").unwrap();
    /// let index = ImageIndex::new(2).unwrap();
    /// assert_eq!(post.image_url(index), "https://www.instagram.com/p/ABC123/?img_index=2");
    /// ```
    pub fn image_url(&self, index: ImageIndex) -> String {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("img_index", &index.get().to_string());
        url.into()
    }
}

impl std::fmt::Display for PostReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// 1-based position of an image within a post
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageIndex(u32);

impl ImageIndex {
    /// Create an index; zero is not a valid position
    pub fn new(index: u32) -> Option<Self> {
        (index > 0).then_some(Self(index))
    }

    /// Get the inner value
    pub fn get(&self) -> u32 {
        self.0
    }

    /// All positions of a post with `total` images, in display order
    ///
    /// A total of zero is treated as a single-image post.
    pub fn all(total: u32) -> impl Iterator<Item = ImageIndex> {
        (1..=total.max(1)).map(ImageIndex)
    }
}

impl std::fmt::Display for ImageIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What happened to one image of the post
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadOutcome {
    /// Image written to disk
    Saved {
        /// Final file path
        path: PathBuf,
        /// Bytes written
        bytes: u64,
    },
    /// No image address could be found for this position (or the page never settled)
    ExtractionFailed {
        /// Human-readable cause
        reason: String,
    },
    /// An address was found but downloading it failed
    FetchFailed {
        /// Human-readable cause
        reason: String,
    },
}

impl DownloadOutcome {
    /// Whether the image ended up on disk
    pub fn is_saved(&self) -> bool {
        matches!(self, DownloadOutcome::Saved { .. })
    }
}

/// Per-image record in a [`RunSummary`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Carousel position
    pub index: ImageIndex,
    /// Resolved image address, if extraction succeeded
    pub url: Option<String>,
    /// Result for this position
    #[serde(flatten)]
    pub outcome: DownloadOutcome,
}

/// Result of a completed run over one post
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    /// Post identifier
    pub post_id: String,
    /// Post base address
    pub post_url: String,
    /// Directory the images were written to
    pub output_dir: PathBuf,
    /// Number of images discovered in the post
    pub total_images: u32,
    /// One record per visited position, in visiting order
    pub images: Vec<ImageRecord>,
    /// When the walk started
    pub started_at: DateTime<Utc>,
    /// When the walk ended
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    /// Start an empty summary for a post
    pub fn new(post: &PostReference, output_dir: PathBuf, total_images: u32) -> Self {
        let now = Utc::now();
        Self {
            post_id: post.id().to_string(),
            post_url: post.base_url().to_string(),
            output_dir,
            total_images,
            images: Vec::with_capacity(total_images as usize),
            started_at: now,
            finished_at: now,
        }
    }

    /// Append the outcome for one position
    pub fn record(&mut self, index: ImageIndex, url: Option<String>, outcome: DownloadOutcome) {
        self.images.push(ImageRecord {
            index,
            url,
            outcome,
        });
    }

    /// Stamp the finish time
    pub fn finish(&mut self) {
        self.finished_at = Utc::now();
    }

    /// Number of images written to disk
    pub fn saved(&self) -> usize {
        self.images.iter().filter(|r| r.outcome.is_saved()).count()
    }

    /// Number of positions without a usable image address
    pub fn extraction_failures(&self) -> usize {
        self.images
            .iter()
            .filter(|r| matches!(r.outcome, DownloadOutcome::ExtractionFailed { .. }))
            .count()
    }

    /// Number of positions whose download failed
    pub fn fetch_failures(&self) -> usize {
        self.images
            .iter()
            .filter(|r| matches!(r.outcome, DownloadOutcome::FetchFailed { .. }))
            .count()
    }

    /// Every discovered image was saved
    pub fn is_complete(&self) -> bool {
        self.saved() == self.total_images as usize
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Post {}: found {}, saved {}, extraction failures {}, fetch failures {}",
            self.post_id,
            self.total_images,
            self.saved(),
            self.extraction_failures(),
            self.fetch_failures()
        )?;
        for record in &self.images {
            match &record.outcome {
                DownloadOutcome::Saved { path, bytes } => {
                    writeln!(f, "  [{}] saved {} ({} bytes)", record.index, path.display(), bytes)?
                }
                DownloadOutcome::ExtractionFailed { reason } => {
                    writeln!(f, "  [{}] extraction failed: {}", record.index, reason)?
                }
                DownloadOutcome::FetchFailed { reason } => {
                    writeln!(f, "  [{}] fetch failed: {}", record.index, reason)?
                }
            }
        }
        Ok(())
    }
}
