//! Extraction strategies for the image address of a rendered post

use crate::error::Result;
use crate::session::{ImageCandidate, PageQuery};
use async_trait::async_trait;

/// One way of finding the post image on a rendered page
///
/// Strategies are tried in order by [`super::SelectorResolver`]; the first one
/// to return `Ok(Some(_))` wins.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// Short label for logs
    fn name(&self) -> &str;

    /// Look for an image address; `Ok(None)` means this strategy found nothing
    async fn extract(&self, page: &dyn PageQuery) -> Result<Option<String>>;
}

/// First element matching a CSS selector, if it carries a non-empty source attribute
pub struct SelectorStrategy {
    selector: String,
    attribute: String,
}

impl SelectorStrategy {
    /// Create a strategy for `selector`, reading `attribute` from the match
    pub fn new(selector: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            attribute: attribute.into(),
        }
    }
}

#[async_trait]
impl ExtractionStrategy for SelectorStrategy {
    fn name(&self) -> &str {
        &self.selector
    }

    async fn extract(&self, page: &dyn PageQuery) -> Result<Option<String>> {
        let value = page.first_attribute(&self.selector, &self.attribute).await?;
        Ok(value.filter(|v| !v.is_empty()))
    }
}

/// Largest image on the page that is not a profile picture
///
/// When every image looks like a profile picture the largest one is returned
/// anyway, so this only comes back empty on a page without images. That can
/// yield an avatar instead of the post image; it is a known limitation.
pub struct LargestImageStrategy {
    attribute: String,
    excluded_marker: String,
}

impl LargestImageStrategy {
    /// Create the fallback, skipping sources that contain `excluded_marker`
    pub fn new(attribute: impl Into<String>, excluded_marker: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            excluded_marker: excluded_marker.into(),
        }
    }
}

#[async_trait]
impl ExtractionStrategy for LargestImageStrategy {
    fn name(&self) -> &str {
        "largest image"
    }

    async fn extract(&self, page: &dyn PageQuery) -> Result<Option<String>> {
        let images = page.images(&self.attribute).await?;
        Ok(pick_largest(images, &self.excluded_marker))
    }
}

/// Rank candidates by descending area and pick the best source
///
/// Ties keep document order.
pub fn pick_largest(mut images: Vec<ImageCandidate>, excluded_marker: &str) -> Option<String> {
    images.sort_by_key(|img| std::cmp::Reverse(img.area()));

    let preferred = images
        .iter()
        .filter_map(ImageCandidate::source)
        .find(|src| excluded_marker.is_empty() || !src.contains(excluded_marker));

    preferred
        .or_else(|| images.first().and_then(ImageCandidate::source))
        .map(str::to_string)
}
