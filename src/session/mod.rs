//! Browser session abstraction
//!
//! The resolver and walker only need a handful of capabilities from a browser:
//! navigate somewhere and wait for the page to settle, count elements, read an
//! attribute, and list the images on the page. [`PageQuery`] and
//! [`PageSession`] capture exactly that, so the decision logic can run against
//! Chrome ([`ChromeSession`]) or an in-memory page in tests.

mod chrome;

pub use chrome::ChromeSession;

use crate::error::Result;
use async_trait::async_trait;
use serde::Deserialize;

/// One `<img>` element as seen by the page
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ImageCandidate {
    /// Value of the source attribute, if present
    pub src: Option<String>,
    /// Intrinsic width (0 when not loaded)
    #[serde(default)]
    pub natural_width: u32,
    /// Intrinsic height (0 when not loaded)
    #[serde(default)]
    pub natural_height: u32,
    /// Rendered width
    #[serde(default)]
    pub width: u32,
    /// Rendered height
    #[serde(default)]
    pub height: u32,
}

impl ImageCandidate {
    /// Pixel area used for ranking
    ///
    /// Each dimension prefers the intrinsic size and falls back to the rendered
    /// size; a dimension that is missing in both counts as 0.
    pub fn area(&self) -> u64 {
        let width = if self.natural_width > 0 {
            self.natural_width
        } else {
            self.width
        };
        let height = if self.natural_height > 0 {
            self.natural_height
        } else {
            self.height
        };
        u64::from(width) * u64::from(height)
    }

    /// Source attribute when it is present and non-empty
    pub fn source(&self) -> Option<&str> {
        self.src.as_deref().filter(|s| !s.is_empty())
    }
}

/// Read-only DOM queries against the currently rendered page
#[async_trait]
pub trait PageQuery: Send + Sync {
    /// Number of elements matching `selector`
    async fn count(&self, selector: &str) -> Result<usize>;

    /// `attribute` of the first element matching `selector`
    ///
    /// `Ok(None)` when nothing matches or the element lacks the attribute.
    async fn first_attribute(&self, selector: &str, attribute: &str) -> Result<Option<String>>;

    /// Every `<img>` on the page in document order, with `attribute` as source
    async fn images(&self, attribute: &str) -> Result<Vec<ImageCandidate>>;
}

/// A page that can also be navigated and released
#[async_trait]
pub trait PageSession: PageQuery {
    /// Navigate to `url` and wait until the page is rendered and network-quiet
    ///
    /// Implementations may wait indefinitely; callers bound this with a timeout.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Release the session. Calling it more than once is harmless.
    async fn close(&self) -> Result<()>;
}
