//! # carousel-dl
//!
//! Downloads every image of a single Instagram post, carousels included.
//!
//! ## How it works
//!
//! A post page is rendered in headless Chrome. The number of images is read
//! from the carousel indicators, then each position is opened through its
//! `?img_index=N` address, the image address is extracted with an ordered
//! chain of selectors (falling back to the largest image on the page) and the
//! file is streamed to `{output_dir}/{post id}/image_N.jpg`.
//!
//! A failure at one position never stops the others. Only an unusable
//! configuration, a malformed post address, an unreachable post page or a
//! browser that cannot start fail the whole run.
//!
//! ## Quick Start
//!
//! ```no_run
//! use carousel_dl::{Config, driver};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         output_dir: "downloads".into(),
//!         ..Default::default()
//!     };
//!
//!     let summary = driver::run(config, "https://www.instagram.com/p/DEcJnGD/").await?;
//!     println!("{summary}");
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Run orchestration
pub mod driver;
/// Error types
pub mod error;
/// Image download over HTTP
pub mod fetcher;
/// Log subscriber setup
pub mod logging;
/// Image count and address discovery
pub mod resolver;
/// Retry logic with exponential backoff
pub mod retry;
/// Browser session seam and Chrome implementation
pub mod session;
/// Core types and run summary
pub mod types;
/// Utility functions
pub mod utils;
/// Per-position traversal of a post
pub mod walker;

// unwrap/expect are acceptable in test helpers
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use config::{BrowserConfig, Config, FetchConfig, RetryConfig, SelectorConfig};
pub use error::{Error, FetchError, Result};
pub use fetcher::{HttpFetcher, ImageFetcher};
pub use resolver::{ExtractionStrategy, SelectorResolver};
pub use session::{ChromeSession, ImageCandidate, PageQuery, PageSession};
pub use types::{DownloadOutcome, ImageIndex, ImageRecord, PostReference, RunSummary};
pub use walker::PostWalker;
