//! Image count discovery and image address extraction
//!
//! The post markup is unstable, so nothing here depends on a single selector:
//! - the image count comes from whichever indicator selector matches first,
//!   defaulting to a single image when none does;
//! - the image address comes from an ordered chain of [`ExtractionStrategy`]
//!   values, ending in a largest-image heuristic.

mod strategy;

pub use strategy::{ExtractionStrategy, LargestImageStrategy, SelectorStrategy, pick_largest};

use crate::config::SelectorConfig;
use crate::error::Result;
use crate::session::PageQuery;

/// Finds the number of images in a post and the image address of the current page
pub struct SelectorResolver {
    count_selectors: Vec<String>,
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl SelectorResolver {
    /// Build a resolver from explicit parts
    pub fn new(count_selectors: Vec<String>, strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self {
            count_selectors,
            strategies,
        }
    }

    /// Standard chain: one [`SelectorStrategy`] per configured selector, then
    /// [`LargestImageStrategy`]
    pub fn from_config(config: &SelectorConfig) -> Self {
        let mut strategies: Vec<Box<dyn ExtractionStrategy>> = config
            .image_selectors
            .iter()
            .map(|selector| {
                Box::new(SelectorStrategy::new(
                    selector.clone(),
                    config.source_attribute.clone(),
                )) as Box<dyn ExtractionStrategy>
            })
            .collect();
        strategies.push(Box::new(LargestImageStrategy::new(
            config.source_attribute.clone(),
            config.profile_picture_marker.clone(),
        )));

        Self::new(config.count_selectors.clone(), strategies)
    }

    /// Strategy labels in the order they are tried
    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Number of images in the post shown on `page`
    ///
    /// The first count selector with at least one match decides; with no
    /// matches at all the post is a single image. Query failures are returned
    /// as errors.
    pub async fn discover_image_count(&self, page: &dyn PageQuery) -> Result<u32> {
        for selector in &self.count_selectors {
            let found = page.count(selector).await?;
            if found > 0 {
                tracing::debug!(selector = %selector, count = found, "Image count from indicator");
                return Ok(u32::try_from(found).unwrap_or(u32::MAX));
            }
        }
        tracing::debug!("No carousel indicators, treating post as a single image");
        Ok(1)
    }

    /// Address of the image shown on `page`, or `None` when no strategy finds one
    ///
    /// Never fails: a strategy whose query errors is logged and skipped.
    pub async fn extract_image_url(&self, page: &dyn PageQuery) -> Option<String> {
        for strategy in &self.strategies {
            match strategy.extract(page).await {
                Ok(Some(url)) => {
                    tracing::debug!(strategy = strategy.name(), url = %url, "Image address resolved");
                    return Some(url);
                }
                Ok(None) => {
                    tracing::trace!(strategy = strategy.name(), "Strategy found nothing");
                }
                Err(e) => {
                    tracing::warn!(strategy = strategy.name(), error = %e, "Strategy query failed");
                }
            }
        }
        None
    }
}
