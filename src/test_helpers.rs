//! Shared in-memory fakes for the browser session and the image fetcher.

use crate::error::{Error, FetchError, Result};
use crate::fetcher::ImageFetcher;
use crate::session::{ImageCandidate, PageQuery, PageSession};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A rendered page described by selector results
#[derive(Clone, Debug, Default)]
pub(crate) struct FakePage {
    counts: HashMap<String, usize>,
    attributes: HashMap<String, String>,
    images: Vec<ImageCandidate>,
    failing: HashSet<String>,
}

impl FakePage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_count(mut self, selector: &str, count: usize) -> Self {
        self.counts.insert(selector.to_string(), count);
        self
    }

    /// First match of `selector` carries `value` as its source attribute
    pub(crate) fn with_attribute(mut self, selector: &str, value: &str) -> Self {
        self.attributes
            .insert(selector.to_string(), value.to_string());
        self
    }

    pub(crate) fn with_image(mut self, src: &str, width: u32, height: u32) -> Self {
        self.images.push(ImageCandidate {
            src: Some(src.to_string()),
            natural_width: width,
            natural_height: height,
            width,
            height,
        });
        self
    }

    /// Queries for `selector` fail; use `"img"` to fail the image listing
    pub(crate) fn with_failing(mut self, selector: &str) -> Self {
        self.failing.insert(selector.to_string());
        self
    }

    fn check(&self, selector: &str) -> Result<()> {
        if self.failing.contains(selector) {
            return Err(Error::DomQuery {
                selector: selector.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PageQuery for FakePage {
    async fn count(&self, selector: &str) -> Result<usize> {
        self.check(selector)?;
        Ok(self.counts.get(selector).copied().unwrap_or(0))
    }

    async fn first_attribute(&self, selector: &str, _attribute: &str) -> Result<Option<String>> {
        self.check(selector)?;
        Ok(self.attributes.get(selector).cloned())
    }

    async fn images(&self, _attribute: &str) -> Result<Vec<ImageCandidate>> {
        self.check("img")?;
        Ok(self.images.clone())
    }
}

/// A session that serves a [`FakePage`] per address and records every navigation
#[derive(Default)]
pub(crate) struct FakeSession {
    fallback: FakePage,
    pages: HashMap<String, FakePage>,
    hanging: HashSet<String>,
    unreachable: HashSet<String>,
    current: Mutex<Option<String>>,
    visits: Mutex<Vec<String>>,
    closes: AtomicUsize,
}

impl FakeSession {
    /// Session whose every address renders `page`
    pub(crate) fn new(page: FakePage) -> Self {
        Self {
            fallback: page,
            ..Default::default()
        }
    }

    pub(crate) fn with_page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    /// Navigation to `url` never settles
    pub(crate) fn with_hanging(mut self, url: &str) -> Self {
        self.hanging.insert(url.to_string());
        self
    }

    /// Navigation to `url` fails immediately
    pub(crate) fn with_unreachable(mut self, url: &str) -> Self {
        self.unreachable.insert(url.to_string());
        self
    }

    pub(crate) fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn current_page(&self) -> FakePage {
        let current = self.current.lock().unwrap().clone();
        current
            .and_then(|url| self.pages.get(&url).cloned())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl PageQuery for FakeSession {
    async fn count(&self, selector: &str) -> Result<usize> {
        self.current_page().count(selector).await
    }

    async fn first_attribute(&self, selector: &str, attribute: &str) -> Result<Option<String>> {
        self.current_page().first_attribute(selector, attribute).await
    }

    async fn images(&self, attribute: &str) -> Result<Vec<ImageCandidate>> {
        self.current_page().images(attribute).await
    }
}

#[async_trait]
impl PageSession for FakeSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.visits.lock().unwrap().push(url.to_string());
        if self.hanging.contains(url) {
            std::future::pending::<()>().await;
        }
        if self.unreachable.contains(url) {
            return Err(Error::Navigation {
                url: url.to_string(),
                reason: "net::ERR_CONNECTION_REFUSED".to_string(),
            });
        }
        *self.current.lock().unwrap() = Some(url.to_string());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Fetcher that writes the URL itself as the file body and records every call
#[derive(Default)]
pub(crate) struct RecordingFetcher {
    failing: HashSet<String>,
    calls: Mutex<Vec<(String, PathBuf)>>,
}

impl RecordingFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fetching `url` answers HTTP 500
    pub(crate) fn with_failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub(crate) fn calls(&self) -> Vec<(String, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageFetcher for RecordingFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> std::result::Result<u64, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), destination.to_path_buf()));
        if self.failing.contains(url) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 500,
                retry_after: None,
            });
        }
        tokio::fs::write(destination, url.as_bytes())
            .await
            .map_err(|source| FetchError::Io {
                path: destination.to_path_buf(),
                source,
            })?;
        Ok(url.len() as u64)
    }
}
