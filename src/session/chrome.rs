//! Headless Chrome session over the DevTools protocol

use super::{ImageCandidate, PageQuery, PageSession};
use crate::config::BrowserConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// How long to wait for the CDP event loop to wind down after the browser exits
const HANDLER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs before any page script. The default resource-timing buffer holds 250
/// entries; once full the resource count stops growing and a busy page would
/// look settled.
const RESOURCE_BUFFER_SCRIPT: &str = "performance.setResourceTimingBufferSize(100000);";

/// A single Chrome process with one open tab
///
/// The browser process is killed when this value is dropped, but callers
/// should still call [`PageSession::close`] to shut it down cleanly.
pub struct ChromeSession {
    browser: Mutex<Option<Browser>>,
    handler: Mutex<Option<JoinHandle<()>>>,
    page: Page,
    settle_interval: Duration,
}

#[derive(Deserialize)]
struct LoadState {
    ready: bool,
    resources: u64,
}

impl ChromeSession {
    /// Launch Chrome and open a blank tab identifying itself as `user_agent`
    pub async fn launch(config: &BrowserConfig, user_agent: &str) -> Result<Self> {
        let mut builder = LaunchConfig::builder()
            .window_size(config.window_width, config.window_height)
            .arg(format!("--user-agent={}", user_agent));
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let launch_config = builder.build().map_err(Error::Session)?;

        let (mut browser, mut handler) = Browser::launch(launch_config).await?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!(error = %e, "CDP handler error");
                }
            }
        });

        let page = match open_page(&browser, user_agent).await {
            Ok(page) => page,
            Err(e) => {
                if let Err(close_err) = browser.close().await {
                    tracing::warn!(error = %close_err, "Failed to close browser after setup error");
                }
                handler_task.abort();
                return Err(e);
            }
        };

        tracing::info!(
            headless = config.headless,
            width = config.window_width,
            height = config.window_height,
            "Browser session started"
        );

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            handler: Mutex::new(Some(handler_task)),
            page,
            settle_interval: config.settle_interval(),
        })
    }

    /// Evaluate a script that returns `JSON.stringify(...)` and decode the result
    ///
    /// Going through a JSON string keeps `null` and nested objects intact
    /// across the protocol boundary.
    async fn evaluate_json<T: DeserializeOwned>(&self, label: &str, script: &str) -> Result<T> {
        let query_error = |reason: String| Error::DomQuery {
            selector: label.to_string(),
            reason,
        };

        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| query_error(e.to_string()))?;
        let raw: String = result
            .into_value()
            .map_err(|e| query_error(format!("unexpected script result: {}", e)))?;
        serde_json::from_str(&raw).map_err(|e| query_error(format!("invalid JSON: {}", e)))
    }

    async fn load_state(&self) -> Result<LoadState> {
        self.evaluate_json(
            "load state",
            "JSON.stringify({ ready: document.readyState === 'complete', \
             resources: performance.getEntriesByType('resource').length })",
        )
        .await
    }

    /// Network-idle equivalent: document loaded and no new resources for one settle interval
    async fn wait_until_stable(&self) -> Result<()> {
        let mut previous = self.load_state().await?.resources;
        loop {
            tokio::time::sleep(self.settle_interval).await;
            let state = self.load_state().await?;
            if state.ready && state.resources == previous {
                return Ok(());
            }
            previous = state.resources;
        }
    }
}

async fn open_page(browser: &Browser, user_agent: &str) -> Result<Page> {
    let page = browser.new_page("about:blank").await?;
    page.set_user_agent(SetUserAgentOverrideParams::new(user_agent))
        .await?;
    page.evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(
        RESOURCE_BUFFER_SCRIPT,
    ))
    .await?;
    Ok(page)
}

/// Render a Rust string as a JavaScript string literal
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[async_trait]
impl PageQuery for ChromeSession {
    async fn count(&self, selector: &str) -> Result<usize> {
        let script = format!(
            "JSON.stringify(document.querySelectorAll({}).length)",
            js_string(selector)
        );
        self.evaluate_json(selector, &script).await
    }

    async fn first_attribute(&self, selector: &str, attribute: &str) -> Result<Option<String>> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); \
             return JSON.stringify(el ? el.getAttribute({}) : null); }})()",
            js_string(selector),
            js_string(attribute)
        );
        self.evaluate_json(selector, &script).await
    }

    async fn images(&self, attribute: &str) -> Result<Vec<ImageCandidate>> {
        let script = format!(
            "JSON.stringify(Array.from(document.querySelectorAll('img')).map(img => ({{ \
             src: img.getAttribute({}), \
             natural_width: img.naturalWidth || 0, \
             natural_height: img.naturalHeight || 0, \
             width: img.width || 0, \
             height: img.height || 0 }})))",
            js_string(attribute)
        );
        self.evaluate_json("img", &script).await
    }
}

#[async_trait]
impl PageSession for ChromeSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        tracing::debug!(url, "Navigating");
        self.page.goto(url).await.map_err(|e| Error::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        self.wait_until_stable().await
    }

    async fn close(&self) -> Result<()> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };

        let closed = browser.close().await;
        if let Err(e) = browser.wait().await {
            tracing::warn!(error = %e, "Failed waiting for browser process to exit");
        }

        if let Some(handle) = self.handler.lock().await.take()
            && tokio::time::timeout(HANDLER_SHUTDOWN_TIMEOUT, handle)
                .await
                .is_err()
        {
            tracing::warn!("CDP handler did not stop in time");
        }

        closed?;
        tracing::info!("Browser session closed");
        Ok(())
    }
}
