//! Configuration types for carousel-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// Static desktop-browser identification shared by the browser session and the fetcher
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/96.0.4664.110 Safari/537.36";

/// Largest accepted `retry.backoff_multiplier`
pub const MAX_BACKOFF_MULTIPLIER: f64 = 10.0;

/// Main configuration for a download run
///
/// Every field has a default, so an empty JSON object (`{}`) is a valid
/// configuration file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Root directory for downloads; each post gets a subdirectory (default: "instagram_images")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// User-Agent sent by both the browser and the image fetcher
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Browser session settings
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Image fetch settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Retry policy for image fetches
    #[serde(default)]
    pub retry: RetryConfig,

    /// Markup selectors used to find carousel size and image addresses
    #[serde(default)]
    pub selectors: SelectorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            user_agent: default_user_agent(),
            browser: BrowserConfig::default(),
            fetch: FetchConfig::default(),
            retry: RetryConfig::default(),
            selectors: SelectorConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read config file '{}': {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Reject settings that would make a run impossible or hang
    pub fn validate(&self) -> Result<()> {
        if self.user_agent.trim().is_empty() {
            return Err(Error::config("user_agent", "must not be empty"));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(Error::config("output_dir", "must not be empty"));
        }
        if self.browser.navigation_timeout.is_zero() {
            return Err(Error::config(
                "browser.navigation_timeout",
                "must be at least one second",
            ));
        }
        if self.fetch.request_timeout.is_zero() {
            return Err(Error::config(
                "fetch.request_timeout",
                "must be at least one second",
            ));
        }
        if self.retry.max_delay < self.retry.initial_delay {
            return Err(Error::config(
                "retry.max_delay",
                "must not be smaller than retry.initial_delay",
            ));
        }
        if !(1.0..=MAX_BACKOFF_MULTIPLIER).contains(&self.retry.backoff_multiplier) {
            return Err(Error::config(
                "retry.backoff_multiplier",
                format!("must be between 1.0 and {MAX_BACKOFF_MULTIPLIER}"),
            ));
        }
        if self.selectors.count_selectors.is_empty() {
            return Err(Error::config(
                "selectors.count_selectors",
                "at least one selector is required",
            ));
        }
        if self.selectors.source_attribute.trim().is_empty() {
            return Err(Error::config("selectors.source_attribute", "must not be empty"));
        }
        Ok(())
    }
}

/// Browser session configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run without a visible window (default: true)
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Chrome/Chromium executable (auto-detected if None)
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,

    /// Upper bound for one navigation, including the wait for a stable render (default: 30 seconds)
    #[serde(default = "default_navigation_timeout", with = "duration_serde")]
    pub navigation_timeout: Duration,

    /// Quiet period with no new network resources before a page counts as stable, in milliseconds (default: 500)
    #[serde(default = "default_settle_interval_ms")]
    pub settle_interval_ms: u64,

    /// Window width in pixels (default: 1280)
    #[serde(default = "default_window_width")]
    pub window_width: u32,

    /// Window height in pixels (default: 900)
    #[serde(default = "default_window_height")]
    pub window_height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_executable: None,
            navigation_timeout: default_navigation_timeout(),
            settle_interval_ms: default_settle_interval_ms(),
            window_width: default_window_width(),
            window_height: default_window_height(),
        }
    }
}

impl BrowserConfig {
    /// Settle interval as a [`Duration`]
    pub fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.settle_interval_ms)
    }
}

/// HTTP fetch configuration for image downloads
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Whole-request timeout, body included (default: 60 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// TCP/TLS connect timeout (default: 10 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

/// Retry configuration for transient fetch failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try (default: 3, 0 disables retries)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 10 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Selectors for the post markup
///
/// The markup of the target site changes often, so every selector is data
/// rather than code. Lists are tried in order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Elements whose count equals the number of images (carousel indicators, then pagination dots)
    #[serde(default = "default_count_selectors")]
    pub count_selectors: Vec<String>,

    /// Selectors for the post image, highest priority first
    #[serde(default = "default_image_selectors")]
    pub image_selectors: Vec<String>,

    /// Attribute holding the image address (default: "src")
    #[serde(default = "default_source_attribute")]
    pub source_attribute: String,

    /// Substring identifying profile pictures in the largest-image fallback (default: "profile_pic")
    #[serde(default = "default_profile_picture_marker")]
    pub profile_picture_marker: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            count_selectors: default_count_selectors(),
            image_selectors: default_image_selectors(),
            source_attribute: default_source_attribute(),
            profile_picture_marker: default_profile_picture_marker(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("instagram_images")
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_true() -> bool {
    true
}

fn default_navigation_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_settle_interval_ms() -> u64 {
    500
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    900
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_count_selectors() -> Vec<String> {
    vec!["div._acnb".into(), "div._ae5q span._aamh".into()]
}

fn default_image_selectors() -> Vec<String> {
    vec![
        "img.x5yr21d".into(),
        r#"img[class*="x5yr21d"]"#.into(),
        "div._aagv img".into(),
        "article img".into(),
    ]
}

fn default_source_attribute() -> String {
    "src".into()
}

fn default_profile_picture_marker() -> String {
    "profile_pic".into()
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
