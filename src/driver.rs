//! Entry point tying configuration, browser session and walker together

use crate::config::Config;
use crate::error::Result;
use crate::fetcher::{HttpFetcher, ImageFetcher};
use crate::resolver::SelectorResolver;
use crate::session::{ChromeSession, PageSession};
use crate::types::{PostReference, RunSummary};
use crate::utils::{ensure_dir, post_output_dir};
use crate::walker::PostWalker;
use std::path::Path;
use std::time::Duration;

/// Download every image of the post at `post_url`
///
/// Everything that can be checked without a browser (configuration, post
/// address, output directory) is checked before Chrome is launched. The
/// session is closed on every exit path once it exists.
///
/// # Example
///
/// ```no_run
/// use carousel_dl::{Config, driver};
///
/// #[tokio::main]
/// async fn main() -> carousel_dl::Result<()> {
///     let summary = driver::run(Config::default(), "https://www.instagram.com/p/DEcJnGD/").await?;
///     println!("{summary}");
///     Ok(())
/// }
/// ```
pub async fn run(config: Config, post_url: &str) -> Result<RunSummary> {
    config.validate()?;
    let post = PostReference::parse(post_url)?;

    let output_dir = post_output_dir(&config.output_dir, &post);
    ensure_dir(&output_dir).await?;
    tracing::debug!(post_id = %post, path = %output_dir.display(), "Output directory ready");

    let fetcher = HttpFetcher::new(&config.user_agent, &config.fetch, config.retry.clone())?;
    let resolver = SelectorResolver::from_config(&config.selectors);

    tracing::info!(post_id = %post, headless = config.browser.headless, "Launching browser");
    let session = ChromeSession::launch(&config.browser, &config.user_agent).await?;

    run_with_session(
        &session,
        &resolver,
        &fetcher,
        config.browser.navigation_timeout,
        &post,
        &output_dir,
    )
    .await
}

/// Walk `post` on an already launched session, then close the session
///
/// A walk error takes precedence over a close error; the latter is only
/// logged.
pub async fn run_with_session<S, F>(
    session: &S,
    resolver: &SelectorResolver,
    fetcher: &F,
    navigation_timeout: Duration,
    post: &PostReference,
    output_dir: &Path,
) -> Result<RunSummary>
where
    S: PageSession,
    F: ImageFetcher,
{
    let result = PostWalker::new(resolver, fetcher, navigation_timeout)
        .walk(session, post, output_dir)
        .await;

    if let Err(e) = session.close().await {
        tracing::warn!(post_id = %post, error = %e, "Failed to close browser session");
    }

    match &result {
        Ok(summary) => tracing::info!(
            post_id = %post,
            total = summary.total_images,
            saved = summary.saved(),
            "Scraping completed"
        ),
        Err(e) => tracing::error!(post_id = %post, error = %e, "Scraping failed"),
    }

    result
}
