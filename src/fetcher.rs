//! Streaming image download to disk
//!
//! The body is written to `{destination}.part` and renamed to `destination`
//! only after the whole stream arrived, so a file under the final name is
//! always complete. Transient failures are retried per [`RetryConfig`].

use crate::config::{FetchConfig, RetryConfig};
use crate::error::{FetchError, Result};
use crate::retry::with_retry;
use crate::utils::partial_path;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Downloads one resource to a file
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch `url` into `destination`, returning the number of bytes written
    async fn fetch(&self, url: &str, destination: &Path) -> std::result::Result<u64, FetchError>;
}

/// [`ImageFetcher`] backed by a shared `reqwest` client
pub struct HttpFetcher {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl HttpFetcher {
    /// Build a fetcher sending `user_agent` on every request
    pub fn new(user_agent: &str, config: &FetchConfig, retry: RetryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self { client, retry })
    }

    async fn fetch_once(
        &self,
        url: &str,
        destination: &Path,
    ) -> std::result::Result<u64, FetchError> {
        let mut response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|source| FetchError::Request {
                    url: url.to_string(),
                    source,
                })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| parse_retry_after(value, Utc::now()));
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                retry_after,
            });
        }

        let expected = response.content_length();
        let partial = partial_path(destination);

        let written = match write_body(&mut response, url, &partial).await {
            Ok(written) => written,
            Err(e) => {
                discard(&partial).await;
                return Err(e);
            }
        };

        if let Some(expected) = expected
            && expected != written
        {
            discard(&partial).await;
            return Err(FetchError::Truncated {
                url: url.to_string(),
                expected,
                actual: written,
            });
        }

        if let Err(source) = tokio::fs::rename(&partial, destination).await {
            discard(&partial).await;
            return Err(FetchError::Io {
                path: destination.to_path_buf(),
                source,
            });
        }

        Ok(written)
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> std::result::Result<u64, FetchError> {
        let written = with_retry(&self.retry, url, || self.fetch_once(url, destination)).await?;
        tracing::debug!(url, path = %destination.display(), bytes = written, "Image fetched");
        Ok(written)
    }
}

async fn write_body(
    response: &mut reqwest::Response,
    url: &str,
    partial: &Path,
) -> std::result::Result<u64, FetchError> {
    let io_error = |source| FetchError::Io {
        path: partial.to_path_buf(),
        source,
    };

    let mut file = tokio::fs::File::create(partial).await.map_err(io_error)?;
    let mut written: u64 = 0;

    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })?
    {
        file.write_all(&chunk).await.map_err(io_error)?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(io_error)?;
    file.sync_all().await.map_err(io_error)?;
    Ok(written)
}

/// `Retry-After` as delay-seconds or an HTTP date; dates in the past mean no wait
fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

async fn discard(partial: &Path) {
    if let Err(e) = tokio::fs::remove_file(partial).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %partial.display(), error = %e, "Failed to remove partial download");
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_USER_AGENT;
    use crate::retry::IsRetryable;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn no_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 0,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    fn fetcher(retry: RetryConfig) -> HttpFetcher {
        HttpFetcher::new(DEFAULT_USER_AGENT, &FetchConfig::default(), retry).unwrap()
    }

    /// Serve one raw HTTP response per connection, then stop accepting
    async fn raw_server(responses: Vec<Vec<u8>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                }
                socket.write_all(&response).await.unwrap();
                socket.shutdown().await.ok();
            }
        });
        format!("http://{addr}/photo.jpg")
    }

    /// Response advertising `advertised` bytes but carrying only `body`
    fn short_response(advertised: usize, body: &[u8]) -> Vec<u8> {
        let mut response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: image/jpeg\r\nContent-Length: {advertised}\r\nConnection: close\r\n\r\n"
        )
        .into_bytes();
        response.extend_from_slice(body);
        response
    }

    #[tokio::test]
    async fn saves_body_with_matching_length() {
        let server = MockServer::start().await;
        let body: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();
        Mock::given(method("GET"))
            .and(path("/v/t51/photo.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("image_1.jpg");
        let url = format!("{}/v/t51/photo.jpg", server.uri());

        let written = fetcher(no_retry()).fetch(&url, &destination).await.unwrap();

        assert_eq!(written, body.len() as u64);
        assert_eq!(std::fs::metadata(&destination).unwrap().len(), body.len() as u64);
        assert_eq!(std::fs::read(&destination).unwrap(), body);
        assert!(!partial_path(&destination).exists(), "partial file must be renamed");

        // The user agent contains commas, so compare the raw header value
        let requests = server.received_requests().await.unwrap();
        let user_agent = requests[0]
            .headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok());
        assert_eq!(user_agent, Some(DEFAULT_USER_AGENT));
    }

    #[tokio::test]
    async fn short_body_fails_and_leaves_no_file() {
        let url = raw_server(vec![short_response(100, &[7u8; 10])]).await;
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("image_1.jpg");

        let err = fetcher(no_retry()).fetch(&url, &destination).await.unwrap_err();

        assert!(
            matches!(err, FetchError::Request { .. } | FetchError::Truncated { .. }),
            "got {err:?}"
        );
        assert!(err.is_retryable());
        assert!(!destination.exists());
        assert!(!partial_path(&destination).exists(), "partial file must be removed");
    }

    #[tokio::test]
    async fn short_body_is_refetched() {
        let url = raw_server(vec![
            short_response(100, &[7u8; 10]),
            short_response(100, &[7u8; 100]),
        ])
        .await;
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("image_1.jpg");

        let written = fetcher(fast_retry(1)).fetch(&url, &destination).await.unwrap();

        assert_eq!(written, 100);
        assert_eq!(std::fs::read(&destination).unwrap(), vec![7u8; 100]);
        assert!(!partial_path(&destination).exists());
    }

    #[tokio::test]
    async fn rate_limit_hint_is_read_from_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = format!("{}/photo.jpg", server.uri());

        let err = fetcher(no_retry())
            .fetch(&url, &dir.path().join("image_1.jpg"))
            .await
            .unwrap_err();

        assert!(
            matches!(
                err,
                FetchError::Status {
                    status: 429,
                    retry_after: Some(d),
                    ..
                } if d == Duration::from_secs(7)
            ),
            "got {err:?}"
        );
    }

    #[test]
    fn retry_after_formats() {
        let now = DateTime::parse_from_rfc2822("Wed, 21 Oct 2015 07:28:00 GMT")
            .unwrap()
            .with_timezone(&Utc);

        assert_eq!(parse_retry_after("120", now), Some(Duration::from_secs(120)));
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:30 GMT", now),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:00:00 GMT", now),
            Some(Duration::ZERO)
        );
        assert_eq!(parse_retry_after("soon", now), None);
    }

    #[tokio::test]
    async fn not_found_is_not_retried_and_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("image_1.jpg");
        let url = format!("{}/missing.jpg", server.uri());

        let err = fetcher(fast_retry(3))
            .fetch(&url, &destination)
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 404, .. }), "got {err:?}");
        assert!(!destination.exists());
        assert!(!partial_path(&destination).exists());
    }

    #[tokio::test]
    async fn server_errors_are_retried_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky.jpg"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg-bytes".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("image_2.jpg");
        let url = format!("{}/flaky.jpg", server.uri());

        let written = fetcher(fast_retry(3)).fetch(&url, &destination).await.unwrap();

        assert_eq!(written, 10);
        assert_eq!(std::fs::read(&destination).unwrap(), b"jpeg-bytes");
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down.jpg"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = format!("{}/down.jpg", server.uri());

        let err = fetcher(fast_retry(2))
            .fetch(&url, &dir.path().join("image_1.jpg"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 500, .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn existing_file_is_replaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photo.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("image_1.jpg");
        std::fs::write(&destination, b"old contents").unwrap();
        let url = format!("{}/photo.jpg", server.uri());

        fetcher(no_retry()).fetch(&url, &destination).await.unwrap();

        assert_eq!(std::fs::read(&destination).unwrap(), b"new");
    }

    #[tokio::test]
    async fn unreachable_host_is_request_error() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("image_1.jpg");

        let err = fetcher(no_retry())
            .fetch("http://127.0.0.1:1/photo.jpg", &destination)
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Request { .. }), "got {err:?}");
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn missing_directory_is_io_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("no-such-dir").join("image_1.jpg");
        let url = format!("{}/photo.jpg", server.uri());

        let err = fetcher(no_retry())
            .fetch(&url, &destination)
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Io { .. }), "got {err:?}");
    }
}
