//! HTTP plumbing shared by the hosted providers.

use backon::{ExponentialBuilder, Retryable};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use super::{classify_failure, extract_error_message, ProviderError};

/// One pooled client for every provider instance. Timeouts are set per
/// request from [`CompletionConfig`](super::CompletionConfig).
pub(crate) fn client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(reqwest::Client::new)
}

/// POST `body` as JSON and decode a `R` from a 2xx response.
pub(crate) async fn post_json<B, R>(
    request: reqwest::RequestBuilder,
    body: &B,
    timeout: Duration,
) -> Result<R, ProviderError>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = request
        .timeout(timeout)
        .json(body)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(timeout)
            } else {
                ProviderError::HttpError(e.to_string())
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        let retry_after = parse_retry_after(response.headers());
        let text = response.text().await.unwrap_or_default();
        return Err(classify_failure(
            status.as_u16(),
            retry_after,
            extract_error_message(&text),
        ));
    }

    response
        .json::<R>()
        .await
        .map_err(|e| ProviderError::ParseError(e.to_string()))
}

/// `retry-after` in whole seconds. HTTP-date values are ignored.
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Run `attempt`, retrying transient failures with exponential backoff.
pub(crate) async fn with_retry<T, F, Fut>(
    provider: &str,
    max_retries: usize,
    attempt: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let backoff = ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(250))
        .with_max_delay(Duration::from_secs(4))
        .with_max_times(max_retries);

    attempt
        .retry(backoff)
        .when(ProviderError::is_transient)
        .notify(|err: &ProviderError, delay: Duration| {
            tracing::warn!(provider, error = %err, ?delay, "Retrying completion request");
        })
        .await
}
