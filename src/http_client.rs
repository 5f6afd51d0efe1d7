use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use rand::Rng;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, USER_AGENT};
use tracing::{debug, warn};

const BASE_DELAY_MS: u64 = 1000;
const MAX_JITTER_MS: u64 = 500;

pub fn build_http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("failed to build http client")
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(BASE_DELAY_MS),
            max_jitter: Duration::from_millis(MAX_JITTER_MS),
        }
    }

    /// Delay before retry number `attempt` (1-based), without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    fn delay_with_jitter(&self, attempt: u32) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..jitter_ms)
        };
        self.backoff(attempt) + Duration::from_millis(jitter)
    }
}

enum FetchError {
    Retryable(anyhow::Error),
    Fatal(anyhow::Error),
}

/// 429 and 5xx are worth another attempt; other client errors are not.
fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// GET a JSON body, retrying transport errors, 429 and 5xx. Other 4xx fail
/// straight away.
pub fn get_json_with_retry(client: &Client, url: &str, policy: &RetryPolicy) -> Result<String> {
    let mut last_err = anyhow!("no attempts made for {url}");
    for attempt in 0..policy.max_attempts {
        if attempt > 0 {
            let delay = policy.delay_with_jitter(attempt);
            warn!(
                url,
                attempt = attempt + 1,
                max = policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "retrying provider request"
            );
            thread::sleep(delay);
        }
        match get_once(client, url) {
            Ok(body) => return Ok(body),
            Err(FetchError::Fatal(err)) => return Err(err),
            Err(FetchError::Retryable(err)) => {
                debug!(url, error = %err, "provider request failed");
                last_err = err;
            }
        }
    }
    Err(last_err.context(format!(
        "request failed after {} attempts",
        policy.max_attempts
    )))
}

fn get_once(client: &Client, url: &str) -> Result<String, FetchError> {
    let resp = client
        .get(url)
        .header(USER_AGENT, "Mozilla/5.0")
        .header(ACCEPT, "application/json")
        .send()
        .context("request failed")
        .map_err(FetchError::Retryable)?;
    let status = resp.status();
    let body = resp
        .text()
        .context("failed reading body")
        .map_err(FetchError::Retryable)?;
    if status.is_success() {
        return Ok(body);
    }
    let err = anyhow!("http {}: {}", status, truncate(&body, 200));
    if is_retryable(status) {
        Err(FetchError::Retryable(err))
    } else {
        Err(FetchError::Fatal(err.context(format!("GET {url}"))))
    }
}

fn truncate(raw: &str, max: usize) -> &str {
    match raw.char_indices().nth(max) {
        Some((idx, _)) => &raw[..idx],
        None => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy::new(3);
        assert_eq!(policy.backoff(1), Duration::from_millis(2000));
        assert_eq!(policy.backoff(2), Duration::from_millis(4000));
    }

    #[test]
    fn jitter_stays_within_bound() {
        let policy = RetryPolicy::new(3);
        for _ in 0..50 {
            let d = policy.delay_with_jitter(1);
            assert!(d >= Duration::from_millis(2000));
            assert!(d < Duration::from_millis(2500));
        }
    }

    #[test]
    fn only_rate_limits_and_server_errors_retry() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable(StatusCode::NOT_FOUND));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
        assert!(!is_retryable(StatusCode::FORBIDDEN));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("£££", 2), "££");
        assert_eq!(truncate("ab", 5), "ab");
    }
}
