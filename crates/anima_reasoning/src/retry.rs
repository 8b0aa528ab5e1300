//! Exponential backoff for provider HTTP calls.
//!
//! Transient failures (429, 408, 5xx gateway errors, network errors) are
//! retried; other client errors fail on the first attempt.

use anyhow::Result;
use reqwest::{Response, StatusCode};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay after `delay`, capped at `max_delay`.
    fn next_delay(&self, delay: Duration) -> Duration {
        let next = delay.as_secs_f64() * self.backoff_factor;
        Duration::from_secs_f64(next.min(self.max_delay.as_secs_f64()))
    }
}

fn is_transient(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::REQUEST_TIMEOUT
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Run `send` until it yields a successful response, a permanent error, or
/// the attempts run out.
pub async fn with_retry<F, Fut>(config: &RetryConfig, provider: &str, send: F) -> Result<Response>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<Response>>,
{
    let mut delay = config.initial_delay;
    let mut last_error = String::from("no attempt made");

    for attempt in 1..=config.max_attempts {
        match send().await {
            Ok(response) if response.status().is_success() => {
                if attempt > 1 {
                    tracing::info!("{} succeeded on attempt {}", provider, attempt);
                }
                return Ok(response);
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                if !is_transient(status) {
                    anyhow::bail!("{} API error ({}): {}", provider, status, body);
                }
                tracing::warn!(
                    "{} returned {} on attempt {}/{}: {}",
                    provider,
                    status,
                    attempt,
                    config.max_attempts,
                    body.chars().take(200).collect::<String>()
                );
                last_error = format!("{} ({}): {}", provider, status, body);
            }
            Err(e) => {
                tracing::warn!(
                    "{} network error on attempt {}/{}: {}",
                    provider,
                    attempt,
                    config.max_attempts,
                    e
                );
                last_error = format!("{}: {}", provider, e);
            }
        }

        if attempt < config.max_attempts {
            tracing::info!(
                "{} retrying in {:.1}s",
                provider,
                delay.as_secs_f64()
            );
            tokio::time::sleep(delay).await;
            delay = config.next_delay(delay);
        }
    }

    anyhow::bail!(
        "{} failed after {} attempts: {}",
        provider,
        config.max_attempts,
        last_error
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient(StatusCode::BAD_GATEWAY));
        assert!(!is_transient(StatusCode::UNAUTHORIZED));
        assert!(!is_transient(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = RetryConfig {
            max_delay: Duration::from_secs(5),
            ..RetryConfig::default()
        };
        let d = config.next_delay(Duration::from_secs(1));
        assert_eq!(d, Duration::from_secs(2));
        let d = config.next_delay(Duration::from_secs(4));
        assert_eq!(d, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_network_errors_exhaust_attempts() {
        let config = RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            ..RetryConfig::default()
        };
        let calls = std::sync::atomic::AtomicU32::new(0);
        let result = with_retry(&config, "test", || async {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err::<Response, _>(anyhow::anyhow!("connection refused"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert!(result.unwrap_err().to_string().contains("connection refused"));
    }
}
