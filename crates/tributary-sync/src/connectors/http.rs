//! Resilient HTTP call wrapper
//!
//! Every outbound request a connector makes goes through [`call_with_retry`]:
//! up to 3 attempts with exponential backoff (2s, 4s, capped at 10s).
//! Transport failures, 5xx and 429 are retried; any other 4xx is fatal
//! immediately. Once attempts are exhausted the call fails with
//! [`SyncError::Upstream`] carrying the last response detail.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use tokio::time::sleep;
use tracing::warn;

use tributary_common::{Result, SyncError};

/// Retry schedule for one outbound request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the next attempt, given how many attempts have failed.
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        let factor = 2u32.saturating_pow(failed_attempts.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Failure of a single call attempt, before retry classification.
#[derive(Debug)]
pub enum CallError {
    /// Connection-level failure: refused, timed out, body cut short.
    Transport(String),
    /// Non-success HTTP response.
    Status { status: u16, detail: String },
}

impl CallError {
    fn is_retryable(&self) -> bool {
        match self {
            CallError::Transport(_) => true,
            CallError::Status { status, .. } => {
                *status == 429 || (500..=599).contains(status)
            },
        }
    }

    fn into_sync_error(self) -> SyncError {
        match self {
            CallError::Transport(detail) => SyncError::Upstream {
                status: None,
                detail,
            },
            CallError::Status { status: 401, detail } | CallError::Status { status: 403, detail } => {
                SyncError::Authentication(detail)
            },
            CallError::Status { status, detail } => SyncError::Upstream {
                status: Some(status),
                detail,
            },
        }
    }
}

/// Run one logical request through the retry policy.
pub async fn call_with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, CallError>>,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_secs = delay.as_secs_f64(),
                    error = ?err,
                    "transient upstream failure, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            },
            Err(err) => return Err(err.into_sync_error()),
        }
    }
}

/// Authenticated JSON API client used by the HTTP connectors.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    policy: RetryPolicy,
}

impl ApiClient {
    /// Build a client with a bearer token and the given retry policy.
    pub fn bearer(token: &str, policy: RetryPolicy) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| SyncError::Configuration("token contains invalid characters".into()))?;
        headers.insert(AUTHORIZATION, value);
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| SyncError::Configuration(format!("http client: {err}")))?;
        Ok(Self { http, policy })
    }

    /// GET a JSON document, retrying per the policy.
    pub async fn get_json(&self, url: &str, params: &[(&str, String)]) -> Result<Value> {
        call_with_retry(&self.policy, || async {
            let response = self
                .http
                .get(url)
                .query(params)
                .send()
                .await
                .map_err(|err| CallError::Transport(err.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let detail = truncate(&response.text().await.unwrap_or_default(), 200);
                return Err(CallError::Status {
                    status: status.as_u16(),
                    detail,
                });
            }

            response
                .json::<Value>()
                .await
                .map_err(|err| CallError::Transport(format!("invalid json body: {err}")))
        })
        .await
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        text.to_string()
    } else {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn instant_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        // capped from here on
        assert_eq!(policy.delay_for(4), Duration::from_secs(10));
        assert_eq!(policy.delay_for(10), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let result = call_with_retry(&instant_policy(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(CallError::Transport("connection reset".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_after_three_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = call_with_retry(&instant_policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(CallError::Status {
                    status: 503,
                    detail: "unavailable".to_string(),
                })
            }
        })
        .await;
        assert!(matches!(
            result.unwrap_err(),
            SyncError::Upstream { status: Some(503), .. }
        ));
        // exactly three attempts, never a fourth
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_4xx_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = call_with_retry(&instant_policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(CallError::Status {
                    status: 404,
                    detail: "not found".to_string(),
                })
            }
        })
        .await;
        assert!(matches!(
            result.unwrap_err(),
            SyncError::Upstream { status: Some(404), .. }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_429_is_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = call_with_retry(&instant_policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(CallError::Status {
                    status: 429,
                    detail: "rate limited".to_string(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_401_maps_to_authentication() {
        let result: Result<()> = call_with_retry(&instant_policy(), || async {
            Err(CallError::Status {
                status: 401,
                detail: "bad token".to_string(),
            })
        })
        .await;
        assert!(matches!(result.unwrap_err(), SyncError::Authentication(_)));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "héllo wörld".repeat(40);
        let out = truncate(&text, 200);
        assert!(out.len() <= 204);
        assert!(out.ends_with("..."));
    }
}
