//! The delivery client: a single-call dispatch to the external HTTP
//! delivery API with timeout, classifier, bounded intra-call retry,
//! metrics, and a circuit breaker.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    backoff::delay_for_attempt,
    circuit_breaker::CircuitBreaker,
    config::DeliveryConfig,
    error::{classify_status, DeliveryError, RetryableError},
    metrics::DeliveryMetrics,
};

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    email: &'a str,
    message: &'a str,
}

/// Dispatches a single event message to the external delivery API.
///
/// `send` is synchronous to the caller in the sense that it does not return
/// until the whole bounded retry budget for this invocation is exhausted or
/// a terminal outcome is reached — there is no cross-invocation state other
/// than the circuit breaker and metrics.
#[async_trait]
pub trait DeliveryClient: Send + Sync + std::fmt::Debug {
    /// # Errors
    /// Returns [`DeliveryError::Terminal`] if the service rejects the
    /// message in a way retrying cannot fix, [`DeliveryError::Retryable`]
    /// if the retry budget for this call was exhausted, or
    /// [`DeliveryError::CircuitOpen`] if the breaker is currently open.
    async fn send(&self, email: &str, message: &str) -> Result<(), DeliveryError>;

    fn metrics(&self) -> &DeliveryMetrics;
}

/// Production [`DeliveryClient`] backed by `reqwest`.
#[derive(Debug)]
pub struct HttpDeliveryClient {
    http: reqwest::Client,
    config: DeliveryConfig,
    breaker: CircuitBreaker,
    metrics: DeliveryMetrics,
}

impl HttpDeliveryClient {
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: DeliveryConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().build()?;
        let breaker =
            CircuitBreaker::new(config.circuit_breaker_threshold, config.circuit_breaker_reset);

        Ok(Self {
            http,
            config,
            breaker,
            metrics: DeliveryMetrics::new(),
        })
    }

    async fn attempt(&self, email: &str, message: &str) -> Result<(), DeliveryError> {
        self.metrics.record_attempt();

        let response = self
            .http
            .post(format!("{}/send-email", self.config.email_service_url))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(&SendEmailRequest { email, message })
            .timeout(self.config.timeout)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                self.metrics.record_timeout();
                return Err(DeliveryError::Retryable(RetryableError::Timeout(
                    self.config.timeout,
                )));
            }
            Err(e) => {
                return Err(DeliveryError::Retryable(RetryableError::Transport(
                    e.to_string(),
                )));
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status.as_u16(), body))
    }
}

#[async_trait]
impl DeliveryClient for HttpDeliveryClient {
    async fn send(&self, email: &str, message: &str) -> Result<(), DeliveryError> {
        if !self.breaker.should_allow() {
            return Err(DeliveryError::CircuitOpen);
        }

        let mut last_err = None;
        for attempt in 0..=self.config.max_retries {
            match self.attempt(email, message).await {
                Ok(()) => {
                    self.breaker.record_success();
                    self.metrics.record_success(chrono::Utc::now());
                    return Ok(());
                }
                Err(DeliveryError::Terminal(e)) => {
                    self.breaker.record_failure();
                    self.metrics.record_failure(e.to_string());
                    return Err(DeliveryError::Terminal(e));
                }
                Err(err) => {
                    self.breaker.record_failure();
                    self.metrics.record_failure(err.to_string());
                    last_err = Some(err);

                    if attempt < self.config.max_retries {
                        let delay = delay_for_attempt(attempt, self.config.retry_base_delay);
                        warn!(attempt, ?delay, "delivery attempt failed, retrying");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(last_err.unwrap_or(DeliveryError::Retryable(RetryableError::Transport(
            "retry budget exhausted with no recorded error".to_string(),
        ))))
    }

    fn metrics(&self) -> &DeliveryMetrics {
        &self.metrics
    }
}

/// Test double recording every call for assertions, with a scripted
/// sequence of responses.
#[derive(Debug, Clone)]
pub struct MockDeliveryClient {
    inner: Arc<parking_lot::Mutex<MockState>>,
}

#[derive(Debug)]
struct MockState {
    responses: std::collections::VecDeque<Result<(), DeliveryError>>,
    default: fn() -> Result<(), DeliveryError>,
    calls: Vec<(String, String)>,
}

impl Default for MockDeliveryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDeliveryClient {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(parking_lot::Mutex::new(MockState {
                responses: std::collections::VecDeque::new(),
                default: || Ok(()),
                calls: Vec::new(),
            })),
        }
    }

    /// Queue a scripted response, returned in FIFO order as `send` is called.
    pub fn push_response(&self, response: Result<(), DeliveryError>) {
        self.inner.lock().responses.push_back(response);
    }

    /// All `(email, message)` pairs passed to `send`, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<(String, String)> {
        self.inner.lock().calls.clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.inner.lock().calls.len()
    }
}

#[async_trait]
impl DeliveryClient for MockDeliveryClient {
    async fn send(&self, email: &str, message: &str) -> Result<(), DeliveryError> {
        let mut state = self.inner.lock();
        state.calls.push((email.to_string(), message.to_string()));
        let response = state.responses.pop_front().unwrap_or_else(|| (state.default)());
        info!(email, "mock delivery client invoked");
        response
    }

    fn metrics(&self) -> &DeliveryMetrics {
        // The mock does not track production metrics; callers asserting on
        // metrics should inspect `calls()` instead.
        static EMPTY: std::sync::OnceLock<DeliveryMetrics> = std::sync::OnceLock::new();
        EMPTY.get_or_init(DeliveryMetrics::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_replays_scripted_responses_in_order() {
        let client = MockDeliveryClient::new();
        client.push_response(Err(DeliveryError::Terminal(
            crate::error::TerminalError::Rejected {
                status: 400,
                body: "bad address".into(),
            },
        )));
        client.push_response(Ok(()));

        let first = client.send("a@example.com", "hi").await;
        assert!(first.is_err());

        let second = client.send("a@example.com", "hi").await;
        assert!(second.is_ok());

        assert_eq!(client.call_count(), 2);
    }
}
