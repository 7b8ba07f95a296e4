//! HTTP delivery client for recurring-event messages: timeout handling,
//! retryable/terminal classification, bounded exponential backoff, a
//! process-local circuit breaker, and delivery metrics.

pub mod backoff;
pub mod circuit_breaker;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use client::{DeliveryClient, HttpDeliveryClient, MockDeliveryClient};
pub use config::DeliveryConfig;
pub use error::{DeliveryError, RetryableError, TerminalError};
pub use metrics::{DeliveryMetrics, MetricsSnapshot};
