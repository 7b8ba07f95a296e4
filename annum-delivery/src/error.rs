//! Typed error handling for delivery operations.
//!
//! Distinguishes retryable failures (5xx, 408, 429, transport errors) from
//! terminal ones (other 4xx) so the processor can decide whether to
//! schedule another attempt without re-deriving that policy itself.

use thiserror::Error;

/// Top-level delivery error type.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The email service rejected the request in a way that will not
    /// change on retry (e.g. 400, 401, 404).
    #[error("terminal failure: {0}")]
    Terminal(#[from] TerminalError),

    /// The failure may succeed on a later attempt (5xx, 408, 429, or a
    /// transport-level error).
    #[error("retryable failure: {0}")]
    Retryable(#[from] RetryableError),

    /// Delivery was not attempted because the circuit breaker is open.
    #[error("circuit breaker open, rejecting delivery")]
    CircuitOpen,
}

/// Terminal failures: retrying would not help.
#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("email service rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Retryable failures: a later attempt may succeed.
#[derive(Debug, Error)]
pub enum RetryableError {
    #[error("email service returned a transient status ({status}): {body}")]
    TransientStatus { status: u16, body: String },

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("transport error: {0}")]
    Transport(String),
}

impl DeliveryError {
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_))
    }
}

/// Classify an HTTP status code per the delivery contract:
/// 2xx is handled by the caller before classification is needed; anything
/// else lands here. 5xx, 408, and 429 are retryable; every other 4xx is
/// terminal.
#[must_use]
pub fn classify_status(status: u16, body: String) -> DeliveryError {
    if status >= 500 || status == 408 || status == 429 {
        DeliveryError::Retryable(RetryableError::TransientStatus { status, body })
    } else {
        DeliveryError::Terminal(TerminalError::Rejected { status, body })
    }
}
