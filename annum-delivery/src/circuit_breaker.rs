//! Circuit breaker guarding the single delivery endpoint.
//!
//! Unlike a multi-destination mail transfer agent, this client talks to one
//! configured `EMAIL_SERVICE_URL`, so there is exactly one breaker rather
//! than one per destination.
//!
//! ```text
//! Closed --[threshold consecutive failures]--> Open
//! Open --[resetMs elapsed]--> HalfOpen
//! HalfOpen --[success]--> Closed
//! HalfOpen --[failure]--> Open
//! ```

use std::{
    sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering},
    time::{Duration, Instant},
};

use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

const STATE_CLOSED: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_HALF_OPEN: u8 = 2;

/// Process-wide circuit breaker for the delivery endpoint.
///
/// State transitions are serialized through a single `Mutex`-free atomic
/// state machine: `should_allow` performs the Open -> HalfOpen transition,
/// and only one half-open trial is let through at a time via
/// `half_open_in_flight`.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    reset: Duration,
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    opened_at_millis: AtomicU64,
    half_open_in_flight: std::sync::atomic::AtomicBool,
    started_at: Instant,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(threshold: u32, reset: Duration) -> Self {
        Self {
            threshold,
            reset,
            state: AtomicU8::new(STATE_CLOSED),
            consecutive_failures: AtomicU32::new(0),
            opened_at_millis: AtomicU64::new(0),
            half_open_in_flight: std::sync::atomic::AtomicBool::new(false),
            started_at: Instant::now(),
        }
    }

    #[must_use]
    pub fn state(&self) -> CircuitState {
        match self.state.load(Ordering::SeqCst) {
            STATE_OPEN => CircuitState::Open,
            STATE_HALF_OPEN => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    /// Whether a delivery attempt should proceed. When the circuit is open
    /// and the reset timeout has elapsed, this transitions to half-open and
    /// admits exactly one trial attempt; subsequent callers are rejected
    /// until that trial resolves.
    pub fn should_allow(&self) -> bool {
        match self.state.load(Ordering::SeqCst) {
            STATE_CLOSED => true,
            STATE_HALF_OPEN => false,
            _ => {
                let opened_at = self.opened_at_millis.load(Ordering::SeqCst);
                let elapsed = self.started_at.elapsed().as_millis() as u64;
                if elapsed.saturating_sub(opened_at) < self.reset.as_millis() as u64 {
                    return false;
                }

                if self
                    .state
                    .compare_exchange(
                        STATE_OPEN,
                        STATE_HALF_OPEN,
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    )
                    .is_ok()
                {
                    self.half_open_in_flight.store(true, Ordering::SeqCst);
                    info!("circuit breaker entering half-open, admitting one trial delivery");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let previous = self.state.swap(STATE_CLOSED, Ordering::SeqCst);
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.half_open_in_flight.store(false, Ordering::SeqCst);
        if previous != STATE_CLOSED {
            info!("circuit breaker closed after successful delivery");
        }
    }

    pub fn record_failure(&self) {
        match self.state.load(Ordering::SeqCst) {
            STATE_HALF_OPEN => {
                self.half_open_in_flight.store(false, Ordering::SeqCst);
                self.open();
                warn!("circuit breaker trial delivery failed, reopening");
            }
            STATE_OPEN => {}
            _ => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                if failures >= self.threshold {
                    self.open();
                    warn!(failures, threshold = self.threshold, "circuit breaker opened");
                }
            }
        }
    }

    fn open(&self) {
        self.state.store(STATE_OPEN, Ordering::SeqCst);
        let elapsed = self.started_at.elapsed().as_millis() as u64;
        self.opened_at_millis.store(elapsed, Ordering::SeqCst);
    }
}
