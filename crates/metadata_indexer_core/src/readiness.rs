//! Blocking waits for eventually-consistent grants.
//!
//! A fixed delay alone cannot prove a grant is visible, so every settle delay
//! is paired with a verifiable check: the dependent call itself is retried for
//! as long as the service classifies its failure as
//! [`ServiceErrorKind::TransientUnavailable`], bounded by the policy window.

use std::time::Duration;

use crate::config::PropagationPolicy;
use crate::error::{ServiceError, ServiceErrorKind};
use crate::observer::wait_millis;

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Runs `attempt` until it stops failing with a transient error or the
/// policy's retry window is spent. `on_wait` performs (and reports) each
/// interval of waiting between attempts.
///
/// When the window is exhausted the last transient error is returned as-is;
/// the caller decides that it is now fatal.
pub fn retry_while_transient<T>(
    policy: &PropagationPolicy,
    mut on_wait: impl FnMut(Duration),
    mut attempt: impl FnMut() -> Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    let mut waited = Duration::ZERO;
    loop {
        match attempt() {
            Err(error)
                if error.is(ServiceErrorKind::TransientUnavailable)
                    && !policy.retry_interval.is_zero()
                    && waited < policy.retry_timeout =>
            {
                tracing::debug!(
                    code = %error.code,
                    waited_ms = wait_millis(waited),
                    "grant not yet visible, retrying"
                );
                on_wait(policy.retry_interval);
                waited += policy.retry_interval;
            }
            outcome => return outcome,
        }
    }
}
