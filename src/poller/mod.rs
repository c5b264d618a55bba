//! Eventual-consistency poller.
//!
//! The control plane is only eventually consistent after a write: a resource
//! that was just created may not be readable yet, and one that was just
//! deleted may still be returned. [`await_state`] repeatedly looks the
//! resource up at a fixed interval until it reaches the expected state or the
//! attempt budget runs out. Running out of attempts is reported as
//! [`WaitOutcome::TimedOut`] rather than an error so the caller decides
//! whether that is fatal.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::backend::{NetAppBackend, PollOutcome};
use crate::locator::ResourceLocator;

/// Observable state the caller is waiting for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TargetState {
    /// The resource can be read.
    Exists,
    /// The control plane reports the resource as not found.
    Absent,
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exists => f.write_str("exists"),
            Self::Absent => f.write_str("absent"),
        }
    }
}

/// Interval and attempt budget for a wait.
///
/// Both values are required; there is no default.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollConfig {
    /// Sleep before each lookup.
    pub interval: Duration,
    /// Number of lookups before giving up.
    pub max_attempts: u32,
}

impl PollConfig {
    /// Creates a poll configuration.
    #[must_use]
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Longest time a wait can block.
    #[must_use]
    pub fn worst_case(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }
}

/// How a wait ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WaitOutcome {
    /// The target state was observed.
    Confirmed {
        /// Lookups performed, including the confirming one.
        attempts: u32,
    },
    /// The attempt budget was exhausted first.
    TimedOut {
        /// Lookups performed.
        attempts: u32,
    },
}

impl WaitOutcome {
    /// Returns `true` when the target state was observed.
    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }

    /// Lookups performed.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Confirmed { attempts } | Self::TimedOut { attempts } => *attempts,
        }
    }
}

/// Errors that end a wait early.
#[derive(Debug, Error)]
pub enum WaitError<E>
where
    E: std::error::Error + 'static,
{
    /// The lookup failed with something other than "not found".
    #[error("failed to look up {locator} on attempt {attempt}: {source}")]
    Lookup {
        /// Resource being waited on.
        locator: String,
        /// Attempt on which the lookup failed, starting at 1.
        attempt: u32,
        /// Backend error.
        #[source]
        source: E,
    },
}

/// Waits until `locator` reaches `target` or `config.max_attempts` lookups
/// have been made.
///
/// Each attempt sleeps for `config.interval` and then issues the lookup for
/// the locator's level. "Not found" drives the state machine; any other
/// lookup failure is returned immediately without further attempts.
///
/// # Errors
///
/// Returns [`WaitError::Lookup`] when the backend reports an error other
/// than "not found".
pub async fn await_state<B>(
    backend: &B,
    locator: &ResourceLocator,
    target: TargetState,
    config: &PollConfig,
) -> Result<WaitOutcome, WaitError<B::Error>>
where
    B: NetAppBackend + ?Sized,
{
    for attempt in 1..=config.max_attempts {
        sleep(config.interval).await;

        let reached = match backend.get(locator.key()).await {
            PollOutcome::Found(_) => target == TargetState::Exists,
            PollOutcome::NotFound => target == TargetState::Absent,
            PollOutcome::TransientError(source) => {
                return Err(WaitError::Lookup {
                    locator: locator.to_string(),
                    attempt,
                    source,
                });
            }
        };

        if reached {
            debug!(%locator, %target, attempt, "resource reached target state");
            return Ok(WaitOutcome::Confirmed { attempts: attempt });
        }
        debug!(%locator, %target, attempt, "resource not yet in target state");
    }

    warn!(
        %locator,
        %target,
        attempts = config.max_attempts,
        "gave up waiting for resource state"
    );
    Ok(WaitOutcome::TimedOut {
        attempts: config.max_attempts,
    })
}
