//! Per-call deadlines.

use std::time::{Duration, Instant};

use crate::{KVError, KVResult};

/// An optional point in time after which a store call must not proceed.
///
/// The default deadline never expires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// A deadline that never expires.
    pub fn none() -> Self {
        Self(None)
    }

    /// Expire at the given instant.
    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    /// Expire after the given duration from now.
    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now().checked_add(timeout))
    }

    /// Returns the instant, if any.
    pub fn instant(&self) -> Option<Instant> {
        self.0
    }

    /// Time left before expiry. `None` means unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.0
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Reports whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        matches!(self.0, Some(at) if Instant::now() >= at)
    }

    /// Fails with [`KVError::DeadlineExceeded`] once the deadline has passed.
    pub fn check(&self) -> KVResult<()> {
        if self.is_expired() {
            return Err(KVError::DeadlineExceeded);
        }
        Ok(())
    }
}

impl From<Option<Instant>> for Deadline {
    fn from(instant: Option<Instant>) -> Self {
        Self(instant)
    }
}
