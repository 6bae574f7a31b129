//! TTL windows.
//!
//! Writes pick their expiry at random inside a window so that keys written
//! together do not all expire together.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Inclusive expiry window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TtlRange {
    pub min: Duration,
    pub max: Duration,
}

impl TtlRange {
    /// Creates a window, swapping the bounds if they are inverted.
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// A window that always yields `ttl`.
    pub fn fixed(ttl: Duration) -> Self {
        Self { min: ttl, max: ttl }
    }

    /// Builds a window from millisecond bounds, rejecting an empty maximum.
    pub fn from_millis(min_ms: u64, max_ms: u64) -> Result<Self> {
        if max_ms == 0 {
            return Err(CoreError::invalid_ttl("maximum must be > 0"));
        }
        if min_ms > max_ms {
            return Err(CoreError::invalid_ttl(format!(
                "minimum {min_ms}ms exceeds maximum {max_ms}ms"
            )));
        }
        Ok(Self::new(
            Duration::from_millis(min_ms),
            Duration::from_millis(max_ms),
        ))
    }

    pub fn is_fixed(&self) -> bool {
        self.min == self.max
    }

    /// Draws a uniformly random duration within the window, at millisecond
    /// granularity.
    pub fn sample(&self) -> Duration {
        if self.is_fixed() {
            return self.min;
        }
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

/// Caller-supplied TTL. Missing bounds come from a default window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ttl {
    pub min: Option<Duration>,
    pub max: Option<Duration>,
}

impl Ttl {
    /// Exactly `ttl`, no randomisation.
    pub fn fixed(ttl: Duration) -> Self {
        Self {
            min: Some(ttl),
            max: Some(ttl),
        }
    }

    pub fn range(min: Duration, max: Duration) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn at_least(min: Duration) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    pub fn at_most(max: Duration) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    /// Resolves against `default`.
    ///
    /// When only one bound is given and it lies outside the default window,
    /// the other bound collapses onto it.
    pub fn resolve(&self, default: TtlRange) -> TtlRange {
        match (self.min, self.max) {
            (Some(min), Some(max)) => TtlRange::new(min, max),
            (Some(min), None) => TtlRange::new(min, default.max.max(min)),
            (None, Some(max)) => TtlRange::new(default.min.min(max), max),
            (None, None) => default,
        }
    }
}

impl From<Duration> for Ttl {
    fn from(ttl: Duration) -> Self {
        Ttl::fixed(ttl)
    }
}
