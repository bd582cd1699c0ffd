use std::time::{Duration, Instant};

/// A request deadline, or the explicit absence of one.
///
/// Every public Bifrost entry point accepts a [`Deadline`] alongside its
/// request. The dispatcher, worker pool, and streaming router all honor it:
/// no response or stream send happens later than the deadline plus one
/// grace cycle.
#[derive(Debug, Clone, Copy)]
pub enum Deadline {
    /// No deadline; the caller accepts the request running indefinitely.
    None,
    /// Absolute instant after which the request should be aborted.
    At(Instant),
}

impl Deadline {
    /// Builds a deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self::At(Instant::now() + timeout)
    }

    /// Returns the sentinel "no deadline" value.
    pub fn none() -> Self {
        Self::None
    }

    /// Whether the deadline has already passed.
    pub fn is_expired(&self) -> bool {
        match self {
            Deadline::None => false,
            Deadline::At(at) => Instant::now() >= *at,
        }
    }

    /// Time remaining before the deadline, or `None` if there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            Deadline::None => None,
            Deadline::At(at) => Some(at.saturating_duration_since(Instant::now())),
        }
    }

    /// Picks whichever deadline is sooner; a caller-supplied deadline always
    /// overrides a longer provider default, never the other way around.
    pub fn sooner_of(self, other: Deadline) -> Deadline {
        match (self, other) {
            (Deadline::None, other) => other,
            (this, Deadline::None) => this,
            (Deadline::At(a), Deadline::At(b)) => Deadline::At(a.min(b)),
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::None
    }
}
