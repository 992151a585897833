use std::time::{Duration, Instant};

/// Represents a gallery session.
///
/// The token itself is the key of the session map and is not repeated here.
#[derive(Debug, Clone, Copy)]
pub struct Session {
    /// The last time the session passed validation.
    pub last_seen: Instant,
}

impl Session {
    /// Creates a session first seen at `now`.
    pub fn new(now: Instant) -> Self {
        Self { last_seen: now }
    }

    /// Time elapsed since the session was last seen.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }

    /// A session is fresh while its idle time is strictly below `ttl`.
    pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        self.idle_for(now) < ttl
    }
}
