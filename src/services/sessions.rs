use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::crypto::token::generate_session_token;
use crate::models::session::Session;

/// Issues and checks the short-lived gallery sessions.
pub trait SessionService: Send + Sync {
    /// Creates a new session and returns its token.
    fn issue(&self) -> String;

    /// Returns `true` and slides the expiry forward if `token` names a fresh
    /// session. Unknown or stale tokens return `false` and change nothing.
    fn validate_and_refresh(&self, token: &str) -> bool;

    /// Removes every session idle for longer than the expiry window and
    /// returns how many were dropped.
    fn reap(&self) -> usize;
}

/// Mutex-guarded token map.
///
/// Every operation does its whole read-modify-write inside one critical
/// section; nothing under the lock performs I/O.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    /// Creates an empty store whose sessions expire after `ttl` of idleness.
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Last time `token` passed validation, if it is stored.
    pub fn last_seen(&self, token: &str) -> Option<Instant> {
        self.sessions.lock().get(token).map(|session| session.last_seen)
    }

    fn issue_at(&self, now: Instant) -> String {
        // Generated outside the lock.
        let mut token = generate_session_token();
        loop {
            let mut sessions = self.sessions.lock();
            if !sessions.contains_key(&token) {
                sessions.insert(token.clone(), Session::new(now));
                return token;
            }
            drop(sessions);
            tracing::warn!("Session token collision, regenerating");
            token = generate_session_token();
        }
    }

    fn validate_and_refresh_at(&self, token: &str, now: Instant) -> bool {
        let mut sessions = self.sessions.lock();
        match sessions.get_mut(token) {
            Some(session) if session.is_fresh(now, self.ttl) => {
                session.last_seen = now;
                true
            }
            _ => false,
        }
    }

    fn reap_at(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, session| session.idle_for(now) <= self.ttl);
        before - sessions.len()
    }
}

impl SessionService for SessionStore {
    fn issue(&self) -> String {
        self.issue_at(Instant::now())
    }

    fn validate_and_refresh(&self, token: &str) -> bool {
        self.validate_and_refresh_at(token, Instant::now())
    }

    fn reap(&self) -> usize {
        self.reap_at(Instant::now())
    }
}

/// Spawns the background task that reaps idle sessions every `every`.
///
/// # Arguments
///
/// * `sessions` - The store shared with the request handlers.
/// * `every` - The reaping period.
///
/// # Returns
///
/// The `JoinHandle` of the reaper task.
pub fn spawn_reaper(sessions: Arc<dyn SessionService>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately; there is nothing to reap yet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = sessions.reap();
            if removed > 0 {
                tracing::info!("🧹 Reaped {} idle session(s)", removed);
            } else {
                tracing::debug!("🧹 Session reaper found nothing to remove");
            }
        }
    })
}
