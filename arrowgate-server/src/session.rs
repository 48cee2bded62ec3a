//! Per-connection session bookkeeping.
//!
//! The dispatcher itself keeps no state between messages; a session only
//! records activity for idle timeouts and logging.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// A client session.
pub struct Session {
    /// Unique session ID.
    pub id: String,

    /// Remote address.
    pub remote_addr: SocketAddr,

    /// Messages handled.
    request_count: AtomicU64,

    /// Frames written.
    frames_sent: AtomicU64,

    created_at: Instant,

    last_activity: std::sync::Mutex<Instant>,
}

impl Session {
    /// Creates a new session.
    pub fn new(remote_addr: SocketAddr) -> Self {
        let now = Instant::now();
        Self {
            id: Uuid::new_v4().to_string(),
            remote_addr,
            request_count: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            created_at: now,
            last_activity: std::sync::Mutex::new(now),
        }
    }

    /// Marks the session as active now.
    pub fn touch(&self) {
        if let Ok(mut last) = self.last_activity.lock() {
            *last = Instant::now();
        }
    }

    /// Returns the time since the last activity.
    pub fn idle_duration(&self) -> Duration {
        self.last_activity
            .lock()
            .map(|last| last.elapsed())
            .unwrap_or_default()
    }

    /// Returns the session age.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Records one handled message.
    pub fn record_request(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Records one written frame.
    pub fn record_frame(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }
}
