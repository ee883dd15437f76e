//! Session statistics.
//!
//! Counts what the controller saw during one monitoring session. Kept in
//! memory only and summarized when the session ends.

use crate::error::TransportError;
use crate::posture::PostureEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Counters for the current session.
#[derive(Debug)]
pub struct SessionStats {
    /// Valid readings applied
    readings_accepted: AtomicU64,
    /// Payloads rejected by validation
    readings_rejected: AtomicU64,
    /// Established connections that were lost
    transport_drops: AtomicU64,
    /// Connection attempts that failed
    connect_failures: AtomicU64,
    /// Polling cycles that failed
    fetch_failures: AtomicU64,
    /// Session identifier
    session_id: Uuid,
    /// Session start time
    session_start: DateTime<Utc>,
}

impl SessionStats {
    /// Start a new session.
    pub fn new() -> Self {
        Self {
            readings_accepted: AtomicU64::new(0),
            readings_rejected: AtomicU64::new(0),
            transport_drops: AtomicU64::new(0),
            connect_failures: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
            session_id: Uuid::new_v4(),
            session_start: Utc::now(),
        }
    }

    /// Count an event. `accepted` tells whether a reading passed validation.
    pub fn record(&self, event: &PostureEvent, accepted: bool) {
        let counter = match event {
            PostureEvent::TransportUp => return,
            PostureEvent::TransportDown(TransportError::Dropped(_)) => &self.transport_drops,
            PostureEvent::TransportDown(TransportError::ConnectFailed(_)) => {
                &self.connect_failures
            }
            PostureEvent::Reading(_) if accepted => &self.readings_accepted,
            PostureEvent::Reading(_) => &self.readings_rejected,
            PostureEvent::FetchFailed(_) => &self.fetch_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Get the current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            session_id: self.session_id,
            readings_accepted: self.readings_accepted.load(Ordering::Relaxed),
            readings_rejected: self.readings_rejected.load(Ordering::Relaxed),
            transport_drops: self.transport_drops.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Session Statistics ({}):\n\
             - Readings accepted: {}\n\
             - Readings rejected: {}\n\
             - Connections lost: {}\n\
             - Connection failures: {}\n\
             - Poll failures: {}\n\
             - Session duration: {} seconds",
            stats.session_id,
            stats.readings_accepted,
            stats.readings_rejected,
            stats.transport_drops,
            stats.connect_failures,
            stats.fetch_failures,
            stats.session_duration_secs
        )
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of session statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub session_id: Uuid,
    pub readings_accepted: u64,
    pub readings_rejected: u64,
    pub transport_drops: u64,
    pub connect_failures: u64,
    pub fetch_failures: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Thread-safe shared session statistics.
pub type SharedSessionStats = Arc<SessionStats>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use serde_json::json;

    #[test]
    fn test_counting() {
        let stats = SessionStats::new();
        let reading = PostureEvent::Reading(json!({"postura": "sentado"}));

        stats.record(&reading, true);
        stats.record(&reading, true);
        stats.record(&reading, false);
        stats.record(&PostureEvent::TransportUp, false);
        stats.record(
            &PostureEvent::TransportDown(TransportError::Dropped("eof".to_string())),
            false,
        );
        stats.record(&PostureEvent::FetchFailed(FetchError::Status(503)), false);

        let snap = stats.snapshot();
        assert_eq!(snap.readings_accepted, 2);
        assert_eq!(snap.readings_rejected, 1);
        assert_eq!(snap.transport_drops, 1);
        assert_eq!(snap.connect_failures, 0);
        assert_eq!(snap.fetch_failures, 1);
    }

    #[test]
    fn test_summary_format() {
        let stats = SessionStats::new();
        let summary = stats.summary();

        assert!(summary.contains("Readings accepted"));
        assert!(summary.contains("Connections lost"));
        assert!(summary.contains(&stats.session_id().to_string()));
    }
}
