//! Two-level LLM cooldown ledger.
//!
//! The per-stream map bounds total spend per camera; the per-(stream, track)
//! map is the primary gate — operators want one adjudication per detected
//! individual, not one per alarm flurry.

use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct CooldownLedger {
    per_stream: HashMap<String, Instant>,
    per_track: HashMap<(String, i64), Instant>,
    stream_cooldown: Duration,
    track_cooldown: Duration,
}

impl CooldownLedger {
    pub fn new(stream_cooldown: Duration, track_cooldown: Duration) -> Self {
        Self {
            per_stream: HashMap::new(),
            per_track: HashMap::new(),
            stream_cooldown,
            track_cooldown,
        }
    }

    /// Remaining per-stream cooldown, if the gate is closed at `now`.
    pub fn stream_remaining(&self, stream: &str, now: Instant) -> Option<Duration> {
        let last = self.per_stream.get(stream)?;
        let elapsed = now.saturating_duration_since(*last);
        (elapsed < self.stream_cooldown).then(|| self.stream_cooldown - elapsed)
    }

    /// Remaining per-track cooldown, if the gate is closed at `now`.
    pub fn track_remaining(&self, stream: &str, track_id: i64, now: Instant) -> Option<Duration> {
        let last = self.per_track.get(&(stream.to_string(), track_id))?;
        let elapsed = now.saturating_duration_since(*last);
        (elapsed < self.track_cooldown).then(|| self.track_cooldown - elapsed)
    }

    /// Record a trigger. Called at call time, not on success, so concurrent
    /// bursts cannot all pay the LLM cost while one call is failing.
    pub fn mark(&mut self, stream: &str, track_id: Option<i64>, now: Instant) {
        self.per_stream.insert(stream.to_string(), now);
        if let Some(track_id) = track_id {
            self.per_track.insert((stream.to_string(), track_id), now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmarked_stream_is_open() {
        let ledger = CooldownLedger::new(DEFAULT_COOLDOWN, DEFAULT_COOLDOWN);
        assert!(ledger.stream_remaining("cam-a", Instant::now()).is_none());
        assert!(ledger.track_remaining("cam-a", 1, Instant::now()).is_none());
    }

    #[test]
    fn test_gates_close_after_mark_and_reopen_after_cooldown() {
        let mut ledger = CooldownLedger::new(Duration::from_secs(10), Duration::from_secs(10));
        let t0 = Instant::now();
        ledger.mark("cam-a", Some(7), t0);

        let t2 = t0 + Duration::from_secs(2);
        let remaining = ledger.stream_remaining("cam-a", t2).expect("closed");
        assert_eq!(remaining.as_secs(), 8);
        assert!(ledger.track_remaining("cam-a", 7, t2).is_some());
        // Different track on the same stream: only the stream gate applies.
        assert!(ledger.track_remaining("cam-a", 8, t2).is_none());

        let t11 = t0 + Duration::from_secs(11);
        assert!(ledger.stream_remaining("cam-a", t11).is_none());
        assert!(ledger.track_remaining("cam-a", 7, t11).is_none());
    }

    #[test]
    fn test_streams_are_independent() {
        let mut ledger = CooldownLedger::new(DEFAULT_COOLDOWN, DEFAULT_COOLDOWN);
        let t0 = Instant::now();
        ledger.mark("cam-a", None, t0);
        assert!(ledger.stream_remaining("cam-b", t0).is_none());
    }
}
