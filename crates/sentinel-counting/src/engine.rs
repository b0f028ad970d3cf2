//! The counting engine: per-track state and the entry/exit state machine.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use sentinel_models::{TrackedBox, Zone};

/// Frames a track may go unseen before it is swept out.
pub const STALE_TRACK_FRAMES: u64 = 30;
/// Minimum frames a track must have been observed before an entry counts.
pub const MIN_ZONE_FRAMES: u64 = 5;
/// Zone ids retained per track.
pub const ZONE_HISTORY_LEN: usize = 30;
/// Overlap that arms the entry hysteresis.
pub const ARM_OVERLAP: f32 = 0.5;
/// Overlap required on the frame an entry is counted.
pub const ENTRY_OVERLAP: f32 = 0.8;

/// Per-track persistent state, created on first sighting of a track id and
/// mutated only by the counting engine.
#[derive(Debug, Clone)]
pub struct TrackedPerson {
    pub track_id: i64,
    /// Zone ids this person has resided in, deduplicated consecutively.
    pub zone_history: Vec<String>,
    pub frame_count: u64,
    pub last_seen_frame: u64,
    pub first_zone_entry: Option<String>,
    pub zone_entry_frame: u64,
    /// Latch: once counted, never resets while the track exists.
    pub has_been_counted: bool,
    /// Highest overlap fraction ever observed for this track, across zones.
    pub max_overlap_ratio: f32,
}

impl TrackedPerson {
    fn new(track_id: i64, frame: u64) -> Self {
        Self {
            track_id,
            zone_history: Vec::new(),
            frame_count: 0,
            last_seen_frame: frame,
            first_zone_entry: None,
            zone_entry_frame: 0,
            has_been_counted: false,
            max_overlap_ratio: 0.0,
        }
    }
}

/// Entry/exit events produced by one frame, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum CountEvent {
    Entry {
        track_id: i64,
        zone_id: String,
    },
    Exit {
        track_id: i64,
        entry_zone: Option<String>,
        frames_tracked: u64,
    },
}

/// Occupancy reporting mode. Advisory: `live` reporting keeps the
/// persistent count on the wire until the product decides otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyMode {
    Live,
    #[default]
    Persistent,
}

impl OccupancyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OccupancyMode::Live => "live",
            OccupancyMode::Persistent => "persistent",
        }
    }
}

impl fmt::Display for OccupancyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OccupancyMode {
    type Err = OccupancyModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(OccupancyMode::Live),
            "persistent" => Ok(OccupancyMode::Persistent),
            _ => Err(OccupancyModeParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Mode must be 'live' or 'persistent', got '{0}'")]
pub struct OccupancyModeParseError(String);

/// Point-in-time view of the aggregate counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OccupancySnapshot {
    pub entry_count: u64,
    pub exit_count: u64,
    /// `entries - exits`, clamped non-negative.
    pub live_occupancy: u64,
    /// Cumulative distinct entries; never decremented.
    pub persistent_occupancy: u64,
    pub active_tracks: usize,
}

/// The counting state machine. All mutation happens through
/// [`CountingEngine::process_frame`] and [`CountingEngine::reset`]; callers
/// serialize access so no two frames interleave their updates.
#[derive(Debug, Default)]
pub struct CountingEngine {
    tracked: HashMap<i64, TrackedPerson>,
    frame_number: u64,
    entry_count: u64,
    exit_count: u64,
    live_occupancy: u64,
    persistent_occupancy: u64,
    mode: OccupancyMode,
}

impl CountingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance one frame: update per-track state, apply the entry rule, then
    /// sweep stale tracks (emitting exits). Returns the frame's events.
    ///
    /// Entry rule (hysteresis): a track is counted the first time its
    /// current overlap with some zone reaches [`ENTRY_OVERLAP`] while its
    /// all-time maximum overlap has reached [`ARM_OVERLAP`] and it has been
    /// observed for at least [`MIN_ZONE_FRAMES`] frames. Zones are evaluated
    /// in registry order; the first zone to satisfy the rule is credited.
    pub fn process_frame(&mut self, tracked: &[TrackedBox], zones: &[Zone]) -> Vec<CountEvent> {
        self.frame_number += 1;
        let frame = self.frame_number;
        let mut events = Vec::new();

        for det in tracked {
            let person = self
                .tracked
                .entry(det.track_id)
                .or_insert_with(|| TrackedPerson::new(det.track_id, frame));
            person.last_seen_frame = frame;
            person.frame_count += 1;

            for zone in zones {
                let overlap = zone.overlap_ratio(det.x1, det.y1, det.x2, det.y2);
                if overlap > person.max_overlap_ratio {
                    debug!(
                        track_id = det.track_id,
                        zone_id = %zone.id,
                        overlap,
                        previous = person.max_overlap_ratio,
                        "new max overlap for track"
                    );
                    person.max_overlap_ratio = overlap;
                }

                if !person.has_been_counted
                    && person.max_overlap_ratio >= ARM_OVERLAP
                    && overlap >= ENTRY_OVERLAP
                    && person.frame_count >= MIN_ZONE_FRAMES
                {
                    person.has_been_counted = true;
                    self.entry_count += 1;
                    self.live_occupancy += 1;
                    self.persistent_occupancy += 1;
                    info!(
                        track_id = det.track_id,
                        zone = %zone.name,
                        overlap,
                        entries = self.entry_count,
                        "confirmed entry"
                    );
                    events.push(CountEvent::Entry {
                        track_id: det.track_id,
                        zone_id: zone.id.clone(),
                    });
                }

                // Residency log: consecutive-deduplicated zone ids.
                if overlap >= ENTRY_OVERLAP
                    && person.zone_history.last() != Some(&zone.id)
                {
                    person.zone_history.push(zone.id.clone());
                    if person.first_zone_entry.is_none() {
                        person.first_zone_entry = Some(zone.id.clone());
                        person.zone_entry_frame = frame;
                        info!(
                            track_id = det.track_id,
                            zone = %zone.name,
                            confidence = det.confidence,
                            "first zone residency"
                        );
                    }
                }
            }

            if person.zone_history.len() > ZONE_HISTORY_LEN {
                let excess = person.zone_history.len() - ZONE_HISTORY_LEN;
                person.zone_history.drain(..excess);
            }
        }

        events.extend(self.sweep_stale());
        events
    }

    /// Remove tracks unseen for more than [`STALE_TRACK_FRAMES`] frames,
    /// emitting an exit for each that had been counted.
    fn sweep_stale(&mut self) -> Vec<CountEvent> {
        let frame = self.frame_number;
        let stale: Vec<i64> = self
            .tracked
            .iter()
            .filter(|(_, p)| frame - p.last_seen_frame > STALE_TRACK_FRAMES)
            .map(|(id, _)| *id)
            .collect();

        let mut events = Vec::new();
        for track_id in stale {
            let Some(person) = self.tracked.remove(&track_id) else {
                continue;
            };
            if person.has_been_counted {
                self.exit_count += 1;
                self.live_occupancy = self.live_occupancy.saturating_sub(1);
                info!(
                    track_id,
                    exits = self.exit_count,
                    live_occupancy = self.live_occupancy,
                    entry_zone = person.first_zone_entry.as_deref().unwrap_or("unknown"),
                    frames_tracked = person.frame_count,
                    "track exited"
                );
                events.push(CountEvent::Exit {
                    track_id,
                    entry_zone: person.first_zone_entry,
                    frames_tracked: person.frame_count,
                });
            }
        }
        events
    }

    pub fn occupancy(&self) -> OccupancySnapshot {
        OccupancySnapshot {
            entry_count: self.entry_count,
            exit_count: self.exit_count,
            live_occupancy: self.live_occupancy,
            persistent_occupancy: self.persistent_occupancy,
            active_tracks: self.tracked.len(),
        }
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn mode(&self) -> OccupancyMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: OccupancyMode) {
        info!(%mode, "occupancy mode set");
        self.mode = mode;
    }

    pub fn track(&self, track_id: i64) -> Option<&TrackedPerson> {
        self.tracked.get(&track_id)
    }

    /// Clear all counters and tracked state.
    pub fn reset(&mut self) {
        self.tracked.clear();
        self.entry_count = 0;
        self.exit_count = 0;
        self.live_occupancy = 0;
        self.persistent_occupancy = 0;
        info!("occupancy counters reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn door_zone() -> Zone {
        Zone {
            id: "door-1".to_string(),
            name: "Main Door".to_string(),
            x1: 4.0,
            y1: 2.0,
            x2: 530.0,
            y2: 388.0,
            camera_id: String::new(),
        }
    }

    /// A box whose overlap with a (0,0)-(100,100) zone is exactly `overlap`.
    fn unit_zone() -> Zone {
        Zone {
            id: "z".to_string(),
            name: "Z".to_string(),
            x1: 0.0,
            y1: 0.0,
            x2: 100.0,
            y2: 100.0,
            camera_id: String::new(),
        }
    }

    fn box_with_overlap(track_id: i64, overlap: f32) -> TrackedBox {
        // Width-100 box shifted right so (100 - shift)/100 == overlap.
        let shift = 100.0 * (1.0 - overlap);
        TrackedBox::new(track_id, shift, 0.0, shift + 100.0, 100.0, 0.9)
    }

    fn assert_invariants(engine: &CountingEngine) {
        let s = engine.occupancy();
        assert!(s.entry_count >= s.exit_count);
        assert_eq!(s.persistent_occupancy, s.entry_count);
        assert_eq!(s.live_occupancy, s.entry_count - s.exit_count);
    }

    #[test]
    fn test_single_clean_entry() {
        // One person well inside the door zone for 10 frames: exactly one
        // entry, counted once MIN_ZONE_FRAMES is reached.
        let mut engine = CountingEngine::new();
        let zones = vec![door_zone()];
        let person = TrackedBox::new(1, 50.0, 50.0, 450.0, 380.0, 0.92);

        let mut entry_frames = Vec::new();
        for frame in 1..=10 {
            let events = engine.process_frame(&[person], &zones);
            if events
                .iter()
                .any(|e| matches!(e, CountEvent::Entry { .. }))
            {
                entry_frames.push(frame);
            }
            assert_invariants(&engine);
        }

        assert_eq!(entry_frames, vec![5]);
        let s = engine.occupancy();
        assert_eq!(s.entry_count, 1);
        assert_eq!(s.live_occupancy, 1);
        assert_eq!(s.persistent_occupancy, 1);
    }

    #[test]
    fn test_hysteresis_suppresses_partial_overlap() {
        // Overlap oscillating between 0.55 and 0.75 for 30 frames never
        // produces an entry: the 0.8 bar is never met.
        let mut engine = CountingEngine::new();
        let zones = vec![unit_zone()];
        let pattern = [0.55, 0.70, 0.60, 0.75, 0.55];

        for frame in 0..30 {
            let overlap = pattern[frame % pattern.len()];
            let events = engine.process_frame(&[box_with_overlap(3, overlap)], &zones);
            assert!(events.is_empty());
        }
        assert_eq!(engine.occupancy().entry_count, 0);
    }

    #[test]
    fn test_touching_just_below_entry_bar_never_counts() {
        let mut engine = CountingEngine::new();
        let zones = vec![unit_zone()];
        for _ in 0..100 {
            engine.process_frame(&[box_with_overlap(9, 0.79)], &zones);
        }
        assert_eq!(engine.occupancy().entry_count, 0);
    }

    #[test]
    fn test_short_lived_track_never_counts() {
        // Deep overlap but gone before MIN_ZONE_FRAMES: no entry, and no
        // exit either once the track is swept.
        let mut engine = CountingEngine::new();
        let zones = vec![unit_zone()];
        for _ in 0..3 {
            engine.process_frame(&[box_with_overlap(4, 0.9)], &zones);
        }
        for _ in 0..40 {
            let events = engine.process_frame(&[], &zones);
            assert!(events.is_empty());
        }
        let s = engine.occupancy();
        assert_eq!(s.entry_count, 0);
        assert_eq!(s.exit_count, 0);
        assert_eq!(s.active_tracks, 0);
    }

    #[test]
    fn test_exit_and_reentry_with_new_id() {
        let mut engine = CountingEngine::new();
        let zones = vec![unit_zone()];

        // Track 7 enters.
        for _ in 0..6 {
            engine.process_frame(&[box_with_overlap(7, 0.9)], &zones);
        }
        assert_eq!(engine.occupancy().entry_count, 1);

        // Gone for 31 frames: exit emitted on the sweep.
        let mut exited = false;
        for _ in 0..31 {
            let events = engine.process_frame(&[], &zones);
            exited |= events
                .iter()
                .any(|e| matches!(e, CountEvent::Exit { track_id: 7, .. }));
        }
        assert!(exited);
        let s = engine.occupancy();
        assert_eq!(s.exit_count, 1);
        assert_eq!(s.live_occupancy, 0);
        assert_eq!(s.persistent_occupancy, 1);

        // Same person re-identified as track 8: counted again.
        for _ in 0..6 {
            engine.process_frame(&[box_with_overlap(8, 0.9)], &zones);
        }
        let s = engine.occupancy();
        assert_eq!(s.entry_count, 2);
        assert_eq!(s.persistent_occupancy, 2);
        assert_eq!(s.live_occupancy, 1);
        assert_invariants(&engine);
    }

    #[test]
    fn test_at_most_one_entry_and_exit_per_track() {
        let mut engine = CountingEngine::new();
        let zones = vec![unit_zone()];

        let mut entries = 0;
        let mut exits = 0;
        // Long residency, then flickering in and out of deep overlap.
        for frame in 0..60 {
            let overlap = if frame % 3 == 0 { 0.95 } else { 0.6 };
            for event in engine.process_frame(&[box_with_overlap(5, overlap)], &zones) {
                match event {
                    CountEvent::Entry { track_id, .. } => {
                        assert_eq!(track_id, 5);
                        entries += 1;
                    }
                    CountEvent::Exit { .. } => exits += 1,
                }
            }
        }
        for _ in 0..40 {
            for event in engine.process_frame(&[], &zones) {
                if matches!(event, CountEvent::Exit { track_id: 5, .. }) {
                    exits += 1;
                }
            }
        }

        assert_eq!(entries, 1);
        assert_eq!(exits, 1);
        assert_invariants(&engine);
    }

    #[test]
    fn test_persistent_occupancy_is_monotone() {
        let mut engine = CountingEngine::new();
        let zones = vec![unit_zone()];
        let mut last_persistent = 0;

        for frame in 0..200u64 {
            // Rotating cast of tracks with varying overlap.
            let track_id = (frame / 20) as i64;
            let overlap = if frame % 2 == 0 { 0.9 } else { 0.4 };
            engine.process_frame(&[box_with_overlap(track_id, overlap)], &zones);

            let s = engine.occupancy();
            assert!(s.persistent_occupancy >= last_persistent);
            last_persistent = s.persistent_occupancy;
            assert_invariants(&engine);
        }
    }

    #[test]
    fn test_zone_history_dedup_and_cap() {
        let mut engine = CountingEngine::new();
        let zones = vec![unit_zone()];
        for _ in 0..50 {
            engine.process_frame(&[box_with_overlap(2, 0.9)], &zones);
        }
        let person = engine.track(2).expect("track exists");
        // Same zone every frame: consecutive dedup keeps one element.
        assert_eq!(person.zone_history, vec!["z".to_string()]);
        assert!(person.zone_history.len() <= ZONE_HISTORY_LEN);
        assert_eq!(person.first_zone_entry.as_deref(), Some("z"));
    }

    #[test]
    fn test_reset_clears_counters_and_tracks() {
        let mut engine = CountingEngine::new();
        let zones = vec![unit_zone()];
        for _ in 0..6 {
            engine.process_frame(&[box_with_overlap(1, 0.9)], &zones);
        }
        assert_eq!(engine.occupancy().entry_count, 1);

        engine.reset();
        let s = engine.occupancy();
        assert_eq!(s, OccupancySnapshot::default());
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("live".parse::<OccupancyMode>().unwrap(), OccupancyMode::Live);
        assert!("both".parse::<OccupancyMode>().is_err());
    }
}
