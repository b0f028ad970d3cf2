//! Zone-based people counting.
//!
//! This crate provides:
//! - The door-zone registry (replaced en bloc by operators)
//! - The counting engine: a frame-sequenced state machine that turns noisy
//!   tracked detections into monotone entry/exit events via a hysteresis
//!   rule on box/zone overlap

pub mod engine;
pub mod zones;

pub use engine::{
    CountEvent, CountingEngine, OccupancyMode, OccupancySnapshot, TrackedPerson, ARM_OVERLAP,
    ENTRY_OVERLAP, MIN_ZONE_FRAMES, STALE_TRACK_FRAMES, ZONE_HISTORY_LEN,
};
pub use zones::ZoneRegistry;
