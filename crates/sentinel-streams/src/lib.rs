//! Stream lifecycle management.
//!
//! This crate provides:
//! - The [`FrameSource`]/[`SourceConnector`] seams that keep the capture
//!   layer opaque, with a built-in MJPEG-over-HTTP source
//! - Per-stream records and their wire snapshots
//! - The [`StreamManager`]: heartbeat-driven registry of supervised
//!   per-stream workers with a stale-stream reaper

pub mod error;
pub mod manager;
pub mod record;
pub mod source;

pub use error::{StreamError, StreamResult};
pub use manager::{StartOutcome, StreamConfig, StreamManager};
pub use record::{StreamRecord, StreamStatus};
pub use source::{FrameSource, MjpegConnector, SourceConnector};
