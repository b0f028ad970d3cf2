//! Shared data models for the Sentinel detection backend.
//!
//! This crate provides Serde-serializable types for:
//! - Detection bounding boxes and their threat categories
//! - Tracked person boxes handed to the counting engine
//! - Door zones and their geometry predicates

pub mod bbox;
pub mod tracked;
pub mod zone;

// Re-export common types
pub use bbox::{iou_xyxy, BoundingBox, Category};
pub use tracked::TrackedBox;
pub use zone::Zone;
