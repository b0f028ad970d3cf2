//! Greedy-IoU multi-object tracker (byte-track family).
//!
//! Matches boxes frame-to-frame by IoU and hands out stable integer ids
//! that persist across calls. A track unmatched for more than `max_age`
//! updates is dropped; a detection with no matching track opens a new one.

use sentinel_models::iou_xyxy;

use crate::detector::RawDetection;

pub const DEFAULT_TRACK_IOU: f32 = 0.3;
pub const DEFAULT_TRACK_MAX_AGE: u32 = 30;

#[derive(Debug)]
struct ActiveTrack {
    id: i64,
    bbox: (f32, f32, f32, f32),
    /// Updates since last match.
    age: u32,
}

/// Persistent tracker state. Hold one per camera/model and feed it every
/// frame in order.
#[derive(Debug)]
pub struct IouTracker {
    tracks: Vec<ActiveTrack>,
    next_id: i64,
    iou_threshold: f32,
    max_age: u32,
}

impl Default for IouTracker {
    fn default() -> Self {
        Self::new(DEFAULT_TRACK_IOU, DEFAULT_TRACK_MAX_AGE)
    }
}

impl IouTracker {
    pub fn new(iou_threshold: f32, max_age: u32) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            iou_threshold,
            max_age,
        }
    }

    /// Assign a track id to each detection of the current frame.
    ///
    /// Returned ids are parallel to `detections`. Matching is greedy on
    /// descending IoU, so a detection is claimed by the best still-free
    /// track.
    pub fn update(&mut self, detections: &[RawDetection]) -> Vec<i64> {
        for track in &mut self.tracks {
            track.age += 1;
        }

        // Candidate (track, detection, iou) pairs above the floor.
        let mut pairs: Vec<(usize, usize, f32)> = Vec::new();
        for (ti, track) in self.tracks.iter().enumerate() {
            let (tx1, ty1, tx2, ty2) = track.bbox;
            for (di, det) in detections.iter().enumerate() {
                let iou = iou_xyxy(tx1, ty1, tx2, ty2, det.x1, det.y1, det.x2, det.y2);
                if iou >= self.iou_threshold {
                    pairs.push((ti, di, iou));
                }
            }
        }
        pairs.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

        let mut assigned: Vec<Option<i64>> = vec![None; detections.len()];
        let mut track_taken = vec![false; self.tracks.len()];
        for (ti, di, _) in pairs {
            if track_taken[ti] || assigned[di].is_some() {
                continue;
            }
            track_taken[ti] = true;
            let track = &mut self.tracks[ti];
            track.bbox = detections[di].coords();
            track.age = 0;
            assigned[di] = Some(track.id);
        }

        // Unmatched detections open new tracks.
        for (di, slot) in assigned.iter_mut().enumerate() {
            if slot.is_none() {
                let id = self.next_id;
                self.next_id += 1;
                self.tracks.push(ActiveTrack {
                    id,
                    bbox: detections[di].coords(),
                    age: 0,
                });
                *slot = Some(id);
            }
        }

        self.tracks.retain(|t| t.age <= self.max_age);

        assigned.into_iter().flatten().collect()
    }

    pub fn active_tracks(&self) -> usize {
        self.tracks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x1: f32, y1: f32, x2: f32, y2: f32) -> RawDetection {
        RawDetection {
            x1,
            y1,
            x2,
            y2,
            confidence: 0.9,
            class_id: 0,
            label: "person".to_string(),
        }
    }

    #[test]
    fn test_id_persists_across_frames() {
        let mut tracker = IouTracker::default();
        let first = tracker.update(&[det(10.0, 10.0, 50.0, 90.0)]);
        // Slightly moved next frame.
        let second = tracker.update(&[det(14.0, 12.0, 54.0, 92.0)]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_distinct_objects_get_distinct_ids() {
        let mut tracker = IouTracker::default();
        let ids = tracker.update(&[det(0.0, 0.0, 20.0, 40.0), det(200.0, 0.0, 220.0, 40.0)]);
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn test_best_match_wins_when_boxes_compete() {
        let mut tracker = IouTracker::default();
        let ids = tracker.update(&[det(0.0, 0.0, 100.0, 100.0)]);
        // Two candidates: one nearly identical, one barely overlapping.
        let next = tracker.update(&[det(2.0, 2.0, 102.0, 102.0), det(70.0, 70.0, 170.0, 170.0)]);
        assert_eq!(next[0], ids[0]);
        assert_ne!(next[1], ids[0]);
    }

    #[test]
    fn test_stale_track_is_dropped_and_id_not_reused() {
        let mut tracker = IouTracker::new(0.3, 2);
        let first = tracker.update(&[det(0.0, 0.0, 50.0, 50.0)]);
        for _ in 0..4 {
            tracker.update(&[]);
        }
        assert_eq!(tracker.active_tracks(), 0);
        let second = tracker.update(&[det(0.0, 0.0, 50.0, 50.0)]);
        assert_ne!(first, second);
    }
}
