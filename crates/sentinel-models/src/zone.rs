//! Door zones and their geometry predicates.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A door zone: a rectangle on the image plane used for entry/exit counting.
///
/// Coordinates tolerate swapped corners; all predicates normalize first.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Zone {
    pub id: String,
    pub name: String,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    #[serde(default)]
    pub camera_id: String,
}

impl Zone {
    /// Normalized (min_x, min_y, max_x, max_y) bounds.
    fn bounds(&self) -> (f32, f32, f32, f32) {
        (
            self.x1.min(self.x2),
            self.y1.min(self.y2),
            self.x1.max(self.x2),
            self.y1.max(self.y2),
        )
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).abs()
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).abs()
    }

    /// Whether a point lies inside this zone.
    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        let (zx1, zy1, zx2, zy2) = self.bounds();
        zx1 <= x && x <= zx2 && zy1 <= y && y <= zy2
    }

    /// Whether the center of a bounding box lies inside this zone.
    pub fn center_in_zone(&self, x1: f32, y1: f32, x2: f32, y2: f32) -> bool {
        self.contains_point((x1 + x2) / 2.0, (y1 + y2) / 2.0)
    }

    /// Fraction of a box's area that lies inside this zone.
    ///
    /// Returns 0 for degenerate or disjoint boxes.
    pub fn overlap_ratio(&self, x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
        let (zx1, zy1, zx2, zy2) = self.bounds();

        let ix1 = x1.max(zx1);
        let iy1 = y1.max(zy1);
        let ix2 = x2.min(zx2);
        let iy2 = y2.min(zy2);

        if ix1 >= ix2 || iy1 >= iy2 {
            return 0.0;
        }

        let box_area = (x2 - x1) * (y2 - y1);
        if box_area <= 0.0 {
            return 0.0;
        }

        let intersection = (ix2 - ix1) * (iy2 - iy1);
        intersection / box_area
    }

    /// Whether at least `1 - tolerance` of a box overlaps this zone.
    pub fn person_in_zone_with_tolerance(
        &self,
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        tolerance: f32,
    ) -> bool {
        self.overlap_ratio(x1, y1, x2, y2) >= 1.0 - tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(x1: f32, y1: f32, x2: f32, y2: f32) -> Zone {
        Zone {
            id: "door-1".to_string(),
            name: "Main Door".to_string(),
            x1,
            y1,
            x2,
            y2,
            camera_id: String::new(),
        }
    }

    #[test]
    fn test_contains_point() {
        let z = zone(10.0, 10.0, 100.0, 100.0);
        assert!(z.contains_point(50.0, 50.0));
        assert!(z.contains_point(10.0, 100.0));
        assert!(!z.contains_point(5.0, 50.0));
    }

    #[test]
    fn test_overlap_ratio_fully_inside() {
        let z = zone(0.0, 0.0, 100.0, 100.0);
        assert!((z.overlap_ratio(10.0, 10.0, 50.0, 50.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_overlap_ratio_partial() {
        // Half the box hangs outside to the right.
        let z = zone(0.0, 0.0, 100.0, 100.0);
        let r = z.overlap_ratio(50.0, 0.0, 150.0, 100.0);
        assert!((r - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_overlap_ratio_disjoint_and_degenerate() {
        let z = zone(0.0, 0.0, 100.0, 100.0);
        assert_eq!(z.overlap_ratio(200.0, 200.0, 300.0, 300.0), 0.0);
        assert_eq!(z.overlap_ratio(50.0, 50.0, 50.0, 80.0), 0.0);
    }

    #[test]
    fn test_geometry_invariant_under_swapped_corners() {
        let a = zone(4.0, 2.0, 530.0, 388.0);
        let b = zone(530.0, 2.0, 4.0, 388.0);
        let c = zone(4.0, 388.0, 530.0, 2.0);
        let bbox = (50.0, 50.0, 450.0, 380.0);
        let r = a.overlap_ratio(bbox.0, bbox.1, bbox.2, bbox.3);
        assert_eq!(r, b.overlap_ratio(bbox.0, bbox.1, bbox.2, bbox.3));
        assert_eq!(r, c.overlap_ratio(bbox.0, bbox.1, bbox.2, bbox.3));
        assert!(a.contains_point(5.0, 3.0) && b.contains_point(5.0, 3.0) && c.contains_point(5.0, 3.0));
    }

    #[test]
    fn test_tolerance_predicate() {
        let z = zone(0.0, 0.0, 100.0, 100.0);
        // 85% inside passes a 0.2 tolerance, fails 0.1.
        assert!(z.person_in_zone_with_tolerance(15.0, 0.0, 115.0, 100.0, 0.2));
        assert!(!z.person_in_zone_with_tolerance(15.0, 0.0, 115.0, 100.0, 0.1));
    }
}
