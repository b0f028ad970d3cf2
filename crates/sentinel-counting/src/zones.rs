//! Registry of operator-configured door zones.

use sentinel_models::Zone;
use tracing::info;

/// The active door-zone set. Single writer at a time; zone updates replace
/// the whole set. Iteration order is the order zones were supplied in, which
/// is also the order the counting engine evaluates them.
#[derive(Debug, Default)]
pub struct ZoneRegistry {
    zones: Vec<Zone>,
}

impl ZoneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replace the active zone set.
    pub fn update(&mut self, zones: Vec<Zone>, camera_id: &str) {
        info!(
            camera_id,
            count = zones.len(),
            "replacing active door zones"
        );
        for zone in &zones {
            info!(
                zone_id = %zone.id,
                name = %zone.name,
                width = zone.width(),
                height = zone.height(),
                "door zone configured"
            );
        }
        self.zones = zones;
    }

    pub fn all(&self) -> &[Zone] {
        &self.zones
    }

    /// Snapshot the zone set so counting can run outside this registry's lock.
    pub fn to_vec(&self) -> Vec<Zone> {
        self.zones.clone()
    }

    /// Zones configured for one camera. Zones without a camera tag apply to
    /// every camera.
    pub fn for_camera(&self, camera_id: &str) -> Vec<Zone> {
        self.zones
            .iter()
            .filter(|z| z.camera_id.is_empty() || z.camera_id == camera_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(id: &str, camera_id: &str) -> Zone {
        Zone {
            id: id.to_string(),
            name: id.to_string(),
            x1: 0.0,
            y1: 0.0,
            x2: 10.0,
            y2: 10.0,
            camera_id: camera_id.to_string(),
        }
    }

    #[test]
    fn test_update_replaces_everything() {
        let mut registry = ZoneRegistry::new();
        registry.update(vec![zone("a", ""), zone("b", "")], "cam-1");
        assert_eq!(registry.len(), 2);

        registry.update(vec![zone("c", "")], "cam-1");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.all()[0].id, "c");
    }

    #[test]
    fn test_for_camera_filters_tagged_zones() {
        let mut registry = ZoneRegistry::new();
        registry.update(vec![zone("a", "cam-1"), zone("b", "cam-2"), zone("c", "")], "cam-1");

        let zones = registry.for_camera("cam-1");
        let ids: Vec<&str> = zones.iter().map(|z| z.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }
}
