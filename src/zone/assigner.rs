use std::collections::BTreeMap;

use crate::tracker::{Detection, Rect};
use crate::zone::model::Zone;

/// Maps a bounding box to at most one zone by its center point.
///
/// Zones are tested in configuration order; the first containing zone wins.
#[derive(Debug, Clone, Default)]
pub struct ZoneAssigner {
    zones: Vec<Zone>,
}

impl ZoneAssigner {
    pub fn new(zones: Vec<Zone>) -> Self {
        Self { zones }
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone_ids(&self) -> impl Iterator<Item = &str> {
        self.zones.iter().map(|z| z.zone_id.as_str())
    }

    /// Zone containing the center of `bbox`, or `None` for outside.
    pub fn assign(&self, bbox: &Rect) -> Option<&str> {
        let (cx, cy) = bbox.center();
        self.zones
            .iter()
            .find(|z| z.contains(cx, cy))
            .map(|z| z.zone_id.as_str())
    }

    /// Copy of `detections` with `zone_id` filled in.
    pub fn annotate(&self, detections: Vec<Detection>) -> Vec<Detection> {
        detections
            .into_iter()
            .map(|mut d| {
                d.zone_id = self.assign(&d.bbox).map(str::to_string);
                d
            })
            .collect()
    }
}

/// Count occupants per zone. Every zone in `zone_ids` is present, possibly at zero;
/// occupants in unknown zones or outside are ignored.
pub fn count_by_zone<'a, Z, O>(zone_ids: Z, occupants: O) -> BTreeMap<String, usize>
where
    Z: IntoIterator<Item = &'a str>,
    O: IntoIterator<Item = Option<&'a str>>,
{
    let mut counts: BTreeMap<String, usize> =
        zone_ids.into_iter().map(|z| (z.to_string(), 0)).collect();
    for zone in occupants.into_iter().flatten() {
        if let Some(count) = counts.get_mut(zone) {
            *count += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assigner() -> ZoneAssigner {
        ZoneAssigner::new(vec![
            Zone::new("Rack_A").with_rect(0.0, 0.0, 100.0, 100.0),
            Zone::new("Rack_B").with_rect(50.0, 0.0, 200.0, 100.0),
            Zone::new("Ledger_Only"),
        ])
    }

    #[test]
    fn test_first_matching_zone_wins() {
        let a = assigner();
        let overlap = Rect::from_tlbr(60.0, 10.0, 80.0, 30.0);
        assert_eq!(a.assign(&overlap), Some("Rack_A"));
        let right = Rect::from_tlbr(150.0, 10.0, 170.0, 30.0);
        assert_eq!(a.assign(&right), Some("Rack_B"));
    }

    #[test]
    fn test_outside_is_none() {
        let a = assigner();
        let below = Rect::from_tlbr(10.0, 300.0, 30.0, 320.0);
        assert_eq!(a.assign(&below), None);
    }

    #[test]
    fn test_annotate_and_count() {
        let a = assigner();
        let dets = a.annotate(vec![
            Detection::new("spool", 10.0, 10.0, 20.0, 20.0, 0.9),
            Detection::new("spool", 30.0, 10.0, 40.0, 20.0, 0.9),
            Detection::new("spool", 10.0, 500.0, 20.0, 520.0, 0.9),
        ]);
        assert_eq!(dets[0].zone_id.as_deref(), Some("Rack_A"));
        assert_eq!(dets[2].zone_id, None);

        let counts = count_by_zone(a.zone_ids(), dets.iter().map(|d| d.zone_id.as_deref()));
        assert_eq!(counts["Rack_A"], 2);
        assert_eq!(counts["Rack_B"], 0);
        assert_eq!(counts["Ledger_Only"], 0);
    }
}
