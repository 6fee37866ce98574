//! Debounced per-zone occupancy counts.
//!
//! A count change is only reported after the new value has been observed
//! for `min_stable_frames` consecutive updates. This corroborates movement
//! without relying on track continuity, so it also catches objects that
//! appear or vanish without ever forming a track edge.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OccupancyConfig {
    pub min_stable_frames: u32,
}

impl Default for OccupancyConfig {
    fn default() -> Self {
        Self {
            min_stable_frames: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeDirection {
    Appearance,
    Disappearance,
}

/// A confirmed occupancy change for one zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneChange {
    pub zone_id: String,
    pub old_count: usize,
    pub new_count: usize,
}

impl ZoneChange {
    pub fn direction(&self) -> ChangeDirection {
        if self.new_count > self.old_count {
            ChangeDirection::Appearance
        } else {
            ChangeDirection::Disappearance
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidate {
    count: usize,
    frames: u32,
}

impl Candidate {
    fn first(count: usize) -> Self {
        Self { count, frames: 1 }
    }
}

#[derive(Debug, Clone)]
pub struct OccupancyDebouncer {
    zone_ids: Vec<String>,
    confirmed: HashMap<String, usize>,
    candidates: HashMap<String, Candidate>,
    min_stable_frames: u32,
}

impl OccupancyDebouncer {
    /// Every zone starts at a confirmed count of zero.
    pub fn new<I, S>(zone_ids: I, config: &OccupancyConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let zone_ids: Vec<String> = zone_ids.into_iter().map(Into::into).collect();
        let confirmed = zone_ids.iter().map(|z| (z.clone(), 0)).collect();
        Self {
            zone_ids,
            confirmed,
            candidates: HashMap::new(),
            min_stable_frames: config.min_stable_frames.max(1),
        }
    }

    pub fn confirmed_count(&self, zone_id: &str) -> Option<usize> {
        self.confirmed.get(zone_id).copied()
    }

    /// Feed the raw counts of one frame. Zones missing from `counts` read as zero.
    pub fn update(&mut self, counts: &BTreeMap<String, usize>) -> Vec<ZoneChange> {
        let mut changes = Vec::new();

        for zone_id in &self.zone_ids {
            let old = self.confirmed.get(zone_id).copied().unwrap_or(0);
            let raw = counts.get(zone_id).copied().unwrap_or(0);

            if raw == old {
                self.candidates.remove(zone_id);
                continue;
            }

            let candidate = self
                .candidates
                .entry(zone_id.clone())
                .and_modify(|c| {
                    if c.count == raw {
                        c.frames += 1;
                    } else {
                        *c = Candidate::first(raw);
                    }
                })
                .or_insert(Candidate::first(raw));

            if candidate.frames >= self.min_stable_frames {
                debug!(zone = %zone_id, old, new = raw, "occupancy change confirmed");
                changes.push(ZoneChange {
                    zone_id: zone_id.clone(),
                    old_count: old,
                    new_count: raw,
                });
                self.confirmed.insert(zone_id.clone(), raw);
                self.candidates.remove(zone_id);
            }
        }

        changes
    }
}

/// A move inferred by pairing one zone's decrement with another's increment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InferredTransfer {
    pub from_zone: String,
    pub to_zone: String,
}

/// Pair decrements with increments in order of appearance.
///
/// Returns the inferred transfers and the changes left unpaired.
pub fn infer_transfers(changes: &[ZoneChange]) -> (Vec<InferredTransfer>, Vec<ZoneChange>) {
    let decrements: Vec<usize> = (0..changes.len())
        .filter(|&i| changes[i].new_count < changes[i].old_count)
        .collect();
    let increments: Vec<usize> = (0..changes.len())
        .filter(|&i| changes[i].new_count > changes[i].old_count)
        .collect();

    let mut paired = vec![false; changes.len()];
    let mut transfers = Vec::new();
    for (&dec, &inc) in decrements.iter().zip(increments.iter()) {
        transfers.push(InferredTransfer {
            from_zone: changes[dec].zone_id.clone(),
            to_zone: changes[inc].zone_id.clone(),
        });
        paired[dec] = true;
        paired[inc] = true;
    }

    let residual = changes
        .iter()
        .zip(paired)
        .filter(|(_, used)| !used)
        .map(|(c, _)| c.clone())
        .collect();

    (transfers, residual)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(&str, usize)]) -> BTreeMap<String, usize> {
        pairs.iter().map(|(z, c)| (z.to_string(), *c)).collect()
    }

    fn change(zone_id: &str, old_count: usize, new_count: usize) -> ZoneChange {
        ZoneChange {
            zone_id: zone_id.into(),
            old_count,
            new_count,
        }
    }

    fn debouncer(frames: u32) -> OccupancyDebouncer {
        OccupancyDebouncer::new(
            ["A", "B"],
            &OccupancyConfig {
                min_stable_frames: frames,
            },
        )
    }

    #[test]
    fn test_change_confirmed_on_third_consecutive_frame() {
        let mut d = debouncer(3);
        assert!(d.update(&counts(&[("A", 0)])).is_empty());
        assert!(d.update(&counts(&[("A", 1)])).is_empty());
        assert!(d.update(&counts(&[("A", 1)])).is_empty());
        let changes = d.update(&counts(&[("A", 1)]));
        assert_eq!(changes, vec![change("A", 0, 1)]);
        assert_eq!(d.confirmed_count("A"), Some(1));
    }

    #[test]
    fn test_noise_resets_candidate() {
        let mut d = debouncer(3);
        d.update(&counts(&[("A", 1)]));
        d.update(&counts(&[("A", 1)]));
        d.update(&counts(&[("A", 0)])); // back to confirmed value
        assert!(d.update(&counts(&[("A", 1)])).is_empty());
        assert!(d.update(&counts(&[("A", 1)])).is_empty());
        assert_eq!(d.update(&counts(&[("A", 1)])).len(), 1);
    }

    #[test]
    fn test_different_candidate_restarts_count() {
        let mut d = debouncer(2);
        d.update(&counts(&[("B", 2)]));
        assert!(d.update(&counts(&[("B", 3)])).is_empty());
        let changes = d.update(&counts(&[("B", 3)]));
        assert_eq!(changes[0].new_count, 3);
        assert_eq!(changes[0].direction(), ChangeDirection::Appearance);
    }

    #[test]
    fn test_zero_threshold_clamped_to_one() {
        let mut d = debouncer(0);
        assert_eq!(d.update(&counts(&[("A", 1)])).len(), 1);
    }

    #[test]
    fn test_infer_transfers_pairs_in_order() {
        let changes = vec![
            change("A", 1, 0),
            change("B", 0, 1),
            change("C", 0, 2),
        ];
        let (transfers, residual) = infer_transfers(&changes);
        assert_eq!(
            transfers,
            vec![InferredTransfer {
                from_zone: "A".into(),
                to_zone: "B".into()
            }]
        );
        assert_eq!(residual.len(), 1);
        assert_eq!(residual[0].zone_id, "C");
    }
}
