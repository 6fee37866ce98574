//! Detection input and detection-to-track association strategies.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::tracker::rect::{Rect, centroid_distance};

/// Detection input for the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class label reported by the detector
    pub label: String,
    /// Detection confidence score
    #[serde(alias = "conf")]
    pub confidence: f32,
    /// Bounding box in TLBR format (x1, y1, x2, y2)
    pub bbox: Rect,
    /// Zone the box center falls in, filled by the zone assigner
    #[serde(default)]
    pub zone_id: Option<String>,
}

impl Detection {
    pub fn new(
        label: impl Into<String>,
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        confidence: f32,
    ) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox: Rect::from_tlbr(x1, y1, x2, y2),
            zone_id: None,
        }
    }

    pub fn from_rect(label: impl Into<String>, bbox: Rect, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
            zone_id: None,
        }
    }

    /// Same detection placed in `zone_id`.
    pub fn in_zone(mut self, zone_id: impl Into<String>) -> Self {
        self.zone_id = Some(zone_id.into());
        self
    }
}

/// What a strategy needs to know about an existing track.
#[derive(Debug, Clone, Copy)]
pub struct TrackCandidate<'a> {
    pub label: &'a str,
    pub bbox: Rect,
}

/// Admissibility rules shared by every strategy.
#[derive(Debug, Clone, Copy)]
pub struct MatchGate {
    pub max_distance: f32,
    pub enforce_same_label: bool,
}

impl MatchGate {
    pub fn admits(&self, track: &TrackCandidate<'_>, det: &Detection, distance: f32) -> bool {
        if self.enforce_same_label && track.label != det.label {
            return false;
        }
        distance <= self.max_distance
    }
}

/// Compute the centroid distance matrix between tracks (rows) and detections (cols).
pub fn centroid_distances(tracks: &[TrackCandidate<'_>], detections: &[Detection]) -> Array2<f32> {
    let mut dists = Array2::zeros((tracks.len(), detections.len()));
    for (i, t) in tracks.iter().enumerate() {
        for (j, d) in detections.iter().enumerate() {
            dists[[i, j]] = centroid_distance(&t.bbox, &d.bbox);
        }
    }
    dists
}

/// Associates detections with existing tracks.
///
/// Returns one entry per detection: the index of the matched track in
/// `tracks`, or `None` when the detection should start a new track. A track
/// index appears at most once.
pub trait MatchingStrategy: std::fmt::Debug + Send {
    fn associate(
        &self,
        tracks: &[TrackCandidate<'_>],
        detections: &[Detection],
        gate: &MatchGate,
    ) -> Vec<Option<usize>>;
}

/// Greedy nearest-centroid matching.
///
/// Detections are visited in input order and each claims the closest
/// unclaimed admissible track. On equal distances the earlier track wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyCentroidMatcher;

impl MatchingStrategy for GreedyCentroidMatcher {
    fn associate(
        &self,
        tracks: &[TrackCandidate<'_>],
        detections: &[Detection],
        gate: &MatchGate,
    ) -> Vec<Option<usize>> {
        let dists = centroid_distances(tracks, detections);
        let mut used = vec![false; tracks.len()];
        let mut assigned = Vec::with_capacity(detections.len());

        for (j, det) in detections.iter().enumerate() {
            let mut best: Option<(usize, f32)> = None;
            for (i, track) in tracks.iter().enumerate() {
                if used[i] {
                    continue;
                }
                let d = dists[[i, j]];
                if !gate.admits(track, det, d) {
                    continue;
                }
                if best.is_none_or(|(_, best_d)| d < best_d) {
                    best = Some((i, d));
                }
            }
            if let Some((i, _)) = best {
                used[i] = true;
            }
            assigned.push(best.map(|(i, _)| i));
        }
        assigned
    }
}

/// Globally optimal assignment minimising the summed centroid distance.
///
/// Uses the Jonker-Volgenant solver; inadmissible pairs get a prohibitive
/// cost and are discarded after solving.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimalCentroidMatcher;

const FORBIDDEN_COST: f64 = 1e6;

impl MatchingStrategy for OptimalCentroidMatcher {
    fn associate(
        &self,
        tracks: &[TrackCandidate<'_>],
        detections: &[Detection],
        gate: &MatchGate,
    ) -> Vec<Option<usize>> {
        let num_dets = detections.len();
        let num_tracks = tracks.len();
        if num_dets == 0 || num_tracks == 0 {
            return vec![None; num_dets];
        }

        let dists = centroid_distances(tracks, detections);
        let size = num_dets.max(num_tracks);
        let mut padded = Array2::<f64>::from_elem((size, size), FORBIDDEN_COST);
        for j in 0..num_dets {
            for i in 0..num_tracks {
                let d = dists[[i, j]];
                if gate.admits(&tracks[i], &detections[j], d) {
                    padded[[j, i]] = d as f64;
                }
            }
        }

        let mut assigned = vec![None; num_dets];
        if size == 1 {
            if padded[[0, 0]] < FORBIDDEN_COST {
                assigned[0] = Some(0);
            }
            return assigned;
        }
        match lapjv::lapjv(&padded) {
            Ok((row_to_col, _)) => {
                for (j, &i) in row_to_col.iter().enumerate().take(num_dets) {
                    if i < num_tracks && padded[[j, i]] < FORBIDDEN_COST {
                        assigned[j] = Some(i);
                    }
                }
            }
            Err(_) => {
                tracing::warn!("optimal assignment failed, falling back to greedy matching");
                return GreedyCentroidMatcher.associate(tracks, detections, gate);
            }
        }
        assigned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> MatchGate {
        MatchGate {
            max_distance: 50.0,
            enforce_same_label: true,
        }
    }

    fn candidate(label: &str, x1: f32, y1: f32) -> TrackCandidate<'_> {
        TrackCandidate {
            label,
            bbox: Rect::from_tlbr(x1, y1, x1 + 10.0, y1 + 10.0),
        }
    }

    #[test]
    fn test_greedy_prefers_nearest() {
        let tracks = vec![candidate("spool", 0.0, 0.0), candidate("spool", 100.0, 0.0)];
        let dets = vec![Detection::new("spool", 95.0, 0.0, 105.0, 10.0, 0.9)];
        let out = GreedyCentroidMatcher.associate(&tracks, &dets, &gate());
        assert_eq!(out, vec![Some(1)]);
    }

    #[test]
    fn test_greedy_first_detection_wins_ties() {
        let tracks = vec![candidate("spool", 50.0, 0.0)];
        let dets = vec![
            Detection::new("spool", 40.0, 0.0, 50.0, 10.0, 0.9),
            Detection::new("spool", 60.0, 0.0, 70.0, 10.0, 0.9),
        ];
        let out = GreedyCentroidMatcher.associate(&tracks, &dets, &gate());
        assert_eq!(out, vec![Some(0), None]);
    }

    #[test]
    fn test_gate_rejects_label_and_distance() {
        let tracks = vec![candidate("printer", 0.0, 0.0), candidate("spool", 200.0, 0.0)];
        let dets = vec![Detection::new("spool", 0.0, 0.0, 10.0, 10.0, 0.9)];
        let out = GreedyCentroidMatcher.associate(&tracks, &dets, &gate());
        assert_eq!(out, vec![None]);

        let relaxed = MatchGate {
            enforce_same_label: false,
            ..gate()
        };
        let out = GreedyCentroidMatcher.associate(&tracks, &dets, &relaxed);
        assert_eq!(out, vec![Some(0)]);
    }

    #[test]
    fn test_optimal_resolves_crossing_claims() {
        // Greedy lets the first detection steal track 1; the optimal solver
        // keeps both pairs within the gate.
        let tracks = vec![candidate("spool", 0.0, 0.0), candidate("spool", 40.0, 0.0)];
        let dets = vec![
            Detection::new("spool", 25.0, 0.0, 35.0, 10.0, 0.9),
            Detection::new("spool", 70.0, 0.0, 80.0, 10.0, 0.9),
        ];
        let greedy = GreedyCentroidMatcher.associate(&tracks, &dets, &gate());
        assert_eq!(greedy, vec![Some(1), None]);

        let optimal = OptimalCentroidMatcher.associate(&tracks, &dets, &gate());
        assert_eq!(optimal, vec![Some(0), Some(1)]);
    }
}
