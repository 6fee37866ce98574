//! Zone-aware multi-object tracker.
//!
//! Keeps object identity across frames and turns each track's zone history
//! into transfer, enter and exit events. A track that drops out of every
//! zone opens a gap episode instead of exiting at once, so a move through
//! an unmonitored stretch between two zones still reads as one transfer.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tracker::events::{
    EnterEvent, EnterReason, ExitEvent, ExitReason, FrameEvents, TransferEvent, TransferReason,
};
use crate::tracker::matching::{
    Detection, GreedyCentroidMatcher, MatchGate, MatchingStrategy, OptimalCentroidMatcher,
    TrackCandidate,
};
use crate::tracker::track::Track;

/// Which association algorithm the tracker uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatcherKind {
    #[default]
    Greedy,
    Optimal,
}

impl MatcherKind {
    pub fn build(self) -> Box<dyn MatchingStrategy> {
        match self {
            MatcherKind::Greedy => Box::new(GreedyCentroidMatcher),
            MatcherKind::Optimal => Box::new(OptimalCentroidMatcher),
        }
    }
}

/// Configuration for the ZoneTracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Frames a track survives without a detection before it is destroyed
    pub max_age_frames: u64,
    /// Largest centroid distance (pixels) accepted as the same object
    pub match_distance_px: f32,
    /// Longest zone gap that can still complete as a transfer
    pub max_zone_gap_frames: u64,
    /// Only match detections to tracks carrying the same label
    pub enforce_same_label: bool,
    pub matcher: MatcherKind,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_age_frames: 30,
            match_distance_px: 140.0,
            max_zone_gap_frames: 10,
            enforce_same_label: true,
            matcher: MatcherKind::Greedy,
        }
    }
}

/// Result of one tracker update.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrackerUpdate {
    pub frame_id: u64,
    /// Tracks matched or created this frame, in detection order
    pub tracks: Vec<Track>,
    pub events: FrameEvents,
}

#[derive(Debug)]
pub struct ZoneTracker {
    tracks: BTreeMap<u64, Track>,
    next_id: u64,
    frame_id: u64,
    config: TrackerConfig,
    matcher: Box<dyn MatchingStrategy>,
}

impl ZoneTracker {
    pub fn new(config: TrackerConfig) -> Self {
        let matcher = config.matcher.build();
        Self::with_matcher(config, matcher)
    }

    /// Create a tracker with a custom association strategy.
    pub fn with_matcher(config: TrackerConfig, matcher: Box<dyn MatchingStrategy>) -> Self {
        Self {
            tracks: BTreeMap::new(),
            next_id: 1,
            frame_id: 0,
            config,
            matcher,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Index of the last processed frame (1-based, 0 before the first update).
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    /// All live tracks, including those not seen this frame.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    pub fn track(&self, track_id: u64) -> Option<&Track> {
        self.tracks.get(&track_id)
    }

    pub fn contains(&self, track_id: u64) -> bool {
        self.tracks.contains_key(&track_id)
    }

    pub fn update(&mut self, detections: &[Detection]) -> TrackerUpdate {
        self.frame_id += 1;
        let frame = self.frame_id;
        let max_gap = self.config.max_zone_gap_frames;
        let mut events = FrameEvents::default();

        // Step 1: Associate detections with existing tracks
        let ids: Vec<u64> = self.tracks.keys().copied().collect();
        let gate = MatchGate {
            max_distance: self.config.match_distance_px,
            enforce_same_label: self.config.enforce_same_label,
        };
        let assignment = {
            let candidates: Vec<TrackCandidate<'_>> =
                self.tracks.values().map(Track::candidate).collect();
            self.matcher.associate(&candidates, detections, &gate)
        };

        // Step 2: Update matched tracks, spawn new ones
        let mut matched = HashSet::with_capacity(detections.len());
        let mut current = Vec::with_capacity(detections.len());
        for (det, slot) in detections.iter().zip(assignment) {
            let track_id = match slot.map(|idx| ids[idx]) {
                Some(id) => {
                    if let Some(track) = self.tracks.get_mut(&id) {
                        advance(track, det, frame, max_gap, &mut events);
                    }
                    id
                }
                None => self.spawn(det, frame, &mut events),
            };
            matched.insert(track_id);
            if let Some(track) = self.tracks.get(&track_id) {
                current.push(track.clone());
            }
        }

        // Step 3: Age out unseen tracks, settle gaps that ran too long
        self.settle(&matched, frame, &mut events);

        TrackerUpdate {
            frame_id: frame,
            tracks: current,
            events,
        }
    }

    fn spawn(&mut self, det: &Detection, frame: u64, events: &mut FrameEvents) -> u64 {
        let track_id = self.next_id;
        self.next_id += 1;

        if let Some(zone) = &det.zone_id {
            debug!(track_id, label = %det.label, zone = %zone, "new track in zone");
            events.enters.push(EnterEvent {
                track_id,
                label: det.label.clone(),
                to_zone: zone.clone(),
                reason: EnterReason::NewTrackInZone,
            });
        } else {
            debug!(track_id, label = %det.label, "new track outside zones");
        }

        self.tracks.insert(track_id, Track::new(track_id, det, frame));
        track_id
    }

    fn settle(&mut self, matched: &HashSet<u64>, frame: u64, events: &mut FrameEvents) {
        let max_age = self.config.max_age_frames;
        let max_gap = self.config.max_zone_gap_frames;
        let mut expired = Vec::new();

        for (&track_id, track) in self.tracks.iter_mut() {
            let seen = matched.contains(&track_id);

            if !seen && track.frames_unseen(frame) > max_age {
                if let Some(gap) = track.open_gap() {
                    debug!(track_id, from = %gap.origin_zone, "exit on track expiry");
                    events.exits.push(ExitEvent {
                        track_id,
                        label: track.label.clone(),
                        from_zone: gap.origin_zone.clone(),
                        reason: ExitReason::ExitOnExpire,
                    });
                }
                expired.push(track_id);
                continue;
            }

            // Matched tracks only qualify while they are still outside;
            // anything that landed in a zone this frame has already closed its gap.
            if seen && !track.is_outside() {
                continue;
            }
            let Some(gap) = track.gap.as_mut() else {
                continue;
            };
            if gap.exit_emitted || gap.age(frame) <= max_gap {
                continue;
            }
            debug!(track_id, from = %gap.origin_zone, age = gap.age(frame), "gap timed out");
            events.exits.push(ExitEvent {
                track_id,
                label: track.label.clone(),
                from_zone: gap.origin_zone.clone(),
                reason: ExitReason::ExitAfterGapTimeout,
            });
            gap.exit_emitted = true;
            track.zone_id = None;
        }

        for track_id in expired {
            debug!(track_id, "track removed");
            self.tracks.remove(&track_id);
        }
    }
}

/// Apply a matched detection to `track` and record the zone event it implies.
fn advance(
    track: &mut Track,
    det: &Detection,
    frame: u64,
    max_gap: u64,
    events: &mut FrameEvents,
) {
    let prev = track.zone_id.clone();
    let next = det.zone_id.clone();
    track.observe(det, frame);

    match (prev.as_deref(), next.as_deref()) {
        (Some(from), Some(to)) if from != to => {
            debug!(track_id = track.track_id, from, to, "direct zone change");
            events.transfers.push(TransferEvent {
                track_id: track.track_id,
                label: track.label.clone(),
                from_zone: from.to_string(),
                to_zone: to.to_string(),
                reason: TransferReason::DirectZoneChange,
            });
            track.clear_gap();
        }
        (Some(_), Some(_)) | (None, None) => {}
        (Some(from), None) => {
            debug!(track_id = track.track_id, from, "zone gap started");
            track.start_gap(from, frame);
        }
        // A gap already resolved by a timeout exit no longer counts as active.
        (None, Some(to)) => match track.gap.take().filter(|g| g.is_open()) {
            Some(gap) if gap.age(frame) <= max_gap && gap.origin_zone != to => {
                debug!(
                    track_id = track.track_id,
                    from = %gap.origin_zone,
                    to,
                    "transfer across zone gap"
                );
                events.transfers.push(TransferEvent {
                    track_id: track.track_id,
                    label: track.label.clone(),
                    from_zone: gap.origin_zone,
                    to_zone: to.to_string(),
                    reason: TransferReason::NoZoneGap,
                });
            }
            Some(_) => events.enters.push(EnterEvent {
                track_id: track.track_id,
                label: track.label.clone(),
                to_zone: to.to_string(),
                reason: EnterReason::EnterAfterLongGap,
            }),
            None => events.enters.push(EnterEvent {
                track_id: track.track_id,
                label: track.label.clone(),
                to_zone: to.to_string(),
                reason: EnterReason::EnterFromOutside,
            }),
        },
    }

    track.prev_zone_id = prev;
    track.zone_id = next;
}
