//! Single object track with zone history for multi-object tracking.

use serde::Serialize;

use crate::tracker::matching::{Detection, TrackCandidate};
use crate::tracker::rect::Rect;

/// A period during which a track has left its zone without being
/// confirmed outside yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GapEpisode {
    /// Zone the track occupied before the gap began
    pub origin_zone: String,
    /// Frame index at which the gap began
    pub started_frame: u64,
    /// Set once an exit has been emitted; the episode can no longer become a transfer
    pub exit_emitted: bool,
}

impl GapEpisode {
    pub fn age(&self, frame: u64) -> u64 {
        frame.saturating_sub(self.started_frame)
    }

    pub fn is_open(&self) -> bool {
        !self.exit_emitted
    }
}

/// Single object track.
#[derive(Debug, Clone, Serialize)]
pub struct Track {
    /// Unique track identifier, never reused by the owning tracker
    pub track_id: u64,
    pub label: String,
    /// Last matched bounding box
    pub bbox: Rect,
    /// Confidence of the last matched detection
    pub confidence: f32,
    /// Current zone; `None` means outside every zone
    pub zone_id: Option<String>,
    /// Zone before the most recent update
    pub prev_zone_id: Option<String>,
    pub first_seen_frame: u64,
    pub last_seen_frame: u64,
    pub gap: Option<GapEpisode>,
}

impl Track {
    /// Create a new track from a detection.
    pub fn new(track_id: u64, det: &Detection, frame: u64) -> Self {
        Self {
            track_id,
            label: det.label.clone(),
            bbox: det.bbox,
            confidence: det.confidence,
            zone_id: det.zone_id.clone(),
            prev_zone_id: None,
            first_seen_frame: frame,
            last_seen_frame: frame,
            gap: None,
        }
    }

    pub fn candidate(&self) -> TrackCandidate<'_> {
        TrackCandidate {
            label: &self.label,
            bbox: self.bbox,
        }
    }

    /// Frames elapsed since the track was last matched.
    pub fn frames_unseen(&self, frame: u64) -> u64 {
        frame.saturating_sub(self.last_seen_frame)
    }

    /// Refresh geometry from a matched detection. Zone bookkeeping is left to the caller.
    pub fn observe(&mut self, det: &Detection, frame: u64) {
        self.bbox = det.bbox;
        self.confidence = det.confidence;
        self.last_seen_frame = frame;
    }

    /// Open a gap episode unless one is already running.
    pub fn start_gap(&mut self, origin_zone: &str, frame: u64) {
        if self.gap.is_none() {
            self.gap = Some(GapEpisode {
                origin_zone: origin_zone.to_string(),
                started_frame: frame,
                exit_emitted: false,
            });
        }
    }

    pub fn clear_gap(&mut self) {
        self.gap = None;
    }

    /// The gap episode, if one is still waiting to become a transfer or exit.
    pub fn open_gap(&self) -> Option<&GapEpisode> {
        self.gap.as_ref().filter(|g| g.is_open())
    }

    pub fn is_outside(&self) -> bool {
        self.zone_id.is_none()
    }
}
