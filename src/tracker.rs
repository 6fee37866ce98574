mod events;
mod matching;
mod rect;
mod track;
mod zone_tracker;

pub use events::{
    EnterEvent, EnterReason, ExitEvent, ExitReason, FrameEvents, TransferEvent, TransferReason,
};
pub use matching::{
    Detection, GreedyCentroidMatcher, MatchGate, MatchingStrategy, OptimalCentroidMatcher,
    TrackCandidate, centroid_distances,
};
pub use rect::{Rect, centroid_distance};
pub use track::{GapEpisode, Track};
pub use zone_tracker::{MatcherKind, TrackerConfig, TrackerUpdate, ZoneTracker};
