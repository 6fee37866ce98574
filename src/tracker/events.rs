//! Zone events derived from track trajectories.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferReason {
    /// Zone A in one frame, zone B in the next
    DirectZoneChange,
    /// Zone A, a short stretch outside every zone, then zone B
    NoZoneGap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnterReason {
    NewTrackInZone,
    EnterFromOutside,
    EnterAfterLongGap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    ExitAfterGapTimeout,
    ExitOnExpire,
}

macro_rules! reason_str {
    ($ty:ty { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

reason_str!(TransferReason {
    DirectZoneChange => "direct_zone_change",
    NoZoneGap => "no_zone_gap",
});

reason_str!(EnterReason {
    NewTrackInZone => "new_track_in_zone",
    EnterFromOutside => "enter_from_outside",
    EnterAfterLongGap => "enter_after_long_gap",
});

reason_str!(ExitReason {
    ExitAfterGapTimeout => "exit_after_gap_timeout",
    ExitOnExpire => "exit_on_expire",
});

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferEvent {
    pub track_id: u64,
    pub label: String,
    pub from_zone: String,
    pub to_zone: String,
    pub reason: TransferReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnterEvent {
    pub track_id: u64,
    pub label: String,
    pub to_zone: String,
    pub reason: EnterReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExitEvent {
    pub track_id: u64,
    pub label: String,
    pub from_zone: String,
    pub reason: ExitReason,
}

/// Events produced by one tracker update, split by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameEvents {
    pub transfers: Vec<TransferEvent>,
    pub enters: Vec<EnterEvent>,
    pub exits: Vec<ExitEvent>,
}

impl FrameEvents {
    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty() && self.enters.is_empty() && self.exits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.transfers.len() + self.enters.len() + self.exits.len()
    }

    /// Number of events of any kind attributed to `track_id`.
    pub fn count_for(&self, track_id: u64) -> usize {
        self.transfers.iter().filter(|e| e.track_id == track_id).count()
            + self.enters.iter().filter(|e| e.track_id == track_id).count()
            + self.exits.iter().filter(|e| e.track_id == track_id).count()
    }
}
