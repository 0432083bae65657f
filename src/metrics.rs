use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Player, PollSnapshot, Session};

/// A Mario Kart Wii race holds at most 12 players. Fixed by the game.
pub const RACE_CAPACITY: usize = 12;

/// What a tracked player is doing right now, derived from their session.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    Offline,
    TrackSelection,
    OngoingRace,
    OngoingRaceFull,
}

impl PlayerStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::TrackSelection => "track_selection",
            Self::OngoingRace => "ongoing_race",
            Self::OngoingRaceFull => "ongoing_race_full",
        }
    }
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified room kind. `None` means "not in a room at all", `Unknown`
/// is the catch-all for codes outside the fixed table.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    RetroVs,
    RetroTt,
    #[serde(rename = "retro_200cc")]
    Retro200cc,
    CustomVs,
    CustomTt,
    #[serde(rename = "custom_200cc")]
    Custom200cc,
    None,
    Unknown,
}

impl RoomType {
    /// Every value this classification can take, in display order. Exposed
    /// as the option list of the room type sensor.
    pub const OPTIONS: [Self; 8] = [
        Self::RetroVs,
        Self::RetroTt,
        Self::Retro200cc,
        Self::CustomVs,
        Self::CustomTt,
        Self::Custom200cc,
        Self::None,
        Self::Unknown,
    ];

    #[must_use]
    pub fn from_rk(rk: &str) -> Self {
        match rk {
            "vs_10" => Self::RetroVs,
            "vs_11" => Self::RetroTt,
            "vs_12" => Self::Retro200cc,
            "vs_20" => Self::CustomVs,
            "vs_21" => Self::CustomTt,
            "vs_22" => Self::Custom200cc,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RetroVs => "retro_vs",
            Self::RetroTt => "retro_tt",
            Self::Retro200cc => "retro_200cc",
            Self::CustomVs => "custom_vs",
            Self::CustomTt => "custom_tt",
            Self::Custom200cc => "custom_200cc",
            Self::None => "none",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a player's status from the session they were found in.
///
/// The capacity check dominates: a full room counts as racing even while
/// the suspend flag is set.
#[must_use]
pub fn player_status(session: Option<&Session>) -> PlayerStatus {
    let Some(session) = session else {
        return PlayerStatus::Offline;
    };

    let count = session.player_count();
    if session.suspend == 1 && count < RACE_CAPACITY {
        PlayerStatus::TrackSelection
    } else if count >= RACE_CAPACITY {
        PlayerStatus::OngoingRaceFull
    } else {
        PlayerStatus::OngoingRace
    }
}

#[must_use]
pub fn room_type(session: Option<&Session>) -> RoomType {
    session.map_or(RoomType::None, |session| RoomType::from_rk(&session.rk))
}

/// The player's rating, if they have one. Absence is meaningful and must
/// never be reported as zero.
#[must_use]
pub const fn points(player: Option<&Player>) -> Option<i64> {
    match player {
        Some(player) => player.ev,
        None => None,
    }
}

#[must_use]
pub fn player_count(session: Option<&Session>) -> usize {
    session.map_or(0, Session::player_count)
}

/// Number of sessions whose room kind code equals the filter.
#[must_use]
pub fn aggregate_rooms(snapshot: &PollSnapshot, rk_filter: &str) -> usize {
    snapshot
        .sessions()
        .iter()
        .filter(|session| session.rk == rk_filter)
        .count()
}

/// Total players across all sessions whose room kind code equals the filter.
#[must_use]
pub fn aggregate_players(snapshot: &PollSnapshot, rk_filter: &str) -> usize {
    snapshot
        .sessions()
        .iter()
        .filter(|session| session.rk == rk_filter)
        .map(Session::player_count)
        .sum()
}
