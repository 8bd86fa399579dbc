//! # Game Modes and Per-Mode Statistics
//!
//! The mode table (vanilla rulesets plus relax/autopilot variants), the
//! gameplay modifier bitset, and the per-mode stats record refreshed from
//! persistent storage at login.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A playable game mode. Values above 3 are server-side variants that map
/// back onto a vanilla ruleset for wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum GameMode {
    #[default]
    Osu = 0,
    Taiko = 1,
    Catch = 2,
    Mania = 3,

    RelaxOsu = 4,
    RelaxTaiko = 5,
    RelaxCatch = 6,

    AutopilotOsu = 8,
}

impl GameMode {
    pub const ALL: [GameMode; 8] = [
        GameMode::Osu,
        GameMode::Taiko,
        GameMode::Catch,
        GameMode::Mania,
        GameMode::RelaxOsu,
        GameMode::RelaxTaiko,
        GameMode::RelaxCatch,
        GameMode::AutopilotOsu,
    ];

    pub fn from_u8(value: u8) -> Option<Self> {
        use GameMode::*;

        Some(match value {
            0 => Osu,
            1 => Taiko,
            2 => Catch,
            3 => Mania,
            4 => RelaxOsu,
            5 => RelaxTaiko,
            6 => RelaxCatch,
            8 => AutopilotOsu,
            _ => return None,
        })
    }

    /// The vanilla ruleset this mode presents as on the wire.
    pub fn as_vanilla(self) -> u8 {
        match self {
            GameMode::Osu | GameMode::RelaxOsu | GameMode::AutopilotOsu => 0,
            GameMode::Taiko | GameMode::RelaxTaiko => 1,
            GameMode::Catch | GameMode::RelaxCatch => 2,
            GameMode::Mania => 3,
        }
    }
}

/// Gameplay modifier bitset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mods(pub u32);

impl Mods {
    pub const NOMOD: Mods = Mods(0);
    pub const NOFAIL: Mods = Mods(1 << 0);
    pub const EASY: Mods = Mods(1 << 1);
    pub const TOUCHSCREEN: Mods = Mods(1 << 2);
    pub const HIDDEN: Mods = Mods(1 << 3);
    pub const HARDROCK: Mods = Mods(1 << 4);
    pub const SUDDEN_DEATH: Mods = Mods(1 << 5);
    pub const DOUBLETIME: Mods = Mods(1 << 6);
    pub const RELAX: Mods = Mods(1 << 7);
    pub const HALFTIME: Mods = Mods(1 << 8);
    pub const NIGHTCORE: Mods = Mods(1 << 9);
    pub const FLASHLIGHT: Mods = Mods(1 << 10);
    pub const AUTOPLAY: Mods = Mods(1 << 11);
    pub const SPUNOUT: Mods = Mods(1 << 12);
    pub const AUTOPILOT: Mods = Mods(1 << 13);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn intersects(self, other: Mods) -> bool {
        self.0 & other.0 != 0
    }
}

/// Score grade buckets tracked per mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    XH,
    X,
    SH,
    S,
    A,
}

/// A player's stats in a single game mode.
///
/// Read-mostly: refreshed from persistent storage at login and on score
/// submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModeData {
    pub total_score: i64,
    pub ranked_score: i64,
    pub pp: i32,
    pub acc: f32,
    pub playcount: i32,
    pub playtime: i32,
    pub max_combo: i32,
    pub total_hits: i32,
    /// Global rank.
    pub rank: i32,

    pub grades: HashMap<Grade, i32>,
}
