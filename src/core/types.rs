//! # Wire Composite Types
//!
//! Fixed-layout structures built from the primitive codec types: chat
//! messages, channel descriptors, multiplayer match state, score frames and
//! replay frame bundles.
//!
//! Each type carries its own `decode` reading from a [`Cursor`]; the
//! matching encoders live in [`crate::core::writer`].

use bytes::Bytes;

use crate::core::cursor::Cursor;
use crate::error::Result;

/// Number of slots in a multiplayer match.
pub const MATCH_SLOTS: usize = 16;

/// Slot-status bit mask that signals an occupied slot (bits 2-6); occupied
/// slots are followed by a player id in the match wire layout.
pub const SLOT_OCCUPIED_MASK: u8 = 0x7c;

/// A chat message envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender: String,
    pub text: String,
    pub recipient: String,
    pub sender_id: i32,
}

impl Message {
    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            sender: cursor.read_string()?,
            text: cursor.read_string()?,
            recipient: cursor.read_string()?,
            sender_id: cursor.read_i32()?,
        })
    }
}

/// A chat channel descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub name: String,
    pub topic: String,
    pub player_count: i32,
}

impl Channel {
    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            name: cursor.read_string()?,
            topic: cursor.read_string()?,
            player_count: cursor.read_i32()?,
        })
    }
}

/// The client's in-game action while a replay frame bundle was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReplayAction {
    Standard = 0,
    NewSong = 1,
    Skip = 2,
    Completion = 3,
    Fail = 4,
    Pause = 5,
    Unpause = 6,
    SongSelect = 7,
    WatchingOther = 8,
}

impl ReplayAction {
    pub fn from_u8(value: u8) -> Option<Self> {
        use ReplayAction::*;

        Some(match value {
            0 => Standard,
            1 => NewSong,
            2 => Skip,
            3 => Completion,
            4 => Fail,
            5 => Pause,
            6 => Unpause,
            7 => SongSelect,
            8 => WatchingOther,
            _ => return None,
        })
    }
}

/// A gameplay score snapshot.
///
/// The fixed section is a packed 29-byte structure; `combo_portion` and
/// `bonus_portion` follow only when `score_v2` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreFrame {
    pub time: i32,
    pub id: u8,
    pub count_300: u16,
    pub count_100: u16,
    pub count_50: u16,
    pub count_geki: u16,
    pub count_katu: u16,
    pub count_miss: u16,
    pub total_score: i32,
    pub current_combo: u16,
    pub max_combo: u16,
    pub perfect: bool,
    pub current_hp: u8,
    pub tag_byte: u8,

    pub score_v2: bool,
    pub combo_portion: Option<f64>,
    pub bonus_portion: Option<f64>,
}

impl ScoreFrame {
    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        let mut frame = Self {
            time: cursor.read_i32()?,
            id: cursor.read_u8()?,
            count_300: cursor.read_u16()?,
            count_100: cursor.read_u16()?,
            count_50: cursor.read_u16()?,
            count_geki: cursor.read_u16()?,
            count_katu: cursor.read_u16()?,
            count_miss: cursor.read_u16()?,
            total_score: cursor.read_i32()?,
            current_combo: cursor.read_u16()?,
            max_combo: cursor.read_u16()?,
            perfect: cursor.read_u8()? != 0,
            current_hp: cursor.read_u8()?,
            tag_byte: cursor.read_u8()?,
            score_v2: cursor.read_u8()? != 0,
            combo_portion: None,
            bonus_portion: None,
        };

        if frame.score_v2 {
            frame.combo_portion = Some(cursor.read_f64()?);
            frame.bonus_portion = Some(cursor.read_f64()?);
        }

        Ok(frame)
    }
}

/// A single input frame within a replay bundle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayFrame {
    pub button_state: u8,
    pub taiko_byte: u8,
    pub x: f32,
    pub y: f32,
    pub time: i32,
}

impl ReplayFrame {
    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            button_state: cursor.read_u8()?,
            taiko_byte: cursor.read_u8()?,
            x: cursor.read_f32()?,
            y: cursor.read_f32()?,
            time: cursor.read_i32()?,
        })
    }
}

/// A batch of replay frames plus the score state at capture time.
///
/// `raw` retains the complete unparsed payload so the bundle can be relayed
/// to spectators without re-encoding.
#[derive(Debug, Clone)]
pub struct ReplayFrameBundle {
    pub extra: i32,
    pub frames: Vec<ReplayFrame>,
    pub action: ReplayAction,
    pub score_frame: ScoreFrame,
    pub sequence: u16,
    pub raw: Bytes,
}

impl ReplayFrameBundle {
    /// Decode a bundle from `cursor`, keeping `raw` as the passthrough copy
    /// of the full payload range.
    pub fn decode(cursor: &mut Cursor<'_>, raw: Bytes) -> Result<Self> {
        let extra = cursor.read_i32()?;
        let frame_count = cursor.read_u16()?;

        let mut frames = Vec::with_capacity(usize::from(frame_count));
        for _ in 0..frame_count {
            frames.push(ReplayFrame::decode(cursor)?);
        }

        // Out-of-range actions come from buggy or hostile clients; fall back
        // to Standard rather than failing the whole request.
        let action = ReplayAction::from_u8(cursor.read_u8()?).unwrap_or(ReplayAction::Standard);
        let score_frame = ScoreFrame::decode(cursor)?;
        let sequence = cursor.read_u16()?;

        Ok(Self {
            extra,
            frames,
            action,
            score_frame,
            sequence,
            raw,
        })
    }
}

/// Multiplayer match state as carried on the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiplayerMatch {
    pub id: i16,
    pub in_progress: bool,

    pub powerplay: i8,
    pub mods: i32,
    pub name: String,
    pub password: String,

    pub map_name: String,
    pub map_id: i32,
    pub map_md5: String,

    pub slot_statuses: [u8; MATCH_SLOTS],
    pub slot_teams: [u8; MATCH_SLOTS],
    /// One id per occupied slot, in ascending slot order.
    pub slot_ids: Vec<i32>,

    pub host_id: i32,

    pub mode: u8,
    pub win_condition: u8,
    pub team_type: u8,

    pub freemod: bool,
    /// Per-slot mods, present only when `freemod` is set.
    pub slot_mods: Vec<i32>,

    /// Seed for the mania Random mod.
    pub seed: i32,
}

impl MultiplayerMatch {
    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        let mut m = Self {
            id: cursor.read_i16()?,
            in_progress: cursor.read_i8()? == 1,
            powerplay: cursor.read_i8()?,
            mods: cursor.read_i32()?,
            name: cursor.read_string()?,
            password: cursor.read_string()?,
            map_name: cursor.read_string()?,
            map_id: cursor.read_i32()?,
            map_md5: cursor.read_string()?,
            ..Default::default()
        };

        for status in &mut m.slot_statuses {
            *status = cursor.read_u8()?;
        }
        for team in &mut m.slot_teams {
            *team = cursor.read_u8()?;
        }

        // Occupied slots carry a trailing player id each
        for status in m.slot_statuses {
            if status & SLOT_OCCUPIED_MASK != 0 {
                m.slot_ids.push(cursor.read_i32()?);
            }
        }

        m.host_id = cursor.read_i32()?;
        m.mode = cursor.read_u8()?;
        m.win_condition = cursor.read_u8()?;
        m.team_type = cursor.read_u8()?;
        m.freemod = cursor.read_i8()? == 1;

        if m.freemod {
            m.slot_mods.reserve(MATCH_SLOTS);
            for _ in 0..MATCH_SLOTS {
                m.slot_mods.push(cursor.read_i32()?);
            }
        }

        m.seed = cursor.read_i32()?;

        Ok(m)
    }
}
