//! # Session State
//!
//! The in-memory player-session model: the player entity and its state
//! machine, the process-wide session registry, chat channels, and the
//! privilege/statistics value types the codec serializes against.

pub mod channel;
pub mod player;
pub mod privileges;
pub mod registry;
pub mod stats;

pub use player::{make_safe_name, Player, PlayerOptions};
pub use registry::SessionRegistry;
