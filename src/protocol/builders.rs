//! # Packet Codec — Encode Path
//!
//! One constructor per server packet: pure functions from typed arguments
//! to a complete framed packet.
//!
//! Zero-argument packets are invariant, so they are built once and served
//! from `Lazy` statics. Per-subject packets (stats, presence) are always
//! built fresh: memoizing them across different subjects would leak one
//! player's snapshot to another.

use bytes::Bytes;
use once_cell::sync::Lazy;
use rand::seq::IndexedRandom;

use crate::core::packet::ServerPacketId;
use crate::core::types::ScoreFrame;
use crate::core::writer::PacketWriter;
use crate::session::player::{Action, Player};
use crate::session::privileges::ClientPrivileges;

/// The client renders pp above this threshold incorrectly; larger values are
/// smuggled through the ranked-score field instead.
const INGAME_PP_LIMIT: i32 = 0x7fff;

// --- login / connection ---

/// Packet 5: the login reply. Negative values are rejection sentinels,
/// anything else is the authenticated user id.
pub fn user_id(id: i32) -> Bytes {
    PacketWriter::new(ServerPacketId::UserId).put_i32(id).finish()
}

/// Packet 75: protocol version advertised after login.
pub fn protocol_version(version: i32) -> Bytes {
    PacketWriter::new(ServerPacketId::ProtocolVersion)
        .put_i32(version)
        .finish()
}

/// Packet 71: the client-facing privilege bitset.
pub fn bancho_privileges(privileges: ClientPrivileges) -> Bytes {
    PacketWriter::new(ServerPacketId::Privileges)
        .put_i32(privileges.bits() as i32)
        .finish()
}

/// Packet 24: a toast notification.
pub fn notification(message: &str) -> Bytes {
    PacketWriter::new(ServerPacketId::Notification)
        .put_str(message)
        .finish()
}

/// Packet 76: main menu icon, `icon|onclick` as one string.
pub fn main_menu_icon(icon_url: &str, onclick_url: &str) -> Bytes {
    PacketWriter::new(ServerPacketId::MainMenuIcon)
        .put_str(&format!("{icon_url}|{onclick_url}"))
        .finish()
}

/// Packet 86: server restart countdown in milliseconds.
pub fn server_restarted(ms: i32) -> Bytes {
    PacketWriter::new(ServerPacketId::Restart).put_i32(ms).finish()
}

/// Packet 103: hand the client off to another server.
pub fn switch_server(timeout: i32) -> Bytes {
    PacketWriter::new(ServerPacketId::SwitchServer)
        .put_i32(timeout)
        .finish()
}

/// Packet 107: hand a tournament client off to another host.
pub fn switch_tournament_server(ip: &str) -> Bytes {
    PacketWriter::new(ServerPacketId::SwitchTournamentServer)
        .put_str(ip)
        .finish()
}

static PONG: Lazy<Bytes> = Lazy::new(|| PacketWriter::new(ServerPacketId::Pong).finish());

/// Packet 8: keep-alive reply.
pub fn pong() -> Bytes {
    PONG.clone()
}

static VERSION_UPDATE: Lazy<Bytes> =
    Lazy::new(|| PacketWriter::new(ServerPacketId::VersionUpdate).finish());

/// Packet 19: a client update is available.
pub fn version_update() -> Bytes {
    VERSION_UPDATE.clone()
}

static VERSION_UPDATE_FORCED: Lazy<Bytes> =
    Lazy::new(|| PacketWriter::new(ServerPacketId::VersionUpdateForced).finish());

/// Packet 102: the client must update before logging in.
pub fn version_update_forced() -> Bytes {
    VERSION_UPDATE_FORCED.clone()
}

static GET_ATTENTION: Lazy<Bytes> =
    Lazy::new(|| PacketWriter::new(ServerPacketId::GetAttention).finish());

/// Packet 23: flash the client window.
pub fn get_attention() -> Bytes {
    GET_ATTENTION.clone()
}

static ACCOUNT_RESTRICTED: Lazy<Bytes> =
    Lazy::new(|| PacketWriter::new(ServerPacketId::AccountRestricted).finish());

/// Packet 104: tell the session it is restricted.
pub fn account_restricted() -> Bytes {
    ACCOUNT_RESTRICTED.clone()
}

// --- presence / stats ---

/// Packet 11: the player's live stats snapshot. Never memoized; the payload
/// is per-subject, per-moment state.
pub fn user_stats(player: &Player) -> Bytes {
    let stats = player.gamemode_stats();
    let status = player.status();

    // Smuggle oversized pp through the ranked-score field
    let (ranked_score, pp) = if stats.pp > INGAME_PP_LIMIT {
        (i64::from(stats.pp), 0)
    } else {
        (stats.ranked_score, stats.pp)
    };

    PacketWriter::new(ServerPacketId::UserStats)
        .put_i32(player.id)
        .put_u8(status.action as u8)
        .put_str(&status.action_info)
        .put_str(&status.map_md5)
        .put_i32(status.mods.bits() as i32)
        .put_u8(status.mode.as_vanilla())
        .put_i32(status.map_id)
        .put_i64(ranked_score)
        .put_f32(stats.acc / 100.0)
        .put_i32(stats.playcount)
        .put_i64(stats.total_score)
        .put_i32(stats.rank)
        .put_i16(pp as i16)
        .finish()
}

const BOT_STATUSES: [(Action, &str); 3] = [
    (Action::Watching, "over your shoulder"),
    (Action::Watching, "the inside of your walls"),
    (Action::Watching, "cat videos"),
];

/// Packet 11 for the resident bot: synthetic stats with a rotating status.
pub fn bot_stats(player: &Player) -> Bytes {
    let (action, action_info) = *BOT_STATUSES
        .choose(&mut rand::rng())
        .unwrap_or(&BOT_STATUSES[0]);

    PacketWriter::new(ServerPacketId::UserStats)
        .put_i32(player.id)
        .put_u8(action as u8)
        .put_str(action_info)
        .put_str("")
        .put_i32(0)
        .put_u8(0)
        .put_i32(0)
        .put_i64(0)
        .put_f32(1.0)
        .put_i32(0)
        .put_i64(0)
        .put_i32(0)
        .put_i16(2137)
        .finish()
}

/// Packet 83: the player's public presence snapshot. Never memoized.
pub fn user_presence(player: &Player) -> Bytes {
    let stats = player.gamemode_stats();
    let mode = player.status().mode;

    PacketWriter::new(ServerPacketId::UserPresence)
        .put_i32(player.id)
        .put_str(&player.name)
        .put_u8((i16::from(player.utc_offset) + 24) as u8)
        .put_u8(player.geolocation.country_code)
        .put_u8((player.client_privileges().bits() as u8) | (mode.as_vanilla() << 5))
        .put_f32(player.geolocation.longitude)
        .put_f32(player.geolocation.latitude)
        .put_i32(stats.rank)
        .finish()
}

/// Packet 83 for the resident bot: fixed presence with coordinates off the
/// edge of the map.
pub fn bot_presence(player: &Player) -> Bytes {
    PacketWriter::new(ServerPacketId::UserPresence)
        .put_i32(player.id)
        .put_str(&player.name)
        .put_u8(24)
        .put_u8(245) // "satellite provider"
        .put_u8(31)
        .put_f32(1234.0)
        .put_f32(4321.0)
        .put_i32(0)
        .finish()
}

/// Packet 12: a player logged out.
pub fn logout(user_id: i32) -> Bytes {
    PacketWriter::new(ServerPacketId::UserLogout)
        .put_i32(user_id)
        .put_u8(0)
        .finish()
}

/// Packet 72: the player's friend ids.
pub fn friends_list(friend_ids: &[i32]) -> Bytes {
    PacketWriter::new(ServerPacketId::FriendsList)
        .put_i32_list_u16len(friend_ids)
        .finish()
}

// --- chat ---

/// Packet 7: deliver a chat message.
pub fn send_message(sender: &str, text: &str, recipient: &str, sender_id: i32) -> Bytes {
    PacketWriter::new(ServerPacketId::SendMessage)
        .put_message(sender, text, recipient, sender_id)
        .finish()
}

/// Packet 92: seconds of silence remaining.
pub fn silence_end(delta: i32) -> Bytes {
    PacketWriter::new(ServerPacketId::SilenceEnd)
        .put_i32(delta)
        .finish()
}

/// Packet 94: a player was silenced.
pub fn user_silenced(user_id: i32) -> Bytes {
    PacketWriter::new(ServerPacketId::UserSilenced)
        .put_i32(user_id)
        .finish()
}

/// Packet 100: the target blocks DMs from non-friends.
pub fn user_dm_blocked(target: &str) -> Bytes {
    PacketWriter::new(ServerPacketId::UserDmBlocked)
        .put_message("", "", target, 0)
        .finish()
}

/// Packet 101: the target is silenced.
pub fn target_silenced(target: &str) -> Bytes {
    PacketWriter::new(ServerPacketId::TargetIsSilenced)
        .put_message("", "", target, 0)
        .finish()
}

static TOGGLE_BLOCK_NON_FRIEND_DMS: Lazy<Bytes> =
    Lazy::new(|| PacketWriter::new(ServerPacketId::ToggleBlockNonFriendDms).finish());

/// Packet 34: acknowledge the DM privacy toggle.
pub fn toggle_block_non_friend_dms() -> Bytes {
    TOGGLE_BLOCK_NON_FRIEND_DMS.clone()
}

// --- channels ---

/// Packet 64: the channel join went through.
pub fn channel_join_success(name: &str) -> Bytes {
    PacketWriter::new(ServerPacketId::ChannelJoinSuccess)
        .put_str(name)
        .finish()
}

/// Packet 65: advertise a channel and its population.
pub fn channel_info(name: &str, topic: &str, player_count: u16) -> Bytes {
    PacketWriter::new(ServerPacketId::ChannelInfo)
        .put_channel(name, topic, player_count)
        .finish()
}

/// Packet 66: forcibly remove the client from a channel.
pub fn channel_kick(name: &str) -> Bytes {
    PacketWriter::new(ServerPacketId::ChannelKick)
        .put_str(name)
        .finish()
}

/// Packet 67: a channel the client joins automatically.
pub fn channel_auto_join(name: &str, topic: &str, player_count: u16) -> Bytes {
    PacketWriter::new(ServerPacketId::ChannelAutoJoin)
        .put_channel(name, topic, player_count)
        .finish()
}

static CHANNEL_INFO_END: Lazy<Bytes> =
    Lazy::new(|| PacketWriter::new(ServerPacketId::ChannelInfoEnd).finish());

/// Packet 89: end of the login channel listing.
pub fn channel_info_end() -> Bytes {
    CHANNEL_INFO_END.clone()
}

// --- spectating ---

/// Packet 13: someone started watching this client.
pub fn spectator_joined(user_id: i32) -> Bytes {
    PacketWriter::new(ServerPacketId::SpectatorJoined)
        .put_i32(user_id)
        .finish()
}

/// Packet 14: a spectator detached.
pub fn spectator_left(user_id: i32) -> Bytes {
    PacketWriter::new(ServerPacketId::SpectatorLeft)
        .put_i32(user_id)
        .finish()
}

/// Packet 15: relay raw replay frames to a spectator. The bundle bytes pass
/// through untouched.
pub fn spectate_frames(raw: &[u8]) -> Bytes {
    PacketWriter::new(ServerPacketId::SpectateFrames)
        .put_raw(raw)
        .finish()
}

/// Packet 22: the host cannot be spectated right now.
pub fn spectator_cant_spectate(user_id: i32) -> Bytes {
    PacketWriter::new(ServerPacketId::SpectatorCantSpectate)
        .put_i32(user_id)
        .finish()
}

/// Packet 42: a fellow spectator joined the same host.
pub fn fellow_spectator_joined(user_id: i32) -> Bytes {
    PacketWriter::new(ServerPacketId::FellowSpectatorJoined)
        .put_i32(user_id)
        .finish()
}

/// Packet 43: a fellow spectator left.
pub fn fellow_spectator_left(user_id: i32) -> Bytes {
    PacketWriter::new(ServerPacketId::FellowSpectatorLeft)
        .put_i32(user_id)
        .finish()
}

// --- multiplayer (lobby features are stubs; these cover the packets the
// --- stub handlers and relays still emit) ---

/// Packet 28: a match was torn down.
pub fn dispose_match(match_id: i32) -> Bytes {
    PacketWriter::new(ServerPacketId::DisposeMatch)
        .put_i32(match_id)
        .finish()
}

/// Packet 48: relay a score frame to the match.
pub fn match_score_update(frame: &ScoreFrame) -> Bytes {
    PacketWriter::new(ServerPacketId::MatchScoreUpdate)
        .put_scoreframe(frame)
        .finish()
}

static MATCH_TRANSFER_HOST: Lazy<Bytes> =
    Lazy::new(|| PacketWriter::new(ServerPacketId::MatchTransferHost).finish());

/// Packet 50: host was handed to this client.
pub fn match_transfer_host() -> Bytes {
    MATCH_TRANSFER_HOST.clone()
}

static MATCH_ALL_PLAYERS_LOADED: Lazy<Bytes> =
    Lazy::new(|| PacketWriter::new(ServerPacketId::MatchAllPlayersLoaded).finish());

/// Packet 53: every participant finished loading.
pub fn match_all_players_loaded() -> Bytes {
    MATCH_ALL_PLAYERS_LOADED.clone()
}

/// Packet 57: a participant failed.
pub fn match_player_failed(slot_id: i32) -> Bytes {
    PacketWriter::new(ServerPacketId::MatchPlayerFailed)
        .put_i32(slot_id)
        .finish()
}

static MATCH_COMPLETE: Lazy<Bytes> =
    Lazy::new(|| PacketWriter::new(ServerPacketId::MatchComplete).finish());

/// Packet 58: the match finished.
pub fn match_complete() -> Bytes {
    MATCH_COMPLETE.clone()
}

static MATCH_SKIP: Lazy<Bytes> = Lazy::new(|| PacketWriter::new(ServerPacketId::MatchSkip).finish());

/// Packet 61: everyone agreed to skip.
pub fn match_skip() -> Bytes {
    MATCH_SKIP.clone()
}

/// Packet 81: a participant voted to skip.
pub fn match_player_skipped(user_id: i32) -> Bytes {
    PacketWriter::new(ServerPacketId::MatchPlayerSkipped)
        .put_i32(user_id)
        .finish()
}

/// Packet 88: invite the target into the sender's match.
pub fn match_invite(sender: &Player, target_name: &str) -> Bytes {
    let message = "Come join my game!";

    PacketWriter::new(ServerPacketId::MatchInvite)
        .put_message(&sender.name, message, target_name, sender.id)
        .finish()
}

/// Packet 91: the match password changed.
pub fn match_change_password(new_password: &str) -> Bytes {
    PacketWriter::new(ServerPacketId::MatchChangePassword)
        .put_str(new_password)
        .finish()
}

static MATCH_ABORT: Lazy<Bytes> =
    Lazy::new(|| PacketWriter::new(ServerPacketId::MatchAbort).finish());

/// Packet 106: the match was aborted mid-play.
pub fn match_abort() -> Bytes {
    MATCH_ABORT.clone()
}
