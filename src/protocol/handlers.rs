//! # Client Packet Handlers
//!
//! Per-packet-type handlers: each consumes one decoded [`ClientPacket`],
//! mutates player/registry/channel state, and enqueues response bytes.
//!
//! Semantically invalid field values (out-of-range enums, unknown targets)
//! are ignored with a diagnostic rather than failing the request, keeping
//! the server resilient to client bugs. Multiplayer lobby packets decode
//! fully but their handlers are stubs.

use std::sync::Arc;
use tracing::{debug, trace};

use crate::config::BanchoConfig;
use crate::core::codec::ClientPacket;
use crate::core::types::Message;
use crate::error::Result;
use crate::protocol::builders;
use crate::session::channel::ChannelMap;
use crate::session::player::{Action, Player, PresenceFilter, Status};
use crate::session::registry::SessionRegistry;
use crate::session::stats::{GameMode, Mods};
use crate::storage::AccountStore;

/// Borrowed server state handed to every handler.
pub struct HandlerContext<'a> {
    pub registry: &'a SessionRegistry,
    pub channels: &'a ChannelMap,
    pub store: &'a dyn AccountStore,
    pub config: &'a BanchoConfig,
}

/// Dispatch one decoded packet to its handler.
pub fn handle_packet(
    player: &Arc<Player>,
    packet: ClientPacket,
    ctx: &HandlerContext<'_>,
) -> Result<()> {
    match packet {
        ClientPacket::ChangeAction {
            action,
            action_info,
            map_md5,
            mods,
            mode,
            map_id,
        } => handle_change_action(player, ctx, action, action_info, map_md5, mods, mode, map_id),
        ClientPacket::SendPublicMessage(message) => handle_public_message(player, ctx, message),
        ClientPacket::Logout => {
            player.logout(ctx.registry, ctx.channels);
            Ok(())
        }
        ClientPacket::RequestStatusUpdate => {
            player.enqueue(&builders::user_stats(player));
            Ok(())
        }
        ClientPacket::Ping => {
            player.enqueue(&builders::pong());
            Ok(())
        }
        ClientPacket::StartSpectating { target_id } => {
            handle_start_spectating(player, ctx, target_id)
        }
        ClientPacket::StopSpectating => handle_stop_spectating(player, ctx),
        ClientPacket::SpectateFrames(bundle) => {
            for spectator_id in player.spectators() {
                if let Some(spectator) = ctx.registry.get_by_id(spectator_id) {
                    spectator.enqueue(&builders::spectate_frames(&bundle.raw));
                }
            }
            Ok(())
        }
        ClientPacket::CantSpectate => handle_cant_spectate(player, ctx),
        ClientPacket::SendPrivateMessage(message) => handle_private_message(player, ctx, message),
        ClientPacket::PartLobby => {
            player.set_in_lobby(false);
            Ok(())
        }
        ClientPacket::JoinLobby => {
            player.set_in_lobby(true);
            Ok(())
        }
        ClientPacket::ChannelJoin { name } => handle_channel_join(player, ctx, &name),
        ClientPacket::ChannelPart { name } => handle_channel_part(player, ctx, &name),
        ClientPacket::FriendAdd { target_id } => {
            player.add_friend(target_id);
            Ok(())
        }
        ClientPacket::FriendRemove { target_id } => {
            player.remove_friend(target_id);
            Ok(())
        }
        ClientPacket::ReceiveUpdates { filter } => {
            match PresenceFilter::from_i32(filter) {
                Some(filter) => player.set_presence_filter(filter),
                None => debug!(filter, "ignoring out-of-range presence filter"),
            }
            Ok(())
        }
        ClientPacket::SetAwayMessage(message) => {
            let away = (!message.text.is_empty()).then_some(message.text);
            player.set_away_message(away);
            Ok(())
        }
        ClientPacket::UserStatsRequest { user_ids } => {
            for id in user_ids {
                if id == player.id {
                    continue;
                }
                if let Some(other) = ctx.registry.get_by_id(id) {
                    let stats = if other.bot_client {
                        builders::bot_stats(&other)
                    } else {
                        builders::user_stats(&other)
                    };
                    player.enqueue(&stats);
                }
            }
            Ok(())
        }
        ClientPacket::UserPresenceRequest { user_ids } => {
            for id in user_ids {
                if let Some(other) = ctx.registry.get_by_id(id) {
                    let presence = if other.bot_client {
                        builders::bot_presence(&other)
                    } else {
                        builders::user_presence(&other)
                    };
                    player.enqueue(&presence);
                }
            }
            Ok(())
        }
        ClientPacket::UserPresenceRequestAll => {
            for other in ctx.registry.snapshot() {
                if other.id == player.id {
                    continue;
                }
                let presence = if other.bot_client {
                    builders::bot_presence(&other)
                } else {
                    builders::user_presence(&other)
                };
                player.enqueue(&presence);
            }
            Ok(())
        }
        ClientPacket::ToggleBlockNonFriendDms { value } => {
            player.set_pm_private(value != 0);
            player.enqueue(&builders::toggle_block_non_friend_dms());
            Ok(())
        }
        ClientPacket::ErrorReport { report } => {
            debug!(player = %player.name, report_len = report.len(), "client error report received");
            Ok(())
        }
        ClientPacket::IrcOnly => Ok(()),

        // Multiplayer lobby: wire format supported, feature stubbed
        ClientPacket::CreateMatch(_)
        | ClientPacket::JoinMatch { .. }
        | ClientPacket::PartMatch
        | ClientPacket::MatchChangeSlot { .. }
        | ClientPacket::MatchReady
        | ClientPacket::MatchLock { .. }
        | ClientPacket::MatchChangeSettings(_)
        | ClientPacket::MatchStart
        | ClientPacket::MatchScoreUpdate(_)
        | ClientPacket::MatchComplete
        | ClientPacket::MatchChangeMods { .. }
        | ClientPacket::MatchLoadComplete
        | ClientPacket::MatchNoBeatmap
        | ClientPacket::MatchNotReady
        | ClientPacket::MatchFailed
        | ClientPacket::MatchHasBeatmap
        | ClientPacket::MatchSkipRequest
        | ClientPacket::MatchTransferHost { .. }
        | ClientPacket::MatchChangeTeam
        | ClientPacket::MatchInvite { .. }
        | ClientPacket::MatchChangePassword(_)
        | ClientPacket::TournamentMatchInfoRequest { .. }
        | ClientPacket::TournamentJoinMatchChannel { .. }
        | ClientPacket::TournamentLeaveMatchChannel { .. } => {
            trace!(player = %player.name, "multiplayer packet ignored (lobby not implemented)");
            Ok(())
        }
        ClientPacket::BeatmapInfoRequest => {
            trace!(player = %player.name, "beatmap info request ignored");
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_change_action(
    player: &Arc<Player>,
    ctx: &HandlerContext<'_>,
    action: u8,
    action_info: String,
    map_md5: String,
    mods: u32,
    mode: u8,
    map_id: i32,
) -> Result<()> {
    let Some(action) = Action::from_u8(action) else {
        debug!(action, "ignoring status update with out-of-range action");
        return Ok(());
    };
    let Some(mode) = GameMode::from_u8(mode) else {
        debug!(mode, "ignoring status update with out-of-range mode");
        return Ok(());
    };

    player.set_status(Status {
        action,
        action_info,
        map_md5,
        mods: Mods(mods),
        mode,
        map_id,
    });

    if !player.is_restricted() {
        ctx.registry.broadcast(&builders::user_stats(player), &[]);
    }
    Ok(())
}

fn handle_public_message(
    player: &Arc<Player>,
    ctx: &HandlerContext<'_>,
    message: Message,
) -> Result<()> {
    if player.is_silenced() {
        debug!(player = %player.name, "silenced player tried to chat");
        return Ok(());
    }
    if player.is_restricted() {
        debug!(player = %player.name, "restricted player tried to chat");
        return Ok(());
    }

    let Some(channel) = ctx.channels.get(&message.recipient) else {
        debug!(channel = %message.recipient, "message to unknown channel dropped");
        return Ok(());
    };
    if !channel.contains(player.id) {
        debug!(player = %player.name, channel = %channel.name, "message to unjoined channel dropped");
        return Ok(());
    }

    let packet = builders::send_message(&player.name, &message.text, &channel.name, player.id);
    for member_id in channel.member_ids() {
        if member_id == player.id {
            continue;
        }
        if let Some(member) = ctx.registry.get_by_id(member_id) {
            member.enqueue(&packet);
        }
    }
    Ok(())
}

fn handle_private_message(
    player: &Arc<Player>,
    ctx: &HandlerContext<'_>,
    message: Message,
) -> Result<()> {
    if player.is_silenced() {
        debug!(player = %player.name, "silenced player tried to DM");
        return Ok(());
    }

    let Some(target) = ctx.registry.get_by_name(&message.recipient) else {
        debug!(target = %message.recipient, "DM to offline player dropped");
        return Ok(());
    };

    if target.pm_private() && !target.friends().contains(&player.id) {
        player.enqueue(&builders::user_dm_blocked(&target.name));
        return Ok(());
    }

    if target.is_silenced() {
        player.enqueue(&builders::target_silenced(&target.name));
        return Ok(());
    }

    target.enqueue(&builders::send_message(
        &player.name,
        &message.text,
        &target.name,
        player.id,
    ));

    if let Some(away) = target.away_message() {
        player.enqueue(&builders::send_message(
            &target.name,
            &away,
            &player.name,
            target.id,
        ));
    }
    Ok(())
}

fn handle_start_spectating(
    player: &Arc<Player>,
    ctx: &HandlerContext<'_>,
    target_id: i32,
) -> Result<()> {
    if target_id == player.id {
        debug!(player = %player.name, "ignoring self-spectate");
        return Ok(());
    }
    let Some(host) = ctx.registry.get_by_id(target_id) else {
        debug!(target_id, "spectate target is not online");
        return Ok(());
    };

    // Moving between hosts detaches from the old one first
    if let Some(current_id) = player.spectating() {
        if current_id != target_id {
            if let Some(current) = ctx.registry.get_by_id(current_id) {
                detach_spectator(player, &current, ctx);
            }
        }
    }

    for fellow_id in host.spectators() {
        if let Some(fellow) = ctx.registry.get_by_id(fellow_id) {
            fellow.enqueue(&builders::fellow_spectator_joined(player.id));
            player.enqueue(&builders::fellow_spectator_joined(fellow.id));
        }
    }

    Player::link_spectator(&host, player);
    host.enqueue(&builders::spectator_joined(player.id));
    Ok(())
}

fn handle_stop_spectating(player: &Arc<Player>, ctx: &HandlerContext<'_>) -> Result<()> {
    let Some(host_id) = player.spectating() else {
        debug!(player = %player.name, "stop-spectate while not spectating");
        return Ok(());
    };
    if let Some(host) = ctx.registry.get_by_id(host_id) {
        detach_spectator(player, &host, ctx);
    }
    Ok(())
}

fn detach_spectator(player: &Arc<Player>, host: &Arc<Player>, ctx: &HandlerContext<'_>) {
    Player::unlink_spectator(host, player);
    host.enqueue(&builders::spectator_left(player.id));
    for fellow_id in host.spectators() {
        if let Some(fellow) = ctx.registry.get_by_id(fellow_id) {
            fellow.enqueue(&builders::fellow_spectator_left(player.id));
        }
    }
}

fn handle_cant_spectate(player: &Arc<Player>, ctx: &HandlerContext<'_>) -> Result<()> {
    let Some(host_id) = player.spectating() else {
        return Ok(());
    };
    let Some(host) = ctx.registry.get_by_id(host_id) else {
        return Ok(());
    };

    let packet = builders::spectator_cant_spectate(player.id);
    host.enqueue(&packet);
    for fellow_id in host.spectators() {
        if fellow_id == player.id {
            continue;
        }
        if let Some(fellow) = ctx.registry.get_by_id(fellow_id) {
            fellow.enqueue(&packet);
        }
    }
    Ok(())
}

fn handle_channel_join(player: &Arc<Player>, ctx: &HandlerContext<'_>, name: &str) -> Result<()> {
    let Some(channel) = ctx.channels.get(name) else {
        debug!(channel = %name, "join of unknown channel dropped");
        return Ok(());
    };

    channel.join(player.id);
    player.note_channel_joined(&channel.name);
    player.enqueue(&builders::channel_join_success(&channel.name));

    advertise_channel(&channel, ctx);
    Ok(())
}

fn handle_channel_part(player: &Arc<Player>, ctx: &HandlerContext<'_>, name: &str) -> Result<()> {
    player.note_channel_left(name);

    let Some(channel) = ctx.channels.get(name) else {
        debug!(channel = %name, "part of unknown channel dropped");
        return Ok(());
    };

    channel.leave(player.id);
    advertise_channel(&channel, ctx);
    Ok(())
}

/// Push the channel's updated population to its remaining members.
fn advertise_channel(channel: &crate::session::channel::Channel, ctx: &HandlerContext<'_>) {
    let info = builders::channel_info(&channel.name, &channel.topic, channel.member_count() as u16);
    for member_id in channel.member_ids() {
        if let Some(member) = ctx.registry.get_by_id(member_id) {
            member.enqueue(&info);
        }
    }
}
