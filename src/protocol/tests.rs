// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use crate::config::BanchoConfig;
use crate::core::codec::ClientPacket;
use crate::core::packet::ServerPacketId;
use crate::core::types::Message;
use crate::protocol::handlers::{handle_packet, HandlerContext};
use crate::session::channel::ChannelMap;
use crate::session::player::{Player, PlayerOptions};
use crate::session::privileges::Privileges;
use crate::session::registry::SessionRegistry;
use crate::storage::MemoryAccountStore;

struct Fixture {
    registry: SessionRegistry,
    channels: ChannelMap,
    store: MemoryAccountStore,
    config: BanchoConfig,
}

impl Fixture {
    fn new() -> Self {
        Self {
            registry: SessionRegistry::new(),
            channels: ChannelMap::with_defaults(),
            store: MemoryAccountStore::new(),
            config: BanchoConfig::default(),
        }
    }

    fn ctx(&self) -> HandlerContext<'_> {
        HandlerContext {
            registry: &self.registry,
            channels: &self.channels,
            store: &self.store,
            config: &self.config,
        }
    }

    fn spawn_player(&self, id: i32, name: &str) -> Arc<Player> {
        let player = Arc::new(Player::new(
            id,
            name,
            Privileges::UNRESTRICTED,
            PlayerOptions {
                token: Some(Player::generate_token()),
                ..PlayerOptions::default()
            },
        ));
        self.registry.add(player.clone());
        player
    }
}

/// First packet id found in a drained queue, if any.
fn first_packet_id(player: &Player) -> Option<u16> {
    let bytes = player.dequeue()?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

#[test]
fn ping_answers_pong() {
    let fixture = Fixture::new();
    let player = fixture.spawn_player(1, "A");

    handle_packet(&player, ClientPacket::Ping, &fixture.ctx()).unwrap();
    assert_eq!(first_packet_id(&player), Some(ServerPacketId::Pong as u16));
}

#[test]
fn spectate_lifecycle_updates_both_sides_and_notifies() {
    let fixture = Fixture::new();
    let host = fixture.spawn_player(1, "Host");
    let spectator = fixture.spawn_player(2, "Watcher");

    handle_packet(
        &spectator,
        ClientPacket::StartSpectating { target_id: 1 },
        &fixture.ctx(),
    )
    .unwrap();

    assert_eq!(host.spectators(), vec![2]);
    assert_eq!(spectator.spectating(), Some(1));
    assert_eq!(
        first_packet_id(&host),
        Some(ServerPacketId::SpectatorJoined as u16)
    );

    handle_packet(&spectator, ClientPacket::StopSpectating, &fixture.ctx()).unwrap();
    assert!(host.spectators().is_empty());
    assert_eq!(spectator.spectating(), None);
    assert_eq!(
        first_packet_id(&host),
        Some(ServerPacketId::SpectatorLeft as u16)
    );
}

#[test]
fn second_spectator_gets_fellow_notifications() {
    let fixture = Fixture::new();
    let host = fixture.spawn_player(1, "Host");
    let first = fixture.spawn_player(2, "First");
    let second = fixture.spawn_player(3, "Second");

    handle_packet(
        &first,
        ClientPacket::StartSpectating { target_id: 1 },
        &fixture.ctx(),
    )
    .unwrap();
    first.dequeue();
    host.dequeue();

    handle_packet(
        &second,
        ClientPacket::StartSpectating { target_id: 1 },
        &fixture.ctx(),
    )
    .unwrap();

    assert_eq!(host.spectators(), vec![2, 3]);
    assert_eq!(
        first_packet_id(&first),
        Some(ServerPacketId::FellowSpectatorJoined as u16)
    );
    assert_eq!(
        first_packet_id(&second),
        Some(ServerPacketId::FellowSpectatorJoined as u16)
    );
}

#[test]
fn replay_frames_relay_raw_bytes_to_spectators() {
    let fixture = Fixture::new();
    let host = fixture.spawn_player(1, "Host");
    let spectator = fixture.spawn_player(2, "Watcher");

    handle_packet(
        &spectator,
        ClientPacket::StartSpectating { target_id: 1 },
        &fixture.ctx(),
    )
    .unwrap();
    host.dequeue();

    // Build a bundle through the real decoder so raw matches the wire bytes
    use bytes::BufMut;
    let mut payload = bytes::BytesMut::new();
    payload.put_i32_le(0);
    payload.put_u16_le(0); // no frames
    payload.put_u8(0);
    payload.put_slice(&[0u8; 29]);
    payload.put_u16_le(1);
    let payload = payload.freeze();

    let mut cursor = crate::core::cursor::Cursor::new(&payload);
    let bundle =
        crate::core::types::ReplayFrameBundle::decode(&mut cursor, payload.clone()).unwrap();

    handle_packet(&host, ClientPacket::SpectateFrames(bundle), &fixture.ctx()).unwrap();

    let relayed = spectator.dequeue().expect("spectator got frames");
    assert_eq!(
        u16::from_le_bytes([relayed[0], relayed[1]]),
        ServerPacketId::SpectateFrames as u16
    );
    assert_eq!(&relayed[7..], &payload[..]);
}

#[test]
fn public_message_reaches_members_but_not_sender() {
    let fixture = Fixture::new();
    let sender = fixture.spawn_player(1, "Sender");
    let listener = fixture.spawn_player(2, "Listener");
    let outsider = fixture.spawn_player(3, "Outsider");

    let channel = fixture.channels.get("#osu").unwrap();
    channel.join(sender.id);
    sender.note_channel_joined("#osu");
    channel.join(listener.id);
    listener.note_channel_joined("#osu");

    handle_packet(
        &sender,
        ClientPacket::SendPublicMessage(Message {
            sender: String::new(),
            text: "hello all".to_string(),
            recipient: "#osu".to_string(),
            sender_id: 0,
        }),
        &fixture.ctx(),
    )
    .unwrap();

    assert_eq!(
        first_packet_id(&listener),
        Some(ServerPacketId::SendMessage as u16)
    );
    assert!(sender.dequeue().is_none());
    assert!(outsider.dequeue().is_none());
}

#[test]
fn silenced_player_cannot_chat() {
    let fixture = Fixture::new();
    let sender = fixture.spawn_player(1, "Muted");
    let listener = fixture.spawn_player(2, "Listener");

    let channel = fixture.channels.get("#osu").unwrap();
    channel.join(sender.id);
    sender.note_channel_joined("#osu");
    channel.join(listener.id);

    sender.set_silence_end(crate::utils::time::unix_time() + 600);

    handle_packet(
        &sender,
        ClientPacket::SendPublicMessage(Message {
            sender: String::new(),
            text: "let me talk".to_string(),
            recipient: "#osu".to_string(),
            sender_id: 0,
        }),
        &fixture.ctx(),
    )
    .unwrap();

    assert!(listener.dequeue().is_none());
}

#[test]
fn dm_blocked_by_privacy_setting() {
    let fixture = Fixture::new();
    let sender = fixture.spawn_player(1, "Sender");
    let target = fixture.spawn_player(2, "Target");
    target.set_pm_private(true);

    handle_packet(
        &sender,
        ClientPacket::SendPrivateMessage(Message {
            sender: String::new(),
            text: "hey".to_string(),
            recipient: "Target".to_string(),
            sender_id: 0,
        }),
        &fixture.ctx(),
    )
    .unwrap();

    assert!(target.dequeue().is_none());
    assert_eq!(
        first_packet_id(&sender),
        Some(ServerPacketId::UserDmBlocked as u16)
    );

    // Friends bypass the privacy flag
    target.add_friend(sender.id);
    handle_packet(
        &sender,
        ClientPacket::SendPrivateMessage(Message {
            sender: String::new(),
            text: "hey again".to_string(),
            recipient: "Target".to_string(),
            sender_id: 0,
        }),
        &fixture.ctx(),
    )
    .unwrap();

    assert_eq!(
        first_packet_id(&target),
        Some(ServerPacketId::SendMessage as u16)
    );
}

#[test]
fn away_message_auto_replies() {
    let fixture = Fixture::new();
    let sender = fixture.spawn_player(1, "Sender");
    let target = fixture.spawn_player(2, "Away Guy");
    target.set_away_message(Some("brb food".to_string()));

    handle_packet(
        &sender,
        ClientPacket::SendPrivateMessage(Message {
            sender: String::new(),
            text: "you there?".to_string(),
            recipient: "away guy".to_string(),
            sender_id: 0,
        }),
        &fixture.ctx(),
    )
    .unwrap();

    assert!(target.dequeue().is_some());
    let reply = sender.dequeue().expect("away auto-reply");
    assert_eq!(
        u16::from_le_bytes([reply[0], reply[1]]),
        ServerPacketId::SendMessage as u16
    );
}

#[test]
fn out_of_range_status_fields_are_ignored() {
    let fixture = Fixture::new();
    let player = fixture.spawn_player(1, "A");
    let other = fixture.spawn_player(2, "B");

    handle_packet(
        &player,
        ClientPacket::ChangeAction {
            action: 200,
            action_info: String::new(),
            map_md5: String::new(),
            mods: 0,
            mode: 0,
            map_id: 0,
        },
        &fixture.ctx(),
    )
    .unwrap();

    // packet ignored entirely: no status change, no broadcast
    assert_eq!(player.status().action as u8, 0);
    assert!(other.dequeue().is_none());
}

#[test]
fn change_action_broadcasts_stats_to_everyone() {
    let fixture = Fixture::new();
    let player = fixture.spawn_player(1, "A");
    let other = fixture.spawn_player(2, "B");

    handle_packet(
        &player,
        ClientPacket::ChangeAction {
            action: 2,
            action_info: "playing something".to_string(),
            map_md5: "abc".to_string(),
            mods: 8,
            mode: 0,
            map_id: 42,
        },
        &fixture.ctx(),
    )
    .unwrap();

    assert_eq!(player.status().map_id, 42);
    assert_eq!(
        first_packet_id(&other),
        Some(ServerPacketId::UserStats as u16)
    );
    assert_eq!(
        first_packet_id(&player),
        Some(ServerPacketId::UserStats as u16)
    );
}

#[test]
fn channel_join_and_part_track_membership() {
    let fixture = Fixture::new();
    let player = fixture.spawn_player(1, "A");

    handle_packet(
        &player,
        ClientPacket::ChannelJoin {
            name: "#osu".to_string(),
        },
        &fixture.ctx(),
    )
    .unwrap();

    assert!(player.joined_channels().contains(&"#osu".to_string()));
    assert!(fixture.channels.get("#osu").unwrap().contains(1));
    assert_eq!(
        first_packet_id(&player),
        Some(ServerPacketId::ChannelJoinSuccess as u16)
    );

    handle_packet(
        &player,
        ClientPacket::ChannelPart {
            name: "#osu".to_string(),
        },
        &fixture.ctx(),
    )
    .unwrap();

    assert!(player.joined_channels().is_empty());
    assert!(!fixture.channels.get("#osu").unwrap().contains(1));
}

#[test]
fn logout_detaches_spectating_leaves_channels_and_deregisters() {
    let fixture = Fixture::new();
    let host = fixture.spawn_player(1, "X");
    let player = fixture.spawn_player(2, "Leaver");
    let bystander = fixture.spawn_player(3, "Bystander");

    // spectating X, joined #osu and #lobby
    handle_packet(
        &player,
        ClientPacket::StartSpectating { target_id: 1 },
        &fixture.ctx(),
    )
    .unwrap();
    for name in ["#osu", "#lobby"] {
        handle_packet(
            &player,
            ClientPacket::ChannelJoin {
                name: name.to_string(),
            },
            &fixture.ctx(),
        )
        .unwrap();
    }
    host.dequeue();
    bystander.dequeue();

    handle_packet(&player, ClientPacket::Logout, &fixture.ctx()).unwrap();

    assert!(host.spectators().is_empty());
    assert!(player.joined_channels().is_empty());
    assert!(!fixture.channels.get("#osu").unwrap().contains(player.id));
    assert!(!fixture.channels.get("#lobby").unwrap().contains(player.id));
    assert!(fixture.registry.get_by_id(player.id).is_none());
    assert!(!player.is_online());

    // the bystander hears a logout packet for the leaver
    let heard = bystander.dequeue().expect("logout broadcast");
    let mut offset = 0;
    let mut saw_logout = false;
    while offset + 7 <= heard.len() {
        let id = u16::from_le_bytes([heard[offset], heard[offset + 1]]);
        let len = u32::from_le_bytes([
            heard[offset + 3],
            heard[offset + 4],
            heard[offset + 5],
            heard[offset + 6],
        ]) as usize;
        if id == ServerPacketId::UserLogout as u16 {
            let user = i32::from_le_bytes([
                heard[offset + 7],
                heard[offset + 8],
                heard[offset + 9],
                heard[offset + 10],
            ]);
            assert_eq!(user, player.id);
            saw_logout = true;
        }
        offset += 7 + len;
    }
    assert!(saw_logout);
}

#[test]
fn stats_request_skips_self_and_offline_ids() {
    let fixture = Fixture::new();
    let player = fixture.spawn_player(1, "A");
    let other = fixture.spawn_player(2, "B");

    handle_packet(
        &player,
        ClientPacket::UserStatsRequest {
            user_ids: vec![1, 2, 999],
        },
        &fixture.ctx(),
    )
    .unwrap();

    // exactly one user-stats packet arrived
    let queued = player.dequeue().expect("stats for the one online other");
    assert_eq!(u16::from_le_bytes([queued[0], queued[1]]), 11);
    let declared = u32::from_le_bytes([queued[3], queued[4], queued[5], queued[6]]) as usize;
    assert_eq!(queued.len(), 7 + declared);
    assert!(other.dequeue().is_none());
}
