//! # Packet Codec — Decode Path
//!
//! A lazy, finite, non-restartable sequence of client packets over one
//! request body.
//!
//! [`PacketReader`] repeatedly scans a fixed 7-byte header (type id, pad,
//! payload length). Unregistered type ids are skipped payload and all;
//! registered ids hand a cursor bounded to the payload to the type's
//! decoder. A truncated or malformed buffer fails fast: the reader yields
//! one `Err` item and discards the remainder of the body.

use bytes::Bytes;
use tracing::trace;

use crate::config::MAX_PAYLOAD_SIZE;
use crate::core::cursor::Cursor;
use crate::core::packet::{ClientPacketId, HEADER_LEN};
use crate::core::types::{Message, MultiplayerMatch, ReplayFrameBundle, ScoreFrame};
use crate::error::{constants, ProtocolError, Result};

/// One decoded client packet: the discriminant is the wire type id, the
/// payload shape is fixed per type.
#[derive(Debug, Clone)]
pub enum ClientPacket {
    ChangeAction {
        action: u8,
        action_info: String,
        map_md5: String,
        mods: u32,
        mode: u8,
        map_id: i32,
    },
    SendPublicMessage(Message),
    Logout,
    RequestStatusUpdate,
    Ping,
    StartSpectating {
        target_id: i32,
    },
    StopSpectating,
    SpectateFrames(ReplayFrameBundle),
    ErrorReport {
        report: String,
    },
    CantSpectate,
    SendPrivateMessage(Message),
    PartLobby,
    JoinLobby,
    CreateMatch(MultiplayerMatch),
    JoinMatch {
        match_id: i32,
        password: String,
    },
    PartMatch,
    MatchChangeSlot {
        slot_id: i32,
    },
    MatchReady,
    MatchLock {
        slot_id: i32,
    },
    MatchChangeSettings(MultiplayerMatch),
    MatchStart,
    MatchScoreUpdate(ScoreFrame),
    MatchComplete,
    MatchChangeMods {
        mods: i32,
    },
    MatchLoadComplete,
    MatchNoBeatmap,
    MatchNotReady,
    MatchFailed,
    MatchHasBeatmap,
    MatchSkipRequest,
    ChannelJoin {
        name: String,
    },
    BeatmapInfoRequest,
    MatchTransferHost {
        slot_id: i32,
    },
    FriendAdd {
        target_id: i32,
    },
    FriendRemove {
        target_id: i32,
    },
    MatchChangeTeam,
    ChannelPart {
        name: String,
    },
    ReceiveUpdates {
        filter: i32,
    },
    SetAwayMessage(Message),
    IrcOnly,
    UserStatsRequest {
        user_ids: Vec<i32>,
    },
    MatchInvite {
        target_id: i32,
    },
    MatchChangePassword(MultiplayerMatch),
    TournamentMatchInfoRequest {
        match_id: i32,
    },
    UserPresenceRequest {
        user_ids: Vec<i32>,
    },
    UserPresenceRequestAll,
    ToggleBlockNonFriendDms {
        value: i32,
    },
    TournamentJoinMatchChannel {
        match_id: i32,
    },
    TournamentLeaveMatchChannel {
        match_id: i32,
    },
}

/// Lazy decoder over one request body.
///
/// The body is held as an immutable [`Bytes`] view; decoding never mutates
/// shared state, only the reader's own offset.
pub struct PacketReader {
    body: Bytes,
    pos: usize,
    finished: bool,
}

impl PacketReader {
    pub fn new(body: Bytes) -> Self {
        Self {
            body,
            pos: 0,
            finished: false,
        }
    }

    fn remaining(&self) -> usize {
        self.body.len() - self.pos
    }
}

impl Iterator for PacketReader {
    type Item = Result<ClientPacket>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            if self.remaining() < HEADER_LEN {
                // Exhausted without another recognizable header
                self.finished = true;
                return None;
            }

            let header = &self.body[self.pos..self.pos + HEADER_LEN];
            let type_id = u16::from_le_bytes([header[0], header[1]]);
            let length =
                u32::from_le_bytes([header[3], header[4], header[5], header[6]]) as usize;
            self.pos += HEADER_LEN;

            if length > MAX_PAYLOAD_SIZE {
                self.finished = true;
                return Some(Err(ProtocolError::OversizedPacket(length)));
            }

            if length > self.remaining() {
                self.finished = true;
                return Some(Err(ProtocolError::Truncated {
                    needed: length,
                    remaining: self.remaining(),
                }));
            }

            let Some(packet_id) = ClientPacketId::from_u16(type_id) else {
                // Unknown packets are silently discarded, not an error
                trace!(type_id, length, "{}", constants::DIAG_UNKNOWN_PACKET);
                self.pos += length;
                continue;
            };

            let payload = self.body.slice(self.pos..self.pos + length);
            self.pos += length;

            return match decode_payload(packet_id, &payload) {
                Ok(packet) => Some(Ok(packet)),
                Err(e) => {
                    self.finished = true;
                    Some(Err(e))
                }
            };
        }
    }
}

/// Decode one payload with a cursor bounded to exactly its byte range.
fn decode_payload(id: ClientPacketId, payload: &Bytes) -> Result<ClientPacket> {
    let mut cursor = Cursor::new(payload);

    let packet = match id {
        ClientPacketId::ChangeAction => ClientPacket::ChangeAction {
            action: cursor.read_u8()?,
            action_info: cursor.read_string()?,
            map_md5: cursor.read_string()?,
            mods: cursor.read_u32()?,
            mode: cursor.read_u8()?,
            map_id: cursor.read_i32()?,
        },
        ClientPacketId::SendPublicMessage => {
            ClientPacket::SendPublicMessage(Message::decode(&mut cursor)?)
        }
        ClientPacketId::Logout => {
            // Carries an unused i32
            ClientPacket::Logout
        }
        ClientPacketId::RequestStatusUpdate => ClientPacket::RequestStatusUpdate,
        ClientPacketId::Ping => ClientPacket::Ping,
        ClientPacketId::StartSpectating => ClientPacket::StartSpectating {
            target_id: cursor.read_i32()?,
        },
        ClientPacketId::StopSpectating => ClientPacket::StopSpectating,
        ClientPacketId::SpectateFrames => ClientPacket::SpectateFrames(
            ReplayFrameBundle::decode(&mut cursor, payload.clone())?,
        ),
        ClientPacketId::ErrorReport => ClientPacket::ErrorReport {
            report: cursor.read_string()?,
        },
        ClientPacketId::CantSpectate => ClientPacket::CantSpectate,
        ClientPacketId::SendPrivateMessage => {
            ClientPacket::SendPrivateMessage(Message::decode(&mut cursor)?)
        }
        ClientPacketId::PartLobby => ClientPacket::PartLobby,
        ClientPacketId::JoinLobby => ClientPacket::JoinLobby,
        ClientPacketId::CreateMatch => {
            ClientPacket::CreateMatch(MultiplayerMatch::decode(&mut cursor)?)
        }
        ClientPacketId::JoinMatch => ClientPacket::JoinMatch {
            match_id: cursor.read_i32()?,
            password: cursor.read_string()?,
        },
        ClientPacketId::PartMatch => ClientPacket::PartMatch,
        ClientPacketId::MatchChangeSlot => ClientPacket::MatchChangeSlot {
            slot_id: cursor.read_i32()?,
        },
        ClientPacketId::MatchReady => ClientPacket::MatchReady,
        ClientPacketId::MatchLock => ClientPacket::MatchLock {
            slot_id: cursor.read_i32()?,
        },
        ClientPacketId::MatchChangeSettings => {
            ClientPacket::MatchChangeSettings(MultiplayerMatch::decode(&mut cursor)?)
        }
        ClientPacketId::MatchStart => ClientPacket::MatchStart,
        ClientPacketId::MatchScoreUpdate => {
            ClientPacket::MatchScoreUpdate(ScoreFrame::decode(&mut cursor)?)
        }
        ClientPacketId::MatchComplete => ClientPacket::MatchComplete,
        ClientPacketId::MatchChangeMods => ClientPacket::MatchChangeMods {
            mods: cursor.read_i32()?,
        },
        ClientPacketId::MatchLoadComplete => ClientPacket::MatchLoadComplete,
        ClientPacketId::MatchNoBeatmap => ClientPacket::MatchNoBeatmap,
        ClientPacketId::MatchNotReady => ClientPacket::MatchNotReady,
        ClientPacketId::MatchFailed => ClientPacket::MatchFailed,
        ClientPacketId::MatchHasBeatmap => ClientPacket::MatchHasBeatmap,
        ClientPacketId::MatchSkipRequest => ClientPacket::MatchSkipRequest,
        ClientPacketId::ChannelJoin => ClientPacket::ChannelJoin {
            name: cursor.read_string()?,
        },
        ClientPacketId::BeatmapInfoRequest => ClientPacket::BeatmapInfoRequest,
        ClientPacketId::MatchTransferHost => ClientPacket::MatchTransferHost {
            slot_id: cursor.read_i32()?,
        },
        ClientPacketId::FriendAdd => ClientPacket::FriendAdd {
            target_id: cursor.read_i32()?,
        },
        ClientPacketId::FriendRemove => ClientPacket::FriendRemove {
            target_id: cursor.read_i32()?,
        },
        ClientPacketId::MatchChangeTeam => ClientPacket::MatchChangeTeam,
        ClientPacketId::ChannelPart => ClientPacket::ChannelPart {
            name: cursor.read_string()?,
        },
        ClientPacketId::ReceiveUpdates => ClientPacket::ReceiveUpdates {
            filter: cursor.read_i32()?,
        },
        ClientPacketId::SetAwayMessage => {
            ClientPacket::SetAwayMessage(Message::decode(&mut cursor)?)
        }
        ClientPacketId::IrcOnly => ClientPacket::IrcOnly,
        ClientPacketId::UserStatsRequest => ClientPacket::UserStatsRequest {
            user_ids: cursor.read_i32_list_u16len()?,
        },
        ClientPacketId::MatchInvite => ClientPacket::MatchInvite {
            target_id: cursor.read_i32()?,
        },
        ClientPacketId::MatchChangePassword => {
            ClientPacket::MatchChangePassword(MultiplayerMatch::decode(&mut cursor)?)
        }
        ClientPacketId::TournamentMatchInfoRequest => ClientPacket::TournamentMatchInfoRequest {
            match_id: cursor.read_i32()?,
        },
        ClientPacketId::UserPresenceRequest => ClientPacket::UserPresenceRequest {
            user_ids: cursor.read_i32_list_u16len()?,
        },
        ClientPacketId::UserPresenceRequestAll => ClientPacket::UserPresenceRequestAll,
        ClientPacketId::ToggleBlockNonFriendDms => ClientPacket::ToggleBlockNonFriendDms {
            value: cursor.read_i32()?,
        },
        ClientPacketId::TournamentJoinMatchChannel => ClientPacket::TournamentJoinMatchChannel {
            match_id: cursor.read_i32()?,
        },
        ClientPacketId::TournamentLeaveMatchChannel => ClientPacket::TournamentLeaveMatchChannel {
            match_id: cursor.read_i32()?,
        },
    };

    Ok(packet)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::core::cursor::STRING_PRESENT;
    use crate::core::types::{MATCH_SLOTS, SLOT_OCCUPIED_MASK};
    use bytes::{BufMut, BytesMut};

    fn raw_packet(type_id: u16, payload: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_u16_le(type_id);
        buf.put_u8(0);
        buf.put_u32_le(payload.len() as u32);
        buf.put_slice(payload);
        buf
    }

    #[test]
    fn empty_body_yields_nothing() {
        let mut reader = PacketReader::new(Bytes::new());
        assert!(reader.next().is_none());
    }

    #[test]
    fn unknown_packet_is_skipped_known_one_decoded() {
        // One unknown-type packet (id 200, length 11) followed by a ping
        let mut body = raw_packet(200, &[0xaa; 11]);
        body.extend_from_slice(&raw_packet(4, &[]));

        let reader = PacketReader::new(body.freeze());
        let packets: Vec<_> = reader.collect();

        assert_eq!(packets.len(), 1);
        assert!(matches!(packets[0], Ok(ClientPacket::Ping)));
    }

    #[test]
    fn truncated_payload_fails_fast_and_discards_remainder() {
        // Header declares 8 payload bytes but only 2 follow
        let mut buf = BytesMut::new();
        buf.put_u16_le(85); // user stats request
        buf.put_u8(0);
        buf.put_u32_le(8);
        buf.put_slice(&[0x01, 0x00]);

        let mut reader = PacketReader::new(buf.freeze());
        assert!(matches!(
            reader.next(),
            Some(Err(ProtocolError::Truncated { .. }))
        ));
        assert!(reader.next().is_none());
    }

    #[test]
    fn oversized_length_is_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u16_le(4);
        buf.put_u8(0);
        buf.put_u32_le(u32::MAX);

        let mut reader = PacketReader::new(buf.freeze());
        assert!(matches!(
            reader.next(),
            Some(Err(ProtocolError::OversizedPacket(_)))
        ));
    }

    #[test]
    fn trailing_garbage_shorter_than_a_header_terminates() {
        let mut body = raw_packet(4, &[]);
        body.put_slice(&[0x01, 0x02, 0x03]);

        let reader = PacketReader::new(body.freeze());
        let packets: Vec<_> = reader.collect();
        assert_eq!(packets.len(), 1);
    }

    #[test]
    fn change_action_decodes_all_fields() {
        let mut payload = BytesMut::new();
        payload.put_u8(2); // playing
        payload.put_u8(STRING_PRESENT);
        payload.put_u8(4);
        payload.put_slice(b"solo");
        payload.put_u8(0x00); // empty map md5
        payload.put_u32_le(72); // hidden + hardrock
        payload.put_u8(0);
        payload.put_i32_le(1234);

        let body = raw_packet(0, &payload);
        let mut reader = PacketReader::new(body.freeze());

        match reader.next().unwrap().unwrap() {
            ClientPacket::ChangeAction {
                action,
                action_info,
                map_md5,
                mods,
                mode,
                map_id,
            } => {
                assert_eq!(action, 2);
                assert_eq!(action_info, "solo");
                assert_eq!(map_md5, "");
                assert_eq!(mods, 72);
                assert_eq!(mode, 0);
                assert_eq!(map_id, 1234);
            }
            other => panic!("unexpected packet: {other:?}"),
        }
    }

    fn encode_match_payload(
        occupied_slots: &[usize],
        slot_ids: &[i32],
        freemod: bool,
    ) -> BytesMut {
        let mut payload = BytesMut::new();
        payload.put_i16_le(9); // match id
        payload.put_i8(0); // not in progress
        payload.put_i8(0); // powerplay
        payload.put_i32_le(0); // mods
        payload.put_u8(0x00); // name (absent)
        payload.put_u8(0x00); // password
        payload.put_u8(0x00); // map name
        payload.put_i32_le(42); // map id
        payload.put_u8(0x00); // map md5

        let mut statuses = [0u8; MATCH_SLOTS];
        for &slot in occupied_slots {
            statuses[slot] = 1 << 2;
        }
        payload.put_slice(&statuses);
        payload.put_slice(&[0u8; MATCH_SLOTS]); // teams
        for id in slot_ids {
            payload.put_i32_le(*id);
        }

        payload.put_i32_le(7); // host
        payload.put_u8(0); // mode
        payload.put_u8(0); // win condition
        payload.put_u8(0); // team type
        payload.put_i8(i8::from(freemod));
        if freemod {
            for i in 0..MATCH_SLOTS {
                payload.put_i32_le(i as i32);
            }
        }
        payload.put_i32_le(777); // seed

        payload
    }

    #[test]
    fn match_decoder_reads_one_id_per_occupied_slot() {
        // Exactly slots 2 and 5 have an occupancy bit set
        let payload = encode_match_payload(&[2, 5], &[501, 502], false);
        let body = raw_packet(31, &payload); // create match

        let mut reader = PacketReader::new(body.freeze());
        match reader.next().unwrap().unwrap() {
            ClientPacket::CreateMatch(m) => {
                assert_eq!(m.id, 9);
                assert_eq!(m.slot_ids, vec![501, 502]);
                assert_eq!(m.host_id, 7);
                assert!(!m.freemod);
                assert!(m.slot_mods.is_empty());
                assert_eq!(m.seed, 777);
            }
            other => panic!("unexpected packet: {other:?}"),
        }
        assert!(reader.next().is_none());
    }

    #[test]
    fn match_decoder_reads_per_slot_mods_only_with_freemod() {
        let payload = encode_match_payload(&[0], &[99], true);
        let body = raw_packet(41, &payload); // change settings

        let mut reader = PacketReader::new(body.freeze());
        match reader.next().unwrap().unwrap() {
            ClientPacket::MatchChangeSettings(m) => {
                assert!(m.freemod);
                assert_eq!(m.slot_mods.len(), MATCH_SLOTS);
                assert_eq!(m.seed, 777);
            }
            other => panic!("unexpected packet: {other:?}"),
        }
    }

    #[test]
    fn occupied_mask_covers_bits_two_through_six() {
        assert_eq!(SLOT_OCCUPIED_MASK, 0b0111_1100);
    }

    #[test]
    fn replay_bundle_retains_raw_payload() {
        let mut payload = BytesMut::new();
        payload.put_i32_le(-1); // extra
        payload.put_u16_le(1); // frame count
        payload.put_u8(1); // button state
        payload.put_u8(0);
        payload.put_f32_le(256.0);
        payload.put_f32_le(192.0);
        payload.put_i32_le(12_345);
        payload.put_u8(0); // action: standard
        payload.put_slice(&[0u8; 29]); // zeroed score frame (score_v2 unset)
        payload.put_u16_le(3); // sequence

        let body = raw_packet(18, &payload);
        let mut reader = PacketReader::new(body.freeze());

        match reader.next().unwrap().unwrap() {
            ClientPacket::SpectateFrames(bundle) => {
                assert_eq!(bundle.extra, -1);
                assert_eq!(bundle.frames.len(), 1);
                assert_eq!(bundle.frames[0].time, 12_345);
                assert_eq!(bundle.sequence, 3);
                assert_eq!(&bundle.raw[..], &payload[..]);
            }
            other => panic!("unexpected packet: {other:?}"),
        }
    }

    #[test]
    fn stats_request_reads_short_prefixed_id_list() {
        let mut payload = BytesMut::new();
        payload.put_u16_le(3);
        payload.put_i32_le(3);
        payload.put_i32_le(5);
        payload.put_i32_le(8);

        let body = raw_packet(85, &payload);
        let mut reader = PacketReader::new(body.freeze());

        match reader.next().unwrap().unwrap() {
            ClientPacket::UserStatsRequest { user_ids } => {
                assert_eq!(user_ids, vec![3, 5, 8]);
            }
            other => panic!("unexpected packet: {other:?}"),
        }
    }
}
