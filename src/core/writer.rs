//! # Packet Writer
//!
//! Encode path of the packet codec: builds one complete server packet from
//! typed arguments.
//!
//! The writer reserves the 7-byte header up front (type id, pad byte, and a
//! length placeholder), appends the payload through the primitive encoders
//! mirrored from [`crate::core::cursor`], and patches the true payload
//! length into the header on [`PacketWriter::finish`].

use bytes::{BufMut, Bytes, BytesMut};

use crate::core::cursor::STRING_PRESENT;
use crate::core::packet::{ServerPacketId, HEADER_LEN};
use crate::core::types::ScoreFrame;

/// Builder for a single outbound packet.
pub struct PacketWriter {
    buf: BytesMut,
}

impl PacketWriter {
    pub fn new(id: ServerPacketId) -> Self {
        let mut buf = BytesMut::with_capacity(32);
        buf.put_u16_le(id as u16);
        buf.put_u8(0);
        buf.put_u32_le(0); // patched in finish()
        Self { buf }
    }

    /// Patch the payload length and return the finished packet.
    pub fn finish(mut self) -> Bytes {
        let payload_len = (self.buf.len() - HEADER_LEN) as u32;
        self.buf[3..7].copy_from_slice(&payload_len.to_le_bytes());
        self.buf.freeze()
    }

    pub fn put_u8(mut self, value: u8) -> Self {
        self.buf.put_u8(value);
        self
    }

    pub fn put_i8(mut self, value: i8) -> Self {
        self.buf.put_i8(value);
        self
    }

    pub fn put_u16(mut self, value: u16) -> Self {
        self.buf.put_u16_le(value);
        self
    }

    pub fn put_i16(mut self, value: i16) -> Self {
        self.buf.put_i16_le(value);
        self
    }

    pub fn put_u32(mut self, value: u32) -> Self {
        self.buf.put_u32_le(value);
        self
    }

    pub fn put_i32(mut self, value: i32) -> Self {
        self.buf.put_i32_le(value);
        self
    }

    pub fn put_u64(mut self, value: u64) -> Self {
        self.buf.put_u64_le(value);
        self
    }

    pub fn put_i64(mut self, value: i64) -> Self {
        self.buf.put_i64_le(value);
        self
    }

    pub fn put_f32(mut self, value: f32) -> Self {
        self.buf.put_f32_le(value);
        self
    }

    pub fn put_f64(mut self, value: f64) -> Self {
        self.buf.put_f64_le(value);
        self
    }

    /// Append pre-encoded bytes verbatim (spectator passthrough and bundled
    /// packet streams).
    pub fn put_raw(mut self, bytes: &[u8]) -> Self {
        self.buf.put_slice(bytes);
        self
    }

    pub fn put_uleb128(mut self, mut value: u64) -> Self {
        loop {
            let mut byte = (value & 0x7f) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            self.buf.put_u8(byte);
            if value == 0 {
                break;
            }
        }
        self
    }

    /// Append a length-prefixed string: empty strings encode to the single
    /// absence byte.
    pub fn put_str(mut self, value: &str) -> Self {
        if value.is_empty() {
            self.buf.put_u8(0x00);
            return self;
        }

        self.buf.put_u8(STRING_PRESENT);
        self = self.put_uleb128(value.len() as u64);
        self.buf.put_slice(value.as_bytes());
        self
    }

    pub fn put_i32_list_u16len(mut self, items: &[i32]) -> Self {
        self.buf.put_u16_le(items.len() as u16);
        for item in items {
            self.buf.put_i32_le(*item);
        }
        self
    }

    /// Append a chat message composite.
    pub fn put_message(self, sender: &str, text: &str, recipient: &str, sender_id: i32) -> Self {
        self.put_str(sender)
            .put_str(text)
            .put_str(recipient)
            .put_i32(sender_id)
    }

    /// Append a channel descriptor composite.
    pub fn put_channel(self, name: &str, topic: &str, player_count: u16) -> Self {
        self.put_str(name).put_str(topic).put_u16(player_count)
    }

    /// Append the fixed 29-byte score frame section.
    pub fn put_scoreframe(self, frame: &ScoreFrame) -> Self {
        self.put_i32(frame.time)
            .put_u8(frame.id)
            .put_u16(frame.count_300)
            .put_u16(frame.count_100)
            .put_u16(frame.count_50)
            .put_u16(frame.count_geki)
            .put_u16(frame.count_katu)
            .put_u16(frame.count_miss)
            .put_i32(frame.total_score)
            .put_u16(frame.current_combo)
            .put_u16(frame.max_combo)
            .put_u8(u8::from(frame.perfect))
            .put_u8(frame.current_hp)
            .put_u8(frame.tag_byte)
            .put_u8(u8::from(frame.score_v2))
    }
}
