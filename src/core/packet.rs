//! Wire packet shared by the realm and game protocols.
//!
//! ```text
//! [Marker(1)] [Opcode(1)] [Length(2, LE, includes header)] [Body(Length - 4)]
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ProtocolError, Result};

/// Header constant of every realm (chat/auth server) packet.
pub const REALM_MARKER: u8 = 0xFF;

/// Header constant of every game (lobby/host) packet.
pub const GAME_MARKER: u8 = 0xF7;

/// Size of the fixed header.
pub const HEADER_LEN: usize = 4;

/// Largest packet the 16-bit length field can describe.
pub const MAX_PACKET_LEN: usize = u16::MAX as usize;

/// A complete, validated packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub marker: u8,
    pub opcode: u8,
    pub body: Bytes,
}

impl Packet {
    /// Builds a packet, rejecting bodies the length field cannot express.
    pub fn new(marker: u8, opcode: u8, body: impl Into<Bytes>) -> Result<Self> {
        let body = body.into();
        if body.len() + HEADER_LEN > MAX_PACKET_LEN {
            return Err(ProtocolError::OversizedPacket(body.len() + HEADER_LEN));
        }
        Ok(Self {
            marker,
            opcode,
            body,
        })
    }

    /// Total on-wire length including the header.
    pub fn length(&self) -> usize {
        HEADER_LEN + self.body.len()
    }

    /// Appends the encoded packet to `dst`.
    pub fn write_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(self.marker);
        dst.put_u8(self.opcode);
        // Packet::new guarantees the length fits
        dst.put_u16_le(self.length() as u16);
        dst.put_slice(&self.body);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.length());
        self.write_to(&mut buf);
        buf.freeze()
    }
}
