//! Tokio codec applying the same framing rules as [`TransportFramer`].
//!
//! Used for connections that have been promoted past the join gate, where a
//! `Framed` stream is more convenient than driving a framer by hand.
//!
//! [`TransportFramer`]: crate::core::framer::TransportFramer

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::core::framer::split_packet;
use crate::core::packet::Packet;
use crate::error::ProtocolError;

#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    marker: u8,
}

impl FrameCodec {
    pub fn new(marker: u8) -> Self {
        Self { marker }
    }
}

impl Decoder for FrameCodec {
    type Item = Packet;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, Self::Error> {
        Ok(split_packet(src, self.marker)?)
    }
}

impl Encoder<Packet> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.marker != self.marker {
            return Err(ProtocolError::InvalidField("packet marker does not match codec"));
        }
        dst.reserve(item.length());
        item.write_to(dst);
        Ok(())
    }
}
