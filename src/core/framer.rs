//! Incremental packet framing over an unreliable byte stream.
//!
//! TCP delivers bytes with arbitrary boundaries. The framer owns a growable
//! buffer per connection, appends whatever arrives, and hands out complete
//! packets from the front in arrival order.
//!
//! A bad marker or a declared length below the header size poisons the framer:
//! the error is reported once, nothing further is decoded, and the owner is
//! expected to close the socket.

use bytes::BytesMut;

use crate::core::packet::{Packet, HEADER_LEN};
use crate::error::FramingError;

/// Tries to split one complete packet off the front of `buf`.
///
/// Returns `Ok(None)` when fewer than four bytes are buffered or the declared
/// length has not fully arrived. Nothing is consumed unless a packet is returned.
pub(crate) fn split_packet(
    buf: &mut BytesMut,
    marker: u8,
) -> Result<Option<Packet>, FramingError> {
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }

    if buf[0] != marker {
        return Err(FramingError::BadMarker {
            expected: marker,
            found: buf[0],
        });
    }

    let length = u16::from_le_bytes([buf[2], buf[3]]);
    if usize::from(length) < HEADER_LEN {
        return Err(FramingError::BadLength { length });
    }

    if buf.len() < usize::from(length) {
        return Ok(None);
    }

    let frame = buf.split_to(usize::from(length)).freeze();
    Ok(Some(Packet {
        marker,
        opcode: frame[1],
        body: frame.slice(HEADER_LEN..),
    }))
}

/// Per-connection inbound framer for one protocol marker.
#[derive(Debug)]
pub struct TransportFramer {
    marker: u8,
    pending: BytesMut,
    poisoned: Option<FramingError>,
}

impl TransportFramer {
    pub fn new(marker: u8) -> Self {
        Self {
            marker,
            pending: BytesMut::new(),
            poisoned: None,
        }
    }

    pub fn marker(&self) -> u8 {
        self.marker
    }

    /// Appends inbound bytes to the pending buffer.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Next complete packet, `None` if more bytes are needed.
    ///
    /// A framing error is returned exactly once; afterwards the framer yields
    /// `None` forever and [`is_poisoned`](Self::is_poisoned) reports the error.
    pub fn next_packet(&mut self) -> Option<Result<Packet, FramingError>> {
        if self.poisoned.is_some() {
            return None;
        }

        match split_packet(&mut self.pending, self.marker) {
            Ok(Some(packet)) => Some(Ok(packet)),
            Ok(None) => None,
            Err(err) => {
                self.poisoned = Some(err);
                Some(Err(err))
            }
        }
    }

    /// Lazy iterator over the packets currently available.
    ///
    /// Each call restarts from the current buffer state; bytes fed later are
    /// picked up by the next call.
    pub fn packets(&mut self) -> Packets<'_> {
        Packets { framer: self }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_poisoned(&self) -> Option<FramingError> {
        self.poisoned
    }

    /// Hands over every byte not yet framed, leaving the framer empty.
    pub fn take_remaining(&mut self) -> BytesMut {
        std::mem::take(&mut self.pending)
    }
}

/// Iterator returned by [`TransportFramer::packets`].
pub struct Packets<'a> {
    framer: &'a mut TransportFramer,
}

impl Iterator for Packets<'_> {
    type Item = Result<Packet, FramingError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.framer.next_packet()
    }
}
