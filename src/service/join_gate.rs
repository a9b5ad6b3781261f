//! Inbound game-side gate.
//!
//! A freshly accepted player socket is not a player yet. The gate frames its
//! bytes with the game marker and waits for one join request. Other packets
//! that arrive first are skipped. Once the request is decoded the gate stops
//! reading; anything after it stays buffered for whoever takes the socket over.

use bytes::BytesMut;
use tracing::debug;

use crate::core::framer::TransportFramer;
use crate::core::packet::GAME_MARKER;
use crate::error::FramingError;
use crate::protocol::game::opcode::GameOpcode;
use crate::protocol::game::{decode_packet, GameMessage, IncomingJoinRequest};

#[derive(Debug)]
pub struct JoinGate {
    framer: TransportFramer,
    resolved: bool,
}

impl JoinGate {
    pub fn new() -> Self {
        Self {
            framer: TransportFramer::new(GAME_MARKER),
            resolved: false,
        }
    }

    /// Feeds inbound bytes.
    ///
    /// Returns the join request the first time one is complete and valid, and
    /// `Ok(None)` while more bytes are needed or after the gate resolved.
    ///
    /// # Errors
    /// A bad marker or length. The caller must close the socket.
    pub fn on_bytes(&mut self, bytes: &[u8]) -> Result<Option<IncomingJoinRequest>, FramingError> {
        self.framer.feed(bytes);
        if self.resolved {
            return Ok(None);
        }

        while let Some(next) = self.framer.next_packet() {
            let packet = next?;
            if packet.opcode != GameOpcode::ReqJoin as u8 {
                debug!(opcode = packet.opcode, "ignoring packet before join request");
                continue;
            }

            match decode_packet(&packet) {
                Ok(GameMessage::JoinRequest(request)) => {
                    self.resolved = true;
                    return Ok(Some(request));
                }
                Ok(other) => {
                    debug!(opcode = %other.opcode(), "unexpected message in join slot");
                }
                Err(e) => {
                    debug!(reason = %e, "dropping malformed join request");
                }
            }
        }
        Ok(None)
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Bytes received after the join request, not yet framed.
    pub fn into_remaining(mut self) -> BytesMut {
        self.framer.take_remaining()
    }
}

impl Default for JoinGate {
    fn default() -> Self {
        Self::new()
    }
}
