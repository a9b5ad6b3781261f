//! Decoder table for packets a host receives from players.

use std::net::Ipv4Addr;

use crate::core::cursor::ByteCursor;
use crate::core::packet::Packet;
use crate::error::{DecodeError, DecodeReason};
use crate::protocol::game::message::*;
use crate::protocol::game::opcode::{chat_flag, GameOpcode};
use crate::protocol::realm::opcode::PRODUCT_TFT;

type Field<T> = std::result::Result<T, DecodeReason>;
type DecodeFn = fn(&mut ByteCursor<'_>) -> Field<GameMessage>;

fn entry(min_body: usize, decode: DecodeFn) -> Option<(usize, DecodeFn)> {
    Some((min_body, decode))
}

fn decoder_for(opcode: GameOpcode) -> Option<(usize, DecodeFn)> {
    match opcode {
        GameOpcode::ReqJoin => entry(16, |cur| {
            read_join_request(cur).map(GameMessage::JoinRequest)
        }),
        GameOpcode::LeaveGame => entry(4, |cur| {
            Ok(GameMessage::LeaveGame {
                reason: cur.read_u32_le()?,
            })
        }),
        GameOpcode::GameLoadedSelf => entry(0, |_| Ok(GameMessage::GameLoadedSelf)),
        GameOpcode::OutgoingKeepalive => entry(5, |cur| {
            cur.skip(1)?;
            Ok(GameMessage::OutgoingKeepalive {
                checksum: cur.read_u32_le()?,
            })
        }),
        GameOpcode::ChatToHost => entry(4, decode_chat_to_host),
        GameOpcode::SearchGame => entry(8, |cur| {
            let product = cur.array::<4>()?;
            Ok(GameMessage::SearchGame {
                tft: &product == PRODUCT_TFT,
                version: cur.read_u32_le()?,
            })
        }),
        GameOpcode::MapSize => entry(9, |cur| {
            cur.skip(4)?;
            Ok(GameMessage::MapSize {
                size_flag: cur.read_u8()?,
                map_size: cur.read_u32_le()?,
            })
        }),
        GameOpcode::MapPartOk => entry(10, |cur| {
            let from_pid = cur.read_u8()?;
            let to_pid = cur.read_u8()?;
            cur.skip(4)?;
            Ok(GameMessage::MapPartOk {
                from_pid,
                to_pid,
                map_size: cur.read_u32_le()?,
            })
        }),
        GameOpcode::MapPartNotOk => entry(0, |_| Ok(GameMessage::MapPartNotOk)),
        GameOpcode::PongToHost => entry(4, |cur| {
            Ok(GameMessage::PongToHost {
                ticks: cur.read_u32_le()?,
            })
        }),
        _ => None,
    }
}

/// Decodes one game packet body.
pub fn decode(opcode: u8, body: &[u8]) -> Result<GameMessage, DecodeError> {
    let (min_body, decode_fn) = GameOpcode::try_from(opcode)
        .ok()
        .and_then(decoder_for)
        .ok_or_else(|| DecodeError::unrecognized(opcode))?;

    if body.len() < min_body {
        return Err(DecodeError::new(
            opcode,
            DecodeReason::TooShort {
                need: min_body,
                have: body.len(),
            },
        ));
    }

    decode_fn(&mut ByteCursor::new(body)).map_err(|reason| DecodeError::new(opcode, reason))
}

pub fn decode_packet(packet: &Packet) -> Result<GameMessage, DecodeError> {
    decode(packet.opcode, &packet.body)
}

/// Join request body.
///
/// ```text
/// [HostCounter(4)] [EntryKey(4)] [?(1)] [ListenPort(2)] [PeerKey(4)] [Name\0]
/// [?(4)] [InternalPort(2, BE)] [InternalIP(4)]
/// ```
///
/// The address block sits at a fixed offset after the name terminator, so its
/// position moves with the name length.
pub fn read_join_request(cur: &mut ByteCursor<'_>) -> Field<IncomingJoinRequest> {
    let host_counter = cur.read_u32_le()?;
    let entry_key = cur.read_u32_le()?;
    cur.skip(1)?;
    let listen_port = cur.read_u16_le()?;
    let peer_key = cur.read_u32_le()?;
    let name = cur.read_cstring("name")?;
    if name.is_empty() {
        return Err(DecodeReason::Malformed("empty player name"));
    }
    cur.skip(4)?;
    let internal_port = cur.read_u16_be()?;
    let internal_ip = Ipv4Addr::from(cur.array::<4>()?);

    Ok(IncomingJoinRequest {
        host_counter,
        entry_key,
        listen_port,
        peer_key,
        name,
        internal_port,
        internal_ip,
    })
}

fn decode_chat_to_host(cur: &mut ByteCursor<'_>) -> Field<GameMessage> {
    let total = cur.read_u8()?;
    let to_pids = cur.bytes(usize::from(total))?.to_vec();
    let from_pid = cur.read_u8()?;
    let flag = cur.read_u8()?;

    let body = match flag {
        chat_flag::MESSAGE => ChatToHostBody::Message(cur.read_cstring("message")?),
        chat_flag::MESSAGE_EXTRA => ChatToHostBody::MessageExtra {
            flags: cur.read_u32_le()?,
            message: cur.read_cstring("message")?,
        },
        chat_flag::TEAM_CHANGE => ChatToHostBody::TeamChange(cur.read_u8()?),
        chat_flag::COLOUR_CHANGE => ChatToHostBody::ColourChange(cur.read_u8()?),
        chat_flag::RACE_CHANGE => ChatToHostBody::RaceChange(cur.read_u8()?),
        chat_flag::HANDICAP_CHANGE => ChatToHostBody::HandicapChange(cur.read_u8()?),
        flag => ChatToHostBody::Unknown { flag },
    };

    Ok(GameMessage::ChatToHost(ChatToHost {
        to_pids,
        from_pid,
        body,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join_body(name: &str) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&1u32.to_le_bytes());
        body.extend_from_slice(&0u32.to_le_bytes());
        body.push(0);
        body.extend_from_slice(&6112u16.to_le_bytes());
        body.extend_from_slice(&0xABCDu32.to_le_bytes());
        body.extend_from_slice(name.as_bytes());
        body.push(0);
        body.extend_from_slice(&[0; 4]);
        body.extend_from_slice(&6112u16.to_be_bytes());
        body.extend_from_slice(&[192, 168, 0, 10]);
        body
    }

    #[test]
    fn test_decode_join_request() {
        let msg = decode(0x1E, &join_body("Player1")).unwrap();
        assert_eq!(
            msg,
            GameMessage::JoinRequest(IncomingJoinRequest {
                host_counter: 1,
                entry_key: 0,
                listen_port: 6112,
                peer_key: 0xABCD,
                name: "Player1".into(),
                internal_port: 6112,
                internal_ip: Ipv4Addr::new(192, 168, 0, 10),
            })
        );
    }

    #[test]
    fn test_join_request_missing_address_block() {
        let mut body = join_body("Player1");
        body.truncate(body.len() - 1);
        let err = decode(0x1E, &body).unwrap_err();
        assert!(matches!(err.reason, DecodeReason::TooShort { .. }));
    }

    #[test]
    fn test_join_request_rejects_empty_name() {
        let err = decode(0x1E, &join_body("")).unwrap_err();
        assert_eq!(err.reason, DecodeReason::Malformed("empty player name"));
    }

    #[test]
    fn test_decode_chat_to_host() {
        let mut body = vec![2, 1, 2, 3, chat_flag::MESSAGE];
        body.extend_from_slice(b"gl hf\0");
        match decode(0x28, &body).unwrap() {
            GameMessage::ChatToHost(chat) => {
                assert_eq!(chat.to_pids, vec![1, 2]);
                assert_eq!(chat.from_pid, 3);
                assert_eq!(chat.body, ChatToHostBody::Message("gl hf".into()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_host_only_opcodes_are_unrecognized() {
        assert!(decode(0x30, &[0; 40]).unwrap_err().is_unrecognized());
    }
}
