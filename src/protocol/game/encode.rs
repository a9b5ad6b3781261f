//! Encoders for packets a host sends to players and to the LAN.

use std::net::Ipv4Addr;

use bytes::{BufMut, BytesMut};

use crate::core::cursor::PutExt;
use crate::core::packet::{Packet, GAME_MARKER};
use crate::error::{ProtocolError, Result};
use crate::protocol::game::message::{GameInfo, MapCheck, SlotTable};
use crate::protocol::game::opcode::{chat_flag, GameOpcode};
use crate::protocol::game::stat_string;
use crate::protocol::realm::opcode::{PRODUCT_ROC, PRODUCT_TFT};

/// Address family tag in the embedded `sockaddr_in` blocks.
const AF_INET: [u8; 2] = [2, 0];

fn packet(opcode: GameOpcode, body: BytesMut) -> Result<Packet> {
    Packet::new(GAME_MARKER, opcode as u8, body.freeze())
}

fn put_slot_table(body: &mut BytesMut, table: &SlotTable) -> Result<()> {
    u8::try_from(table.slots.len()).map_err(|_| ProtocolError::InvalidField("too many slots"))?;
    let len = u16::try_from(table.encoded_len())
        .map_err(|_| ProtocolError::InvalidField("slot table too large"))?;
    body.put_u16_le(len);
    table.write_to(body);
    Ok(())
}

pub fn ping_from_host(ticks: u32) -> Result<Packet> {
    let mut body = BytesMut::with_capacity(4);
    body.put_u32_le(ticks);
    packet(GameOpcode::PingFromHost, body)
}

/// Accepts a player and tells it which PID it was given.
pub fn slot_info_join(
    pid: u8,
    port: u16,
    external_ip: Ipv4Addr,
    table: &SlotTable,
) -> Result<Packet> {
    let mut body = BytesMut::with_capacity(2 + table.encoded_len() + 17);
    put_slot_table(&mut body, table)?;
    body.put_u8(pid);
    body.put_slice(&AF_INET);
    body.put_u16(port);
    body.put_slice(&external_ip.octets());
    body.put_slice(&[0; 8]);
    packet(GameOpcode::SlotInfoJoin, body)
}

pub fn reject_join(reason: u32) -> Result<Packet> {
    let mut body = BytesMut::with_capacity(4);
    body.put_u32_le(reason);
    packet(GameOpcode::RejectJoin, body)
}

pub fn slot_info(table: &SlotTable) -> Result<Packet> {
    let mut body = BytesMut::with_capacity(2 + table.encoded_len());
    put_slot_table(&mut body, table)?;
    packet(GameOpcode::SlotInfo, body)
}

/// LAN/realm game advertisement.
///
/// The map stat block is stat-string encoded so it carries no zero bytes.
pub fn game_info(info: &GameInfo) -> Result<Packet> {
    if info.game_name.is_empty() || info.host_name.is_empty() || info.map_path.is_empty() {
        return Err(ProtocolError::InvalidField(
            "game info needs a game name, host name and map path",
        ));
    }

    let mut stat = BytesMut::with_capacity(16 + info.map_path.len() + info.host_name.len());
    stat.put_u32_le(info.map_flags);
    stat.put_u8(0);
    stat.put_u16_le(info.map_width);
    stat.put_u16_le(info.map_height);
    stat.put_u32_le(info.map_crc);
    stat.put_cstring(&info.map_path);
    stat.put_cstring(&info.host_name);
    stat.put_u8(0);
    let stat = stat_string::encode(&stat);

    let mut body = BytesMut::with_capacity(48 + info.game_name.len() + stat.len());
    body.put_tag(if info.tft { PRODUCT_TFT } else { PRODUCT_ROC });
    body.put_u32_le(u32::from(info.war3_version));
    body.put_u32_le(info.host_counter);
    // entry key
    body.put_u32_le(0);
    body.put_cstring(&info.game_name);
    // password
    body.put_u8(0);
    body.put_slice(&stat);
    body.put_u8(0);
    body.put_u32_le(info.slots_total);
    body.put_u32_le(info.map_game_type);
    body.put_u32_le(1);
    body.put_u32_le(info.slots_open);
    body.put_u32_le(info.up_time);
    body.put_u16_le(info.port);
    packet(GameOpcode::GameInfo, body)
}

pub fn chat_from_host(from_pid: u8, to_pids: &[u8], message: &str) -> Result<Packet> {
    let count = u8::try_from(to_pids.len())
        .map_err(|_| ProtocolError::InvalidField("too many chat recipients"))?;
    let mut body = BytesMut::with_capacity(3 + to_pids.len() + message.len() + 1);
    body.put_u8(count);
    body.put_slice(to_pids);
    body.put_u8(from_pid);
    body.put_u8(chat_flag::MESSAGE);
    body.put_cstring(message);
    packet(GameOpcode::ChatFromHost, body)
}

pub fn start_download(from_pid: u8) -> Result<Packet> {
    let mut body = BytesMut::with_capacity(5);
    body.put_u32_le(1);
    body.put_u8(from_pid);
    packet(GameOpcode::StartDownload, body)
}

pub fn map_check(map: &MapCheck) -> Result<Packet> {
    let mut body = BytesMut::with_capacity(36 + map.map_path.len() + 1);
    body.put_u32_le(1);
    body.put_cstring(&map.map_path);
    body.put_u32_le(map.map_size);
    body.put_u32_le(map.map_info);
    body.put_u32_le(map.map_crc);
    body.put_slice(&map.map_sha1);
    packet(GameOpcode::MapCheck, body)
}

/// One chunk of a map download. `crc` is the CRC-32 of `data`, computed by the caller.
pub fn map_part(to_pid: u8, from_pid: u8, start: u32, crc: u32, data: &[u8]) -> Result<Packet> {
    let mut body = BytesMut::with_capacity(14 + data.len());
    body.put_u8(to_pid);
    body.put_u8(from_pid);
    body.put_u32_le(1);
    body.put_u32_le(start);
    body.put_u32_le(crc);
    body.put_slice(data);
    packet(GameOpcode::MapPart, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::game::message::GameSlot;
    use crate::protocol::game::opcode::{game_type, reject_reason};

    fn table() -> SlotTable {
        SlotTable {
            slots: vec![GameSlot::default(); 2],
            random_seed: 0x01020304,
            layout_style: 0,
            player_slots: 2,
        }
    }

    #[test]
    fn test_slot_info_join_layout() {
        let packet = slot_info_join(3, 6112, Ipv4Addr::new(1, 2, 3, 4), &table()).unwrap();
        let body = &packet.body[..];
        let slot_len = table().encoded_len();
        assert_eq!(&body[..2], &(slot_len as u16).to_le_bytes());
        let tail = &body[2 + slot_len..];
        assert_eq!(tail[0], 3);
        assert_eq!(&tail[1..3], &[2, 0]);
        assert_eq!(&tail[3..5], &[0x17, 0xE0]);
        assert_eq!(&tail[5..9], &[1, 2, 3, 4]);
        assert_eq!(tail.len(), 17);
    }

    #[test]
    fn test_reject_join_is_framed() {
        let bytes = reject_join(reject_reason::FULL).unwrap().to_bytes();
        assert_eq!(&bytes[..], &[0xF7, 0x05, 0x08, 0x00, 9, 0, 0, 0]);
    }

    #[test]
    fn test_game_info_stat_string_has_no_zeros() {
        let info = GameInfo {
            tft: true,
            war3_version: 26,
            map_game_type: game_type::CUSTOM,
            map_flags: 0,
            map_width: 116,
            map_height: 116,
            game_name: "relay test".into(),
            host_name: "host".into(),
            up_time: 0,
            map_path: "Maps\\Test.w3x".into(),
            map_crc: 0,
            slots_total: 12,
            slots_open: 11,
            port: 6112,
            host_counter: 1,
        };
        let packet = game_info(&info).unwrap();
        let body = &packet.body[..];
        assert_eq!(&body[..4], b"PX3W");
        let name_end = 16 + "relay test".len();
        assert_eq!(body[name_end], 0);
        // password terminator, then the encoded stat string up to its terminator
        let stat = &body[name_end + 2..];
        let stat_end = stat.iter().position(|&b| b == 0).unwrap();
        assert!(stat_end > 0);
        assert_eq!(&body[body.len() - 2..], &6112u16.to_le_bytes());
    }

    #[test]
    fn test_game_info_requires_names() {
        let info = GameInfo {
            tft: false,
            war3_version: 26,
            map_game_type: 1,
            map_flags: 0,
            map_width: 0,
            map_height: 0,
            game_name: String::new(),
            host_name: "host".into(),
            up_time: 0,
            map_path: "x".into(),
            map_crc: 0,
            slots_total: 0,
            slots_open: 0,
            port: 0,
            host_counter: 0,
        };
        assert!(game_info(&info).is_err());
    }

    #[test]
    fn test_chat_from_host() {
        let packet = chat_from_host(1, &[2, 3], "hi").unwrap();
        assert_eq!(&packet.body[..], &[2, 2, 3, 1, 16, b'h', b'i', 0]);
    }

    #[test]
    fn test_slot_info_prefixes_table_length() {
        let packet = slot_info(&table()).unwrap();
        assert_eq!(packet.opcode, GameOpcode::SlotInfo as u8);
        assert_eq!(packet.body.len(), 2 + table().encoded_len());
    }

    #[test]
    fn test_ping_and_download_bodies() {
        assert_eq!(&ping_from_host(0x0A0B).unwrap().body[..], &[0x0B, 0x0A, 0, 0]);
        assert_eq!(&start_download(1).unwrap().body[..], &[1, 0, 0, 0, 1]);
    }

    #[test]
    fn test_map_check_layout() {
        let map = MapCheck {
            map_path: "Maps\\Test.w3x".into(),
            map_size: 1024,
            map_info: 0xAABBCCDD,
            map_crc: 0x11223344,
            map_sha1: [7; 20],
        };
        let packet = map_check(&map).unwrap();
        let body = &packet.body[..];
        let path_end = 4 + map.map_path.len();
        assert_eq!(body[path_end], 0);
        assert_eq!(&body[path_end + 1..path_end + 5], &1024u32.to_le_bytes());
        assert_eq!(&body[body.len() - 20..], &[7; 20]);
    }

    #[test]
    fn test_map_part_carries_chunk() {
        let packet = map_part(2, 1, 1442, 0xDEADBEEF, b"chunk").unwrap();
        let body = &packet.body[..];
        assert_eq!(&body[..2], &[2, 1]);
        assert_eq!(&body[6..10], &1442u32.to_le_bytes());
        assert_eq!(&body[10..14], &0xDEADBEEFu32.to_le_bytes());
        assert_eq!(&body[14..], b"chunk");
    }

    #[test]
    fn test_slot_count_must_fit_a_byte() {
        let oversized = SlotTable {
            slots: vec![GameSlot::default(); 256],
            ..table()
        };
        assert!(matches!(
            slot_info(&oversized),
            Err(ProtocolError::InvalidField("too many slots"))
        ));
        assert!(slot_info_join(2, 6112, Ipv4Addr::LOCALHOST, &oversized).is_err());

        let full = SlotTable {
            slots: vec![GameSlot::default(); 255],
            ..table()
        };
        assert_eq!(slot_info(&full).unwrap().body[2], 255);
    }
}
