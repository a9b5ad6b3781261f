//! Encoders for outbound realm packets.
//!
//! Every function assembles the body first and lets [`Packet`] patch in the
//! length, so callers never compute header sizes by hand.

use bytes::{BufMut, Bytes, BytesMut};

use crate::core::cursor::PutExt;
use crate::core::packet::{Packet, REALM_MARKER};
use crate::error::{HandshakeError, Result};
use crate::protocol::realm::message::{AuthCheckRequest, AuthInfoRequest, KeyInfo};
use crate::protocol::realm::opcode::{
    RealmOpcode, PLATFORM_X86, PRODUCT_ROC, PRODUCT_TFT, PROTOCOL_SELECTOR,
};

fn packet(opcode: RealmOpcode, body: BytesMut) -> Result<Packet> {
    Packet::new(REALM_MARKER, opcode as u8, body.freeze())
}

/// The single selector byte preceding the first packet on a new socket.
pub fn protocol_selector() -> Bytes {
    Bytes::from_static(&[PROTOCOL_SELECTOR])
}

pub fn null() -> Result<Packet> {
    packet(RealmOpcode::Null, BytesMut::new())
}

/// Echo of a server ping; the payload is returned untouched.
pub fn ping(payload: u32) -> Result<Packet> {
    let mut body = BytesMut::with_capacity(4);
    body.put_u32_le(payload);
    packet(RealmOpcode::Ping, body)
}

/// Locale string reversed into a four byte tag, `enUS` becomes `SUne`.
fn language_tag(language: &str) -> [u8; 4] {
    let mut tag = [0u8; 4];
    for (slot, byte) in tag.iter_mut().zip(language.bytes().rev()) {
        *slot = byte;
    }
    tag
}

pub fn auth_info(req: &AuthInfoRequest) -> Result<Packet> {
    let mut body = BytesMut::with_capacity(64);
    // protocol id
    body.put_u32_le(0);
    body.put_tag(PLATFORM_X86);
    body.put_tag(if req.tft { PRODUCT_TFT } else { PRODUCT_ROC });
    body.put_u32_le(req.war3_version);
    body.put_tag(&language_tag(&req.language));
    body.put_slice(&req.local_ip.octets());
    body.put_u32_le(req.timezone_bias);
    body.put_u32_le(req.locale_id);
    // language id mirrors the locale id
    body.put_u32_le(req.locale_id);
    body.put_cstring(&req.country_abbrev);
    body.put_cstring(&req.country);
    packet(RealmOpcode::AuthInfo, body)
}

pub fn auth_check(req: &AuthCheckRequest) -> Result<Packet> {
    let num_keys: u32 = if req.key_tft.is_some() { 2 } else { 1 };
    let mut body = BytesMut::with_capacity(20 + 2 * KeyInfo::ENCODED_LEN + 32);
    body.put_u32_le(req.client_token);
    body.put_u32_le(req.exe_version);
    body.put_u32_le(req.exe_version_hash);
    body.put_u32_le(num_keys);
    // spawn key: never used
    body.put_u32_le(0);
    req.key_roc.write_to(&mut body);
    if let Some(key_tft) = &req.key_tft {
        key_tft.write_to(&mut body);
    }
    body.put_cstring(&req.exe_info);
    body.put_cstring(&req.key_owner);
    packet(RealmOpcode::AuthCheck, body)
}

/// Rejects any public value that is not exactly 32 bytes.
pub fn account_logon(client_public_key: &[u8], account: &str) -> Result<Packet> {
    if client_public_key.len() != 32 {
        return Err(HandshakeError::PublicKeyLength(client_public_key.len()).into());
    }
    let mut body = BytesMut::with_capacity(32 + account.len() + 1);
    body.put_slice(client_public_key);
    body.put_cstring(account);
    packet(RealmOpcode::AuthAccountLogon, body)
}

pub fn account_logon_proof(proof: &[u8; 20]) -> Result<Packet> {
    let mut body = BytesMut::with_capacity(20);
    body.put_slice(proof);
    packet(RealmOpcode::AuthAccountLogonProof, body)
}

pub fn net_game_port(port: u16) -> Result<Packet> {
    let mut body = BytesMut::with_capacity(2);
    body.put_u16_le(port);
    packet(RealmOpcode::NetGamePort, body)
}

/// Enter chat with empty account name and stat string; the server fills both in.
pub fn enter_chat() -> Result<Packet> {
    let mut body = BytesMut::with_capacity(2);
    body.put_u8(0);
    body.put_u8(0);
    packet(RealmOpcode::EnterChat, body)
}

pub fn join_channel(channel: &str) -> Result<Packet> {
    const NO_CREATE_JOIN: u32 = 2;
    const FIRST_JOIN: u32 = 1;

    let mut body = BytesMut::with_capacity(4 + channel.len() + 1);
    body.put_u32_le(if channel.is_empty() {
        FIRST_JOIN
    } else {
        NO_CREATE_JOIN
    });
    body.put_cstring(channel);
    packet(RealmOpcode::JoinChannel, body)
}

pub fn chat_command(command: &str) -> Result<Packet> {
    let mut body = BytesMut::with_capacity(command.len() + 1);
    body.put_cstring(command);
    packet(RealmOpcode::ChatCommand, body)
}

pub fn friends_list() -> Result<Packet> {
    packet(RealmOpcode::FriendsList, BytesMut::new())
}

pub fn clan_member_list() -> Result<Packet> {
    let mut body = BytesMut::with_capacity(4);
    // cookie
    body.put_u32_le(0);
    packet(RealmOpcode::ClanMemberList, body)
}

/// Game list query. An empty name asks for any open games, a name asks for
/// that game only.
pub fn get_adv_list_ex(game_name: &str, num_games: u32) -> Result<Packet> {
    let (cond1, cond2, cond3, num_games): ([u8; 2], [u8; 2], [u8; 4], u32) =
        if game_name.is_empty() {
            ([0x00, 0xE0], [0x7F, 0x00], [0; 4], num_games)
        } else {
            ([0xFF, 0x03], [0x00, 0x00], [0xFF, 0x03, 0x00, 0x00], 1)
        };

    let mut body = BytesMut::with_capacity(20 + game_name.len() + 3);
    body.put_slice(&cond1);
    body.put_slice(&cond2);
    body.put_slice(&cond3);
    body.put_slice(&[0; 4]);
    body.put_u32_le(num_games);
    body.put_cstring(game_name);
    // password and stat string
    body.put_u8(0);
    body.put_u8(0);
    packet(RealmOpcode::GetAdvListEx, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_null_is_header_only() {
        assert_eq!(&null().unwrap().to_bytes()[..], &[0xFF, 0x00, 0x04, 0x00]);
    }

    #[test]
    fn test_auth_info_layout() {
        let req = AuthInfoRequest {
            war3_version: 26,
            tft: true,
            language: "enUS".into(),
            local_ip: Ipv4Addr::new(192, 168, 1, 2),
            timezone_bias: 0,
            locale_id: 1033,
            country_abbrev: "USA".into(),
            country: "United States".into(),
        };
        let packet = auth_info(&req).unwrap();
        let body = &packet.body[..];
        assert_eq!(&body[4..8], b"68XI");
        assert_eq!(&body[8..12], b"PX3W");
        assert_eq!(&body[12..16], &[26, 0, 0, 0]);
        assert_eq!(&body[16..20], b"SUne");
        assert_eq!(&body[20..24], &[192, 168, 1, 2]);
        assert_eq!(&body[28..32], &1033u32.to_le_bytes());
        assert!(body.ends_with(b"USA\0United States\0"));
    }

    #[test]
    fn test_auth_check_counts_keys() {
        let key = KeyInfo {
            key_len: 26,
            product: 1,
            public_value: 2,
            hash: [0; 20],
        };
        let mut req = AuthCheckRequest {
            client_token: 0x07CB01DC,
            exe_version: 1,
            exe_version_hash: 2,
            key_roc: key.clone(),
            key_tft: None,
            exe_info: "war3.exe".into(),
            key_owner: "owner".into(),
        };
        let roc = auth_check(&req).unwrap();
        assert_eq!(&roc.body[..4], &[0xDC, 0x01, 0xCB, 0x07]);
        assert_eq!(&roc.body[12..16], &[1, 0, 0, 0]);

        req.key_tft = Some(key);
        let tft = auth_check(&req).unwrap();
        assert_eq!(&tft.body[12..16], &[2, 0, 0, 0]);
        assert_eq!(tft.body.len(), roc.body.len() + KeyInfo::ENCODED_LEN);
    }

    #[test]
    fn test_account_logon_rejects_short_key() {
        assert!(account_logon(&[0u8; 31], "bot").is_err());
        let packet = account_logon(&[1u8; 32], "bot").unwrap();
        assert_eq!(packet.length(), 4 + 32 + 4);
    }

    #[test]
    fn test_join_channel_flags() {
        assert_eq!(&join_channel("").unwrap().body[..4], &[1, 0, 0, 0]);
        assert_eq!(&join_channel("The Void").unwrap().body[..4], &[2, 0, 0, 0]);
    }

    #[test]
    fn test_selector_and_port() {
        assert_eq!(&protocol_selector()[..], &[0x01]);
        assert_eq!(
            &net_game_port(6113).unwrap().to_bytes()[..],
            &[0xFF, 0x45, 0x06, 0x00, 0xE1, 0x17]
        );
    }
}
