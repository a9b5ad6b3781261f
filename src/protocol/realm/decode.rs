//! Opcode-keyed decoder table for inbound realm packets.
//!
//! Each entry pairs a minimum body length with a decode function. The length
//! check runs before the decoder so short bodies are reported uniformly; the
//! decoder itself still reads through a bounds-checked cursor.

use std::net::Ipv4Addr;

use bytes::Bytes;
use tracing::trace;

use crate::core::cursor::ByteCursor;
use crate::core::packet::Packet;
use crate::error::{DecodeError, DecodeReason};
use crate::protocol::realm::message::*;
use crate::protocol::realm::opcode::RealmOpcode;

type Field<T> = std::result::Result<T, DecodeReason>;
type DecodeFn = fn(&mut ByteCursor<'_>) -> Field<RealmMessage>;

#[derive(Clone, Copy)]
struct DecoderEntry {
    min_body: usize,
    decode: DecodeFn,
}

fn entry(min_body: usize, decode: DecodeFn) -> Option<DecoderEntry> {
    Some(DecoderEntry { min_body, decode })
}

/// Outbound-only opcodes have no entry and decode as unrecognized.
fn decoder_for(opcode: RealmOpcode) -> Option<DecoderEntry> {
    match opcode {
        RealmOpcode::Null => entry(0, |_| Ok(RealmMessage::Null)),
        RealmOpcode::Ping => entry(4, decode_ping),
        RealmOpcode::AuthInfo => entry(21, decode_auth_info),
        RealmOpcode::AuthCheck => entry(5, decode_auth_check),
        RealmOpcode::AuthAccountLogon => entry(68, decode_account_logon),
        RealmOpcode::AuthAccountLogonProof => entry(4, decode_account_logon_proof),
        RealmOpcode::RequiredWork => entry(0, decode_required_work),
        RealmOpcode::EnterChat => entry(1, decode_enter_chat),
        RealmOpcode::ChatEvent => entry(25, decode_chat_event),
        RealmOpcode::FloodDetected => entry(0, |_| Ok(RealmMessage::FloodDetected)),
        RealmOpcode::MessageBox => entry(6, decode_message_box),
        RealmOpcode::FriendsList => entry(1, decode_friends_list),
        RealmOpcode::FriendsUpdate => entry(8, decode_friends_update),
        RealmOpcode::FriendsAdd => entry(8, decode_friends_add),
        RealmOpcode::ClanInfo => entry(6, decode_clan_info),
        RealmOpcode::ClanInvitation => entry(5, decode_clan_invitation),
        RealmOpcode::ClanMemberList => entry(5, decode_clan_member_list),
        RealmOpcode::ClanMemberRemoved => entry(1, decode_clan_member_removed),
        RealmOpcode::ClanMemberStatusChange => entry(4, decode_clan_member_status),
        RealmOpcode::GetAdvListEx => entry(4, decode_game_list),
        RealmOpcode::StopAdv
        | RealmOpcode::JoinChannel
        | RealmOpcode::ChatCommand
        | RealmOpcode::CheckAd
        | RealmOpcode::StartAdvEx3
        | RealmOpcode::NotifyJoin
        | RealmOpcode::NetGamePort => None,
    }
}

/// Minimum body length the decoder table requires, `None` for opcodes we never decode.
pub fn min_body_len(opcode: RealmOpcode) -> Option<usize> {
    decoder_for(opcode).map(|e| e.min_body)
}

/// Decodes one realm packet body.
pub fn decode(opcode: u8, body: &[u8]) -> Result<RealmMessage, DecodeError> {
    let entry = RealmOpcode::try_from(opcode)
        .ok()
        .and_then(decoder_for)
        .ok_or_else(|| DecodeError::unrecognized(opcode))?;

    if body.len() < entry.min_body {
        return Err(DecodeError::new(
            opcode,
            DecodeReason::TooShort {
                need: entry.min_body,
                have: body.len(),
            },
        ));
    }

    trace!(opcode, len = body.len(), "decoding realm packet");
    (entry.decode)(&mut ByteCursor::new(body)).map_err(|reason| DecodeError::new(opcode, reason))
}

pub fn decode_packet(packet: &Packet) -> Result<RealmMessage, DecodeError> {
    decode(packet.opcode, &packet.body)
}

/// Four raw bytes read back to front, padding dropped. Product and clan tags
/// are stored reversed on the wire.
fn reversed_tag(raw: [u8; 4]) -> String {
    raw.iter()
        .rev()
        .filter(|&&b| b != 0)
        .map(|&b| char::from(b))
        .collect()
}

fn decode_ping(cur: &mut ByteCursor<'_>) -> Field<RealmMessage> {
    Ok(RealmMessage::Ping(cur.read_u32_le()?))
}

fn decode_auth_info(cur: &mut ByteCursor<'_>) -> Field<RealmMessage> {
    let logon_type = cur.read_u32_le()?;
    let server_token = cur.read_u32_le()?;
    let udp_value = cur.read_u32_le()?;
    let mpq_file_time = cur.array::<8>()?;
    let exe_file_name = cur.read_cstring("exe_file_name")?;
    // Anything after the formula is the server signature, which we ignore
    let version_formula = cur.read_cstring_lenient();

    Ok(RealmMessage::AuthInfo(AuthInfo {
        logon_type,
        server_token,
        udp_value,
        mpq_file_time,
        exe_file_name,
        version_formula,
    }))
}

fn decode_auth_check(cur: &mut ByteCursor<'_>) -> Field<RealmMessage> {
    let key_state = cur.read_u32_le()?;
    let description = cur.read_cstring_lenient();
    Ok(RealmMessage::AuthCheck(AuthCheckResult {
        key_state,
        description,
    }))
}

fn decode_account_logon(cur: &mut ByteCursor<'_>) -> Field<RealmMessage> {
    Ok(RealmMessage::AccountLogon(AccountLogonChallenge {
        status: cur.read_u32_le()?,
        salt: cur.array()?,
        server_public_key: cur.array()?,
    }))
}

fn decode_account_logon_proof(cur: &mut ByteCursor<'_>) -> Field<RealmMessage> {
    let status = cur.read_u32_le()?;
    let server_proof = if cur.remaining() >= 20 {
        Some(cur.array::<20>()?)
    } else {
        None
    };
    let message = cur.read_cstring_lenient();
    Ok(RealmMessage::AccountLogonProof(AccountLogonProof {
        status,
        server_proof,
        message,
    }))
}

fn decode_required_work(cur: &mut ByteCursor<'_>) -> Field<RealmMessage> {
    Ok(RealmMessage::RequiredWork {
        file_name: cur.read_cstring_lenient(),
    })
}

fn decode_enter_chat(cur: &mut ByteCursor<'_>) -> Field<RealmMessage> {
    let unique_name = cur.read_cstring("unique_name")?;
    let stat_string = cur.read_cstring_lenient();
    let account_name = cur.read_cstring_lenient();
    Ok(RealmMessage::EnterChat(EnterChat {
        unique_name,
        stat_string,
        account_name,
    }))
}

fn decode_chat_event(cur: &mut ByteCursor<'_>) -> Field<RealmMessage> {
    let kind = cur.read_u32_le()?.into();
    let user_flags = cur.read_u32_le()?;
    let ping_ms = cur.read_u32_le()?;
    // IP address, account number, registration authority: all defunct
    cur.skip(12)?;
    let user = cur.read_cstring("user")?;
    let message = cur.read_cstring_lenient();
    Ok(RealmMessage::ChatEvent(ChatEvent {
        kind,
        user_flags,
        ping_ms,
        user,
        message,
    }))
}

fn decode_message_box(cur: &mut ByteCursor<'_>) -> Field<RealmMessage> {
    let style = cur.read_u32_le()?;
    let text = cur.read_cstring("text")?;
    let caption = cur.read_cstring_lenient();
    Ok(RealmMessage::MessageBox(MessageBox {
        style,
        text,
        caption,
    }))
}

fn read_friend(cur: &mut ByteCursor<'_>) -> Field<FriendEntry> {
    let account = cur.read_cstring("account")?;
    let status_flags = cur.read_u8()?;
    let area = cur.read_u8()?;
    let client_tag = reversed_tag(cur.array()?);
    let location = cur.read_cstring("location")?;
    Ok(FriendEntry {
        account,
        status_flags,
        area,
        client_tag,
        location,
    })
}

/// A truncated tail ends the list; the entries read so far are kept.
fn decode_friends_list(cur: &mut ByteCursor<'_>) -> Field<RealmMessage> {
    let total = cur.read_u8()?;
    let mut friends = Vec::with_capacity(usize::from(total));
    for _ in 0..total {
        match read_friend(cur) {
            Ok(friend) => friends.push(friend),
            Err(_) => break,
        }
    }
    Ok(RealmMessage::FriendsList(friends))
}

fn decode_friends_update(cur: &mut ByteCursor<'_>) -> Field<RealmMessage> {
    Ok(RealmMessage::FriendsUpdate(FriendUpdate {
        entry_number: cur.read_u8()?,
        status_flags: cur.read_u8()?,
        area: cur.read_u8()?,
        client_tag: reversed_tag(cur.array()?),
        location: cur.read_cstring_lenient(),
    }))
}

fn decode_friends_add(cur: &mut ByteCursor<'_>) -> Field<RealmMessage> {
    let account = cur.read_cstring("account")?;
    let status_flags = cur.read_u8()?;
    let area = cur.read_u8()?;
    let client_tag = reversed_tag(cur.array()?);
    let location = cur.read_cstring_lenient();
    Ok(RealmMessage::FriendsAdd(FriendEntry {
        account,
        status_flags,
        area,
        client_tag,
        location,
    }))
}

fn decode_clan_info(cur: &mut ByteCursor<'_>) -> Field<RealmMessage> {
    cur.skip(1)?;
    let tag = reversed_tag(cur.array()?);
    let rank = cur.read_u8()?;
    Ok(RealmMessage::ClanInfo(ClanInfo { tag, rank }))
}

fn decode_clan_invitation(cur: &mut ByteCursor<'_>) -> Field<RealmMessage> {
    Ok(RealmMessage::ClanInvitation(ClanInvitationResponse {
        cookie: cur.read_u32_le()?,
        status: cur.read_u8()?,
    }))
}

fn read_clan_member(cur: &mut ByteCursor<'_>) -> Field<ClanMember> {
    let name = cur.read_cstring("name")?;
    let rank = cur.read_u8()?;
    let online = cur.read_u8()?;
    let location = cur.read_cstring("location")?;
    Ok(ClanMember {
        name,
        rank,
        online,
        location,
    })
}

fn decode_clan_member_list(cur: &mut ByteCursor<'_>) -> Field<RealmMessage> {
    let _cookie = cur.read_u32_le()?;
    let total = cur.read_u8()?;
    let mut members = Vec::with_capacity(usize::from(total));
    for _ in 0..total {
        match read_clan_member(cur) {
            Ok(member) => members.push(member),
            Err(_) => break,
        }
    }
    Ok(RealmMessage::ClanMemberList(members))
}

fn decode_clan_member_removed(cur: &mut ByteCursor<'_>) -> Field<RealmMessage> {
    Ok(RealmMessage::ClanMemberRemoved {
        name: cur.read_cstring("name")?,
    })
}

fn decode_clan_member_status(cur: &mut ByteCursor<'_>) -> Field<RealmMessage> {
    let name = cur.read_cstring("name")?;
    let rank = cur.read_u8()?;
    let online = cur.read_u8()?;
    let location = cur.read_cstring_lenient();
    Ok(RealmMessage::ClanMemberStatusChange(ClanMember {
        name,
        rank,
        online,
        location,
    }))
}

/// Host counters are advertised as eight hex digits, least significant first.
fn parse_host_counter(raw: &[u8]) -> u32 {
    let digits: String = raw.iter().rev().map(|&b| char::from(b)).collect();
    u32::from_str_radix(&digits, 16).unwrap_or(0)
}

fn read_game_host(cur: &mut ByteCursor<'_>) -> Field<IncomingGameHost> {
    let game_type = cur.read_u16_le()?;
    let parameter = cur.read_u16_le()?;
    let language_id = cur.read_u32_le()?;
    // sockaddr_in: family, port (network order), address, 8 bytes of padding
    cur.skip(2)?;
    let port = cur.read_u16_be()?;
    let ip = Ipv4Addr::from(cur.array::<4>()?);
    cur.skip(8)?;
    let status = cur.read_u32_le()?;
    let elapsed_secs = cur.read_u32_le()?;
    let name = cur.read_cstring("game_name")?;
    let password = cur.read_cstring("game_password")?;
    let slots_total = char::from(cur.read_u8()?).to_digit(16).unwrap_or(0);
    let host_counter = parse_host_counter(cur.bytes(8)?);
    let stat_string = Bytes::from(cur.read_cstring("stat_string")?.into_bytes());

    Ok(IncomingGameHost {
        game_type,
        parameter,
        language_id,
        port,
        ip,
        status,
        elapsed_secs,
        name,
        password,
        slots_total,
        host_counter,
        stat_string,
    })
}

fn decode_game_list(cur: &mut ByteCursor<'_>) -> Field<RealmMessage> {
    let found = cur.read_u32_le()?;
    let mut games = Vec::new();
    for _ in 0..found {
        match read_game_host(cur) {
            Ok(game) => games.push(game),
            Err(_) => break,
        }
    }
    Ok(RealmMessage::GameList(games))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::realm::opcode::ChatEventKind;

    fn auth_info_body() -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&2u32.to_le_bytes());
        body.extend_from_slice(&0xDEADBEEFu32.to_le_bytes());
        body.extend_from_slice(&0u32.to_le_bytes());
        body.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        body.extend_from_slice(b"ver-IX86-1.mpq\0");
        body.extend_from_slice(b"A=1 B=2 C=3 4 A=A+S\0");
        body
    }

    #[test]
    fn test_decode_auth_info() {
        let msg = decode(0x50, &auth_info_body()).unwrap();
        match msg {
            RealmMessage::AuthInfo(info) => {
                assert_eq!(info.logon_type, 2);
                assert_eq!(info.server_token, 0xDEADBEEF);
                assert_eq!(info.mpq_file_time, [1, 2, 3, 4, 5, 6, 7, 8]);
                assert_eq!(info.exe_file_name, "ver-IX86-1.mpq");
                assert_eq!(info.version_formula, "A=1 B=2 C=3 4 A=A+S");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_auth_info_too_short() {
        let err = decode(0x50, &[0u8; 20]).unwrap_err();
        assert_eq!(err.opcode, 0x50);
        assert_eq!(err.reason, DecodeReason::TooShort { need: 21, have: 20 });
    }

    #[test]
    fn test_unrecognized_opcodes() {
        assert!(decode(0x5E, &[]).unwrap_err().is_unrecognized());
        // Known but outbound-only
        assert!(decode(0x0E, b"hi\0").unwrap_err().is_unrecognized());
    }

    #[test]
    fn test_decode_chat_event() {
        let mut body = Vec::new();
        body.extend_from_slice(&5u32.to_le_bytes());
        body.extend_from_slice(&0u32.to_le_bytes());
        body.extend_from_slice(&120u32.to_le_bytes());
        body.extend_from_slice(&[0; 12]);
        body.extend_from_slice(b"Thrall\0?trigger\0");

        let msg = decode(0x0F, &body).unwrap();
        assert_eq!(
            msg,
            RealmMessage::ChatEvent(ChatEvent {
                kind: ChatEventKind::Talk,
                user_flags: 0,
                ping_ms: 120,
                user: "Thrall".into(),
                message: "?trigger".into(),
            })
        );
    }

    #[test]
    fn test_chat_event_user_needs_terminator() {
        let mut body = vec![0u8; 24];
        body.push(b'x');
        let err = decode(0x0F, &body).unwrap_err();
        assert_eq!(
            err.reason,
            DecodeReason::MissingTerminator { field: "user" }
        );
    }

    #[test]
    fn test_decode_friends_list_reverses_client_tag() {
        let mut body = vec![2u8];
        body.extend_from_slice(b"Jaina\0");
        body.extend_from_slice(&[3, 2]);
        body.extend_from_slice(b"PX3W");
        body.extend_from_slice(b"The Void\0");
        // Second entry is truncated and dropped
        body.extend_from_slice(b"Arthas\0\x01");

        match decode(0x65, &body).unwrap() {
            RealmMessage::FriendsList(friends) => {
                assert_eq!(friends.len(), 1);
                assert_eq!(friends[0].account, "Jaina");
                assert_eq!(friends[0].client_tag, "W3XP");
                assert_eq!(friends[0].location, "The Void");
                assert_eq!(friends[0].status_text(), "<Mutual><DND>");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_decode_logon_proof_without_server_proof() {
        let body = 0x02u32.to_le_bytes();
        match decode(0x54, &body).unwrap() {
            RealmMessage::AccountLogonProof(proof) => {
                assert_eq!(proof.status, 2);
                assert!(proof.server_proof.is_none());
                assert!(!proof.is_success());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_decode_game_list() {
        let mut body = Vec::new();
        body.extend_from_slice(&1u32.to_le_bytes());
        body.extend_from_slice(&1u16.to_le_bytes());
        body.extend_from_slice(&0u16.to_le_bytes());
        body.extend_from_slice(&0u32.to_le_bytes());
        body.extend_from_slice(&[2, 0]);
        body.extend_from_slice(&6113u16.to_be_bytes());
        body.extend_from_slice(&[10, 0, 0, 7]);
        body.extend_from_slice(&[0; 8]);
        body.extend_from_slice(&4u32.to_le_bytes());
        body.extend_from_slice(&33u32.to_le_bytes());
        body.extend_from_slice(b"dota apem\0\0");
        body.push(b'a');
        body.extend_from_slice(b"50000000");
        body.extend_from_slice(b"stat\0");

        match decode(0x09, &body).unwrap() {
            RealmMessage::GameList(games) => {
                assert_eq!(games.len(), 1);
                let game = &games[0];
                assert_eq!(game.port, 6113);
                assert_eq!(game.ip, Ipv4Addr::new(10, 0, 0, 7));
                assert_eq!(game.name, "dota apem");
                assert_eq!(game.slots_total, 10);
                assert_eq!(game.host_counter, 5);
                assert_eq!(&game.stat_string[..], b"stat");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_min_body_table() {
        assert_eq!(min_body_len(RealmOpcode::AuthAccountLogon), Some(68));
        assert_eq!(min_body_len(RealmOpcode::ClanMemberList), Some(5));
        assert_eq!(min_body_len(RealmOpcode::ChatCommand), None);
    }
}
