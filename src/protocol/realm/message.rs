//! Typed records decoded from realm packets, plus the outbound request records
//! the encoders consume.

use std::net::Ipv4Addr;

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::realm::opcode::{ChatEventKind, RealmOpcode};

/// Server challenge opening the handshake (`SID_AUTH_INFO`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthInfo {
    pub logon_type: u32,
    pub server_token: u32,
    pub udp_value: u32,
    pub mpq_file_time: [u8; 8],
    /// Name of the version-check archive, e.g. `ver-IX86-1.mpq`.
    pub exe_file_name: String,
    pub version_formula: String,
}

impl AuthInfo {
    /// Archive number embedded in the version-check file name.
    ///
    /// `ver-IX86-3.mpq` and `IX86ver3.mpq` both yield 3. Returns `None` when
    /// the name carries no digit.
    pub fn mpq_number(&self) -> Option<u32> {
        let stem = self
            .exe_file_name
            .strip_suffix(".mpq")
            .unwrap_or(&self.exe_file_name);
        stem.chars().rev().find_map(|c| c.to_digit(10))
    }
}

/// Result of the CD-key and version check (`SID_AUTH_CHECK`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCheckResult {
    pub key_state: u32,
    /// Patch archive name or the account holding the key, depending on the state.
    pub description: String,
}

impl AuthCheckResult {
    pub fn is_success(&self) -> bool {
        self.key_state == super::opcode::key_state::GOOD
    }
}

/// Salt and server public value (`SID_AUTH_ACCOUNTLOGON`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountLogonChallenge {
    pub status: u32,
    pub salt: [u8; 32],
    pub server_public_key: [u8; 32],
}

/// Verdict on the password proof (`SID_AUTH_ACCOUNTLOGONPROOF`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountLogonProof {
    pub status: u32,
    /// Absent when the server cut the body short after the status.
    pub server_proof: Option<[u8; 20]>,
    pub message: String,
}

impl AccountLogonProof {
    pub fn is_success(&self) -> bool {
        use super::opcode::logon_status::{PROOF_EMAIL_REQUESTED, PROOF_OK};
        matches!(self.status, PROOF_OK | PROOF_EMAIL_REQUESTED)
    }
}

/// Confirmation that we entered chat (`SID_ENTERCHAT`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnterChat {
    /// Name the server assigned; a leading `#` means the account was already online.
    pub unique_name: String,
    pub stat_string: String,
    pub account_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    pub kind: ChatEventKind,
    pub user_flags: u32,
    pub ping_ms: u32,
    pub user: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendEntry {
    pub account: String,
    pub status_flags: u8,
    pub area: u8,
    /// Product tag in display order, e.g. `W3XP`.
    pub client_tag: String,
    pub location: String,
}

impl FriendEntry {
    pub const STATUS_MUTUAL: u8 = 1;
    pub const STATUS_DND: u8 = 2;
    pub const STATUS_AWAY: u8 = 4;

    pub fn status_text(&self) -> String {
        let mut out = String::new();
        if self.status_flags & Self::STATUS_MUTUAL != 0 {
            out.push_str("<Mutual>");
        }
        if self.status_flags & Self::STATUS_DND != 0 {
            out.push_str("<DND>");
        }
        if self.status_flags & Self::STATUS_AWAY != 0 {
            out.push_str("<Away>");
        }
        if out.is_empty() {
            out.push_str("<None>");
        }
        out
    }

    pub fn area_text(&self) -> &'static str {
        match self.area {
            0 => "<Offline>",
            1 => "<No Channel>",
            2 => "<In Channel>",
            3 => "<Public Game>",
            4 | 5 => "<Private Game>",
            _ => "<Unknown>",
        }
    }
}

/// Partial friend refresh (`SID_FRIENDSUPDATE`), addressed by list position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendUpdate {
    pub entry_number: u8,
    pub status_flags: u8,
    pub area: u8,
    pub client_tag: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClanMember {
    pub name: String,
    pub rank: u8,
    pub online: u8,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClanInfo {
    /// Clan tag in display order.
    pub tag: String,
    pub rank: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClanInvitationResponse {
    pub cookie: u32,
    pub status: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBox {
    pub style: u32,
    pub text: String,
    pub caption: String,
}

/// One advertised game from a `SID_GETADVLISTEX` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingGameHost {
    pub game_type: u16,
    pub parameter: u16,
    pub language_id: u32,
    pub port: u16,
    pub ip: Ipv4Addr,
    pub status: u32,
    pub elapsed_secs: u32,
    pub name: String,
    pub password: String,
    pub slots_total: u32,
    pub host_counter: u32,
    pub stat_string: Bytes,
}

/// Decoded inbound realm packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealmMessage {
    Null,
    Ping(u32),
    AuthInfo(AuthInfo),
    AuthCheck(AuthCheckResult),
    AccountLogon(AccountLogonChallenge),
    AccountLogonProof(AccountLogonProof),
    RequiredWork { file_name: String },
    EnterChat(EnterChat),
    ChatEvent(ChatEvent),
    FloodDetected,
    MessageBox(MessageBox),
    FriendsList(Vec<FriendEntry>),
    FriendsUpdate(FriendUpdate),
    FriendsAdd(FriendEntry),
    ClanInfo(ClanInfo),
    ClanInvitation(ClanInvitationResponse),
    ClanMemberList(Vec<ClanMember>),
    ClanMemberRemoved { name: String },
    ClanMemberStatusChange(ClanMember),
    GameList(Vec<IncomingGameHost>),
}

impl RealmMessage {
    pub fn opcode(&self) -> RealmOpcode {
        match self {
            RealmMessage::Null => RealmOpcode::Null,
            RealmMessage::Ping(_) => RealmOpcode::Ping,
            RealmMessage::AuthInfo(_) => RealmOpcode::AuthInfo,
            RealmMessage::AuthCheck(_) => RealmOpcode::AuthCheck,
            RealmMessage::AccountLogon(_) => RealmOpcode::AuthAccountLogon,
            RealmMessage::AccountLogonProof(_) => RealmOpcode::AuthAccountLogonProof,
            RealmMessage::RequiredWork { .. } => RealmOpcode::RequiredWork,
            RealmMessage::EnterChat(_) => RealmOpcode::EnterChat,
            RealmMessage::ChatEvent(_) => RealmOpcode::ChatEvent,
            RealmMessage::FloodDetected => RealmOpcode::FloodDetected,
            RealmMessage::MessageBox(_) => RealmOpcode::MessageBox,
            RealmMessage::FriendsList(_) => RealmOpcode::FriendsList,
            RealmMessage::FriendsUpdate(_) => RealmOpcode::FriendsUpdate,
            RealmMessage::FriendsAdd(_) => RealmOpcode::FriendsAdd,
            RealmMessage::ClanInfo(_) => RealmOpcode::ClanInfo,
            RealmMessage::ClanInvitation(_) => RealmOpcode::ClanInvitation,
            RealmMessage::ClanMemberList(_) => RealmOpcode::ClanMemberList,
            RealmMessage::ClanMemberRemoved { .. } => RealmOpcode::ClanMemberRemoved,
            RealmMessage::ClanMemberStatusChange(_) => RealmOpcode::ClanMemberStatusChange,
            RealmMessage::GameList(_) => RealmOpcode::GetAdvListEx,
        }
    }
}

/// CD-key proof block sent inside `SID_AUTH_CHECK`.
///
/// ```text
/// [KeyLen(4)] [Product(4)] [PublicValue(4)] [Zero(4)] [Hash(20)]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    pub key_len: u32,
    pub product: u32,
    pub public_value: u32,
    pub hash: [u8; 20],
}

impl KeyInfo {
    pub const ENCODED_LEN: usize = 36;

    pub fn write_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u32_le(self.key_len);
        dst.put_u32_le(self.product);
        dst.put_u32_le(self.public_value);
        dst.put_u32_le(0);
        dst.put_slice(&self.hash);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::ENCODED_LEN);
        self.write_to(&mut buf);
        buf.freeze()
    }
}

/// Fields of the opening `SID_AUTH_INFO` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthInfoRequest {
    pub war3_version: u32,
    pub tft: bool,
    /// Locale string in display order (`enUS`); reversed on the wire.
    pub language: String,
    pub local_ip: Ipv4Addr,
    pub timezone_bias: u32,
    pub locale_id: u32,
    pub country_abbrev: String,
    pub country: String,
}

/// Fields of the `SID_AUTH_CHECK` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCheckRequest {
    pub client_token: u32,
    pub exe_version: u32,
    pub exe_version_hash: u32,
    pub key_roc: KeyInfo,
    /// Present only when authenticating as the expansion.
    pub key_tft: Option<KeyInfo>,
    pub exe_info: String,
    pub key_owner: String,
}
