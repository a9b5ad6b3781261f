//! Realm opcodes and protocol constants.

use std::fmt;

/// Out-of-band byte written once, before the first packet, on a fresh socket.
pub const PROTOCOL_SELECTOR: u8 = 0x01;

/// Default realm server port.
pub const DEFAULT_REALM_PORT: u16 = 6112;

/// Platform tag, already in wire order.
pub const PLATFORM_X86: &[u8; 4] = b"68XI";
/// Expansion product tag, already in wire order.
pub const PRODUCT_TFT: &[u8; 4] = b"PX3W";
/// Base product tag, already in wire order.
pub const PRODUCT_ROC: &[u8; 4] = b"3RAW";

/// Key states returned in the auth-check result.
pub mod key_state {
    pub const GOOD: u32 = 0x000;
    pub const OLD_GAME_VERSION: u32 = 0x100;
    pub const INVALID_VERSION: u32 = 0x101;
    pub const MUST_BE_DOWNGRADED: u32 = 0x102;
    pub const INVALID_CD_KEY: u32 = 0x200;
    pub const ROC_KEY_IN_USE: u32 = 0x201;
    pub const BANNED_KEY: u32 = 0x202;
    pub const WRONG_PRODUCT: u32 = 0x203;
    pub const TFT_KEY_IN_USE: u32 = 0x211;

    pub fn describe(code: u32) -> &'static str {
        match code {
            GOOD => "passed challenge",
            OLD_GAME_VERSION => "old game version",
            INVALID_VERSION => "invalid version",
            MUST_BE_DOWNGRADED => "game version must be downgraded",
            INVALID_CD_KEY => "invalid CD key",
            ROC_KEY_IN_USE => "ROC CD key in use",
            TFT_KEY_IN_USE => "TFT CD key in use",
            BANNED_KEY => "banned CD key",
            WRONG_PRODUCT => "wrong product",
            code if code < 0x100 => "invalid version code",
            _ => "unknown key state",
        }
    }
}

/// Account logon statuses.
pub mod logon_status {
    pub const ACCEPTED: u32 = 0x00;
    pub const NO_ACCOUNT: u32 = 0x01;
    pub const UPGRADE_REQUIRED: u32 = 0x05;

    /// Logon proof statuses
    pub const PROOF_OK: u32 = 0x00;
    pub const PROOF_BAD_PASSWORD: u32 = 0x02;
    pub const PROOF_EMAIL_REQUESTED: u32 = 0x0E;
    pub const PROOF_CUSTOM_ERROR: u32 = 0x0F;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RealmOpcode {
    Null = 0x00,
    StopAdv = 0x02,
    GetAdvListEx = 0x09,
    EnterChat = 0x0A,
    JoinChannel = 0x0C,
    ChatCommand = 0x0E,
    ChatEvent = 0x0F,
    FloodDetected = 0x13,
    CheckAd = 0x15,
    MessageBox = 0x19,
    StartAdvEx3 = 0x1C,
    NotifyJoin = 0x22,
    Ping = 0x25,
    NetGamePort = 0x45,
    RequiredWork = 0x4C,
    AuthInfo = 0x50,
    AuthCheck = 0x51,
    AuthAccountLogon = 0x53,
    AuthAccountLogonProof = 0x54,
    FriendsList = 0x65,
    FriendsUpdate = 0x66,
    FriendsAdd = 0x67,
    ClanInfo = 0x75,
    ClanInvitation = 0x77,
    ClanMemberList = 0x7D,
    ClanMemberRemoved = 0x7E,
    ClanMemberStatusChange = 0x7F,
}

impl RealmOpcode {
    pub fn name(self) -> &'static str {
        match self {
            RealmOpcode::Null => "SID_NULL",
            RealmOpcode::StopAdv => "SID_STOPADV",
            RealmOpcode::GetAdvListEx => "SID_GETADVLISTEX",
            RealmOpcode::EnterChat => "SID_ENTERCHAT",
            RealmOpcode::JoinChannel => "SID_JOINCHANNEL",
            RealmOpcode::ChatCommand => "SID_CHATCOMMAND",
            RealmOpcode::ChatEvent => "SID_CHATEVENT",
            RealmOpcode::FloodDetected => "SID_FLOODDETECTED",
            RealmOpcode::CheckAd => "SID_CHECKAD",
            RealmOpcode::MessageBox => "SID_MESSAGEBOX",
            RealmOpcode::StartAdvEx3 => "SID_STARTADVEX3",
            RealmOpcode::NotifyJoin => "SID_NOTIFYJOIN",
            RealmOpcode::Ping => "SID_PING",
            RealmOpcode::NetGamePort => "SID_NETGAMEPORT",
            RealmOpcode::RequiredWork => "SID_REQUIREDWORK",
            RealmOpcode::AuthInfo => "SID_AUTH_INFO",
            RealmOpcode::AuthCheck => "SID_AUTH_CHECK",
            RealmOpcode::AuthAccountLogon => "SID_AUTH_ACCOUNTLOGON",
            RealmOpcode::AuthAccountLogonProof => "SID_AUTH_ACCOUNTLOGONPROOF",
            RealmOpcode::FriendsList => "SID_FRIENDSLIST",
            RealmOpcode::FriendsUpdate => "SID_FRIENDSUPDATE",
            RealmOpcode::FriendsAdd => "SID_FRIENDSADD",
            RealmOpcode::ClanInfo => "SID_CLANINFO",
            RealmOpcode::ClanInvitation => "SID_CLANINVITATION",
            RealmOpcode::ClanMemberList => "SID_CLANMEMBERLIST",
            RealmOpcode::ClanMemberRemoved => "SID_CLANMEMBERREMOVED",
            RealmOpcode::ClanMemberStatusChange => "SID_CLANMEMBERSTATUSCHANGE",
        }
    }
}

impl TryFrom<u8> for RealmOpcode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x00 => RealmOpcode::Null,
            0x02 => RealmOpcode::StopAdv,
            0x09 => RealmOpcode::GetAdvListEx,
            0x0A => RealmOpcode::EnterChat,
            0x0C => RealmOpcode::JoinChannel,
            0x0E => RealmOpcode::ChatCommand,
            0x0F => RealmOpcode::ChatEvent,
            0x13 => RealmOpcode::FloodDetected,
            0x15 => RealmOpcode::CheckAd,
            0x19 => RealmOpcode::MessageBox,
            0x1C => RealmOpcode::StartAdvEx3,
            0x22 => RealmOpcode::NotifyJoin,
            0x25 => RealmOpcode::Ping,
            0x45 => RealmOpcode::NetGamePort,
            0x4C => RealmOpcode::RequiredWork,
            0x50 => RealmOpcode::AuthInfo,
            0x51 => RealmOpcode::AuthCheck,
            0x53 => RealmOpcode::AuthAccountLogon,
            0x54 => RealmOpcode::AuthAccountLogonProof,
            0x65 => RealmOpcode::FriendsList,
            0x66 => RealmOpcode::FriendsUpdate,
            0x67 => RealmOpcode::FriendsAdd,
            0x75 => RealmOpcode::ClanInfo,
            0x77 => RealmOpcode::ClanInvitation,
            0x7D => RealmOpcode::ClanMemberList,
            0x7E => RealmOpcode::ClanMemberRemoved,
            0x7F => RealmOpcode::ClanMemberStatusChange,
            other => return Err(other),
        })
    }
}

impl fmt::Display for RealmOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Chat event identifiers carried in `SID_CHATEVENT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatEventKind {
    ShowUser,
    Join,
    Leave,
    Whisper,
    Talk,
    Broadcast,
    Channel,
    UserFlags,
    WhisperSent,
    ChannelFull,
    ChannelDoesNotExist,
    ChannelRestricted,
    Info,
    Error,
    Emote,
    Other(u32),
}

impl From<u32> for ChatEventKind {
    fn from(id: u32) -> Self {
        match id {
            1 => ChatEventKind::ShowUser,
            2 => ChatEventKind::Join,
            3 => ChatEventKind::Leave,
            4 => ChatEventKind::Whisper,
            5 => ChatEventKind::Talk,
            6 => ChatEventKind::Broadcast,
            7 => ChatEventKind::Channel,
            9 => ChatEventKind::UserFlags,
            10 => ChatEventKind::WhisperSent,
            13 => ChatEventKind::ChannelFull,
            14 => ChatEventKind::ChannelDoesNotExist,
            15 => ChatEventKind::ChannelRestricted,
            18 => ChatEventKind::Info,
            19 => ChatEventKind::Error,
            23 => ChatEventKind::Emote,
            other => ChatEventKind::Other(other),
        }
    }
}
