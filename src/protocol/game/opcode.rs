//! Game opcodes and the constants carried inside game packets.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GameOpcode {
    PingFromHost = 0x01,
    SlotInfoJoin = 0x04,
    RejectJoin = 0x05,
    PlayerInfo = 0x06,
    PlayerLeaveOthers = 0x07,
    GameLoadedOthers = 0x08,
    SlotInfo = 0x09,
    CountdownStart = 0x0A,
    CountdownEnd = 0x0B,
    IncomingAction = 0x0C,
    ChatFromHost = 0x0F,
    StartLag = 0x10,
    StopLag = 0x11,
    HostKickPlayer = 0x1C,
    ReqJoin = 0x1E,
    LeaveGame = 0x21,
    GameLoadedSelf = 0x23,
    OutgoingAction = 0x26,
    OutgoingKeepalive = 0x27,
    ChatToHost = 0x28,
    DropReq = 0x29,
    SearchGame = 0x2F,
    GameInfo = 0x30,
    CreateGame = 0x31,
    RefreshGame = 0x32,
    DecreateGame = 0x33,
    ChatOthers = 0x34,
    PingFromOthers = 0x35,
    PongToOthers = 0x36,
    MapCheck = 0x3D,
    StartDownload = 0x3F,
    MapSize = 0x42,
    MapPart = 0x43,
    MapPartOk = 0x44,
    MapPartNotOk = 0x45,
    PongToHost = 0x46,
    IncomingAction2 = 0x48,
}

impl GameOpcode {
    pub fn name(self) -> &'static str {
        match self {
            GameOpcode::PingFromHost => "W3GS_PING_FROM_HOST",
            GameOpcode::SlotInfoJoin => "W3GS_SLOTINFOJOIN",
            GameOpcode::RejectJoin => "W3GS_REJECTJOIN",
            GameOpcode::PlayerInfo => "W3GS_PLAYERINFO",
            GameOpcode::PlayerLeaveOthers => "W3GS_PLAYERLEAVE_OTHERS",
            GameOpcode::GameLoadedOthers => "W3GS_GAMELOADED_OTHERS",
            GameOpcode::SlotInfo => "W3GS_SLOTINFO",
            GameOpcode::CountdownStart => "W3GS_COUNTDOWN_START",
            GameOpcode::CountdownEnd => "W3GS_COUNTDOWN_END",
            GameOpcode::IncomingAction => "W3GS_INCOMING_ACTION",
            GameOpcode::ChatFromHost => "W3GS_CHAT_FROM_HOST",
            GameOpcode::StartLag => "W3GS_START_LAG",
            GameOpcode::StopLag => "W3GS_STOP_LAG",
            GameOpcode::HostKickPlayer => "W3GS_HOST_KICK_PLAYER",
            GameOpcode::ReqJoin => "W3GS_REQJOIN",
            GameOpcode::LeaveGame => "W3GS_LEAVEGAME",
            GameOpcode::GameLoadedSelf => "W3GS_GAMELOADED_SELF",
            GameOpcode::OutgoingAction => "W3GS_OUTGOING_ACTION",
            GameOpcode::OutgoingKeepalive => "W3GS_OUTGOING_KEEPALIVE",
            GameOpcode::ChatToHost => "W3GS_CHAT_TO_HOST",
            GameOpcode::DropReq => "W3GS_DROPREQ",
            GameOpcode::SearchGame => "W3GS_SEARCHGAME",
            GameOpcode::GameInfo => "W3GS_GAMEINFO",
            GameOpcode::CreateGame => "W3GS_CREATEGAME",
            GameOpcode::RefreshGame => "W3GS_REFRESHGAME",
            GameOpcode::DecreateGame => "W3GS_DECREATEGAME",
            GameOpcode::ChatOthers => "W3GS_CHAT_OTHERS",
            GameOpcode::PingFromOthers => "W3GS_PING_FROM_OTHERS",
            GameOpcode::PongToOthers => "W3GS_PONG_TO_OTHERS",
            GameOpcode::MapCheck => "W3GS_MAPCHECK",
            GameOpcode::StartDownload => "W3GS_STARTDOWNLOAD",
            GameOpcode::MapSize => "W3GS_MAPSIZE",
            GameOpcode::MapPart => "W3GS_MAPPART",
            GameOpcode::MapPartOk => "W3GS_MAPPARTOK",
            GameOpcode::MapPartNotOk => "W3GS_MAPPARTNOTOK",
            GameOpcode::PongToHost => "W3GS_PONG_TO_HOST",
            GameOpcode::IncomingAction2 => "W3GS_INCOMING_ACTION2",
        }
    }
}

impl TryFrom<u8> for GameOpcode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x01 => GameOpcode::PingFromHost,
            0x04 => GameOpcode::SlotInfoJoin,
            0x05 => GameOpcode::RejectJoin,
            0x06 => GameOpcode::PlayerInfo,
            0x07 => GameOpcode::PlayerLeaveOthers,
            0x08 => GameOpcode::GameLoadedOthers,
            0x09 => GameOpcode::SlotInfo,
            0x0A => GameOpcode::CountdownStart,
            0x0B => GameOpcode::CountdownEnd,
            0x0C => GameOpcode::IncomingAction,
            0x0F => GameOpcode::ChatFromHost,
            0x10 => GameOpcode::StartLag,
            0x11 => GameOpcode::StopLag,
            0x1C => GameOpcode::HostKickPlayer,
            0x1E => GameOpcode::ReqJoin,
            0x21 => GameOpcode::LeaveGame,
            0x23 => GameOpcode::GameLoadedSelf,
            0x26 => GameOpcode::OutgoingAction,
            0x27 => GameOpcode::OutgoingKeepalive,
            0x28 => GameOpcode::ChatToHost,
            0x29 => GameOpcode::DropReq,
            0x2F => GameOpcode::SearchGame,
            0x30 => GameOpcode::GameInfo,
            0x31 => GameOpcode::CreateGame,
            0x32 => GameOpcode::RefreshGame,
            0x33 => GameOpcode::DecreateGame,
            0x34 => GameOpcode::ChatOthers,
            0x35 => GameOpcode::PingFromOthers,
            0x36 => GameOpcode::PongToOthers,
            0x3D => GameOpcode::MapCheck,
            0x3F => GameOpcode::StartDownload,
            0x42 => GameOpcode::MapSize,
            0x43 => GameOpcode::MapPart,
            0x44 => GameOpcode::MapPartOk,
            0x45 => GameOpcode::MapPartNotOk,
            0x46 => GameOpcode::PongToHost,
            0x48 => GameOpcode::IncomingAction2,
            other => return Err(other),
        })
    }
}

impl fmt::Display for GameOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub mod game_type {
    pub const CUSTOM: u32 = 1;
    pub const BLIZZARD: u32 = 9;
}

/// Reasons carried by `W3GS_REJECTJOIN`.
pub mod reject_reason {
    pub const FULL: u32 = 9;
    pub const STARTED: u32 = 10;
    pub const WRONG_PASSWORD: u32 = 27;
}

/// Reasons carried by leave packets.
pub mod leave_reason {
    pub const DISCONNECT: u32 = 1;
    pub const LOST: u32 = 7;
    pub const LOST_BUILDINGS: u32 = 8;
    pub const WON: u32 = 9;
    pub const DRAW: u32 = 10;
    pub const OBSERVER: u32 = 11;
    pub const LOBBY: u32 = 13;
    pub const GPROXY: u32 = 100;
}

/// Chat-to-host sub-commands.
pub mod chat_flag {
    pub const MESSAGE: u8 = 16;
    pub const TEAM_CHANGE: u8 = 17;
    pub const COLOUR_CHANGE: u8 = 18;
    pub const RACE_CHANGE: u8 = 19;
    pub const HANDICAP_CHANGE: u8 = 20;
    pub const MESSAGE_EXTRA: u8 = 32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_values() {
        assert_eq!(GameOpcode::try_from(0x1E), Ok(GameOpcode::ReqJoin));
        assert_eq!(GameOpcode::MapPartNotOk as u8, 0x45);
        assert_eq!(GameOpcode::try_from(0x02), Err(0x02));
        assert_eq!(GameOpcode::GameInfo.to_string(), "W3GS_GAMEINFO");
    }
}
