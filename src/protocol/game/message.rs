//! Records exchanged over the game protocol.

use std::net::Ipv4Addr;

use bytes::BufMut;

use crate::protocol::game::opcode::GameOpcode;

/// One lobby seat. Opaque to this crate beyond its 9-byte wire layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GameSlot {
    pub pid: u8,
    pub download_status: u8,
    pub slot_status: u8,
    pub computer: u8,
    pub team: u8,
    pub colour: u8,
    pub race: u8,
    pub computer_type: u8,
    pub handicap: u8,
}

impl GameSlot {
    pub const ENCODED_LEN: usize = 9;

    pub fn write_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_slice(&self.to_array());
    }

    pub fn to_array(&self) -> [u8; Self::ENCODED_LEN] {
        [
            self.pid,
            self.download_status,
            self.slot_status,
            self.computer,
            self.team,
            self.colour,
            self.race,
            self.computer_type,
            self.handicap,
        ]
    }

    pub fn from_array(raw: [u8; Self::ENCODED_LEN]) -> Self {
        let [pid, download_status, slot_status, computer, team, colour, race, computer_type, handicap] =
            raw;
        Self {
            pid,
            download_status,
            slot_status,
            computer,
            team,
            colour,
            race,
            computer_type,
            handicap,
        }
    }
}

/// A player's request to enter a hosted game (`W3GS_REQJOIN`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingJoinRequest {
    pub host_counter: u32,
    pub entry_key: u32,
    pub listen_port: u16,
    pub peer_key: u32,
    pub name: String,
    pub internal_port: u16,
    pub internal_ip: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatToHostBody {
    Message(String),
    /// Message with the extra flags used for all/allies/observer routing.
    MessageExtra { flags: u32, message: String },
    TeamChange(u8),
    ColourChange(u8),
    RaceChange(u8),
    HandicapChange(u8),
    Unknown { flag: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatToHost {
    pub to_pids: Vec<u8>,
    pub from_pid: u8,
    pub body: ChatToHostBody,
}

/// Decoded inbound game packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameMessage {
    JoinRequest(IncomingJoinRequest),
    LeaveGame { reason: u32 },
    GameLoadedSelf,
    OutgoingKeepalive { checksum: u32 },
    ChatToHost(ChatToHost),
    SearchGame { tft: bool, version: u32 },
    MapSize { size_flag: u8, map_size: u32 },
    MapPartOk { from_pid: u8, to_pid: u8, map_size: u32 },
    MapPartNotOk,
    PongToHost { ticks: u32 },
}

impl GameMessage {
    pub fn opcode(&self) -> GameOpcode {
        match self {
            GameMessage::JoinRequest(_) => GameOpcode::ReqJoin,
            GameMessage::LeaveGame { .. } => GameOpcode::LeaveGame,
            GameMessage::GameLoadedSelf => GameOpcode::GameLoadedSelf,
            GameMessage::OutgoingKeepalive { .. } => GameOpcode::OutgoingKeepalive,
            GameMessage::ChatToHost(_) => GameOpcode::ChatToHost,
            GameMessage::SearchGame { .. } => GameOpcode::SearchGame,
            GameMessage::MapSize { .. } => GameOpcode::MapSize,
            GameMessage::MapPartOk { .. } => GameOpcode::MapPartOk,
            GameMessage::MapPartNotOk => GameOpcode::MapPartNotOk,
            GameMessage::PongToHost { .. } => GameOpcode::PongToHost,
        }
    }
}

/// Slot table shared by slot-info and slot-info-join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotTable {
    pub slots: Vec<GameSlot>,
    pub random_seed: u32,
    pub layout_style: u8,
    pub player_slots: u8,
}

impl SlotTable {
    /// `[count] [slots..] [seed(4)] [layout(1)] [player slots(1)]`
    pub fn encoded_len(&self) -> usize {
        1 + self.slots.len() * GameSlot::ENCODED_LEN + 6
    }

    /// Callers check that the slot count fits the count byte.
    pub fn write_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(self.slots.len() as u8);
        for slot in &self.slots {
            slot.write_to(dst);
        }
        dst.put_u32_le(self.random_seed);
        dst.put_u8(self.layout_style);
        dst.put_u8(self.player_slots);
    }
}

/// Everything advertised in a `W3GS_GAMEINFO` broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameInfo {
    pub tft: bool,
    pub war3_version: u8,
    pub map_game_type: u32,
    pub map_flags: u32,
    pub map_width: u16,
    pub map_height: u16,
    pub game_name: String,
    pub host_name: String,
    pub up_time: u32,
    pub map_path: String,
    pub map_crc: u32,
    pub slots_total: u32,
    pub slots_open: u32,
    pub port: u16,
    pub host_counter: u32,
}

/// Map descriptor sent in `W3GS_MAPCHECK`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapCheck {
    pub map_path: String,
    pub map_size: u32,
    pub map_info: u32,
    pub map_crc: u32,
    pub map_sha1: [u8; 20],
}
