//! Game (lobby and host) protocol, marker `0xF7`.

pub mod decode;
pub mod encode;
pub mod message;
pub mod opcode;
pub mod stat_string;

pub use decode::{decode, decode_packet};
pub use message::{GameMessage, GameSlot, IncomingJoinRequest};
pub use opcode::GameOpcode;
