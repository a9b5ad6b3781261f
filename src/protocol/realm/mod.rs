//! Realm (chat and authentication server) protocol, marker `0xFF`.

pub mod decode;
pub mod encode;
pub mod message;
pub mod opcode;

pub use decode::{decode, decode_packet};
pub use message::RealmMessage;
pub use opcode::RealmOpcode;
