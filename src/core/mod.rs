//! # Core Protocol Components
//!
//! Byte-level helpers, the packet type, and stream framing shared by both protocols.
//!
//! ## Components
//! - **Cursor**: bounds-checked little-endian reads and null-terminated strings
//! - **Packet**: marker/opcode/length header plus body
//! - **Framer**: per-connection buffer turning a byte stream into packets
//! - **Codec**: Tokio codec over the same rules for `Framed` streams
//!
//! ## Wire Format
//! ```text
//! [Marker(1)] [Opcode(1)] [Length(2, LE)] [Body(Length - 4)]
//! ```
//!
//! The realm protocol uses marker `0xFF`, the game protocol `0xF7`.

pub mod codec;
pub mod cursor;
pub mod framer;
pub mod packet;
