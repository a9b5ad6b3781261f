//! # Protocol Layer
//!
//! Wire vocabulary of both protocols plus the realm authentication handshake.
//!
//! ## Components
//! - **Realm**: opcodes, decoded records, decoder table and encoders (marker `0xFF`)
//! - **Game**: the same for the lobby/host protocol (marker `0xF7`)
//! - **Handshake**: the four-step logon sequence over [`handshake::AuthPrimitives`]
//!
//! Decoding is table driven: each opcode maps to a minimum body length and a
//! decode function. Opcodes without an entry decode to
//! [`DecodeReason::Unrecognized`](crate::error::DecodeReason::Unrecognized),
//! which callers log and drop.

pub mod game;
pub mod handshake;
pub mod realm;
