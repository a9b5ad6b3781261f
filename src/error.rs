//! # Error Types
//!
//! Error taxonomy for the realm and game protocol engine.
//!
//! Every component returns an explicit result so the caller can decide whether a
//! failure is fatal to the connection, fatal to the session, or merely logged.
//!
//! ## Error Categories
//! - **Framing**: bad marker or length on a byte stream. Always fatal to the connection.
//! - **Decode**: malformed or unrecognized packet body. The packet is dropped.
//! - **Handshake**: rejected credentials/keys or a broken crypto primitive. Terminal
//!   for the handshake.
//! - **Queue**: too many pending outbound commands. The newest command is shed.
//! - **I/O**: socket failures. The session degrades but stays alive.
//!
//! ## Example Usage
//! ```rust
//! use realmgate::core::framer::TransportFramer;
//! use realmgate::core::packet::REALM_MARKER;
//! use realmgate::error::FramingError;
//!
//! let mut framer = TransportFramer::new(REALM_MARKER);
//! framer.feed(&[0xF7, 0x00, 0x04, 0x00]);
//! assert!(matches!(
//!     framer.next_packet(),
//!     Some(Err(FramingError::BadMarker { .. }))
//! ));
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Registry lock errors
    pub const ERR_REGISTRY_WRITE_LOCK: &str = "Failed to acquire write lock on session registry";
    pub const ERR_REGISTRY_READ_LOCK: &str = "Failed to acquire read lock on session registry";

    /// Session errors
    pub const ERR_SESSION_NOT_FOUND: &str = "No realm session registered under that id";
    pub const ERR_SESSION_GONE: &str = "Realm session command channel closed";
    pub const ERR_HOST_COUNTERS_EXHAUSTED: &str = "Host counters exhausted";

    /// Handshake errors
    pub const ERR_PROOF_MISSING: &str = "Logon proof response could not be read";
}

/// Structural violation on an inbound byte stream.
///
/// The framer never closes sockets itself; the owner must close the connection
/// after receiving one of these.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingError {
    #[error("bad header constant: expected {expected:#04x}, found {found:#04x}")]
    BadMarker { expected: u8, found: u8 },

    #[error("bad packet length {length} (minimum 4)")]
    BadLength { length: u16 },
}

/// Why a single packet body could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeReason {
    #[error("unrecognized opcode")]
    Unrecognized,

    #[error("body too short: need {need} bytes, have {have}")]
    TooShort { need: usize, have: usize },

    #[error("field `{field}` is missing its null terminator")]
    MissingTerminator { field: &'static str },

    #[error("malformed body: {0}")]
    Malformed(&'static str),
}

/// A packet body that could not be turned into a message record.
///
/// Never fatal: the session logs it and drops the packet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot decode opcode {opcode:#04x}: {reason}")]
pub struct DecodeError {
    pub opcode: u8,
    pub reason: DecodeReason,
}

impl DecodeError {
    pub fn new(opcode: u8, reason: DecodeReason) -> Self {
        Self { opcode, reason }
    }

    pub fn unrecognized(opcode: u8) -> Self {
        Self::new(opcode, DecodeReason::Unrecognized)
    }

    pub fn is_unrecognized(&self) -> bool {
        matches!(self.reason, DecodeReason::Unrecognized)
    }
}

/// The server refused our keys, version, or credentials.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeRejection {
    #[error("CD key or version problem (key state {code:#05x}: {description})")]
    KeyState { code: u32, description: String },

    #[error("account logon refused (status {status})")]
    AccountLogon { status: u32 },

    #[error("logon proof rejected (status {status}): {message}")]
    LogonProof { status: u32, message: String },
}

/// Failure of one step of the authentication handshake.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("rejected by server: {0}")]
    Rejected(#[from] HandshakeRejection),

    #[error("CD key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("client public value has length {0}, expected 32")]
    PublicKeyLength(usize),

    #[error("unexpected {got} while handshake is {stage}")]
    OutOfOrder { stage: &'static str, got: &'static str },

    #[error("auth primitive failed: {0}")]
    Primitive(String),
}

impl HandshakeError {
    /// Out-of-order messages are logged and dropped; everything else ends the handshake.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, HandshakeError::OutOfOrder { .. })
    }
}

/// Outbound chat command that was not queued.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("empty chat command")]
    Empty,

    #[error("not logged in")]
    NotLoggedIn,

    #[error("outbound queue full ({depth} packets waiting)")]
    Overflow { depth: usize },
}

// ProtocolError is the primary error type for all protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Invalid field: {0}")]
    InvalidField(&'static str),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
