//! # realmgate
//!
//! Protocol engine for a game-hosting relay that logs into legacy chat/auth
//! realms and accepts players over the matching lobby protocol.
//!
//! ## Layers
//! - [`core`]: packet type, stream framing and byte cursors
//! - [`protocol`]: realm and game message codecs plus the login handshake
//! - [`service`]: sans-IO realm sessions, outbound throttling, the join gate
//!   and the session registry
//! - [`transport`]: tokio drivers owning the sockets
//! - [`config`], [`utils`]: TOML/env configuration, logging, clock and metrics
//!
//! ## Example
//! ```rust
//! use realmgate::core::framer::TransportFramer;
//! use realmgate::core::packet::{Packet, REALM_MARKER};
//! use realmgate::protocol::realm::{decode_packet, RealmMessage};
//!
//! let ping = Packet::new(REALM_MARKER, 0x25, vec![1, 2, 3, 4]).unwrap();
//! let wire = ping.to_bytes();
//!
//! let mut framer = TransportFramer::new(REALM_MARKER);
//! framer.feed(&wire[..3]);
//! assert!(framer.next_packet().is_none());
//! framer.feed(&wire[3..]);
//!
//! let packet = framer.next_packet().unwrap().unwrap();
//! assert!(matches!(decode_packet(&packet), Ok(RealmMessage::Ping(_))));
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::config::{HostConfig, RealmConfig};
pub use crate::core::packet::{Packet, GAME_MARKER, REALM_MARKER};
pub use crate::core::framer::TransportFramer;
pub use crate::error::{ProtocolError, Result};
pub use crate::service::{JoinGate, RealmSession, SessionRegistry};
