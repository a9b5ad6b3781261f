//! # Transport Layer
//!
//! Tokio drivers that own sockets and feed the sans-IO services.
//!
//! ## Components
//! - **Realm TCP**: one outbound connection per realm session
//! - **Game listener**: accepts player sockets and gates them on a join request

pub mod game_listener;
pub mod realm_tcp;

pub use game_listener::{start_game_listener_with_shutdown, JoinedPlayer};
pub use realm_tcp::run_realm_session;
