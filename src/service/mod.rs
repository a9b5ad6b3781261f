//! # Service Layer
//!
//! Sans-IO state machines sitting between the codecs and the tokio drivers.
//!
//! ## Components
//! - **RealmSession**: connection lifecycle, authentication and chat for one realm
//! - **OutboundThrottle**: paced outbound queue with overflow shedding
//! - **JoinGate**: waits for one join request on an accepted player socket
//! - **SessionRegistry**: command routing to every session plus host counters

pub mod join_gate;
pub mod realm_session;
pub mod registry;
pub mod throttle;

pub use join_gate::JoinGate;
pub use realm_session::{
    RealmEvent, RealmSession, SessionAction, SessionContext, SessionEvent, SessionState,
};
pub use registry::{HostCounter, SessionCommand, SessionId, SessionInfo, SessionRegistry};
pub use throttle::{OutboundEntry, OutboundThrottle};
