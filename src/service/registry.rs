//! Process-wide table of realm sessions.
//!
//! The registry never owns a session. It keeps a command sender per session so
//! the lobby/admin layer can reach every realm, plus the host-counter
//! allocator shared by all hosted games.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{constants, ProtocolError, Result};

pub type SessionId = u32;

/// Instruction routed to one session's driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    QueueChat(String),
    QueueWhisper { user: String, text: String },
    JoinChannel(String),
    RequestGameList(String),
    RefreshFriends,
    RefreshClan,
    Disconnect,
}

/// Identity of a registered session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: SessionId,
    pub alias: String,
    pub server: String,
}

struct Entry {
    info: SessionInfo,
    commands: mpsc::UnboundedSender<SessionCommand>,
}

/// Hands out host counters. Values start at 1 and never repeat.
#[derive(Debug)]
pub struct HostCounter(AtomicU32);

impl HostCounter {
    pub fn new() -> Self {
        Self(AtomicU32::new(1))
    }

    /// Next unused counter, or `None` once the `u32` range is spent.
    pub fn next(&self) -> Option<u32> {
        self.0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_add(1))
            .ok()
    }
}

impl Default for HostCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Entry>>,
    host_counter: HostCounter,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session and returns the receiving end of its command channel.
    ///
    /// Registering an id twice replaces the earlier entry; its channel closes.
    pub fn register(&self, info: SessionInfo) -> Result<mpsc::UnboundedReceiver<SessionCommand>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| ProtocolError::Custom(constants::ERR_REGISTRY_WRITE_LOCK.to_string()))?;

        debug!(session = info.id, alias = %info.alias, "registering realm session");
        if let Some(old) = sessions.insert(info.id, Entry { info, commands: tx }) {
            warn!(session = old.info.id, alias = %old.info.alias, "replaced registered session");
        }
        Ok(rx)
    }

    pub fn unregister(&self, id: SessionId) -> Result<Option<SessionInfo>> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| ProtocolError::Custom(constants::ERR_REGISTRY_WRITE_LOCK.to_string()))?;
        Ok(sessions.remove(&id).map(|entry| entry.info))
    }

    /// Registered sessions ordered by id.
    pub fn sessions(&self) -> Result<Vec<SessionInfo>> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| ProtocolError::Custom(constants::ERR_REGISTRY_READ_LOCK.to_string()))?;
        let mut infos: Vec<SessionInfo> = sessions.values().map(|e| e.info.clone()).collect();
        infos.sort_by_key(|info| info.id);
        Ok(infos)
    }

    pub fn send(&self, id: SessionId, command: SessionCommand) -> Result<()> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| ProtocolError::Custom(constants::ERR_REGISTRY_READ_LOCK.to_string()))?;
        let entry = sessions
            .get(&id)
            .ok_or_else(|| ProtocolError::Custom(constants::ERR_SESSION_NOT_FOUND.to_string()))?;
        entry
            .commands
            .send(command)
            .map_err(|_| ProtocolError::Custom(constants::ERR_SESSION_GONE.to_string()))
    }

    /// Queues `message` on every registered session. Returns how many accepted it.
    pub fn broadcast_chat(&self, message: &str) -> Result<usize> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| ProtocolError::Custom(constants::ERR_REGISTRY_READ_LOCK.to_string()))?;
        let delivered = sessions
            .values()
            .filter(|entry| {
                entry
                    .commands
                    .send(SessionCommand::QueueChat(message.to_owned()))
                    .is_ok()
            })
            .count();
        Ok(delivered)
    }

    /// # Errors
    /// Fails once every counter has been handed out.
    pub fn next_host_counter(&self) -> Result<u32> {
        self.host_counter.next().ok_or_else(|| {
            ProtocolError::Custom(constants::ERR_HOST_COUNTERS_EXHAUSTED.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: SessionId) -> SessionInfo {
        SessionInfo {
            id,
            alias: format!("realm{id}"),
            server: String::from("127.0.0.1"),
        }
    }

    #[test]
    fn test_host_counter_starts_at_one() {
        let registry = SessionRegistry::new();
        assert_eq!(registry.next_host_counter().unwrap(), 1);
        assert_eq!(registry.next_host_counter().unwrap(), 2);
    }

    #[test]
    fn test_host_counter_does_not_wrap() {
        let counter = HostCounter(AtomicU32::new(u32::MAX - 1));
        assert_eq!(counter.next(), Some(u32::MAX - 1));
        assert_eq!(counter.next(), None);
        assert_eq!(counter.next(), None);

        let registry = SessionRegistry {
            host_counter: counter,
            ..SessionRegistry::default()
        };
        let err = registry.next_host_counter().unwrap_err();
        assert!(err.to_string().contains("Host counters exhausted"));
    }

    #[test]
    fn test_send_routes_to_session() {
        let registry = SessionRegistry::new();
        let mut rx = registry.register(info(3)).unwrap();
        registry
            .send(3, SessionCommand::JoinChannel("Lobby".into()))
            .unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionCommand::JoinChannel("Lobby".into())
        );
        assert!(registry.send(4, SessionCommand::Disconnect).is_err());
    }

    #[test]
    fn test_broadcast_skips_closed_sessions() {
        let registry = SessionRegistry::new();
        let mut a = registry.register(info(1)).unwrap();
        let b = registry.register(info(2)).unwrap();
        drop(b);
        assert_eq!(registry.broadcast_chat("hello").unwrap(), 1);
        assert_eq!(
            a.try_recv().unwrap(),
            SessionCommand::QueueChat("hello".into())
        );
    }

    #[test]
    fn test_unregister_returns_info() {
        let registry = SessionRegistry::new();
        let _rx = registry.register(info(7)).unwrap();
        assert_eq!(registry.unregister(7).unwrap(), Some(info(7)));
        assert!(registry.sessions().unwrap().is_empty());
    }
}
