//! Shared fixtures for the integration tests: deterministic auth primitives,
//! server-side packet builders and a session harness on a manual clock.
#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::mpsc;

use realmgate::config::RealmConfig;
use realmgate::core::framer::TransportFramer;
use realmgate::core::packet::{Packet, GAME_MARKER, REALM_MARKER};
use realmgate::error::HandshakeError;
use realmgate::protocol::game::GameOpcode;
use realmgate::protocol::handshake::{
    AuthPrimitives, ExeInfo, PrimitiveResult, VersionFiles,
};
use realmgate::protocol::realm::message::KeyInfo;
use realmgate::protocol::realm::RealmOpcode;
use realmgate::service::realm_session::{
    RealmSession, SessionAction, SessionContext, SessionEvent,
};
use realmgate::utils::{ManualClock, Metrics};

pub const SERVER_TOKEN: u32 = 0x1234_5678;

/// Primitives returning fixed values so packets can be asserted byte for byte.
#[derive(Debug, Default, Clone)]
pub struct FakePrimitives {
    pub broken_key: bool,
}

impl AuthPrimitives for FakePrimitives {
    fn exe_info(&self, _war3_exe: &Path) -> PrimitiveResult<ExeInfo> {
        Ok(ExeInfo {
            description: String::from("war3.exe 03/18/11 05:29:24 471040"),
            version: 0x011A_0001,
        })
    }

    fn check_revision(
        &self,
        _formula: &str,
        _files: &VersionFiles,
        mpq_number: u32,
    ) -> PrimitiveResult<u32> {
        Ok(0x5000_0000 | mpq_number)
    }

    fn cd_key_info(
        &self,
        key: &str,
        _client_token: u32,
        _server_token: u32,
    ) -> PrimitiveResult<KeyInfo> {
        if self.broken_key {
            return Err(HandshakeError::KeyDerivation(String::from("checksum mismatch")));
        }
        Ok(KeyInfo {
            key_len: key.len() as u32,
            product: 0x0E,
            public_value: 0xCAFE,
            hash: [0xAB; 20],
        })
    }

    fn srp_start(&mut self, _username: &str, _password: &str) -> PrimitiveResult<Vec<u8>> {
        Ok(vec![0xC1; 32])
    }

    fn srp_proof(
        &mut self,
        _salt: &[u8; 32],
        _server_public_key: &[u8; 32],
    ) -> PrimitiveResult<[u8; 20]> {
        Ok([0xD2; 20])
    }

    fn hash_password(&self, _password: &str) -> PrimitiveResult<[u8; 20]> {
        Ok([0xE3; 20])
    }
}

pub fn realm_config() -> RealmConfig {
    RealmConfig {
        server: String::from("realm.test"),
        alias: String::from("test"),
        username: String::from("relaybot"),
        password: String::from("secret"),
        key_roc: String::from("FFFFFFFFFFFFFFFFFFFFFFFFFF"),
        key_tft: String::from("FFFFFFFFFFFFFFFFFFFFFFFFFF"),
        first_channel: String::from("Lobby"),
        root_admin: Some(String::from("Owner")),
        admins: vec![String::from("Helper")],
        ..RealmConfig::default()
    }
}

// ---------------------------------------------------------------------------
// server-side packets
// ---------------------------------------------------------------------------

pub fn realm_packet(opcode: RealmOpcode, body: impl Into<Bytes>) -> Vec<u8> {
    Packet::new(REALM_MARKER, opcode as u8, body)
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub fn auth_info_packet() -> Vec<u8> {
    let mut body = BytesMut::new();
    body.put_u32_le(0);
    body.put_u32_le(SERVER_TOKEN);
    body.put_u32_le(0);
    body.put_slice(&[0; 8]);
    body.put_slice(b"ver-IX86-1.mpq\0");
    body.put_slice(b"A=1 B=2 C=3 4 A=A+S B=B-C C=C^A A=A^B\0");
    realm_packet(RealmOpcode::AuthInfo, body.freeze())
}

pub fn auth_check_packet(key_state: u32, description: &str) -> Vec<u8> {
    let mut body = BytesMut::new();
    body.put_u32_le(key_state);
    body.put_slice(description.as_bytes());
    body.put_u8(0);
    realm_packet(RealmOpcode::AuthCheck, body.freeze())
}

pub fn logon_challenge_packet(status: u32) -> Vec<u8> {
    let mut body = BytesMut::new();
    body.put_u32_le(status);
    body.put_slice(&[0x01; 32]);
    body.put_slice(&[0x02; 32]);
    realm_packet(RealmOpcode::AuthAccountLogon, body.freeze())
}

pub fn logon_proof_packet(status: u32) -> Vec<u8> {
    let mut body = BytesMut::new();
    body.put_u32_le(status);
    body.put_slice(&[0x03; 20]);
    body.put_u8(0);
    realm_packet(RealmOpcode::AuthAccountLogonProof, body.freeze())
}

pub fn enter_chat_packet(unique_name: &str) -> Vec<u8> {
    let mut body = BytesMut::new();
    body.put_slice(unique_name.as_bytes());
    body.put_u8(0);
    body.put_slice(b"PX3W\0");
    body.put_slice(unique_name.as_bytes());
    body.put_u8(0);
    realm_packet(RealmOpcode::EnterChat, body.freeze())
}

pub fn chat_event_packet(kind: u32, user: &str, message: &str) -> Vec<u8> {
    let mut body = BytesMut::new();
    body.put_u32_le(kind);
    body.put_u32_le(0);
    body.put_u32_le(42);
    body.put_slice(&[0; 12]);
    body.put_slice(user.as_bytes());
    body.put_u8(0);
    body.put_slice(message.as_bytes());
    body.put_u8(0);
    realm_packet(RealmOpcode::ChatEvent, body.freeze())
}

pub fn ping_packet(payload: u32) -> Vec<u8> {
    realm_packet(RealmOpcode::Ping, payload.to_le_bytes().to_vec())
}

/// Join request body in the layout players send.
pub fn join_request_packet(host_counter: u32, entry_key: u32, name: &str) -> Vec<u8> {
    let mut body = BytesMut::new();
    body.put_u32_le(host_counter);
    body.put_u32_le(entry_key);
    body.put_u8(0);
    body.put_u16_le(6112);
    body.put_u32_le(0);
    body.put_slice(name.as_bytes());
    body.put_u8(0);
    body.put_slice(&[0; 4]);
    body.put_u16(6112);
    body.put_slice(&[192, 168, 1, 20]);
    Packet::new(GAME_MARKER, GameOpcode::ReqJoin as u8, body.freeze())
        .unwrap()
        .to_bytes()
        .to_vec()
}

// ---------------------------------------------------------------------------
// session harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub session: RealmSession<FakePrimitives>,
    pub clock: ManualClock,
    pub metrics: Arc<Metrics>,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl Harness {
    pub fn new(realm: RealmConfig) -> Self {
        Self::with_primitives(realm, FakePrimitives::default())
    }

    pub fn with_primitives(realm: RealmConfig, primitives: FakePrimitives) -> Self {
        let clock = ManualClock::starting_at(1_000_000);
        let metrics = Arc::new(Metrics::new());
        let (tx, events) = mpsc::unbounded_channel();
        let ctx = SessionContext {
            clock: Arc::new(clock.clone()),
            metrics: metrics.clone(),
            events: tx,
        };
        let session = RealmSession::new(1, realm, true, 6113, primitives, ctx);
        Self {
            session,
            clock,
            metrics,
            events,
        }
    }

    /// Ticks once, reports the socket as open and ticks again so the greeting goes out.
    pub fn connect(&mut self) -> Vec<SessionAction> {
        assert!(!self.session.update());
        let actions = self.session.drain_actions();
        assert!(matches!(actions.as_slice(), [SessionAction::Connect { .. }]));
        self.session.on_connected(Ipv4Addr::new(10, 0, 0, 5));
        assert!(!self.session.update());
        self.session.drain_actions()
    }

    /// Runs the whole server side of a successful login, up to the chat channel join.
    pub fn login(&mut self) {
        self.connect();
        for packet in [
            auth_info_packet(),
            auth_check_packet(0, ""),
            logon_challenge_packet(0),
            logon_proof_packet(0),
            enter_chat_packet("relaybot"),
        ] {
            self.session.on_bytes(&packet).unwrap();
        }
        self.session.drain_actions();
        self.drain_events();
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    pub fn tick(&mut self) -> Vec<Packet> {
        self.session.update();
        sent_packets(self.session.drain_actions())
    }
}

/// Frames every `Send` action back into realm packets.
pub fn sent_packets(actions: Vec<SessionAction>) -> Vec<Packet> {
    let mut framer = TransportFramer::new(REALM_MARKER);
    for action in actions {
        if let SessionAction::Send(bytes) = action {
            framer.feed(&bytes);
        }
    }
    framer.packets().map(|p| p.unwrap()).collect()
}

pub fn opcodes(packets: &[Packet]) -> Vec<u8> {
    packets.iter().map(|p| p.opcode).collect()
}
