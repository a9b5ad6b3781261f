//! Realm connection state machine.
//!
//! # Architecture: Action-Based State Machine
//!
//! [`RealmSession`] performs no I/O. The driver feeds it socket bytes and a
//! periodic tick, then executes the [`SessionAction`]s it queued:
//! - `Connect`: open the TCP connection, then report it with `on_connected`
//! - `Send`: write the bytes as-is
//! - `Close`: drop the socket
//!
//! Lifecycle notifications for the lobby/admin layer go out on an unbounded
//! channel of [`SessionEvent`]s, in the order the session produced them.
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐ tick ┌────────────┐ connected ┌─────────────┐ proof ok ┌───────────────┐ enter chat ┌────────┐
//! │ Idle │─────>│ Connecting │──────────>│ Handshaking │─────────>│ Authenticated │───────────>│ InChat │
//! └──────┘      └────────────┘           └─────────────┘          └───────────────┘            └────────┘
//!                     │ socket error           │ rejected                 socket error │
//!                     ↓                        ↓                                       ↓
//!               ┌──────────┐             ┌──────────┐                            ┌──────────┐
//!               │ Degraded │             │ Rejected │                            │ Degraded │
//!               └──────────┘             └──────────┘                            └──────────┘
//! ```
//!
//! `disconnect()` moves any state to `Closed` on the next tick. A degraded
//! session is never reconnected from here; recreating it is the owner's call.

use std::collections::VecDeque;
use std::io;
use std::net::Ipv4Addr;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::config::RealmConfig;
use crate::core::framer::TransportFramer;
use crate::core::packet::{Packet, REALM_MARKER};
use crate::error::{HandshakeError, ProtocolError, QueueError, Result};
use crate::protocol::handshake::{AuthHandshake, AuthPrimitives, HandshakeSettings, HandshakeStage};
use crate::protocol::realm::encode;
use crate::protocol::realm::message::{
    AuthInfoRequest, ChatEvent, ClanInfo, ClanInvitationResponse, ClanMember, EnterChat,
    FriendEntry, FriendUpdate, IncomingGameHost, MessageBox, RealmMessage,
};
use crate::protocol::realm::opcode::{ChatEventKind, RealmOpcode};
use crate::protocol::realm::decode_packet;
use crate::service::registry::{SessionCommand, SessionId};
use crate::service::throttle::{truncate_command, OutboundEntry, OutboundThrottle};
use crate::utils::clock::Clock;
use crate::utils::metrics::Metrics;

/// Seconds between keepalive packets.
pub const KEEPALIVE_INTERVAL_SECS: u64 = 60;

/// Games requested per game-list query.
const GAME_LIST_SIZE: u32 = 20;

/// Work for the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    Connect { host: String, port: u16 },
    Send(Bytes),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Handshaking,
    Authenticated,
    InChat,
    /// Socket failed. Credentials are forgotten; the session object stays.
    Degraded,
    /// Server refused us or a local primitive broke. Never retried.
    Rejected,
    Closed,
}

impl SessionState {
    /// Whether a socket is open and bytes are expected.
    pub fn is_connected(self) -> bool {
        matches!(
            self,
            SessionState::Handshaking | SessionState::Authenticated | SessionState::InChat
        )
    }
}

/// Notification for the lobby/admin layer.
#[derive(Debug, Clone, PartialEq)]
pub enum RealmEvent {
    Connected,
    Authenticated,
    Rejected(HandshakeError),
    Disconnected { reason: String },
    EnteredChat(EnterChat),
    Chat(ChatEvent),
    /// Chat text starting with the command trigger, split on whitespace.
    Command {
        user: String,
        whisper: bool,
        argv: Vec<String>,
    },
    FriendsList(Vec<FriendEntry>),
    FriendUpdate(FriendUpdate),
    FriendAdded(FriendEntry),
    ClanMembers(Vec<ClanMember>),
    ClanMemberRemoved { name: String },
    ClanMemberStatus(ClanMember),
    ClanInfo(ClanInfo),
    ClanInvitation(ClanInvitationResponse),
    MessageBox(MessageBox),
    RequiredWork { file_name: String },
    FloodDetected,
    GameList(Vec<IncomingGameHost>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub session: SessionId,
    pub alias: String,
    pub event: RealmEvent,
}

/// Shared collaborators handed to every session.
#[derive(Clone)]
pub struct SessionContext {
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<Metrics>,
    pub events: mpsc::UnboundedSender<SessionEvent>,
}

pub struct RealmSession<P: AuthPrimitives> {
    id: SessionId,
    realm: RealmConfig,
    tft: bool,
    host_port: u16,
    state: SessionState,
    handshake: AuthHandshake<P>,
    framer: TransportFramer,
    throttle: OutboundThrottle,
    actions: VecDeque<SessionAction>,
    ctx: SessionContext,
    local_ip: Ipv4Addr,
    first_connect: bool,
    greeting_pending: bool,
    exiting: bool,
    reconnect_eligible: bool,
    last_null_secs: u64,
    admins: Vec<String>,
}

impl<P: AuthPrimitives> RealmSession<P> {
    pub fn new(
        id: SessionId,
        realm: RealmConfig,
        tft: bool,
        host_port: u16,
        primitives: P,
        ctx: SessionContext,
    ) -> Self {
        let settings = HandshakeSettings::from_config(&realm, tft);
        info!(
            session = id,
            alias = %realm.alias,
            server = %realm.server,
            "found realm connection"
        );
        Self {
            id,
            admins: realm.admins.clone(),
            realm,
            tft,
            host_port,
            state: SessionState::Idle,
            handshake: AuthHandshake::new(settings, primitives),
            framer: TransportFramer::new(REALM_MARKER),
            throttle: OutboundThrottle::new(),
            actions: VecDeque::new(),
            ctx,
            local_ip: Ipv4Addr::UNSPECIFIED,
            first_connect: true,
            greeting_pending: false,
            exiting: false,
            reconnect_eligible: false,
            last_null_secs: 0,
        }
    }

    /// Registry id of this session.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Configured realm alias, used in logs and events.
    pub fn alias(&self) -> &str {
        &self.realm.alias
    }

    /// Current connection state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn handshake_stage(&self) -> HandshakeStage {
        self.handshake.stage()
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(
            self.state,
            SessionState::Authenticated | SessionState::InChat
        )
    }

    pub fn is_in_chat(&self) -> bool {
        self.state == SessionState::InChat
    }

    /// Set after a socket error; the owner may recreate the session.
    pub fn reconnect_eligible(&self) -> bool {
        self.reconnect_eligible
    }

    pub fn queued_commands(&self) -> usize {
        self.throttle.len()
    }

    /// Takes every action queued since the last call, oldest first.
    pub fn drain_actions(&mut self) -> Vec<SessionAction> {
        self.actions.drain(..).collect()
    }

    /// Periodic tick. Returns `true` once the session wants to be torn down.
    pub fn update(&mut self) -> bool {
        if self.exiting {
            if self.state != SessionState::Closed {
                let dropped = self.throttle.clear();
                if dropped > 0 {
                    debug!(alias = %self.realm.alias, dropped, "discarding queued packets");
                }
                if self.state.is_connected() {
                    self.ctx.metrics.connection_closed();
                }
                self.actions.push_back(SessionAction::Close);
                // a degraded session already reported its lost socket
                let reported = self.state == SessionState::Degraded;
                self.state = SessionState::Closed;
                if !reported {
                    self.emit(RealmEvent::Disconnected {
                        reason: String::from("disconnect requested"),
                    });
                }
            }
            return true;
        }

        if self.state == SessionState::Rejected {
            return true;
        }

        if self.greeting_pending {
            self.greeting_pending = false;
            self.send_greeting();
        }

        if self.state.is_connected() {
            let now_ms = self.ctx.clock.ticks_ms();
            if let Some(entry) = self.throttle.poll_send(now_ms) {
                self.push_send(entry.bytes);
            }

            let now_secs = self.ctx.clock.now_secs();
            if now_secs.saturating_sub(self.last_null_secs) >= KEEPALIVE_INTERVAL_SECS {
                self.send(encode::null());
                self.last_null_secs = now_secs;
            }
        }

        if self.state == SessionState::Idle && self.first_connect {
            self.first_connect = false;
            self.state = SessionState::Connecting;
            info!(
                alias = %self.realm.alias,
                server = %self.realm.server,
                port = self.realm.port,
                "connecting to realm"
            );
            self.actions.push_back(SessionAction::Connect {
                host: self.realm.server.clone(),
                port: self.realm.port,
            });
        }

        false
    }

    /// The socket requested by `Connect` is open.
    pub fn on_connected(&mut self, local_ip: Ipv4Addr) {
        if self.state != SessionState::Connecting {
            warn!(alias = %self.realm.alias, state = ?self.state, "unexpected connect notification");
            return;
        }
        info!(alias = %self.realm.alias, server = %self.realm.server, %local_ip, "connected");
        self.ctx.metrics.connection_established();
        self.local_ip = local_ip;
        self.state = SessionState::Handshaking;
        self.greeting_pending = true;
        self.handshake.reset();
        self.framer = TransportFramer::new(REALM_MARKER);
        self.emit(RealmEvent::Connected);
    }

    /// Protocol selector plus `SID_AUTH_INFO`, written in one go.
    fn send_greeting(&mut self) {
        let request = AuthInfoRequest {
            war3_version: self.realm.war3_version,
            tft: self.tft,
            language: self.realm.language.clone(),
            local_ip: self.local_ip,
            timezone_bias: self.realm.timezone_bias,
            locale_id: self.realm.locale_id,
            country_abbrev: self.realm.country_abbrev.clone(),
            country: self.realm.country.clone(),
        };

        match encode::auth_info(&request) {
            Ok(packet) => {
                let selector = encode::protocol_selector();
                let mut buf = BytesMut::with_capacity(selector.len() + packet.length());
                buf.extend_from_slice(&selector);
                packet.write_to(&mut buf);
                self.ctx.metrics.handshake_attempt();
                self.ctx.metrics.packet_sent(buf.len() as u64);
                self.actions.push_back(SessionAction::Send(buf.freeze()));
            }
            Err(e) => self.handle_handshake_error(e),
        }

        self.last_null_secs = self.ctx.clock.now_secs();
        self.throttle.start(self.ctx.clock.ticks_ms());
    }

    /// Runs inbound bytes through the framer and dispatches every complete packet.
    ///
    /// # Errors
    /// A framing violation. The session has already queued `Close` and degraded.
    pub fn on_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.state.is_connected() {
            trace!(alias = %self.realm.alias, len = bytes.len(), "ignoring bytes while not connected");
            return Ok(());
        }

        self.framer.feed(bytes);
        while let Some(next) = self.framer.next_packet() {
            let packet = match next {
                Ok(packet) => packet,
                Err(e) => {
                    error!(alias = %self.realm.alias, reason = %e, "received invalid packet from realm");
                    self.ctx.metrics.framing_error();
                    self.degrade(format!("framing error: {e}"));
                    self.actions.push_back(SessionAction::Close);
                    return Err(e.into());
                }
            };

            self.ctx.metrics.packet_received(packet.length() as u64);
            self.dispatch(&packet);

            if !self.state.is_connected() {
                // rejected mid-stream; the rest is not ours to read
                break;
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, packet: &Packet) {
        match decode_packet(packet) {
            Ok(message) => {
                debug!(alias = %self.realm.alias, opcode = %message.opcode(), "received");
                self.handle(message);
            }
            Err(e) => {
                self.ctx.metrics.decode_error();
                let proof_pending = self.handshake.stage() == HandshakeStage::LogonChallengeReceived;
                if packet.opcode == RealmOpcode::AuthAccountLogonProof as u8 && proof_pending {
                    let err = self.handshake.on_missing_proof();
                    self.handle_handshake_error(err.into());
                } else if e.is_unrecognized() {
                    error!(alias = %self.realm.alias, opcode = packet.opcode, "handler for packet not found");
                } else {
                    warn!(alias = %self.realm.alias, opcode = e.opcode, reason = %e.reason, "dropping undecodable packet");
                }
            }
        }
    }

    fn handle(&mut self, message: RealmMessage) {
        match message {
            RealmMessage::Null => {}
            RealmMessage::Ping(payload) => self.send(encode::ping(payload)),
            RealmMessage::AuthInfo(info) => {
                let step = self.handshake.on_auth_info(&info);
                self.handshake_step(step);
            }
            RealmMessage::AuthCheck(result) => {
                let step = self.handshake.on_auth_check(&result);
                self.handshake_step(step);
            }
            RealmMessage::AccountLogon(challenge) => {
                let step = self.handshake.on_logon_challenge(&challenge);
                self.handshake_step(step);
            }
            RealmMessage::AccountLogonProof(proof) => match self.handshake.on_logon_proof(&proof) {
                Ok(()) => self.on_authenticated(),
                Err(e) => self.handle_handshake_error(e),
            },
            RealmMessage::EnterChat(enter) => self.on_enter_chat(enter),
            RealmMessage::ChatEvent(event) => self.on_chat_event(event),
            RealmMessage::FriendsList(friends) => self.emit(RealmEvent::FriendsList(friends)),
            RealmMessage::FriendsUpdate(update) => self.emit(RealmEvent::FriendUpdate(update)),
            RealmMessage::FriendsAdd(friend) => self.emit(RealmEvent::FriendAdded(friend)),
            RealmMessage::ClanInfo(info) => self.emit(RealmEvent::ClanInfo(info)),
            RealmMessage::ClanInvitation(inv) => self.emit(RealmEvent::ClanInvitation(inv)),
            RealmMessage::ClanMemberList(members) => self.emit(RealmEvent::ClanMembers(members)),
            RealmMessage::ClanMemberRemoved { name } => {
                self.emit(RealmEvent::ClanMemberRemoved { name })
            }
            RealmMessage::ClanMemberStatusChange(member) => {
                self.emit(RealmEvent::ClanMemberStatus(member))
            }
            RealmMessage::MessageBox(msg) => {
                info!(alias = %self.realm.alias, caption = %msg.caption, text = %msg.text, "message box");
                self.emit(RealmEvent::MessageBox(msg));
            }
            RealmMessage::RequiredWork { file_name } => {
                debug!(alias = %self.realm.alias, %file_name, "required work");
                self.emit(RealmEvent::RequiredWork { file_name });
            }
            RealmMessage::FloodDetected => {
                warn!(alias = %self.realm.alias, "server reports flooding");
                self.emit(RealmEvent::FloodDetected);
            }
            RealmMessage::GameList(games) => self.emit(RealmEvent::GameList(games)),
        }
    }

    fn handshake_step(&mut self, step: Result<Packet>) {
        match step {
            Ok(packet) => self.push_packet(&packet),
            Err(e) => self.handle_handshake_error(e),
        }
    }

    fn handle_handshake_error(&mut self, err: ProtocolError) {
        if let ProtocolError::Handshake(h) = &err {
            if !h.is_fatal() {
                warn!(alias = %self.realm.alias, reason = %h, "dropping out-of-order handshake message");
                return;
            }
        }

        error!(alias = %self.realm.alias, server = %self.realm.server, reason = %err, "logon failed");
        self.ctx.metrics.handshake_failed();
        if self.state.is_connected() {
            self.ctx.metrics.connection_closed();
        }
        self.state = SessionState::Rejected;
        self.throttle.clear();
        self.actions.push_back(SessionAction::Close);

        let rejection = match err {
            ProtocolError::Handshake(h) => h,
            other => HandshakeError::Primitive(other.to_string()),
        };
        self.emit(RealmEvent::Rejected(rejection));
    }

    fn on_authenticated(&mut self) {
        info!(alias = %self.realm.alias, "logon successful");
        self.ctx.metrics.handshake_success();
        self.state = SessionState::Authenticated;
        self.emit(RealmEvent::Authenticated);

        self.send(encode::net_game_port(self.host_port));
        self.send(encode::enter_chat());
        self.send(encode::friends_list());
        self.send(encode::clan_member_list());
    }

    fn on_enter_chat(&mut self, enter: EnterChat) {
        if enter.unique_name.starts_with('#') {
            warn!(
                alias = %self.realm.alias,
                unique_name = %enter.unique_name,
                "account already logged in elsewhere"
            );
        }
        info!(alias = %self.realm.alias, unique_name = %enter.unique_name, "entered chat");
        self.state = SessionState::InChat;
        self.emit(RealmEvent::EnteredChat(enter));

        let channel = self.realm.first_channel.clone();
        if let Err(e) = self.send_join_channel(&channel) {
            warn!(alias = %self.realm.alias, reason = %e, "could not join first channel");
        }
    }

    fn on_chat_event(&mut self, event: ChatEvent) {
        let whisper = match event.kind {
            ChatEventKind::Talk => false,
            ChatEventKind::Whisper => true,
            _ => {
                self.emit(RealmEvent::Chat(event));
                return;
            }
        };

        let trigger = self.realm.command_trigger;
        if event.message == "?trigger" {
            let reply = format!("Command trigger is {trigger}");
            let queued = if whisper {
                self.queue_whisper_command(&event.user, &reply)
            } else {
                self.queue_chat_command(&reply)
            };
            if let Err(e) = queued {
                debug!(alias = %self.realm.alias, reason = %e, "trigger reply not queued");
            }
        } else if let Some(rest) = event.message.strip_prefix(trigger) {
            let argv: Vec<String> = rest.split_whitespace().map(str::to_owned).collect();
            if !argv.is_empty() {
                self.emit(RealmEvent::Command {
                    user: event.user.clone(),
                    whisper,
                    argv,
                });
            }
        }

        self.emit(RealmEvent::Chat(event));
    }

    /// Socket failed: forget credentials, keep the session around.
    pub fn on_socket_error(&mut self, err: &io::Error) {
        error!(alias = %self.realm.alias, reason = %err, "realm socket error");
        self.ctx.metrics.connection_error();
        self.degrade(err.to_string());
    }

    /// Peer closed the connection.
    pub fn on_socket_closed(&mut self) {
        info!(alias = %self.realm.alias, "realm closed the connection");
        self.degrade(String::from("connection closed by server"));
    }

    fn degrade(&mut self, reason: String) {
        if matches!(self.state, SessionState::Closed | SessionState::Rejected) {
            return;
        }
        if self.state.is_connected() {
            self.ctx.metrics.connection_closed();
        }
        self.state = SessionState::Degraded;
        self.reconnect_eligible = true;
        self.greeting_pending = false;
        self.handshake.reset();
        self.framer = TransportFramer::new(REALM_MARKER);
        self.emit(RealmEvent::Disconnected { reason });
    }

    /// Marks the session as exiting. The next `update` releases the socket.
    pub fn disconnect(&mut self) {
        info!(alias = %self.realm.alias, "disconnecting");
        self.exiting = true;
    }

    /// Queues a chat line or slash command behind the throttle.
    ///
    /// # Errors
    /// `Empty`, `NotLoggedIn`, or `Overflow` when the queue is full.
    pub fn queue_chat_command(&mut self, command: &str) -> Result<()> {
        if command.is_empty() {
            return Err(QueueError::Empty.into());
        }
        if !self.is_logged_in() {
            return Err(QueueError::NotLoggedIn.into());
        }

        let command = truncate_command(command, self.realm.chat_limit());
        let packet = encode::chat_command(command)?;
        self.queue_packet(&packet).inspect_err(|_| {
            warn!(
                alias = %self.realm.alias,
                %command,
                "too many packets queued, discarding chat command"
            );
        })
    }

    /// Queues `/w <user> <command>` behind the throttle.
    ///
    /// # Errors
    /// Same as [`Self::queue_chat_command`].
    pub fn queue_whisper_command(&mut self, user: &str, command: &str) -> Result<()> {
        self.queue_chat_command(&format!("/w {user} {command}"))
    }

    /// Asks for open games, or a single game by name.
    pub fn queue_game_list_request(&mut self, game_name: &str) -> Result<()> {
        if !self.is_logged_in() {
            return Err(QueueError::NotLoggedIn.into());
        }
        let packet = encode::get_adv_list_ex(game_name, GAME_LIST_SIZE)?;
        self.queue_packet(&packet)
    }

    fn queue_packet(&mut self, packet: &Packet) -> Result<()> {
        match self.throttle.push(OutboundEntry::new(packet)) {
            Ok(_) => Ok(()),
            Err(e) => {
                self.ctx.metrics.command_dropped();
                Err(e.into())
            }
        }
    }

    /// Sent immediately, bypassing the throttle.
    pub fn send_join_channel(&mut self, channel: &str) -> Result<()> {
        if !self.is_in_chat() {
            return Err(QueueError::NotLoggedIn.into());
        }
        info!(alias = %self.realm.alias, %channel, "joining channel");
        let packet = encode::join_channel(channel)?;
        self.push_packet(&packet);
        Ok(())
    }

    /// Requests the friends list. Sent immediately.
    pub fn send_get_friends_list(&mut self) -> Result<()> {
        if !self.is_logged_in() {
            return Err(QueueError::NotLoggedIn.into());
        }
        let packet = encode::friends_list()?;
        self.push_packet(&packet);
        Ok(())
    }

    /// Requests the clan member list. Sent immediately.
    pub fn send_get_clan_list(&mut self) -> Result<()> {
        if !self.is_logged_in() {
            return Err(QueueError::NotLoggedIn.into());
        }
        let packet = encode::clan_member_list()?;
        self.push_packet(&packet);
        Ok(())
    }

    /// Applies a command routed through the registry.
    pub fn apply(&mut self, command: SessionCommand) -> Result<()> {
        match command {
            SessionCommand::QueueChat(text) => self.queue_chat_command(&text),
            SessionCommand::QueueWhisper { user, text } => self.queue_whisper_command(&user, &text),
            SessionCommand::JoinChannel(channel) => self.send_join_channel(&channel),
            SessionCommand::RequestGameList(name) => self.queue_game_list_request(&name),
            SessionCommand::RefreshFriends => self.send_get_friends_list(),
            SessionCommand::RefreshClan => self.send_get_clan_list(),
            SessionCommand::Disconnect => {
                self.disconnect();
                Ok(())
            }
        }
    }

    /// Whether `user` is in the admin list. Case-insensitive.
    pub fn is_admin(&self, user: &str) -> bool {
        self.admins.iter().any(|admin| admin.eq_ignore_ascii_case(user))
    }

    /// Case-insensitive match against the configured root admin.
    pub fn is_root_admin(&self, user: &str) -> bool {
        self.realm
            .root_admin
            .as_deref()
            .is_some_and(|root| root.eq_ignore_ascii_case(user))
    }

    /// Returns `false` if the user was already an admin.
    pub fn add_admin(&mut self, user: &str) -> bool {
        if self.is_admin(user) {
            return false;
        }
        self.admins.push(user.to_owned());
        true
    }

    /// Returns `false` if the user was not an admin.
    pub fn remove_admin(&mut self, user: &str) -> bool {
        let before = self.admins.len();
        self.admins.retain(|admin| !admin.eq_ignore_ascii_case(user));
        self.admins.len() != before
    }

    fn send(&mut self, packet: Result<Packet>) {
        match packet {
            Ok(packet) => self.push_packet(&packet),
            Err(e) => error!(alias = %self.realm.alias, reason = %e, "failed to encode packet"),
        }
    }

    fn push_packet(&mut self, packet: &Packet) {
        trace!(alias = %self.realm.alias, opcode = packet.opcode, len = packet.length(), "send");
        self.push_send(packet.to_bytes());
    }

    fn push_send(&mut self, bytes: Bytes) {
        self.ctx.metrics.packet_sent(bytes.len() as u64);
        self.actions.push_back(SessionAction::Send(bytes));
    }

    fn emit(&self, event: RealmEvent) {
        let event = SessionEvent {
            session: self.id,
            alias: self.realm.alias.clone(),
            event,
        };
        if self.ctx.events.send(event).is_err() {
            trace!(alias = %self.realm.alias, "no event listener");
        }
    }
}
