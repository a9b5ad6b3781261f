//! Tokio drivers against real loopback sockets.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use realmgate::core::framer::TransportFramer;
use realmgate::core::packet::{Packet, GAME_MARKER, REALM_MARKER};
use realmgate::protocol::game::{encode as game_encode, GameMessage, GameOpcode};
use realmgate::protocol::realm::RealmOpcode;
use realmgate::service::realm_session::{RealmEvent, RealmSession, SessionContext};
use realmgate::service::registry::{SessionCommand, SessionInfo, SessionRegistry};
use realmgate::transport::game_listener::{gate_socket, start_game_listener_with_shutdown};
use realmgate::transport::realm_tcp::run_realm_session;
use realmgate::utils::{Metrics, SystemClock};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;

const STEP: Duration = Duration::from_secs(5);

/// Reads from `stream` into `framer` until a packet arrives.
async fn read_packet(stream: &mut TcpStream, framer: &mut TransportFramer) -> Packet {
    let mut buf = [0u8; 512];
    loop {
        if let Some(next) = framer.next_packet() {
            return next.unwrap();
        }
        let n = stream.read(&mut buf).await.unwrap();
        assert!(n > 0, "peer closed early");
        framer.feed(&buf[..n]);
    }
}

#[tokio::test]
async fn test_gate_socket_hands_over_framed_stream() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let client = tokio::spawn(async move {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut bytes = join_request_packet(1, 0, "Player1");
        bytes.extend_from_slice(
            &Packet::new(GAME_MARKER, GameOpcode::PongToHost as u8, 5u32.to_le_bytes().to_vec())
                .unwrap()
                .to_bytes(),
        );
        stream.write_all(&bytes).await.unwrap();

        let mut framer = TransportFramer::new(GAME_MARKER);
        read_packet(&mut stream, &mut framer).await
    });

    let (stream, peer) = listener.accept().await.unwrap();
    let metrics = Metrics::new();
    let mut player = timeout(STEP, gate_socket(stream, peer, &metrics))
        .await
        .unwrap()
        .unwrap()
        .expect("join request");
    assert_eq!(player.request.name, "Player1");

    // the packet sent right after the request is not lost
    let next = timeout(STEP, player.recv()).await.unwrap().unwrap().unwrap();
    assert_eq!(
        realmgate::protocol::game::decode_packet(&next).unwrap(),
        GameMessage::PongToHost { ticks: 5 }
    );

    player.send(game_encode::reject_join(9).unwrap()).await.unwrap();
    let reply = timeout(STEP, client).await.unwrap().unwrap();
    assert_eq!(reply.opcode, GameOpcode::RejectJoin as u8);
    assert_eq!(&reply.body[..], &9u32.to_le_bytes());
}

#[tokio::test]
async fn test_gate_socket_rejects_garbage() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        // keep the socket open until the server gives up
        let mut sink = [0u8; 16];
        let _ = stream.read(&mut sink).await;
    });

    let (stream, peer) = listener.accept().await.unwrap();
    let metrics = Metrics::new();
    assert!(gate_socket(stream, peer, &metrics).await.is_err());
    assert_eq!(metrics.snapshot().framing_errors, 1);
}

#[tokio::test]
async fn test_listener_delivers_players_until_shutdown() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let metrics = Arc::new(Metrics::new());
    let (joins_tx, mut joins_rx) = mpsc::channel(4);
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

    let server = tokio::spawn(start_game_listener_with_shutdown(
        listener,
        joins_tx,
        metrics.clone(),
        shutdown_rx,
    ));

    let mut client = TcpStream::connect(addr).await.unwrap();
    client
        .write_all(&join_request_packet(4, 0x1234, "Moon"))
        .await
        .unwrap();

    let player = timeout(STEP, joins_rx.recv()).await.unwrap().unwrap();
    assert_eq!(player.request.name, "Moon");
    assert_eq!(player.request.host_counter, 4);
    assert_eq!(metrics.snapshot().joins_accepted, 1);

    shutdown_tx.send(()).await.unwrap();
    timeout(STEP, server).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn test_realm_driver_connects_and_answers_ping() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let realm = realmgate::config::RealmConfig {
        server: String::from("127.0.0.1"),
        port,
        ..realm_config()
    };
    let registry = SessionRegistry::new();
    let commands = registry
        .register(SessionInfo {
            id: 1,
            alias: realm.alias.clone(),
            server: realm.server.clone(),
        })
        .unwrap();

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let ctx = SessionContext {
        clock: Arc::new(SystemClock::new()),
        metrics: Arc::new(Metrics::new()),
        events: events_tx,
    };
    let session = RealmSession::new(1, realm, true, 6113, FakePrimitives::default(), ctx);
    let driver = tokio::spawn(run_realm_session(
        session,
        commands,
        Duration::from_millis(10),
    ));

    let (mut server, _) = timeout(STEP, listener.accept()).await.unwrap().unwrap();

    // selector byte, then framed packets
    let mut selector = [0u8; 1];
    server.read_exact(&mut selector).await.unwrap();
    assert_eq!(selector[0], 0x01);
    let mut framer = TransportFramer::new(REALM_MARKER);
    let greeting = timeout(STEP, read_packet(&mut server, &mut framer)).await.unwrap();
    assert_eq!(greeting.opcode, RealmOpcode::AuthInfo as u8);

    server.write_all(&ping_packet(77)).await.unwrap();
    let echo = timeout(STEP, read_packet(&mut server, &mut framer)).await.unwrap();
    assert_eq!(echo.opcode, RealmOpcode::Ping as u8);
    assert_eq!(&echo.body[..], &77u32.to_le_bytes());

    let first = timeout(STEP, events_rx.recv()).await.unwrap().unwrap();
    assert_eq!(first.event, RealmEvent::Connected);

    registry.send(1, SessionCommand::Disconnect).unwrap();
    timeout(STEP, driver).await.unwrap().unwrap().unwrap();

    // the driver shut its side down
    let mut rest = Vec::new();
    timeout(STEP, server.read_to_end(&mut rest)).await.unwrap().unwrap();
}
