//! Tokio listener for incoming player connections.
//!
//! Every accepted socket runs through a [`JoinGate`]. When the gate yields a
//! join request, the socket is wrapped in a `Framed` game-protocol stream,
//! seeded with whatever bytes followed the request, and handed to the lobby
//! layer as a [`JoinedPlayer`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::codec::{Framed, FramedParts};
use tracing::{debug, error, info, instrument, warn};

use crate::config::HostConfig;
use crate::core::codec::FrameCodec;
use crate::core::packet::{Packet, GAME_MARKER};
use crate::error::{ProtocolError, Result};
use crate::protocol::game::IncomingJoinRequest;
use crate::service::join_gate::JoinGate;
use crate::utils::metrics::Metrics;

/// How long an accepted socket may take to send its join request.
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

const READ_BUFFER_SIZE: usize = 2048;

/// A socket that completed the join gate.
#[derive(Debug)]
pub struct JoinedPlayer {
    pub request: IncomingJoinRequest,
    pub peer: SocketAddr,
    pub stream: Framed<TcpStream, FrameCodec>,
}

impl JoinedPlayer {
    /// Writes one game packet to the player.
    pub async fn send(&mut self, packet: Packet) -> Result<()> {
        self.stream.send(packet).await
    }

    /// Next packet from the player, `None` once the socket closes.
    pub async fn recv(&mut self) -> Option<Result<Packet>> {
        self.stream.next().await
    }
}

/// Binds the game listener on the configured address and port.
pub async fn bind(config: &HostConfig) -> Result<TcpListener> {
    let addr = format!("{}:{}", config.bind_address, config.host_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(address = %addr, "game listener bound");
    Ok(listener)
}

/// Accepts players until `shutdown_rx` fires or every sender is dropped.
#[instrument(skip_all, fields(address = ?listener.local_addr().ok()))]
pub async fn start_game_listener_with_shutdown(
    listener: TcpListener,
    joins: mpsc::Sender<JoinedPlayer>,
    metrics: Arc<Metrics>,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Shutting down game listener");
                metrics.log_metrics();
                return Ok(());
            }

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer)) => {
                        debug!(%peer, "accepted potential player");
                        let joins = joins.clone();
                        let metrics = metrics.clone();
                        tokio::spawn(async move {
                            match gate_socket(stream, peer, &metrics).await {
                                Ok(Some(player)) => {
                                    metrics.join_accepted();
                                    if joins.send(player).await.is_err() {
                                        warn!(%peer, "lobby stopped taking players");
                                    }
                                }
                                Ok(None) => debug!(%peer, "potential player left before joining"),
                                Err(e) => debug!(%peer, reason = %e, "potential player dropped"),
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Error accepting connection");
                    }
                }
            }
        }
    }
}

/// Reads from `stream` until a join request arrives.
///
/// Returns `Ok(None)` when the peer closes first.
///
/// # Errors
/// Socket errors, a framing violation, or no join request within [`JOIN_TIMEOUT`].
pub async fn gate_socket(
    mut stream: TcpStream,
    peer: SocketAddr,
    metrics: &Metrics,
) -> Result<Option<JoinedPlayer>> {
    let mut gate = JoinGate::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    let request = timeout(JOIN_TIMEOUT, async {
        loop {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                return Ok::<_, ProtocolError>(None);
            }
            match gate.on_bytes(&buf[..n]) {
                Ok(Some(request)) => return Ok(Some(request)),
                Ok(None) => continue,
                Err(e) => {
                    warn!(%peer, reason = %e, "received invalid packet from player");
                    metrics.framing_error();
                    return Err(e.into());
                }
            }
        }
    })
    .await
    .map_err(|_| ProtocolError::Custom(format!("no join request from {peer} in time")))??;

    let Some(request) = request else {
        return Ok(None);
    };
    info!(%peer, name = %request.name, host_counter = request.host_counter, "join request");

    let mut parts = FramedParts::new::<Packet>(stream, FrameCodec::new(GAME_MARKER));
    parts.read_buf = gate.into_remaining();
    Ok(Some(JoinedPlayer {
        request,
        peer,
        stream: Framed::from_parts(parts),
    }))
}
