//! Tokio driver for one realm session.
//!
//! Owns the TCP socket and pumps three inputs into the session: the tick
//! interval, socket reads, and registry commands. After every input the
//! queued [`SessionAction`]s are executed in order.

use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::protocol::handshake::AuthPrimitives;
use crate::service::realm_session::{RealmSession, SessionAction};
use crate::service::registry::SessionCommand;
use crate::utils::metrics::Timer;

/// How long a connect attempt may take before it counts as a socket error.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

const READ_BUFFER_SIZE: usize = 4096;

struct Socket {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
}

/// Runs `session` until it asks to exit.
///
/// The command channel closing is treated as a disconnect request.
#[instrument(skip_all, fields(alias = %session.alias(), session = session.id()))]
pub async fn run_realm_session<P>(
    mut session: RealmSession<P>,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    tick_interval: Duration,
) -> Result<()>
where
    P: AuthPrimitives,
{
    let mut ticker = interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut socket: Option<Socket> = None;
    let mut commands_open = true;
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let exit = session.update();
                execute_actions(&mut session, &mut socket).await;
                if exit {
                    info!(state = ?session.state(), "realm session finished");
                    return Ok(());
                }
            }

            read = read_some(&mut socket, &mut buf) => {
                match read {
                    Ok(0) => {
                        socket = None;
                        session.on_socket_closed();
                    }
                    Ok(n) => {
                        if let Err(e) = session.on_bytes(&buf[..n]) {
                            debug!(reason = %e, "inbound stream rejected");
                        }
                    }
                    Err(e) => {
                        socket = None;
                        session.on_socket_error(&e);
                    }
                }
                execute_actions(&mut session, &mut socket).await;
            }

            command = commands.recv(), if commands_open => {
                match command {
                    Some(command) => {
                        if let Err(e) = session.apply(command) {
                            warn!(reason = %e, "session command not applied");
                        }
                    }
                    None => {
                        commands_open = false;
                        session.disconnect();
                    }
                }
                execute_actions(&mut session, &mut socket).await;
            }
        }
    }
}

/// Reads from the socket, or waits forever when there is none.
async fn read_some(socket: &mut Option<Socket>, buf: &mut [u8]) -> io::Result<usize> {
    match socket {
        Some(socket) => socket.reader.read(buf).await,
        None => std::future::pending().await,
    }
}

async fn execute_actions<P: AuthPrimitives>(
    session: &mut RealmSession<P>,
    socket: &mut Option<Socket>,
) {
    // actions produced while executing (connect notifications) are picked up by the loop
    loop {
        let actions = session.drain_actions();
        if actions.is_empty() {
            return;
        }

        for action in actions {
            match action {
                SessionAction::Connect { host, port } => {
                    let _timer = Timer::start("realm_connect");
                    match connect(&host, port).await {
                        Ok((stream, local_ip)) => {
                            let (reader, writer) = stream.into_split();
                            *socket = Some(Socket { reader, writer });
                            session.on_connected(local_ip);
                        }
                        Err(e) => session.on_socket_error(&e),
                    }
                }
                SessionAction::Send(bytes) => {
                    let Some(open) = socket.as_mut() else {
                        debug!(len = bytes.len(), "dropping send without a socket");
                        continue;
                    };
                    if let Err(e) = open.writer.write_all(&bytes).await {
                        *socket = None;
                        session.on_socket_error(&e);
                    }
                }
                SessionAction::Close => {
                    if let Some(mut open) = socket.take() {
                        if let Err(e) = open.writer.shutdown().await {
                            debug!(reason = %e, "shutdown after close failed");
                        }
                    }
                }
            }
        }
    }
}

async fn connect(host: &str, port: u16) -> io::Result<(TcpStream, Ipv4Addr)> {
    let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port)))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "realm connect timed out"))??;
    stream.set_nodelay(true)?;

    let local_ip = match stream.local_addr()?.ip() {
        IpAddr::V4(ip) => ip,
        IpAddr::V6(ip) => ip.to_ipv4_mapped().unwrap_or(Ipv4Addr::UNSPECIFIED),
    };
    Ok((stream, local_ip))
}
