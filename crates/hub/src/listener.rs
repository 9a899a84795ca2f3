// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP accept loop and agent handshake.
//!
//! Each accepted connection must identify itself with a `ServerInfo` frame
//! before the deadline. Only then is a [`Session`] created and registered;
//! connections that fail the handshake are dropped without touching the
//! registry.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use polychat_core::{AgentId, Envelope, EnvelopeKind, IdError, ServerInfo};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::protocol::{Frame, FrameReader, ProtocolError};
use crate::session::{CloseReason, Session, SessionContext, SessionState};

/// Why a connection was turned away before registration
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("expected server_info, got {0}")]
    UnexpectedKind(EnvelopeKind),

    #[error("expected server_info, got unknown kind {0}")]
    UnknownKind(u8),

    #[error("invalid server id: {0}")]
    InvalidId(#[from] IdError),

    #[error("hub is shutting down")]
    ShuttingDown,
}

/// Accepts agent connections until cancelled.
pub struct Listener {
    socket: TcpListener,
    ctx: SessionContext,
    handshake_timeout: Duration,
    cancel: CancellationToken,
}

impl Listener {
    pub fn new(
        socket: TcpListener,
        ctx: SessionContext,
        handshake_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            socket,
            ctx,
            handshake_timeout,
            cancel,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Accept connections until cancelled, handshaking each on its own task.
    pub async fn run(self) {
        loop {
            let accepted = tokio::select! {
                _ = self.cancel.cancelled() => break,
                accepted = self.socket.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    let ctx = self.ctx.clone();
                    let timeout = self.handshake_timeout;
                    let cancel = self.cancel.clone();
                    tokio::spawn(async move {
                        let result = accept_connection(stream, peer, &ctx, timeout, &cancel).await;
                        if let Err(e) = result {
                            match e {
                                HandshakeError::Protocol(ProtocolError::ConnectionClosed) => {
                                    debug!(%peer, "connection closed before handshake")
                                }
                                HandshakeError::ShuttingDown => {
                                    debug!(%peer, "handshake completed during shutdown")
                                }
                                _ => warn!(%peer, error = %e, "handshake failed"),
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "accept failed");
                    // Usually fd exhaustion; back off instead of spinning
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
        debug!("listener stopped");
    }
}

async fn accept_connection(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: &SessionContext,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Arc<Session>, HandshakeError> {
    debug!(%peer, state = %SessionState::Connecting, "connection accepted");
    if let Err(e) = stream.set_nodelay(true) {
        debug!(%peer, error = %e, "failed to set TCP_NODELAY");
    }

    let (read, write) = stream.into_split();
    let mut reader = FrameReader::new(read);
    debug!(%peer, state = %SessionState::Handshaking, "awaiting server info");
    let (agent, server) = handshake(&mut reader, timeout).await?;

    if cancel.is_cancelled() {
        return Err(HandshakeError::ShuttingDown);
    }
    info!(
        agent = %agent,
        %peer,
        name = %server.server_name,
        address = %server.server_address,
        max_players = server.max_players,
        "agent identified"
    );
    admit(agent, server, peer.to_string(), reader, write, ctx, cancel)
}

/// Register an identified connection unless shutdown has begun.
///
/// Shutdown cancels before it snapshots the registry, so a session that
/// registers after that snapshot still observes the cancellation here and
/// closes itself.
fn admit<R, W>(
    agent: AgentId,
    server: ServerInfo,
    peer: String,
    reader: FrameReader<R>,
    writer: W,
    ctx: &SessionContext,
    cancel: &CancellationToken,
) -> Result<Arc<Session>, HandshakeError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let session = Session::start(agent, server, peer, reader, writer, ctx);
    if cancel.is_cancelled() {
        session.close(CloseReason::Shutdown);
        return Err(HandshakeError::ShuttingDown);
    }
    Ok(session)
}

/// Read and validate the identification frame.
pub async fn handshake<R>(
    reader: &mut FrameReader<R>,
    timeout: Duration,
) -> Result<(AgentId, ServerInfo), HandshakeError>
where
    R: AsyncRead + Unpin,
{
    match reader.next_frame_within(timeout).await? {
        Frame::Envelope(Envelope::ServerInfo(server)) => {
            let agent = AgentId::parse(&server.server_id)?;
            Ok((agent, server))
        }
        Frame::Envelope(other) => Err(HandshakeError::UnexpectedKind(other.kind())),
        Frame::Unknown { tag } => Err(HandshakeError::UnknownKind(tag)),
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
