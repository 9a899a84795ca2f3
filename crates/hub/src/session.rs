// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One live connection to one agent.
//!
//! A session runs two independent tasks: the read path decodes frames and
//! hands envelopes to the inbound router, the write path drains a bounded
//! outbound queue in enqueue order. Either path failing closes the session;
//! once both have stopped the session unregisters itself.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use polychat_core::{AgentId, DeliveryError, DeliveryResult, Envelope, EnvelopeKind, ServerInfo};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::protocol::{self, Frame, FrameReader, ProtocolError};
use crate::registry::Registry;
use crate::router::{Inbound, InboundSender};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Connection lifecycle.
///
/// `Connecting` and `Handshaking` are tracked by the accept path; a
/// [`Session`] value only exists from `Active` onwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Handshaking,
    Active,
    Closing,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Handshaking => "handshaking",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Why a session left `Active`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Hub shutdown
    Shutdown,
    /// A newer connection registered the same agent id
    Superseded,
    PeerClosed,
    ReadFailed(String),
    WriteFailed(String),
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shutdown => f.write_str("shutdown"),
            Self::Superseded => f.write_str("superseded"),
            Self::PeerClosed => f.write_str("peer closed"),
            Self::ReadFailed(e) => write!(f, "read failed: {e}"),
            Self::WriteFailed(e) => write!(f, "write failed: {e}"),
        }
    }
}

/// Per-session limits
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Outbound queue bound
    pub outbound_queue: usize,
    /// How long a targeted enqueue may wait on a full queue
    pub enqueue_wait: Duration,
    /// How long queued writes may keep flushing once closing starts
    pub shutdown_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outbound_queue: 64,
            enqueue_wait: Duration::from_millis(250),
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

/// Shared collaborators every session needs
#[derive(Clone)]
pub struct SessionContext {
    pub registry: Registry,
    pub inbound: InboundSender,
    pub config: SessionConfig,
}

struct Outbound {
    frame: Bytes,
    kind: EnvelopeKind,
    reply: Option<oneshot::Sender<DeliveryResult>>,
}

/// The hub's handle to one connected agent.
pub struct Session {
    id: u64,
    agent: AgentId,
    info: ServerInfo,
    peer: String,
    outbound: mpsc::Sender<Outbound>,
    state: watch::Sender<SessionState>,
    close_reason: Mutex<Option<CloseReason>>,
    cancel: CancellationToken,
    connected_at: Instant,
    last_activity: Mutex<Instant>,
    config: SessionConfig,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("agent", &self.agent)
            .field("peer", &self.peer)
            .field("state", &self.state())
            .finish()
    }
}

impl Session {
    /// Register a handshaken connection and start its read and write tasks.
    ///
    /// Registration happens before the tasks start, so a connection that
    /// dies immediately still unregisters cleanly.
    pub fn start<R, W>(
        agent: AgentId,
        info: ServerInfo,
        peer: impl Into<String>,
        reader: FrameReader<R>,
        writer: W,
        ctx: &SessionContext,
    ) -> Arc<Session>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound, outbound_rx) = mpsc::channel(ctx.config.outbound_queue.max(1));
        let (state, _) = watch::channel(SessionState::Active);
        let now = Instant::now();
        let session = Arc::new(Session {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            agent,
            info,
            peer: peer.into(),
            outbound,
            state,
            close_reason: Mutex::new(None),
            cancel: CancellationToken::new(),
            connected_at: now,
            last_activity: Mutex::new(now),
            config: ctx.config.clone(),
        });

        ctx.registry.register(Arc::clone(&session));
        tokio::spawn(supervise(
            Arc::clone(&session),
            reader,
            writer,
            outbound_rx,
            ctx.registry.clone(),
            ctx.inbound.clone(),
        ));
        session
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn agent(&self) -> &AgentId {
        &self.agent
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    /// Last time a frame was read from or written to this agent
    pub fn last_activity(&self) -> Instant {
        *self.last_activity.lock()
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason.lock().clone()
    }

    fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Queue an envelope and return a future for its delivery result.
    ///
    /// Fails immediately with `NotConnected` unless the session is active.
    /// Waits at most `enqueue_wait` for queue space, then fails with
    /// `WriteFailed`.
    pub async fn enqueue(&self, envelope: &Envelope) -> Result<PendingDelivery, DeliveryError> {
        let frame =
            protocol::encode(envelope).map_err(|e| DeliveryError::Rejected(e.to_string()))?;
        self.enqueue_frame(frame, envelope.kind()).await
    }

    /// Queue a pre-encoded frame; see [`Session::enqueue`].
    pub async fn enqueue_frame(
        &self,
        frame: Bytes,
        kind: EnvelopeKind,
    ) -> Result<PendingDelivery, DeliveryError> {
        if !self.is_active() {
            return Err(DeliveryError::NotConnected(self.agent.clone()));
        }

        let (reply, rx) = oneshot::channel();
        let item = Outbound {
            frame,
            kind,
            reply: Some(reply),
        };
        match tokio::time::timeout(self.config.enqueue_wait, self.outbound.send(item)).await {
            Ok(Ok(())) => Ok(PendingDelivery {
                agent: self.agent.clone(),
                rx,
            }),
            Ok(Err(_)) => Err(DeliveryError::NotConnected(self.agent.clone())),
            Err(_) => Err(DeliveryError::WriteFailed {
                agent: self.agent.clone(),
                reason: "outbound queue full".to_string(),
            }),
        }
    }

    /// Queue a pre-encoded frame without waiting for space or for the write.
    pub fn try_enqueue_frame(&self, frame: Bytes, kind: EnvelopeKind) -> Result<(), DeliveryError> {
        if !self.is_active() {
            return Err(DeliveryError::NotConnected(self.agent.clone()));
        }

        let item = Outbound {
            frame,
            kind,
            reply: None,
        };
        self.outbound.try_send(item).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::WriteFailed {
                agent: self.agent.clone(),
                reason: "outbound queue full".to_string(),
            },
            mpsc::error::TrySendError::Closed(_) => {
                DeliveryError::NotConnected(self.agent.clone())
            }
        })
    }

    /// Begin closing. Idempotent; the first reason wins.
    pub fn close(&self, reason: CloseReason) {
        let first = self.state.send_if_modified(|state| match state {
            SessionState::Closing | SessionState::Closed => false,
            _ => {
                *state = SessionState::Closing;
                true
            }
        });
        if first {
            debug!(agent = %self.agent, session = self.id, %reason, "session closing");
            *self.close_reason.lock() = Some(reason);
        }
        self.cancel.cancel();
    }

    /// Wait until the session has fully closed.
    pub async fn closed(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so this only errors if it was dropped
        let _ = rx.wait_for(|state| *state == SessionState::Closed).await;
    }
}

/// Delivery result of one enqueued envelope.
///
/// Resolves once the write completes or fails, or with `NotConnected` if
/// the session closes before the envelope is written.
#[must_use = "a pending delivery does nothing unless awaited"]
#[derive(Debug)]
pub struct PendingDelivery {
    agent: AgentId,
    rx: oneshot::Receiver<DeliveryResult>,
}

impl Future for PendingDelivery {
    type Output = DeliveryResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => {
                Poll::Ready(Err(DeliveryError::NotConnected(self.agent.clone())))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

async fn supervise<R, W>(
    session: Arc<Session>,
    reader: FrameReader<R>,
    writer: W,
    outbound_rx: mpsc::Receiver<Outbound>,
    registry: Registry,
    inbound: InboundSender,
) where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    info!(
        agent = %session.agent,
        session = session.id,
        peer = %session.peer,
        "session active"
    );

    let read = tokio::spawn(read_loop(Arc::clone(&session), reader, inbound));
    let write = tokio::spawn(write_loop(Arc::clone(&session), writer, outbound_rx));

    session.cancel.cancelled().await;
    if let Err(e) = write.await {
        warn!(agent = %session.agent, error = %e, "write task ended abnormally");
    }
    if let Err(e) = read.await {
        warn!(agent = %session.agent, error = %e, "read task ended abnormally");
    }

    registry.unregister(&session.agent, &session);
    session.state.send_replace(SessionState::Closed);
    info!(
        agent = %session.agent,
        session = session.id,
        reason = %session.close_reason().unwrap_or(CloseReason::Shutdown),
        "session closed"
    );
}

async fn read_loop<R>(session: Arc<Session>, mut reader: FrameReader<R>, inbound: InboundSender)
where
    R: AsyncRead + Unpin,
{
    loop {
        let frame = tokio::select! {
            _ = session.cancel.cancelled() => return,
            frame = reader.next_frame() => frame,
        };

        match frame {
            Ok(Frame::Envelope(envelope)) => {
                session.touch();
                trace!(agent = %session.agent, kind = %envelope.kind(), "frame received");
                inbound.deliver(Inbound {
                    agent: session.agent.clone(),
                    envelope,
                });
            }
            Ok(Frame::Unknown { tag }) => {
                session.touch();
                warn!(agent = %session.agent, tag, "dropping frame of unknown kind");
            }
            Err(ProtocolError::ConnectionClosed) => {
                session.close(CloseReason::PeerClosed);
                return;
            }
            Err(e) => {
                warn!(agent = %session.agent, error = %e, "read failed");
                session.close(CloseReason::ReadFailed(e.to_string()));
                return;
            }
        }
    }
}

async fn write_loop<W>(session: Arc<Session>, mut writer: W, mut rx: mpsc::Receiver<Outbound>)
where
    W: AsyncWrite + Unpin,
{
    tokio::select! {
        () = write_queue(&session, &mut writer, &mut rx) => {}
        () = grace_expired(&session) => {
            warn!(
                agent = %session.agent,
                grace_ms = session.config.shutdown_grace.as_millis() as u64,
                "grace period expired with writes pending"
            );
        }
    }
    // Dropping the writer closes the transport; unwritten items resolve
    // as NotConnected when their reply senders drop with `rx`.
}

/// Completes `shutdown_grace` after the session starts closing.
async fn grace_expired(session: &Session) {
    session.cancel.cancelled().await;
    tokio::time::sleep(session.config.shutdown_grace).await;
}

async fn write_queue<W>(session: &Session, writer: &mut W, rx: &mut mpsc::Receiver<Outbound>)
where
    W: AsyncWrite + Unpin,
{
    loop {
        let item = tokio::select! {
            item = rx.recv() => item,
            _ = session.cancel.cancelled() => break,
        };
        let Some(item) = item else { break };
        if !write_one(session, writer, item).await {
            return;
        }
    }

    // Closing: flush what was queued before the close
    rx.close();
    while let Some(item) = rx.recv().await {
        if !write_one(session, writer, item).await {
            return;
        }
    }
    let _ = writer.shutdown().await;
}

async fn write_one<W>(session: &Session, writer: &mut W, item: Outbound) -> bool
where
    W: AsyncWrite + Unpin,
{
    match protocol::write_frame(writer, &item.frame).await {
        Ok(()) => {
            session.touch();
            trace!(
                agent = %session.agent,
                kind = %item.kind,
                bytes = item.frame.len(),
                "frame written"
            );
            if let Some(reply) = item.reply {
                let _ = reply.send(Ok(()));
            }
            true
        }
        Err(e) => {
            warn!(agent = %session.agent, kind = %item.kind, error = %e, "write failed");
            if let Some(reply) = item.reply {
                let _ = reply.send(Err(DeliveryError::WriteFailed {
                    agent: session.agent.clone(),
                    reason: e.to_string(),
                }));
            }
            session.close(CloseReason::WriteFailed(e.to_string()));
            false
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
