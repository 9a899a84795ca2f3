// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hub lifecycle: wiring, startup and graceful shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use polychat_adapters::RelayAdapter;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::acks::AckTracker;
use crate::broadcaster::Broadcaster;
use crate::commands::Moderation;
use crate::config::{Config, ConfigError};
use crate::dispatcher::Dispatcher;
use crate::listener::Listener;
use crate::registry::Registry;
use crate::router::{self, InboundRouter};
use crate::session::{CloseReason, SessionContext};

/// Extra time on top of the session grace period before giving up on shutdown
const SHUTDOWN_SLACK: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to bind {0}: {1}")]
    BindFailed(String, #[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Filesystem locations used by the daemon binary
#[derive(Debug, Clone)]
pub struct Paths {
    /// Root state directory (e.g. ~/.local/state/polychat)
    pub state_dir: PathBuf,
    /// Path to the hub log file
    pub log_path: PathBuf,
}

impl Paths {
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = crate::env::state_dir()?;
        Ok(Self {
            log_path: state_dir.join("hub.log"),
            state_dir,
        })
    }
}

/// A running hub.
///
/// Owns every long-lived task; nothing is reachable through globals.
pub struct Hub {
    registry: Registry,
    dispatcher: Dispatcher,
    local_addr: SocketAddr,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    shutdown_grace: Duration,
    broadcasting: bool,
    started_at: Instant,
}

impl Hub {
    /// Bind the listener and start routing, broadcasting and accepting.
    pub async fn start<R: RelayAdapter>(config: &Config, relay: R) -> Result<Self, LifecycleError> {
        config.validate()?;

        let socket = TcpListener::bind(&config.hub.listen)
            .await
            .map_err(|e| LifecycleError::BindFailed(config.hub.listen.clone(), e))?;

        let registry = Registry::new();
        let acks = AckTracker::new();
        let dispatcher = Dispatcher::new(registry.clone(), acks.clone(), config.dispatch());
        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();

        let (inbound, inbox) = router::inbox(config.hub.inbound_queue);
        let router = InboundRouter::new(relay, dispatcher.clone(), acks, config.router());
        tasks.push(tokio::spawn(router.run(inbox, cancel.clone())));

        let broadcasting = match Broadcaster::from_config(&config.broadcasts) {
            Some(broadcaster) => {
                tasks.push(tokio::spawn(broadcaster.run(dispatcher.clone(), cancel.clone())));
                true
            }
            None => {
                info!("periodic broadcasts disabled");
                false
            }
        };

        let ctx = SessionContext {
            registry: registry.clone(),
            inbound,
            config: config.session(),
        };
        let listener = Listener::new(socket, ctx, config.handshake_timeout(), cancel.clone());
        let local_addr = listener.local_addr()?;
        tasks.push(tokio::spawn(listener.run()));

        info!(%local_addr, "hub listening");
        Ok(Self {
            registry,
            dispatcher,
            local_addr,
            cancel,
            tasks,
            shutdown_grace: config.shutdown_grace(),
            broadcasting,
            started_at: Instant::now(),
        })
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn moderation(&self) -> Moderation {
        Moderation::new(self.dispatcher.clone())
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether the periodic broadcaster is scheduled
    pub fn broadcasting(&self) -> bool {
        self.broadcasting
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Stop accepting, cancel the broadcaster and close every session.
    ///
    /// Sessions get the configured grace period to flush queued writes.
    pub async fn shutdown(self) {
        info!(sessions = self.registry.len(), "shutting down hub");
        self.cancel.cancel();

        let sessions = self.registry.close_all(CloseReason::Shutdown);
        let deadline = self.shutdown_grace + SHUTDOWN_SLACK;
        let all_closed = async {
            for session in &sessions {
                session.closed().await;
            }
        };
        if tokio::time::timeout(deadline, all_closed).await.is_err() {
            warn!(
                remaining = self.registry.len(),
                "sessions still open after grace period"
            );
        }

        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "hub task ended abnormally");
            }
        }
        info!("hub stopped");
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
