//! ConnectionAcceptor: TCP listener and per-connection task management.
//!
//! This module is responsible for:
//!
//! 1. Validating the configured port and binding the listener.
//! 2. Accepting incoming connections in a loop.
//! 3. Handing each connection to its own Tokio task, which runs the
//!    [`ProtocolHandler`] and closes the socket afterwards.
//! 4. Stopping when the shared `running` flag is cleared.
//!
//! # Concurrency
//!
//! A slow or silent client never blocks the others: the accept loop spawns a
//! task per connection and goes straight back to `accept()`.  The number of
//! live sessions is capped by a semaphore; when every permit is taken the loop
//! waits for a session to finish before it accepts again, leaving further
//! clients in the kernel backlog.
//!
//! # Shutdown
//!
//! Clearing `running` stops the accept loop, but [`ConnectionAcceptor::serve`]
//! does not return until every session has released its slot or the shutdown
//! grace period has run out.  Callers may therefore tear down the runtime as
//! soon as `serve` returns.
//!
//! Each connection gets a UUID, attached as a `tracing` span so interleaved
//! console output can be told apart.

use std::net::{IpAddr, SocketAddr};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use vcalc_core::Journal;

use crate::application::protocol_handler::{ProtocolHandler, SessionOutcome};

/// Lowest port the server may listen on (first non-privileged port).
pub const MIN_PORT: u16 = 1024;
/// Highest port the server may listen on (last registered port).
pub const MAX_PORT: u16 = 49151;

/// How often the accept loop wakes up to check the shutdown flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Default time in-flight sessions get to finish after shutdown begins.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum AcceptorError {
    #[error("port ({0}) out of range {min}-{max}", min = MIN_PORT, max = MAX_PORT)]
    PortOutOfRange(u16),

    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("max_connections must be at least 1")]
    NoConnectionSlots,
}

/// Returns `true` if `port` lies in `[MIN_PORT, MAX_PORT]`.
pub fn port_in_range(port: u16) -> bool {
    (MIN_PORT..=MAX_PORT).contains(&port)
}

pub struct ConnectionAcceptor {
    addr: SocketAddr,
    max_connections: usize,
    shutdown_grace: Duration,
    handler: Arc<ProtocolHandler>,
    journal: Arc<dyn Journal>,
}

impl ConnectionAcceptor {
    /// Creates an acceptor for `bind_ip:port`.
    ///
    /// # Errors
    ///
    /// [`AcceptorError::PortOutOfRange`] (journaled as CRITICAL) if the port
    /// lies outside `[1024, 49151]`, and [`AcceptorError::NoConnectionSlots`]
    /// if `max_connections` is zero.
    pub fn new(
        bind_ip: IpAddr,
        port: u16,
        max_connections: usize,
        handler: Arc<ProtocolHandler>,
        journal: Arc<dyn Journal>,
    ) -> Result<Self, AcceptorError> {
        if !port_in_range(port) {
            let err = AcceptorError::PortOutOfRange(port);
            journal.error(&format!("Server: {err}"), true);
            return Err(err);
        }
        if max_connections == 0 {
            return Err(AcceptorError::NoConnectionSlots);
        }
        Ok(Self {
            addr: SocketAddr::new(bind_ip, port),
            max_connections,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            handler,
            journal,
        })
    }

    /// Sets how long [`serve`](Self::serve) waits for running sessions once
    /// the accept loop has stopped.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Binds the configured address and serves until `running` is cleared.
    ///
    /// # Errors
    ///
    /// [`AcceptorError::Bind`] (journaled as CRITICAL) if the listener cannot
    /// be bound.  Per-connection failures never end the loop.
    pub async fn run(&self, running: Arc<AtomicBool>) -> Result<(), AcceptorError> {
        let listener = TcpListener::bind(self.addr).await.map_err(|source| {
            let err = AcceptorError::Bind {
                addr: self.addr,
                source,
            };
            self.journal.error(&format!("Server: {err}"), true);
            err
        })?;
        self.journal.info(&format!("Server started and listening on port {}", self.addr.port()));
        self.serve(listener, running).await;
        Ok(())
    }

    /// Runs the accept loop on an already bound listener.
    ///
    /// Once `running` is cleared no new clients are accepted; the call then
    /// waits up to the shutdown grace for sessions in flight to finish.
    pub async fn serve(&self, listener: TcpListener, running: Arc<AtomicBool>) {
        let slots = Arc::new(Semaphore::new(self.max_connections));

        'accept: loop {
            let permit = tokio::select! {
                permit = Arc::clone(&slots).acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break 'accept,
                },
                _ = wait_for_shutdown(&running) => break 'accept,
            };

            self.journal.info("Waiting for new client...");
            let (stream, peer) = loop {
                if !running.load(Ordering::Relaxed) {
                    break 'accept;
                }
                match timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await {
                    Ok(Ok(conn)) => break conn,
                    Ok(Err(e)) => self.journal.error(&format!("Accept error: {e}"), false),
                    Err(_) => {}
                }
            };

            self.journal.info(&format!("Connection established with {}", peer.ip()));

            let span = info_span!("connection", id = %Uuid::new_v4(), %peer);
            let handler = Arc::clone(&self.handler);
            let journal = Arc::clone(&self.journal);
            tokio::spawn(
                async move {
                    handle_connection(stream, handler, journal).await;
                    drop(permit);
                }
                .instrument(span),
            );
        }

        info!("shutdown flag cleared; accept loop stopped");
        self.drain(&slots).await;
    }

    /// Waits until every session slot is free again, or the grace runs out.
    async fn drain(&self, slots: &Semaphore) {
        let active = self.max_connections - slots.available_permits();
        if active == 0 {
            return;
        }
        self.journal.info(&format!("Waiting for {active} active sessions to finish"));

        let all = u32::try_from(self.max_connections).unwrap_or(u32::MAX);
        match timeout(self.shutdown_grace, slots.acquire_many(all)).await {
            Ok(_) => info!("all sessions finished"),
            Err(_) => {
                let left = self.max_connections - slots.available_permits();
                self.journal.error(
                    &format!("Shutdown grace expired with {left} sessions still active"),
                    false,
                );
            }
        }
    }
}

/// Resolves once `running` reads `false`.
async fn wait_for_shutdown(running: &AtomicBool) {
    while running.load(Ordering::Relaxed) {
        tokio::time::sleep(ACCEPT_POLL_INTERVAL).await;
    }
}

// ── Per-connection task ───────────────────────────────────────────────────────

/// Runs one session and always closes the socket afterwards.
async fn handle_connection(
    mut stream: TcpStream,
    handler: Arc<ProtocolHandler>,
    journal: Arc<dyn Journal>,
) {
    match handler.handle(&mut stream).await {
        Ok(SessionOutcome::Completed { login, vectors }) => {
            info!("session for {login} completed after {vectors} vectors");
        }
        Ok(SessionOutcome::PeerClosed) => debug!("peer closed before authenticating"),
        Err(e) => journal.error(&format!("Error in server loop: {e}"), false),
    }

    if let Err(e) = stream.shutdown().await {
        debug!("socket shutdown failed: {e}");
    }
    journal.info("Connection closed");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
