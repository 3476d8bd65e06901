//! ProtocolHandler: the per-connection state machine.
//!
//! One call to [`ProtocolHandler::handle`] drives one connection from the
//! first byte to the last:
//!
//! ```text
//! AwaitingAuth ──OK──► Authenticated ──count──► ProcessingVectors ──► Closed
//!      │                     │                         │
//!      └─────────ERR─────────┴───────────ERR───────────┘──────────► Closed
//! ```
//!
//! - **AwaitingAuth** – read one text line, split off the 56-character
//!   challenge, and ask the [`CredentialVerifier`].  `OK` on success, `ERR`
//!   and close on failure.
//! - **Authenticated** – read the `u32` vector count.
//! - **ProcessingVectors** – for each vector read its `u32` length and payload,
//!   average it, and reply immediately.  Replies leave in the order the
//!   vectors arrived.
//!
//! The handler works on any `AsyncRead + AsyncWrite` stream, so tests drive
//! it with scripted in-memory streams instead of sockets.  Closing the
//! transport is the caller's job.
//!
//! # Errors
//!
//! Every phase returns an explicit [`SessionError`].  Whatever the kind, the
//! client receives `ERR` (if the stream is still writable) and the error is
//! returned to the caller for logging.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::debug;

use vcalc_core::protocol::wire::{
    decode_values, encode_average_reply, validate_vector_length, AUTH_LINE_MAX,
    DEFAULT_MAX_VECTOR_BYTES, REPLY_ERR, REPLY_OK,
};
use vcalc_core::{
    AuthError, AuthRequest, CredentialLookup, CredentialVerifier, Journal, ProtocolError,
    VectorAverager,
};

/// Payload bytes read per step; also the largest up-front buffer reservation,
/// so a hostile length field cannot force a large allocation by itself.
const PAYLOAD_CHUNK: u64 = 64 * 1024;

/// Default time a connection may stay silent before it is dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-connection limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Largest accepted vector payload (`length × 4`), in bytes.
    pub max_vector_bytes: u64,
    /// Longest wait for the next bytes from the client.  `None` waits forever.
    pub idle_timeout: Option<Duration>,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_vector_bytes: DEFAULT_MAX_VECTOR_BYTES,
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
        }
    }
}

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingAuth,
    Authenticated,
    ProcessingVectors,
    Closed,
}

impl SessionState {
    /// Whether the machine may move from `self` to `next`.
    ///
    /// Vector processing is only reachable through `Authenticated`, and
    /// `Closed` is reachable from everywhere.
    pub fn permits(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (AwaitingAuth, Authenticated)
                | (Authenticated, ProcessingVectors)
                | (_, Closed)
        )
    }
}

/// How a connection ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The peer closed the connection before sending anything.
    PeerClosed,
    /// Authentication succeeded and every announced vector was answered.
    Completed { login: String, vectors: u32 },
}

/// The error taxonomy of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    Protocol,
    Transport,
}

/// Everything that can end a connection early.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("vector error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    #[error("client idle for more than {0:?}")]
    IdleTimeout(Duration),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Auth(_) => ErrorKind::Authentication,
            SessionError::Protocol(_) => ErrorKind::Protocol,
            SessionError::Transport(_) | SessionError::IdleTimeout(_) => ErrorKind::Transport,
        }
    }
}

/// Buffered stream plus the current state of one connection.
struct Session<S> {
    io: BufReader<S>,
    state: SessionState,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn new(stream: S) -> Self {
        Self {
            io: BufReader::new(stream),
            state: SessionState::AwaitingAuth,
        }
    }

    fn advance(&mut self, next: SessionState) {
        debug_assert!(
            self.state.permits(next),
            "illegal transition {:?} -> {next:?}",
            self.state
        );
        debug!("session state {:?} -> {next:?}", self.state);
        self.state = next;
    }
}

/// Drives the protocol for one connection at a time.
///
/// A single handler is shared (behind an `Arc`) by every connection task; it
/// holds only read-only collaborators.
pub struct ProtocolHandler {
    store: Arc<dyn CredentialLookup + Send + Sync>,
    verifier: CredentialVerifier,
    averager: VectorAverager,
    journal: Arc<dyn Journal>,
    limits: SessionLimits,
}

impl ProtocolHandler {
    pub fn new(
        store: Arc<dyn CredentialLookup + Send + Sync>,
        verifier: CredentialVerifier,
        averager: VectorAverager,
        journal: Arc<dyn Journal>,
        limits: SessionLimits,
    ) -> Self {
        Self {
            store,
            verifier,
            averager,
            journal,
            limits,
        }
    }

    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    /// Runs the whole protocol on `stream`.
    ///
    /// On error, `ERR` is written before returning; a failure to write it is
    /// ignored because the transport may already be gone.
    ///
    /// # Errors
    ///
    /// The [`SessionError`] that ended the connection.
    pub async fn handle<S>(&self, stream: &mut S) -> Result<SessionOutcome, SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut session = Session::new(stream);
        let result = self.run(&mut session).await;

        if let Err(err) = &result {
            if let Err(e) = session.io.write_all(REPLY_ERR).await {
                debug!("could not deliver ERR to client: {e}");
            }
            self.journal.error(&format!("Error sent to client: {err}"), false);
        }
        session.advance(SessionState::Closed);
        result
    }

    async fn run<S>(&self, session: &mut Session<S>) -> Result<SessionOutcome, SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let Some(login) = self.authenticate(session).await? else {
            self.journal.error("Client disconnected during authentication", false);
            return Ok(SessionOutcome::PeerClosed);
        };
        let vectors = self.process_vectors(session).await?;
        Ok(SessionOutcome::Completed { login, vectors })
    }

    // ── Authentication phase ──────────────────────────────────────────────────

    /// Returns the authenticated login, or `None` if the peer left silently.
    async fn authenticate<S>(
        &self,
        session: &mut Session<S>,
    ) -> Result<Option<String>, SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let Some(raw) = self.read_auth_line(session).await? else {
            return Ok(None);
        };
        let request = AuthRequest::from_bytes(&raw)?;

        if !self.verifier.verify(&request.login, &request.challenge, self.store.as_ref()) {
            return Err(AuthError::Rejected(request.login).into());
        }

        session.io.write_all(REPLY_OK).await?;
        self.journal.info(&format!("Client '{}' authenticated successfully", request.login));
        session.advance(SessionState::Authenticated);
        Ok(Some(request.login))
    }

    /// Reads up to [`AUTH_LINE_MAX`] bytes, stopping after the first `\n`.
    ///
    /// Each buffer fill gets its own idle timeout, so a client that keeps
    /// sending is never cut off however slowly the line arrives.
    async fn read_auth_line<S>(
        &self,
        session: &mut Session<S>,
    ) -> Result<Option<Vec<u8>>, SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut line = Vec::with_capacity(128);
        loop {
            let available = self.idle(session.io.fill_buf()).await??;
            if available.is_empty() {
                break;
            }
            let window = &available[..available.len().min(AUTH_LINE_MAX - line.len())];
            let (used, complete) = match window.iter().position(|&b| b == b'\n') {
                Some(i) => (i + 1, true),
                None => (window.len(), false),
            };
            line.extend_from_slice(&window[..used]);
            session.io.consume(used);

            if complete {
                return Ok(Some(line));
            }
            if line.len() >= AUTH_LINE_MAX {
                return Err(AuthError::LineTooLong.into());
            }
        }
        Ok((!line.is_empty()).then_some(line))
    }

    // ── Vector phase ──────────────────────────────────────────────────────────

    /// Answers every announced vector and returns how many there were.
    async fn process_vectors<S>(&self, session: &mut Session<S>) -> Result<u32, SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let count = self.read_u32(session, ProtocolError::MissingVectorCount).await?;
        session.advance(SessionState::ProcessingVectors);
        self.journal.info(&format!("Receiving {count} vectors"));

        for vector in 1..=count {
            let missing = ProtocolError::MissingVectorLength { vector };
            let length = self.read_u32(session, missing).await?;
            let bytes = validate_vector_length(vector, length, self.limits.max_vector_bytes)?;
            let payload = self.read_payload(session, vector, bytes).await?;
            let values = decode_values(&payload)?;

            let average = self.averager.average(&values);
            session.io.write_all(&encode_average_reply(average)).await?;
            self.journal.info(&format!("Processed vector {vector}, result: {average}"));
        }
        Ok(count)
    }

    /// Reads one big-endian `u32`; a short read becomes `missing`.
    async fn read_u32<S>(
        &self,
        session: &mut Session<S>,
        missing: ProtocolError,
    ) -> Result<u32, SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut raw = [0u8; 4];
        let mut filled = 0;
        while filled < raw.len() {
            match self.idle(session.io.read(&mut raw[filled..])).await?? {
                0 => return Err(missing.into()),
                n => filled += n,
            }
        }
        Ok(u32::from_be_bytes(raw))
    }

    /// Reads exactly `bytes` payload bytes, growing the buffer as data arrives.
    ///
    /// The buffer never runs more than [`PAYLOAD_CHUNK`] ahead of the bytes
    /// actually received.
    async fn read_payload<S>(
        &self,
        session: &mut Session<S>,
        vector: u32,
        bytes: u64,
    ) -> Result<Vec<u8>, SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut payload = Vec::with_capacity(bytes.min(PAYLOAD_CHUNK) as usize);
        let mut received: u64 = 0;
        while received < bytes {
            let start = payload.len();
            let want = (bytes - received).min(PAYLOAD_CHUNK) as usize;
            payload.resize(start + want, 0);
            let n = self.idle(session.io.read(&mut payload[start..])).await??;
            payload.truncate(start + n);
            if n == 0 {
                return Err(ProtocolError::TruncatedVector {
                    vector,
                    expected: bytes,
                    received,
                }
                .into());
            }
            received += n as u64;
        }
        Ok(payload)
    }

    /// Applies the idle timeout to a single read call.  Only the timeout
    /// itself becomes an error here; the inner I/O result is returned
    /// untouched.
    async fn idle<F, T>(&self, read: F) -> Result<io::Result<T>, SessionError>
    where
        F: Future<Output = io::Result<T>>,
    {
        match self.limits.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| SessionError::IdleTimeout(limit)),
            None => Ok(read.await),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
