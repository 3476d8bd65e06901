//! vcalc server entry point.
//!
//! Authenticates TCP clients with a salted SHA-1 challenge and answers every
//! integer vector they send with its clamped arithmetic mean.
//!
//! # Usage
//!
//! ```text
//! vcalc-server [OPTIONS]
//!
//! Options:
//!   -p, --port <PORT>             Listening port [default: 33333]
//!   -f, --file <PATH>             Credential database [default: /etc/vcalc.conf]
//!   -l, --log <PATH>              Journal file [default: /var/log/vcalc.log]
//!   -c, --config <PATH>           Optional TOML configuration file
//!       --bind <ADDR>             Bind address [default: 0.0.0.0]
//!       --idle-timeout <SECS>     Per-read idle timeout, 0 disables [default: 30]
//!       --max-connections <N>     Concurrent session limit [default: 64]
//! ```
//!
//! Values are resolved flag/env first, then the TOML file, then the built-in
//! defaults.
//!
//! # Startup order
//!
//! ```text
//! main()
//!  └─ resolve ServerConfig      -- CLI, env, TOML, defaults
//!  └─ FileJournal::open         -- fatal if the journal cannot be opened
//!  └─ load_credentials          -- fatal if unreadable or empty
//!  └─ ConnectionAcceptor::new   -- fatal if the port is out of range
//!  └─ ConnectionAcceptor::run   -- fatal if the bind fails
//! ```
//!
//! Ctrl+C stops the accept loop; `run` then waits up to
//! `limits.shutdown_grace_secs` for open sessions before `main` returns.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vcalc_core::{CredentialVerifier, Journal, VectorAverager};
use vcalc_server::application::protocol_handler::ProtocolHandler;
use vcalc_server::infrastructure::journal::FileJournal;
use vcalc_server::infrastructure::network::acceptor::ConnectionAcceptor;
use vcalc_server::infrastructure::storage::config::{load_config, ServerConfig};
use vcalc_server::infrastructure::storage::credentials::load_credentials;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Vector averaging server.
///
/// Every option left unset falls back to the configuration file (if given)
/// and then to the built-in default.
#[derive(Debug, Default, Parser)]
#[command(
    name = "vcalc-server",
    about = "Authenticating TCP server that averages integer vectors",
    version
)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "VCALC_CONFIG")]
    config: Option<PathBuf>,

    /// TCP port to listen on (1024-49151).
    #[arg(short, long, env = "VCALC_PORT")]
    port: Option<u16>,

    /// Credential database, one `login:secret` per line.
    #[arg(short = 'f', long = "file", env = "VCALC_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// Journal file, opened for appending.
    #[arg(short, long, env = "VCALC_LOG")]
    log: Option<PathBuf>,

    /// IP address to bind to.
    #[arg(long, env = "VCALC_BIND")]
    bind: Option<String>,

    /// Seconds a client may stay silent before it is dropped; 0 disables.
    #[arg(long)]
    idle_timeout: Option<u64>,

    /// Maximum number of sessions served at once.
    #[arg(long)]
    max_connections: Option<usize>,
}

impl Cli {
    /// Resolves the final [`ServerConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read or parsed,
    /// or if the merged configuration is invalid.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load configuration {}", path.display()))?,
            None => ServerConfig::default(),
        };

        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(bind) = self.bind {
            config.network.bind_address = bind;
        }
        if let Some(credentials) = self.credentials {
            config.paths.credentials = credentials;
        }
        if let Some(log) = self.log {
            config.paths.log = log;
        }
        if let Some(secs) = self.idle_timeout {
            config.limits.idle_timeout_secs = secs;
        }
        if let Some(n) = self.max_connections {
            config.limits.max_connections = n;
        }

        config.validate().context("invalid server configuration")?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_server_config()?;

    let journal: Arc<dyn Journal> = Arc::new(
        FileJournal::open(&config.paths.log)
            .with_context(|| format!("cannot open journal {}", config.paths.log.display()))?,
    );
    journal.info("Server configuration parsing completed");

    let store = load_credentials(&config.paths.credentials, journal.as_ref())
        .context("failed to load credential database")?;

    let handler = Arc::new(ProtocolHandler::new(
        Arc::new(store),
        CredentialVerifier::new(Arc::clone(&journal)),
        VectorAverager::new(Arc::clone(&journal)),
        Arc::clone(&journal),
        config.session_limits(),
    ));
    journal.info("Verifier and averager initialized");

    let acceptor = ConnectionAcceptor::new(
        config.bind_ip()?,
        config.network.port,
        config.limits.max_connections,
        handler,
        Arc::clone(&journal),
    )
    .context("cannot start server")?
    .with_shutdown_grace(config.shutdown_grace());

    info!("vcalc server starting on {}", acceptor.addr());

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; stopping accept loop");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    acceptor.run(running).await.context("server stopped")?;

    journal.info("Server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
