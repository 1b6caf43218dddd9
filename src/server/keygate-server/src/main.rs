//! Keygate Server - Main entry point.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use base64::{engine::general_purpose::STANDARD, Engine};
use clap::Parser;
use keygate_api::{router, ApiState};
use keygate_auth::{AuthFlows, IdentityClient, KeystoneClient, SessionCodec};
use keygate_storage::{MemoryRevocationStore, RevocationStore};
use keygate_storage_sqlite::SqliteRevocationStore;
use rand::{rngs::OsRng, RngCore};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zeroize::Zeroizing;

use crate::config::Config;

/// Minimum length of the session signing secret, in bytes.
const MIN_SECRET_LEN: usize = 32;

#[derive(Parser)]
#[command(name = "keygate-server")]
#[command(about = "Keygate - session gateway for OpenStack Keystone")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/keygate.toml")]
    config: PathBuf,

    /// Enable development mode (generated secret key, in-memory revocations)
    #[arg(long, env = "KEYGATE_DEV_MODE")]
    dev: bool,

    /// Server bind address
    #[arg(long, default_value = "0.0.0.0:9999", env = "KEYGATE_BIND_ADDRESS")]
    bind: String,

    /// Data directory, overrides `storage.data_dir`
    #[arg(long, env = "KEYGATE_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    tracing::info!("Starting Keygate server...");

    let mut config = Config::load(&cli.config)?;
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }

    if cli.dev {
        tracing::warn!("Development mode enabled - DO NOT USE IN PRODUCTION");
    }

    let secret = session_secret(&config, cli.dev)?;
    let revocations = revocation_store(&config, cli.dev).await?;

    let identity: Arc<dyn IdentityClient> = Arc::new(
        KeystoneClient::new(config.keystone_config()).context("Failed to build Keystone client")?,
    );
    tracing::info!(
        identity = identity.name(),
        auth_url = %config.keystone.auth_url,
        revocations = revocations.name(),
        "Backends ready"
    );

    let flows = AuthFlows::new(
        identity,
        revocations,
        SessionCodec::new(&secret),
        Arc::new(config.auth_settings()),
    );
    let state = ApiState::new(flows, config.cookie_settings(), config.sso_settings());
    let app = router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&cli.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cli.bind))?;
    tracing::info!("Bind address: {}", listener.local_addr()?);

    tracing::info!("Keygate server started successfully");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Shutting down...");

    Ok(())
}

/// Resolves the session signing secret.
///
/// Dev mode generates a random one when none is configured.
fn session_secret(config: &Config, dev: bool) -> anyhow::Result<Zeroizing<Vec<u8>>> {
    match config.session.secret_key.as_deref() {
        Some(key) if key.len() >= MIN_SECRET_LEN => Ok(Zeroizing::new(key.as_bytes().to_vec())),
        Some(_) => bail!("session.secret_key must be at least {MIN_SECRET_LEN} bytes"),
        None if dev => {
            let mut bytes = Zeroizing::new([0u8; MIN_SECRET_LEN]);
            OsRng.fill_bytes(&mut *bytes);
            let key = Zeroizing::new(STANDARD.encode(&bytes[..]));
            tracing::warn!("No session.secret_key configured, sessions will not survive a restart");
            Ok(Zeroizing::new(key.as_bytes().to_vec()))
        },
        None => bail!("session.secret_key is required outside development mode"),
    }
}

/// Opens the revocation store and drops expired entries.
async fn revocation_store(config: &Config, dev: bool) -> anyhow::Result<Arc<dyn RevocationStore>> {
    let store: Arc<dyn RevocationStore> = if dev {
        Arc::new(MemoryRevocationStore::new())
    } else {
        std::fs::create_dir_all(&config.storage.data_dir).with_context(|| {
            format!(
                "Failed to create data directory: {}",
                config.storage.data_dir.display()
            )
        })?;
        Arc::new(
            SqliteRevocationStore::open(&config.storage.data_dir, "sessions")
                .await
                .context("Failed to open revocation store")?,
        )
    };

    let purged = store
        .purge_expired(keygate_auth::unix_now())
        .await
        .context("Failed to purge expired revocations")?;
    if purged > 0 {
        tracing::info!(purged, "Purged expired revocations");
    }

    Ok(store)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
