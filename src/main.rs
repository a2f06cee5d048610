use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use termgw::activity::MemoryActivityStore;
use termgw::api::{router, AppState};
use termgw::config::{check_config_permissions, AuthConfig, GatewayConfig};
use termgw::session::StaticCredentials;
use termgw::terminal::TerminalPool;

/// Web gateway for a pool of modem-backed terminal sessions.
#[derive(Debug, Parser)]
#[command(name = "termgw", version, about)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, env = "TERMGW_CONFIG", default_value = "termgw.toml")]
    config: PathBuf,

    /// Address to bind the HTTP server. Overrides the config file.
    #[arg(short, long, env = "TERMGW_BIND")]
    bind: Option<SocketAddr>,

    /// Mount root path prefix, e.g. /sms. Overrides the config file.
    #[arg(long, env = "TERMGW_ROOT")]
    root: Option<String>,

    /// Hide internal error detail from 500 responses.
    #[arg(long, env = "TERMGW_PRODUCTION")]
    production: bool,

    /// Gateway log file, appended to and served by GET /activity-log.
    #[arg(long, env = "TERMGW_LOG_FILE")]
    log_file: Option<PathBuf>,
}

/// Initialize tracing to stdout, and additionally to the gateway log file
/// when one is configured (that file is what `GET /activity-log` serves).
fn init_tracing(log_file: Option<&Path>) {
    let file_layer = log_file.and_then(|path| {
        match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            ),
            Err(err) => {
                eprintln!("termgw: cannot open log file {}: {}", path.display(), err);
                None
            }
        }
    });

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "termgw=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
}

/// Credentials for the login endpoint. When the config carries no `[auth]`
/// section, generate a one-off admin password and print it to stderr so the
/// gateway never starts wide open.
fn resolve_credentials(auth: Option<AuthConfig>) -> StaticCredentials {
    match auth {
        Some(auth) => StaticCredentials::new(auth.username, auth.password),
        None => {
            let password: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(24)
                .map(char::from)
                .collect();
            eprintln!("termgw: no credentials configured; one-off login is admin / {password}");
            StaticCredentials::new("admin", password)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = GatewayConfig::load(&cli.config)?;
    let config_found = loaded.is_some();
    let mut config = loaded.unwrap_or_default();
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(root) = cli.root {
        config.root = root;
    }
    if let Some(log_file) = cli.log_file {
        config.log_file = Some(log_file);
    }
    config.production |= cli.production;

    init_tracing(config.log_file.as_deref());
    if config_found {
        // The config file may hold credentials; warn if others can read it.
        check_config_permissions(&cli.config);
    } else {
        tracing::info!("no config file at {}, using defaults", cli.config.display());
    }

    let credentials = resolve_credentials(config.auth.take());

    let state = AppState::new(
        &config,
        Arc::new(TerminalPool::new()),
        Arc::new(MemoryActivityStore::new()),
        Arc::new(credentials),
    );
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    tracing::info!(addr = %config.bind, root = %config.root, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to install ctrl-c handler");
        return;
    }
    tracing::info!("shutting down");
}
