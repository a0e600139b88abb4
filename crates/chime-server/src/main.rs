//! chime server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store and either serves the HTTP API alongside the scheduler loop, or runs
//! a single scheduler cycle and exits.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use chime_engine::Engine;
use chime_gateway::SmsGateway;
use chime_server::ServerConfig;
use chime_store_sqlite::SqliteStore;
use clap::{Parser, Subcommand};
use tokio::{net::TcpListener, sync::watch};
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

type AppEngine = Engine<SqliteStore, SmsGateway>;

#[derive(Parser)]
#[command(author, version, about = "Chime notification server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
  /// Serve the HTTP API and run the scheduler loop (default).
  Serve,
  /// Run one scheduler cycle and exit.
  Trigger,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let server_cfg =
    ServerConfig::load(&cli.config).context("failed to load configuration")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let gateway =
    SmsGateway::new(server_cfg.gateway.clone()).context("failed to configure gateway")?;

  let engine = Arc::new(Engine::new(
    Arc::new(store),
    Arc::new(gateway),
    server_cfg.engine_config(),
  ));

  match cli.command.unwrap_or(Command::Serve) {
    Command::Trigger => {
      let report = engine
        .trigger_due_notifications()
        .await
        .context("failed to trigger due notifications")?;
      tracing::info!(?report, "trigger finished");
      Ok(())
    }
    Command::Serve => serve(engine, &server_cfg).await,
  }
}

async fn serve(engine: Arc<AppEngine>, server_cfg: &ServerConfig) -> anyhow::Result<()> {
  let (stop_tx, mut stop_rx) = watch::channel(false);

  let scheduler = tokio::spawn({
    let engine = engine.clone();
    async move {
      engine
        .run_until(async move {
          // A closed channel also means stop.
          let _ = stop_rx.wait_for(|stop| *stop).await;
        })
        .await;
    }
  });

  let app = chime_api::api_router(engine).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  let _ = stop_tx.send(true);
  scheduler.await.context("scheduler task failed")?;
  Ok(())
}

async fn shutdown_signal() {
  match tokio::signal::ctrl_c().await {
    Ok(()) => tracing::info!("shutdown requested"),
    Err(err) => {
      tracing::error!(error = %err, "cannot listen for ctrl-c; running until killed");
      std::future::pending::<()>().await;
    }
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
