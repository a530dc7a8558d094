//! rollcall server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store, and serves the JSON API under `/api`.
//!
//! # Bootstrapping
//!
//! A fresh database has no users, so nobody can log in. Create the first
//! administrator with:
//!
//! ```text
//! rollcall-server --add-admin a1 --display-name "Registrar"
//! ```
//!
//! The password is read from stdin.

mod settings;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use axum::Router;
use clap::Parser;
use rollcall_api::{AppState, api_router, auth::hash_password};
use rollcall_core::identity::{NewUser, Role, RosterIdentity, UserDirectory};
use rollcall_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

use crate::settings::ServerConfig;

#[derive(Parser)]
#[command(author, version, about = "rollcall attendance server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,

  /// Create an administrator with this user id, then exit.
  #[arg(long, value_name = "USER_ID", conflicts_with = "hash_password")]
  add_admin: Option<String>,

  /// Display name for `--add-admin`.
  #[arg(long, requires = "add_admin")]
  display_name: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_password {
    let password = read_password()?;
    let hash = hash_password(&password).map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?;
    println!("{hash}");
    return Ok(());
  }

  let cfg = ServerConfig::load(&cli.config)?;

  let store_path = cfg.resolved_store_path();
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  if let Some(user_id) = cli.add_admin {
    let display_name = cli.display_name.unwrap_or_else(|| user_id.clone());
    return add_admin(&store, user_id, display_name).await;
  }

  let admins = store
    .list_users(Some(Role::Admin))
    .await
    .context("failed to list users")?;
  if admins.is_empty() {
    warn!("no administrator exists; create one with --add-admin");
  }

  let state = AppState::new(Arc::new(store))
    .with_cooldown(cfg.scan_cooldown())
    .with_session_idle(cfg.session_idle());

  // Reclaim scan sessions abandoned by their clients.
  let pruner = state.clone();
  tokio::spawn(async move {
    let mut tick = tokio::time::interval(Duration::from_secs(60));
    loop {
      tick.tick().await;
      let pruned = pruner.prune_sessions();
      if pruned > 0 {
        debug!(pruned, "expired scan sessions dropped");
      }
    }
  });
  let app = Router::new()
    .nest("/api", api_router(state))
    .layer(TraceLayer::new_for_http());

  let address = cfg.address();
  info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

async fn add_admin(
  store: &SqliteStore,
  user_id: String,
  display_name: String,
) -> anyhow::Result<()> {
  if user_id.is_empty() || user_id.contains(':') {
    anyhow::bail!("user id must be non-empty and contain no ':'");
  }
  let password = read_password()?;
  if password.is_empty() {
    anyhow::bail!("password must not be empty");
  }
  let hash = hash_password(&password).map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?;

  let identity = store
    .add_user(NewUser {
      identity:      RosterIdentity {
        user_id,
        display_name,
        role: Role::Admin,
        department: None,
        semester: None,
      },
      password_hash: Some(hash),
    })
    .await
    .context("failed to add administrator")?;

  info!(user = %identity.user_id, "administrator created");
  Ok(())
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}
