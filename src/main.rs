//! Points ledger, quota gate and bulk request operations.
//!
//! Architecture:
//! - SeaORM for database access (SQLite)
//! - Axum for the HTTP API with rate limiting
//! - Tokio for async runtime

mod entity;
mod error;
mod plugins;
mod prelude;
mod state;
mod sv;
#[cfg(test)]
mod testing;

use std::env;

use tracing_subscriber::{
  EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{
  prelude::*,
  state::{AppState, Config},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
      "pointgate=debug,tower_http=debug,sea_orm=warn".into()
    }))
    .with(tracing_subscriber::fmt::layer())
    .init();

  let db_url = env::var("DATABASE_URL")
    .unwrap_or_else(|_| "sqlite:pointgate.db?mode=rwc".into());
  let config = Config::from_env()?;

  info!("Starting pointgate v{}", env!("CARGO_PKG_VERSION"));
  info!(
    "Gate mode {:?}, timeout {}, batches of {} x{}",
    config.gate_mode,
    humantime::format_duration(config.gate_timeout),
    config.batch_size,
    config.batch_concurrency
  );

  let app = Arc::new(AppState::connect(&db_url, config).await?);

  // prune per-user locks nobody holds
  let gc_app = app.clone();
  tokio::spawn(async move {
    let mut interval = time::interval(Duration::from_secs(60));
    loop {
      interval.tick().await;
      gc_app.gc_locks();
    }
  });

  plugins::App::new().register(plugins::server::Plugin).run(app).await;

  tokio::signal::ctrl_c().await.context("Failed to listen for ctrl-c")?;
  info!("Shutting down");

  Ok(())
}
