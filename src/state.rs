use std::env;

use crate::{
  prelude::*,
  sv::{
    self,
    gate::{GateMode, UserLocks},
    usage::Registry,
  },
};

#[derive(Debug, Clone)]
pub struct Config {
  pub port: u16,
  pub gate_mode: GateMode,
  /// Deadline for the per-kind usage fan-in of one gate check
  pub gate_timeout: Duration,
  pub batch_size: usize,
  pub batch_concurrency: usize,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      port: 3000,
      gate_mode: GateMode::Serialized,
      gate_timeout: Duration::from_secs(5),
      batch_size: 500,
      batch_concurrency: 4,
    }
  }
}

fn var<T: std::str::FromStr>(key: &str) -> anyhow::Result<Option<T>>
where
  T::Err: std::fmt::Display,
{
  match env::var(key) {
    Ok(raw) => raw
      .trim()
      .parse()
      .map(Some)
      .map_err(|err| anyhow::anyhow!("Invalid {key} `{raw}`: {err}")),
    Err(_) => Ok(None),
  }
}

impl Config {
  /// Reads overrides from the environment. Unset keys keep their defaults.
  pub fn from_env() -> anyhow::Result<Self> {
    let default = Self::default();

    let gate_timeout = match env::var("GATE_TIMEOUT") {
      Ok(raw) => humantime::parse_duration(raw.trim())
        .with_context(|| format!("Invalid GATE_TIMEOUT `{raw}`"))?,
      Err(_) => default.gate_timeout,
    };

    Ok(Self {
      port: var("PORT")?.unwrap_or(default.port),
      gate_mode: var("GATE_MODE")?.unwrap_or(default.gate_mode),
      gate_timeout,
      batch_size: var("BATCH_SIZE")?.unwrap_or(default.batch_size),
      batch_concurrency: var("BATCH_CONCURRENCY")?
        .unwrap_or(default.batch_concurrency),
    })
  }

  pub fn executor(&self) -> sv::BatchExecutor {
    sv::BatchExecutor::new(self.batch_size, self.batch_concurrency)
  }
}

pub struct Services<'a> {
  pub user: sv::User<'a>,
  pub ledger: sv::Ledger<'a>,
  pub gate: sv::Gate<'a>,
  pub lifecycle: sv::Lifecycle<'a>,
  pub bulk: sv::Bulk<'a>,
}

pub struct AppState {
  pub db: DatabaseConnection,
  pub config: Config,
  pub registry: Registry,
  pub locks: UserLocks,
}

impl AppState {
  pub async fn connect(db_url: &str, config: Config) -> anyhow::Result<Self> {
    info!("Connecting to database...");
    let db = Database::connect(db_url)
      .await
      .context("Failed to connect to database")?;

    info!("Running migrations...");
    migration::Migrator::up(&db, None)
      .await
      .context("Failed to run migrations")?;

    Ok(Self::from_db(db, config))
  }

  pub fn from_db(db: DatabaseConnection, config: Config) -> Self {
    Self { db, config, registry: Registry::standard(), locks: UserLocks::new() }
  }

  fn gate(&self) -> sv::Gate<'_> {
    sv::Gate::new(&self.db, &self.registry, self.config.gate_timeout)
  }

  pub fn sv(&self) -> Services<'_> {
    Services {
      user: sv::User::new(&self.db),
      ledger: sv::Ledger::new(&self.db),
      gate: self.gate(),
      lifecycle: sv::Lifecycle::new(
        &self.db,
        &self.registry,
        self.gate(),
        &self.locks,
        self.config.gate_mode,
      ),
      bulk: sv::Bulk::new(&self.db, self.config.executor()),
    }
  }

  pub fn gc_locks(&self) {
    let before = self.locks.len();
    self.locks.gc();
    debug!("Lock gc: {} -> {} user locks", before, self.locks.len());
  }
}
