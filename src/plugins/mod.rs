pub mod server;

use std::sync::Arc;

use crate::{prelude::*, state::AppState};

#[async_trait]
pub trait Plugin: Send + Sync {
  fn name(&self) -> &'static str {
    std::any::type_name::<Self>()
  }

  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()>;
}

/// Supervises long-running services and restarts them when they stop.
pub struct App {
  plugins: Vec<Arc<dyn Plugin>>,
  backoff: Duration,
}

impl App {
  pub fn new() -> Self {
    Self { plugins: Vec::new(), backoff: Duration::from_secs(5) }
  }

  pub fn register<P: Plugin + 'static>(mut self, plugin: P) -> Self {
    self.plugins.push(Arc::new(plugin));
    self
  }

  pub async fn run(self, app: Arc<AppState>) {
    let backoff = self.backoff;

    for plugin in self.plugins {
      let app = app.clone();

      tokio::spawn(async move {
        let name = plugin.name();
        info!("SYSTEM: Service `{}` initialized", name);

        loop {
          let app = app.clone();
          let plugin = plugin.clone();

          let handle = tokio::spawn(async move { plugin.start(app).await });

          match handle.await {
            Ok(Ok(())) => warn!("Service `{name}` stopped unexpectedly (Ok)."),
            Ok(Err(err)) => error!("Service `{name}` crashed with error: {err:#}."),
            Err(err) if err.is_cancelled() => {
              info!("Service `{}` shutdown.", name);
              break;
            }
            Err(_) => error!("Service `{}` PANICKED!", name),
          }

          time::sleep(backoff).await;
          info!("SYSTEM: Restarting service `{}`...", name);
        }
      });
    }
  }
}
