mod handlers;
mod identity;

use std::{net::SocketAddr, sync::Arc};

use axum::{
  Router,
  routing::{get, patch, post},
};
use tower::ServiceBuilder;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};

use crate::{prelude::*, state::AppState};

pub struct Plugin;

fn routes() -> Router<Arc<AppState>> {
  Router::new()
    .route("/health", get(handlers::health))
    .route("/api/points", get(handlers::points))
    .route("/api/ledger", get(handlers::ledger))
    .route("/api/gate/check", post(handlers::gate_check))
    .route("/api/requests/{kind}/{id}/submit", post(handlers::submit))
    .route("/api/requests/{kind}/{id}/status", post(handlers::transition))
    .route("/api/requests/{kind}/{id}/cost", patch(handlers::update_cost))
    .route("/api/requests/{kind}/delete", post(handlers::bulk_delete))
    .route("/api/requests/{kind}/status", post(handlers::bulk_status))
    .route("/api/users/{id}/credit", post(handlers::credit))
    .route("/api/users/{id}/debit", post(handlers::debit))
    .route("/api/users/{id}/extend", post(handlers::extend))
    .route("/api/users/{id}/ban", post(handlers::ban))
}

#[async_trait]
impl super::Plugin for Plugin {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let governor_conf = Arc::new(
      GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(100)
        .finish()
        .context("Failed to build rate limiter config")?,
    );

    let limiter = governor_conf.limiter().clone();
    let port = app.config.port;

    let router = routes()
      .layer(
        ServiceBuilder::new()
          .layer(TraceLayer::new_for_http())
          .layer(GovernorLayer::new(governor_conf))
          .layer(
            CorsLayer::new()
              .allow_origin(Any)
              .allow_methods(Any)
              .allow_headers(Any),
          ),
      )
      .with_state(app)
      .into_make_service_with_connect_info::<SocketAddr>();

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
      .await
      .with_context(|| format!("Failed to bind {addr}"))?;
    info!("HTTP Server listening on {addr}");

    let limiter = async {
      loop {
        time::sleep(Duration::from_secs(60)).await;
        limiter.retain_recent();
      }
    };

    let server = async {
      axum::serve(listener, router).await.context("Axum server error")
    };

    tokio::select! {
      result = server => {
        match &result {
          Ok(_) => info!("Server stopped gracefully"),
          Err(err) => error!("Server stopped with error: {err}"),
        }
        result
      }
      _ = limiter => {
        error!("Rate limiter cleaner stopped unexpectedly!");
        Ok(())
      }
    }
  }
}
