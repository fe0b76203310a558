//! Mesa Daemon - restaurant ordering backend.
//!
//! Serves the catalog, persists confirmed orders, and answers the
//! conversational endpoint.

use anyhow::Result;
use mesad::config::MesaConfig;
use mesad::db::MenuDb;
use mesad::server::{self, AppState};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("mesad v{} starting", env!("CARGO_PKG_VERSION"));

    let config = MesaConfig::load();
    let db = Arc::new(MenuDb::open(&config.database.path).await?);
    info!("Menu database ready at {}", db.path().display());

    let state = AppState::new(config, db);
    server::run(state).await
}
