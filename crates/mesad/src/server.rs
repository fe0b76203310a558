//! HTTP server assembly for mesad.

use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::MesaConfig;
use crate::db::MenuDb;
use crate::llm::OllamaClient;
use crate::media::MediaStore;
use crate::nlu::{NluBackend, OllamaNlu, RegexNlu};
use crate::routes;
use crate::speech::{CommandSpeech, SpeechService};

/// Application state shared across handlers. Built once at startup and
/// passed by reference into every request handler - no process globals.
pub struct AppState {
    pub config: MesaConfig,
    pub db: Arc<MenuDb>,
    pub nlu: Arc<dyn NluBackend>,
    pub speech: Option<Arc<dyn SpeechService>>,
    pub media: MediaStore,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: MesaConfig, db: Arc<MenuDb>) -> Self {
        let nlu: Arc<dyn NluBackend> = if config.llm.enabled {
            Arc::new(OllamaNlu::new(OllamaClient::new(
                &config.llm.base_url,
                &config.llm.model,
                config.llm.dispatch_timeout_secs,
            )))
        } else {
            info!("LLM disabled; running with the deterministic NLU only");
            Arc::new(RegexNlu)
        };

        let media = MediaStore::new(&config.database.media_dir);

        let speech: Option<Arc<dyn SpeechService>> = if config.speech.enabled {
            Some(Arc::new(CommandSpeech::new(
                config.speech.clone(),
                media.dir(),
            )))
        } else {
            info!("Speech disabled; responses will be text-only");
            None
        };

        Self {
            config,
            db,
            nlu,
            speech,
            media,
            start_time: Instant::now(),
        }
    }
}

/// Run the HTTP server until shutdown.
pub async fn run(state: AppState) -> Result<()> {
    let bind = state.config.http.bind.clone();
    let state = Arc::new(state);

    let app = Router::new()
        .merge(routes::catalog_routes())
        .merge(routes::order_routes())
        .merge(routes::agent_routes())
        .merge(routes::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("Listening on http://{bind}");

    axum::serve(listener, app).await?;
    Ok(())
}
