//! API routes for mesad.
//!
//! Catalog CRUD and order persistence are plain request/response
//! plumbing; /agent is the conversational entry point that runs the
//! dispatch-and-normalize pipeline.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use mesa_common::error::MesaError;
use mesa_common::order::{DispatchContext, PersistedOrder};
use mesa_common::AgentResponse;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

use crate::db::{Catalog, CatalogKind};
use crate::dispatcher;
use crate::normalizer;
use crate::server::AppState;

type AppStateArc = Arc<AppState>;

/// Map pipeline errors onto HTTP statuses. Upstream details stay in the
/// log; the caller gets a generic service error.
fn http_error(e: MesaError) -> (StatusCode, String) {
    match e {
        MesaError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
        MesaError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        MesaError::Timeout(secs) => (
            StatusCode::GATEWAY_TIMEOUT,
            format!("The assistant took longer than {secs}s. Please try again."),
        ),
        other => {
            error!("Request failed: {other}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Service error. Please try again.".to_string(),
            )
        }
    }
}

// ============================================================================
// Catalog Routes
// ============================================================================

pub fn catalog_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/products", post(add_product).get(list_products))
        .route("/products/:id", get(get_product))
        .route("/deals", post(add_deal).get(list_deals))
        .route("/media/:file", get(get_media))
}

#[derive(Debug, Serialize)]
struct AckResponse {
    success: bool,
    message: String,
}

/// Shared multipart reader for product/deal submissions.
async fn read_catalog_form(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<(String, f64, String, String, String), MesaError> {
    let mut name = None;
    let mut price = None;
    let mut category = None;
    let mut description = String::new();
    let mut image_url = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| MesaError::Validation(format!("bad multipart body: {e}")))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" => name = Some(read_text(field).await?),
            "price" => {
                let raw = read_text(field).await?;
                let parsed: f64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| MesaError::Validation(format!("bad price: {raw}")))?;
                price = Some(parsed);
            }
            "category" => category = Some(read_text(field).await?),
            "description" => description = read_text(field).await?,
            "image" => {
                let file_name = field.file_name().unwrap_or("upload.bin").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| MesaError::Validation(format!("bad image field: {e}")))?;
                image_url = state.media.save_image(&file_name, &bytes).await?;
            }
            _ => {}
        }
    }

    let name = name.ok_or_else(|| MesaError::Validation("missing name".into()))?;
    let price = price.ok_or_else(|| MesaError::Validation("missing price".into()))?;
    let category = category.ok_or_else(|| MesaError::Validation("missing category".into()))?;
    Ok((name, price, category, description, image_url))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, MesaError> {
    field
        .text()
        .await
        .map_err(|e| MesaError::Validation(format!("bad text field: {e}")))
}

async fn add_catalog_item(
    state: &AppState,
    kind: CatalogKind,
    multipart: Multipart,
) -> Result<Json<AckResponse>, (StatusCode, String)> {
    let (name, price, category, description, image) = read_catalog_form(state, multipart)
        .await
        .map_err(http_error)?;
    state
        .db
        .add_item(kind, &name, price, &category, &description, &image)
        .await
        .map_err(http_error)?;
    info!("Added {kind:?} '{name}' at {price}");
    let noun = match kind {
        CatalogKind::Product => "Product",
        CatalogKind::Deal => "Deal",
    };
    Ok(Json(AckResponse {
        success: true,
        message: format!("{noun} added successfully"),
    }))
}

async fn add_product(
    State(state): State<AppStateArc>,
    multipart: Multipart,
) -> Result<Json<AckResponse>, (StatusCode, String)> {
    add_catalog_item(&state, CatalogKind::Product, multipart).await
}

async fn add_deal(
    State(state): State<AppStateArc>,
    multipart: Multipart,
) -> Result<Json<AckResponse>, (StatusCode, String)> {
    add_catalog_item(&state, CatalogKind::Deal, multipart).await
}

async fn list_products(
    State(state): State<AppStateArc>,
) -> Result<Json<BTreeMap<String, Vec<mesa_common::Product>>>, (StatusCode, String)> {
    let menu = state
        .db
        .list_by_category(CatalogKind::Product)
        .await
        .map_err(http_error)?;
    Ok(Json(menu))
}

async fn list_deals(
    State(state): State<AppStateArc>,
) -> Result<Json<BTreeMap<String, Vec<mesa_common::Product>>>, (StatusCode, String)> {
    let deals = state
        .db
        .list_by_category(CatalogKind::Deal)
        .await
        .map_err(http_error)?;
    Ok(Json(deals))
}

async fn get_product(
    State(state): State<AppStateArc>,
    Path(id): Path<String>,
) -> Result<Json<mesa_common::Product>, (StatusCode, String)> {
    let product = state
        .db
        .get_item(CatalogKind::Product, &id)
        .await
        .map_err(http_error)?;
    Ok(Json(product))
}

async fn get_media(
    State(state): State<AppStateArc>,
    Path(file): Path<String>,
) -> Result<Response, (StatusCode, String)> {
    serve_asset(&state, &file).await
}

// ============================================================================
// Order Routes
// ============================================================================

pub fn order_routes() -> Router<AppStateArc> {
    Router::new().route("/orders", post(create_order).get(list_orders))
}

async fn create_order(
    State(state): State<AppStateArc>,
    Json(order): Json<PersistedOrder>,
) -> Result<Json<AckResponse>, (StatusCode, String)> {
    use crate::db::OrderStore;
    if order.items.is_empty() {
        return Err(http_error(MesaError::Validation(
            "order has no items".into(),
        )));
    }
    state.db.save_order(&order).await.map_err(http_error)?;
    Ok(Json(AckResponse {
        success: true,
        message: "Order submitted successfully".to_string(),
    }))
}

async fn list_orders(
    State(state): State<AppStateArc>,
) -> Result<Json<Vec<PersistedOrder>>, (StatusCode, String)> {
    let orders = state.db.list_orders().await.map_err(http_error)?;
    Ok(Json(orders))
}

// ============================================================================
// Agent Routes
// ============================================================================

pub fn agent_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/agent", post(ask_agent))
        .route("/agent-audio", get(get_agent_audio))
}

/// The conversational endpoint. Audio, when present, takes precedence
/// and produces the effective utterance; the optional order_summary field
/// threads the cross-turn context through.
async fn ask_agent(
    State(state): State<AppStateArc>,
    mut multipart: Multipart,
) -> Result<Json<AgentResponse>, (StatusCode, String)> {
    let mut question: Option<String> = None;
    let mut audio: Option<Vec<u8>> = None;
    let mut order_summary: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| http_error(MesaError::Validation(format!("bad multipart body: {e}"))))?
    {
        match field.name().unwrap_or_default() {
            "question" => question = Some(read_text(field).await.map_err(http_error)?),
            "audio" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| http_error(MesaError::Validation(format!("bad audio: {e}"))))?;
                audio = Some(bytes.to_vec());
            }
            "order_summary" => {
                order_summary = Some(read_text(field).await.map_err(http_error)?)
            }
            _ => {}
        }
    }

    let question = match audio {
        Some(clip) if !clip.is_empty() => {
            let speech = state.speech.as_deref().ok_or_else(|| {
                http_error(MesaError::Upstream("transcription is not available".into()))
            })?;
            Some(speech.transcribe(&clip).await.map_err(http_error)?)
        }
        _ => question,
    };
    let question = question.filter(|q| !q.trim().is_empty()).ok_or_else(|| {
        http_error(MesaError::Validation("No question or audio provided.".into()))
    })?;

    let context = DispatchContext::from_form_field(order_summary.as_deref()).map_err(http_error)?;

    let catalog: &dyn Catalog = state.db.as_ref();
    let raw = dispatcher::dispatch(
        state.nlu.as_ref(),
        catalog,
        state.db.as_ref(),
        &question,
        &context,
    )
    .await
    .map_err(http_error)?;

    let response = normalizer::normalize(
        &raw,
        &question,
        &context,
        state.db.as_ref(),
        state.speech.as_deref(),
    )
    .await;

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct AudioQuery {
    file: String,
}

async fn get_agent_audio(
    State(state): State<AppStateArc>,
    Query(query): Query<AudioQuery>,
) -> Result<Response, (StatusCode, String)> {
    serve_asset(&state, &query.file).await
}

async fn serve_asset(state: &AppState, name: &str) -> Result<Response, (StatusCode, String)> {
    let path = state.media.resolve(name).map_err(http_error)?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| http_error(MesaError::Upstream(format!("read asset: {e}"))))?;

    let mime = match path.extension().and_then(|e| e.to_str()) {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    };
    Ok(([(header::CONTENT_TYPE, mime)], bytes).into_response())
}

// ============================================================================
// Health Routes
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/health", get(health_check))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
    products_available: usize,
}

async fn health_check(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    let products_available = state
        .db
        .all_products()
        .await
        .map(|p| p.len())
        .unwrap_or(0);

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        products_available,
    })
}
