use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::{HeaderMap, HeaderValue, StatusCode}, routing::{get, post}, Json, Router};
use blockdex_core::{DocId, IndexError, IndexPaths, Searcher};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f64,
    pub url: Option<String>,
}

type ApiError = (StatusCode, String);

#[derive(Clone)]
pub struct AppState {
    pub index_paths: IndexPaths,
    /// Swapped wholesale on reload; in-flight queries keep the old one.
    pub searcher: Arc<RwLock<Arc<Searcher>>>,
    pub admin_token: Option<String>,
}

impl AppState {
    fn current(&self) -> Arc<Searcher> {
        self.searcher.read().clone()
    }
}

/// Settings that do not come from the index itself.
#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    /// Required in `x-admin-token` by `/index/reload`; reload is disabled when unset.
    pub admin_token: Option<String>,
    /// Allowed CORS origins; empty allows any.
    pub allowed_origins: Vec<String>,
}

pub fn build_app(index_dir: impl Into<PathBuf>) -> Result<Router> {
    build_app_with(index_dir, ServerOptions::default())
}

/// Open the index and wire the routes. Fails on a missing or inconsistent index.
pub fn build_app_with(index_dir: impl Into<PathBuf>, options: ServerOptions) -> Result<Router> {
    let index_paths = IndexPaths::new(index_dir.into());
    let searcher = Searcher::open(&index_paths)?;
    let cors = cors_layer(&options.allowed_origins);
    let app_state = AppState {
        index_paths,
        searcher: Arc::new(RwLock::new(Arc::new(searcher))),
        admin_token: options.admin_token,
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/index/reload", post(reload_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.trim().parse().ok()).collect();
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if parsed.is_empty() {
        layer.allow_origin(Any)
    } else {
        tracing::debug!(origins = parsed.len(), "restricting CORS origins");
        layer.allow_origin(AllowOrigin::list(parsed))
    }
}

fn index_error(err: IndexError) -> ApiError {
    tracing::error!(error = %err, "query failed");
    let status = if err.is_index_state() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, err.to_string())
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let searcher = state.current();
    // Lookups seek and read the merged index; keep them off the async workers.
    let ranked = {
        let searcher = Arc::clone(&searcher);
        let query = params.q.clone();
        tokio::task::spawn_blocking(move || searcher.search_scored(&query))
            .await
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("search task failed: {e}")))?
            .map_err(index_error)?
    };

    let total_hits = ranked.len();
    let k = params.k.clamp(1, 100);
    let results = ranked
        .into_iter()
        .take(k)
        .map(|hit| SearchHit { doc_id: hit.doc_id, score: hit.score, url: searcher.url(hit.doc_id).map(str::to_string) })
        .collect();

    let elapsed = start.elapsed();
    tracing::debug!(query = %params.q, total_hits, took_s = elapsed.as_secs_f64(), "search served");
    Ok(Json(SearchResponse { query: params.q, took_s: elapsed.as_secs_f64(), total_hits, results }))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<DocId>) -> Result<Json<serde_json::Value>, ApiError> {
    let searcher = state.current();
    match searcher.url(doc_id) {
        Some(url) => Ok(Json(serde_json::json!({ "doc_id": doc_id, "url": url }))),
        None => Err((StatusCode::NOT_FOUND, format!("doc {doc_id} not found"))),
    }
}

/// Re-open the index from disk, e.g. after `indexer build` replaced it.
async fn reload_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, ApiError> {
    check_admin(&state, &headers)?;
    let fresh = Searcher::open(&state.index_paths).map_err(index_error)?;
    let body = serde_json::json!({ "docs": fresh.total_docs(), "terms": fresh.terms().count() });
    *state.searcher.write() = Arc::new(fresh);
    tracing::info!(root = %state.index_paths.root.display(), "index reloaded");
    Ok(Json(body))
}

const ADMIN_HEADER: &str = "x-admin-token";

fn check_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Err((StatusCode::FORBIDDEN, "index reload is disabled: no admin token configured".into()));
    };
    match headers.get(ADMIN_HEADER).map(HeaderValue::to_str) {
        Some(Ok(given)) if given == expected => Ok(()),
        _ => Err((StatusCode::UNAUTHORIZED, format!("missing or wrong {ADMIN_HEADER}"))),
    }
}
