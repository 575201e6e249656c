use axum::{extract::State, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use coursematch_core::cache::EmbeddingCache;
use coursematch_core::{Corpus, Document, Embedder, Error, Filters, Recommender, RecommenderConfig, ScoredResult, SharedRecommender};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub const MAX_TOP_K: usize = 100;

type ApiError = (StatusCode, Json<Value>);

#[derive(Deserialize)]
pub struct RecommendRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub previous_courses: Vec<String>,
    #[serde(default)]
    pub filters: HashMap<String, String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}
fn default_top_k() -> usize { 10 }

#[derive(Serialize)]
pub struct RecommendResponse {
    pub success: bool,
    pub count: usize,
    pub took_s: f64,
    pub results: Vec<Recommendation>,
}

#[derive(Serialize)]
pub struct Recommendation {
    pub title: String,
    pub offering_name: String,
    pub section: String,
    pub department: String,
    pub school: String,
    pub instructor: String,
    pub level: String,
    pub credits: String,
    pub description: String,
    pub prerequisites: Vec<String>,
    pub status: String,
    pub seats: String,
    pub meetings: String,
    pub areas: String,
    pub combined_score: f32,
    pub bm25_score: f32,
    pub embedding_score: f32,
}

impl From<ScoredResult> for Recommendation {
    fn from(r: ScoredResult) -> Self {
        let d = r.document;
        let na = |v: Option<String>| v.unwrap_or_else(|| "N/A".to_string());
        Recommendation {
            title: na(d.title),
            offering_name: na(d.offering_id),
            section: na(d.section_id),
            department: na(d.department),
            school: na(d.school),
            instructor: na(d.instructors),
            level: na(d.level),
            credits: na(d.credits),
            description: d.description.unwrap_or_else(|| "No description available".to_string()),
            prerequisites: d.prerequisites.into_iter().map(|p| p.description).collect(),
            status: na(d.status),
            seats: na(d.seats_available),
            meetings: na(d.meetings),
            areas: na(d.areas),
            combined_score: r.combined_score,
            bm25_score: r.bm25_score_norm,
            embedding_score: r.embedding_score_norm,
        }
    }
}

#[derive(Serialize)]
pub struct Facets {
    pub departments: Vec<String>,
    pub levels: Vec<String>,
    pub schools: Vec<String>,
}

/// Where the active index comes from, so it can be rebuilt on demand.
pub struct IndexSource {
    pub corpus_path: PathBuf,
    pub cache_dir: Option<PathBuf>,
    pub embedder: Arc<dyn Embedder>,
    pub config: RecommenderConfig,
    // Builds share one cache directory; only one may run at a time.
    build_lock: Mutex<()>,
}

impl IndexSource {
    pub fn new(corpus_path: PathBuf, cache_dir: Option<PathBuf>, embedder: Arc<dyn Embedder>, config: RecommenderConfig) -> Self {
        Self { corpus_path, cache_dir, embedder, config, build_lock: Mutex::new(()) }
    }

    /// Build a fresh recommender. A cache written for a different corpus, or
    /// one that cannot be read, is discarded and regenerated.
    pub fn build(&self) -> coursematch_core::Result<Recommender> {
        let _guard = self.build_lock.lock();
        let corpus = Corpus::from_path(&self.corpus_path)?;
        let cache = self.cache_dir.as_ref().map(EmbeddingCache::new);
        match Recommender::build(corpus.clone(), self.embedder.clone(), cache.as_ref(), self.config.clone()) {
            Err(Error::CacheMismatch(reason)) => {
                tracing::warn!(%reason, "embedding cache is stale, regenerating");
                if let Some(cache) = &cache {
                    cache.clear()?;
                }
                Recommender::build(corpus, self.embedder.clone(), cache.as_ref(), self.config.clone())
            }
            other => other,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub recommender: Arc<SharedRecommender>,
    pub source: Arc<IndexSource>,
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn new(recommender: Recommender, source: IndexSource, admin_token: Option<String>) -> Self {
        Self { recommender: Arc::new(SharedRecommender::new(recommender)), source: Arc::new(source), admin_token }
    }
}

pub fn build_app(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/facets", get(facets_handler))
        .route("/recommend", post(recommend_handler))
        .route("/index/reload", post(reload_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn recommend_handler(State(state): State<AppState>, Json(req): Json<RecommendRequest>) -> Result<Json<RecommendResponse>, ApiError> {
    let start = std::time::Instant::now();
    if req.query.trim().is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "Query is required"));
    }
    // Empty filter values mean "any".
    let filters: Filters = req.filters.into_iter().filter(|(_, v)| !v.is_empty()).collect();
    let top_k = req.top_k.clamp(1, MAX_TOP_K);
    let recommender = state.recommender.current();
    let query = req.query;
    let previous = req.previous_courses;

    let results = tokio::task::spawn_blocking(move || recommender.recommend(&query, &previous, &filters, top_k))
        .await
        .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()))?
        .map_err(core_error)?;

    let results: Vec<Recommendation> = results.into_iter().map(Recommendation::from).collect();
    let took_s = start.elapsed().as_secs_f64();
    tracing::info!(count = results.len(), took_s, "served recommendations");
    Ok(Json(RecommendResponse { success: true, count: results.len(), took_s, results }))
}

pub async fn facets_handler(State(state): State<AppState>) -> Json<Facets> {
    let recommender = state.recommender.current();
    let corpus = recommender.corpus();
    Json(Facets {
        departments: corpus.distinct(Document::department),
        levels: corpus.distinct(Document::level),
        schools: corpus.distinct(Document::school),
    })
}

async fn reload_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Value>, ApiError> {
    authorize(&state, &headers)?;
    let source = state.source.clone();
    let fresh = tokio::task::spawn_blocking(move || source.build())
        .await
        .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()))?
        .map_err(core_error)?;
    let num_docs = fresh.corpus().len();
    state.recommender.replace(fresh);
    Ok(Json(json!({ "success": true, "num_docs": num_docs })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err(error(StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set")),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err(error(StatusCode::UNAUTHORIZED, "invalid admin token"))
    }
}

fn error(status: StatusCode, message: &str) -> ApiError {
    (status, Json(json!({ "error": message })))
}

fn core_error(err: Error) -> ApiError {
    match err {
        Error::EmptyQuery => error(StatusCode::BAD_REQUEST, "Query is required"),
        other => {
            tracing::error!(error = %other, "request failed");
            error(StatusCode::INTERNAL_SERVER_ERROR, &other.to_string())
        }
    }
}
