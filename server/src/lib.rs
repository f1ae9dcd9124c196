use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use docsearch::converter::{Answers, ConverterJson};
use docsearch::{DocId, IndexOptions, InvertedIndex, SearchServer, WordEntry, WordStats};
use serde::{Deserialize, Serialize};
use std::path::Path as FsPath;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const MAX_K: usize = 100;
const SNIPPET_BEFORE: usize = 100;
const SNIPPET_AFTER: usize = 200;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub k: Option<usize>,
}

#[derive(Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_ms: u128,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize, Deserialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub rank: f32,
    pub snippet: Option<String>,
}

#[derive(Deserialize)]
pub struct BatchRequest {
    pub requests: Vec<String>,
}

#[derive(Serialize, Deserialize)]
pub struct WordResponse {
    pub word: String,
    pub documents: usize,
    pub occurrences: u64,
    pub entries: Vec<WordEntry>,
}

#[derive(Serialize, Deserialize)]
pub struct RebuildResponse {
    pub documents: usize,
    pub tokens: usize,
    pub took_ms: u128,
}

#[derive(Clone)]
pub struct AppState {
    pub search: SearchServer,
    pub converter: Arc<ConverterJson>,
    pub admin_token: Option<String>,
}

/// Load the configuration, index its documents and build the router.
pub fn build_app<P: AsRef<FsPath>>(config_path: P, threads: Option<usize>) -> Result<Router> {
    let converter = ConverterJson::load(config_path)?;
    let index = InvertedIndex::with_options(IndexOptions { worker_threads: threads })?;
    index.rebuild(&converter.text_documents())?;

    let state = AppState {
        search: SearchServer::new(Arc::new(index)),
        converter: Arc::new(converter),
        admin_token: std::env::var("ADMIN_TOKEN").ok(),
    };
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
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
        .route("/search", get(search_handler).post(batch_handler))
        .route("/word/:word", get(word_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/index/rebuild", post(rebuild_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    // Resolve and render against one snapshot so previews match the ranked documents.
    let snapshot = state.search.index().snapshot();
    let hits = docsearch::search::resolve(&snapshot, &params.q);
    let total_hits = hits.len();
    let k = params.k.unwrap_or_else(|| state.converter.max_responses()).clamp(1, MAX_K);

    let raw_terms: Vec<&str> = params.q.split_whitespace().collect();
    let results = hits
        .into_iter()
        .take(k)
        .map(|hit| SearchHit {
            doc_id: hit.doc_id,
            rank: hit.rank,
            snippet: snapshot.document(hit.doc_id).map(|text| snippet(text, &raw_terms)),
        })
        .collect();

    let elapsed = start.elapsed();
    Json(SearchResponse { query: params.q, took_ms: elapsed.as_millis(), took_s: elapsed.as_secs_f64(), total_hits, results })
}

pub async fn batch_handler(State(state): State<AppState>, Json(batch): Json<BatchRequest>) -> Json<Answers> {
    let results = state.search.search(&batch.requests);
    tracing::debug!(requests = batch.requests.len(), "answered batch");
    Json(state.converter.answers(&results))
}

pub async fn word_handler(State(state): State<AppState>, Path(word): Path<String>) -> Json<WordResponse> {
    let entries = state.search.index().lookup(&word);
    let stats = WordStats::from_entries(&entries);
    Json(WordResponse { word, documents: stats.documents, occurrences: stats.occurrences, entries })
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<DocId>) -> (StatusCode, Json<serde_json::Value>) {
    match state.search.index().document(doc_id) {
        Some(text) => (StatusCode::OK, Json(serde_json::json!({ "doc_id": doc_id, "text": text }))),
        None => (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "not found" }))),
    }
}

async fn rebuild_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<RebuildResponse>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let index = state.search.index().clone();
    let converter = state.converter.clone();
    let stats = tokio::task::spawn_blocking(move || index.rebuild(&converter.text_documents()))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    Ok(Json(RebuildResponse { documents: stats.documents, tokens: stats.tokens, took_ms: stats.elapsed.as_millis() }))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}

/// Window of `text` around the first query term, with every term wrapped in `<em>`.
pub fn snippet(text: &str, raw_terms: &[&str]) -> String {
    // ASCII folding keeps byte offsets identical to `text`.
    let folded = text.to_ascii_lowercase();
    let first_idx = raw_terms
        .iter()
        .filter(|t| !t.trim().is_empty())
        .find_map(|t| folded.find(&t.to_ascii_lowercase()));

    let window = match first_idx {
        Some(idx) => {
            let start = floor_boundary(text, idx.saturating_sub(SNIPPET_BEFORE));
            let end = floor_boundary(text, (idx + SNIPPET_AFTER).min(text.len()));
            &text[start..end]
        }
        None => &text[..floor_boundary(text, SNIPPET_AFTER.min(text.len()))],
    };
    highlight_terms(window, raw_terms)
}

fn floor_boundary(text: &str, mut idx: usize) -> usize {
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn highlight_terms(snippet: &str, terms: &[&str]) -> String {
    let mut s = snippet.to_string();
    for t in terms {
        if t.trim().is_empty() {
            continue;
        }
        let Ok(pat) = regex::RegexBuilder::new(&regex::escape(t)).case_insensitive(true).build() else {
            continue;
        };
        s = pat.replace_all(&s, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0])).to_string();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_highlights_terms() {
        let s = snippet("London is the capital of Great Britain", &["capital", "LONDON"]);
        assert_eq!(s, "<em>London</em> is the <em>capital</em> of Great Britain");
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        let text = format!("{}needle{}", "ж".repeat(150), "ё".repeat(150));
        let s = snippet(&text, &["needle"]);
        assert!(s.contains("<em>needle</em>"));
        assert!(s.len() < text.len());
    }
}
