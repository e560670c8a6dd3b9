use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::{path::Path, sync::Arc};
use tower_http::services::ServeDir;

use crate::service::{
    CandleResponse, FibResponse, HealthResponse, IndicatorResponse, QueryError, QueryService,
};

#[derive(Debug, Default, Deserialize)]
pub struct CandleQuery {
    limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    start: Option<String>,
    end: Option<String>,
}

async fn api_candles(
    State(service): State<Arc<QueryService>>,
    Query(query): Query<CandleQuery>,
) -> Result<Json<Vec<CandleResponse>>, QueryError> {
    service.get_candles(query.limit.as_deref()).await.map(Json)
}

async fn api_indicators(
    State(service): State<Arc<QueryService>>,
) -> Result<Json<Vec<IndicatorResponse>>, QueryError> {
    service.get_indicators().await.map(Json)
}

async fn api_fib(
    State(service): State<Arc<QueryService>>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<FibResponse>, QueryError> {
    service
        .get_fib(query.start.as_deref(), query.end.as_deref())
        .await
        .map(Json)
}

async fn health(
    State(service): State<Arc<QueryService>>,
) -> Result<Json<HealthResponse>, QueryError> {
    service.health().await.map(Json)
}

/// Routes of the query endpoints
pub fn api_router() -> Router<Arc<QueryService>> {
    Router::new()
        .route("/api/candles", get(api_candles))
        .route("/api/indicators", get(api_indicators))
        .route("/api/fib", get(api_fib))
        .route("/health", get(health))
}

/// Whole application, the frontend is served from `static_dir` when given.
pub fn router(service: Arc<QueryService>, static_dir: Option<&Path>) -> Router {
    let app = api_router();

    let app = match static_dir {
        Some(dir) => {
            log::info!("Serve static files from {}", dir.display());
            app.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true))
        }
        None => app,
    };

    app.with_state(service)
}
