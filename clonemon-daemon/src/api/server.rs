//! HTTP server implementation

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use clonemon_core::observability::health::HealthCheck;
use clonemon_core::{HealthChecker, Monitor, MonitorError, SnapshotRecord};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<Monitor>,
    pub health: HealthChecker,
}

/// Inclusive time bounds for `/historical-data`.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// A monitor failure rendered as `{"error": ...}`.
#[derive(Debug)]
pub struct ApiError(MonitorError);

impl From<MonitorError> for ApiError {
    fn from(e: MonitorError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_source_failure() || self.0.is_store_failure() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = serde_json::json!({ "error": self.0.to_string(), "kind": self.0.kind() });
        (status, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/data", get(current_data))
        .route("/historical-data", get(historical_data))
        .route("/health", get(health))
        .route("/health/details", get(health_details))
        .with_state(state)
}

/// Run one on-demand cycle and return the stored record.
#[instrument(skip(state))]
async fn current_data(State(state): State<AppState>) -> Result<Json<SnapshotRecord>, ApiError> {
    let record = state.monitor.get_latest().await.map_err(|e| {
        warn!("GET /data failed: {}", e);
        ApiError::from(e)
    })?;
    Ok(Json(record))
}

#[instrument(skip(state))]
async fn historical_data(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<SnapshotRecord>>, ApiError> {
    let records = match (query.since, query.until) {
        (None, None) => state.monitor.get_history().await?,
        (since, until) => state.monitor.get_history_range(since, until).await?,
    };
    Ok(Json(records))
}

async fn health() -> &'static str {
    "ok"
}

async fn health_details(State(state): State<AppState>) -> Json<HealthCheck> {
    Json(state.health.get_health().await)
}

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{}", addr);
    }
    axum::serve(listener, router(state)).with_graceful_shutdown(shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use clonemon_core::observability::health::{HealthStatus, SUBSYSTEM_HISTORY, SUBSYSTEM_SAMPLER};
    use clonemon_core::{
        Collection, CounterSource, HistoryStore, MemoryHistoryStore, RecordFilter, Result, Sampler,
        SamplerConfig, SqliteCounterSource,
    };
    use std::time::Duration;
    use tower::ServiceExt;

    struct StaticSource;

    #[async_trait]
    impl CounterSource for StaticSource {
        async fn count(&self, collection: Collection, _filter: &RecordFilter) -> Result<u64> {
            Ok(match collection {
                Collection::Files => 5,
                Collection::Chunks => 20,
                Collection::Candidates => 8,
                Collection::Clones => 2,
            })
        }

        async fn sum(
            &self,
            _collection: Collection,
            _field: &str,
            _filter: &RecordFilter,
        ) -> Result<f64> {
            Ok(30.0)
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    async fn app_with(
        source: Arc<dyn CounterSource>,
    ) -> (Router, Arc<MemoryHistoryStore>, HealthChecker) {
        let health = HealthChecker::new();
        health.register_subsystem(SUBSYSTEM_SAMPLER).await;
        health.register_subsystem(SUBSYSTEM_HISTORY).await;

        let history = Arc::new(MemoryHistoryStore::new());
        let config = SamplerConfig { query_timeout: Duration::from_secs(2), ..Default::default() };
        let monitor = Monitor::new(Sampler::new(source, config), history.clone())
            .with_health(health.clone());

        let state = AppState { monitor: Arc::new(monitor), health: health.clone() };
        (router(state), history, health)
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn json(body: &[u8]) -> serde_json::Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn test_data_returns_flat_record() {
        let (app, history, _) = app_with(Arc::new(StaticSource)).await;

        let (status, body) = get(&app, "/data").await;
        assert_eq!(status, StatusCode::OK);

        let value = json(&body);
        assert!(value["_id"].is_string());
        assert!(value["timestamp"].is_string());
        assert_eq!(value["files"], 5);
        assert_eq!(value["chunks"], 20);
        assert_eq!(value["candidates"], 8);
        assert_eq!(value["clones"], 2);
        assert_eq!(value["clones_size"], 30.0);
        assert_eq!(value["chunks_per_file"], 4.0);
        assert_eq!(history.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_historical_data_in_append_order() {
        let (app, _, _) = app_with(Arc::new(StaticSource)).await;

        let (_, empty) = get(&app, "/historical-data").await;
        assert_eq!(json(&empty), serde_json::json!([]));

        let mut ids = vec![];
        for _ in 0..3 {
            let (_, body) = get(&app, "/data").await;
            ids.push(json(&body)["_id"].clone());
        }

        let (status, body) = get(&app, "/historical-data").await;
        assert_eq!(status, StatusCode::OK);
        let listed: Vec<_> =
            json(&body).as_array().unwrap().iter().map(|r| r["_id"].clone()).collect();
        assert_eq!(listed, ids);
    }

    #[tokio::test]
    async fn test_historical_data_range() {
        let (app, _, _) = app_with(Arc::new(StaticSource)).await;
        get(&app, "/data").await;

        let (status, body) = get(&app, "/historical-data?since=2100-01-01T00:00:00Z").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body), serde_json::json!([]));

        let (_, body) = get(&app, "/historical-data?since=2000-01-01T00:00:00Z").await;
        assert_eq!(json(&body).as_array().unwrap().len(), 1);

        let (status, _) = get(&app, "/historical-data?since=yesterday").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unreachable_source_returns_503() {
        let dir = tempfile::tempdir().unwrap();
        let source =
            SqliteCounterSource::open(dir.path().join("missing.db"), Duration::from_secs(1));
        let (app, history, health) = app_with(Arc::new(source)).await;

        let (status, body) = get(&app, "/data").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(json(&body)["error"].is_string());
        assert_eq!(history.count().await.unwrap(), 0);

        // Liveness stays up while the details report the failing sampler
        let (status, body) = get(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");

        let (_, body) = get(&app, "/health/details").await;
        assert_eq!(json(&body)["status"], "degraded");
        assert_eq!(health.get_health().await.status, HealthStatus::Degraded);
    }

    #[test]
    fn test_error_status_mapping() {
        let unavailable = ApiError(MonitorError::StoreUnavailable("locked".into())).into_response();
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);

        let internal = ApiError(MonitorError::Internal("bug".into())).into_response();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
