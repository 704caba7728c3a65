//! Web server module for wattwatch.
//!
//! Read-only JSON/CSV/text API consumed by dashboards. Every device request
//! is one refresh: the log is reloaded, metrics are derived and the snapshot
//! is rebuilt. The device id and unit price come from the request itself;
//! the server keeps no selected-device state.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::config::{AppConfig, BillingConfig, check_window_size};
use crate::telemetry::{
    AggregateSnapshot, DerivedSample, DeviceDescriptor, DeviceRegistry, ExportError,
    ExportFormatter, LoadError, RegistryError, derive, snapshot,
};

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub registry: DeviceRegistry,
    pub formatter: ExportFormatter,
    pub billing: BillingConfig,
    pub window_size: usize,
    pub refresh_interval: Duration,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            registry: DeviceRegistry::new(&config.data.dir),
            formatter: ExportFormatter::new(&config.billing.currency),
            billing: config.billing.clone(),
            window_size: config.data.window_size,
            refresh_interval: config.dashboard.refresh_interval,
        }
    }
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

/// Error body for non-2xx responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Settings advertised to dashboards.
#[derive(Serialize)]
struct SettingsResponse {
    refresh_interval_secs: u64,
    unit_price: f64,
    max_unit_price: f64,
    currency: String,
    window_size: usize,
}

/// Live snapshot of one device.
#[derive(Serialize)]
struct SnapshotResponse {
    device: String,
    unit_price: f64,
    window_size: usize,
    #[serde(flatten)]
    snapshot: AggregateSnapshot,
}

/// Query parameters for device endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct DeviceQueryParams {
    pub price: Option<f64>,
    pub window: Option<usize>,
}

/// Errors surfaced to API clients.
#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Registry(RegistryError),
    Load(LoadError),
    Export(ExportError),
    /// Blocking file work panicked or was cancelled.
    Task(tokio::task::JoinError),
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        Self::Registry(err)
    }
}

impl From<LoadError> for ApiError {
    fn from(err: LoadError) -> Self {
        Self::Load(err)
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        Self::Export(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Registry(err @ RegistryError::UnknownDevice(_)) => {
                (StatusCode::NOT_FOUND, err.to_string())
            }
            Self::Registry(err) => {
                tracing::error!(error = %err, "Device listing failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            Self::Load(err) => {
                tracing::error!(error = %err, "Telemetry load failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            Self::Export(err) => {
                tracing::error!(error = %err, "Export failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            Self::Task(err) => {
                tracing::error!(error = %err, "Blocking task failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl AppState {
    fn unit_price(&self, requested: Option<f64>) -> Result<f64, ApiError> {
        match requested {
            Some(price) => self.billing.check_price(price).map_err(ApiError::BadRequest),
            None => Ok(self.billing.unit_price),
        }
    }

    fn window(&self, requested: Option<usize>) -> Result<usize, ApiError> {
        check_window_size(requested.unwrap_or(self.window_size)).map_err(ApiError::BadRequest)
    }

    /// Reload the device log and derive metrics under `unit_price`.
    ///
    /// Directory scan and file read run on the blocking pool.
    async fn refresh(&self, id: &str, unit_price: f64) -> Result<Vec<DerivedSample>, ApiError> {
        let registry = self.registry.clone();
        let id = id.to_string();
        run_blocking(move || {
            let store = registry.resolve(&id)?;
            let series = store.reload()?;
            tracing::debug!(device = %id, samples = series.len(), "Device refreshed");
            Ok(derive(&series, unit_price))
        })
        .await
    }
}

async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(ApiError::Task)?
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let app_state = Arc::new(state);

    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/api/settings", get(settings_handler))
        .route("/api/devices", get(devices_handler))
        .route("/api/devices/{id}/snapshot", get(snapshot_handler))
        .route("/api/devices/{id}/series", get(series_handler))
        .route("/api/devices/{id}/export", get(export_handler))
        .route("/api/devices/{id}/summary", get(summary_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

/// Liveness probe.
async fn healthz_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn settings_handler(State(state): State<Arc<AppState>>) -> Json<SettingsResponse> {
    Json(SettingsResponse {
        refresh_interval_secs: state.refresh_interval.as_secs(),
        unit_price: state.billing.unit_price,
        max_unit_price: state.billing.max_unit_price,
        currency: state.formatter.currency().to_string(),
        window_size: state.window_size,
    })
}

/// Device listing, ordered by id.
async fn devices_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DeviceDescriptor>>, ApiError> {
    let registry = state.registry.clone();
    let devices = run_blocking(move || Ok(registry.list_devices()?)).await?;
    Ok(Json(devices))
}

async fn snapshot_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<DeviceQueryParams>,
) -> Result<Json<SnapshotResponse>, ApiError> {
    let unit_price = state.unit_price(params.price)?;
    let window_size = state.window(params.window)?;
    let derived = state.refresh(&id, unit_price).await?;

    Ok(Json(SnapshotResponse {
        device: id,
        unit_price,
        window_size,
        snapshot: snapshot(&derived, window_size),
    }))
}

async fn series_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<DeviceQueryParams>,
) -> Result<Json<Vec<DerivedSample>>, ApiError> {
    let unit_price = state.unit_price(params.price)?;
    Ok(Json(state.refresh(&id, unit_price).await?))
}

/// CSV download of the full derived series.
async fn export_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<DeviceQueryParams>,
) -> Result<Response, ApiError> {
    let unit_price = state.unit_price(params.price)?;
    let derived = state.refresh(&id, unit_price).await?;
    let table = state.formatter.to_table(&derived)?;

    let disposition = format!("attachment; filename=\"{}.csv\"", attachment_name(&id));
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        table,
    )
        .into_response())
}

async fn summary_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<DeviceQueryParams>,
) -> Result<Response, ApiError> {
    let unit_price = state.unit_price(params.price)?;
    let window_size = state.window(params.window)?;
    let derived = state.refresh(&id, unit_price).await?;
    let summary = state
        .formatter
        .to_summary(&snapshot(&derived, window_size), unit_price);

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        summary,
    )
        .into_response())
}

/// Device id reduced to characters safe inside a quoted header parameter.
fn attachment_name(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tempfile::{TempDir, tempdir};
    use tower::ServiceExt;

    const METER_A: &str = "Timestamp,Voltage (V),Current (A),Power (W),Energy (kWh)\n\
                           2024-01-01 00:05:00,221,2.0,440,1.5\n\
                           2024-01-01 00:00:00,220,0,0,0.000\n";

    fn create_test_state() -> (AppState, TempDir) {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("meter-a.csv"), METER_A).unwrap();
        std::fs::write(dir.path().join("broken.csv"), "time,volts\n1,2\n").unwrap();

        let mut config = AppConfig::default();
        config.data.dir = dir.path().to_string_lossy().into_owned();

        // Return dir to keep tempdir alive
        (AppState::from_config(&config), dir)
    }

    async fn fetch(state: AppState, uri: &str) -> (StatusCode, String) {
        let response = create_router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn test_devices_endpoint() {
        let (state, _dir) = create_test_state();
        let (status, body) = fetch(state, "/api/devices").await;
        assert_eq!(status, StatusCode::OK);

        let devices: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(devices, serde_json::json!([{"id": "broken"}, {"id": "meter-a"}]));
    }

    #[tokio::test]
    async fn test_snapshot_endpoint() {
        let (state, _dir) = create_test_state();
        let (status, body) = fetch(state, "/api/devices/meter-a/snapshot?price=8").await;
        assert_eq!(status, StatusCode::OK, "body: {body}");

        let snap: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(snap["device"], "meter-a");
        assert_eq!(snap["total_energy"], 1.5);
        assert_eq!(snap["total_cost"], 12.0);
        assert_eq!(snap["peaks"]["max_power"], 440.0);
        assert_eq!(snap["latest"]["apparent_power"], 442.0);
        assert_eq!(snap["recent_window"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_unknown_device() {
        let (state, _dir) = create_test_state();
        let (status, body) = fetch(state, "/api/devices/meter-z/snapshot").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("unknown device"));
    }

    #[tokio::test]
    async fn test_snapshot_wrong_schema_is_server_error() {
        let (state, _dir) = create_test_state();
        let (status, body) = fetch(state, "/api/devices/broken/snapshot").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("missing required columns"));
    }

    #[tokio::test]
    async fn test_price_out_of_bounds() {
        let (state, _dir) = create_test_state();
        let (status, _) = fetch(state.clone(), "/api/devices/meter-a/snapshot?price=51").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = fetch(state, "/api/devices/meter-a/summary?window=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_export_endpoint() {
        let (state, _dir) = create_test_state();
        let response = create_router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/devices/meter-a/export")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"meter-a.csv\""
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.starts_with("Timestamp,Voltage (V)"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_refreshes_are_independent() {
        let (state, _dir) = create_test_state();
        let (a, b, c) = tokio::join!(
            fetch(state.clone(), "/api/devices/meter-a/snapshot?price=8"),
            fetch(state.clone(), "/api/devices/meter-a/snapshot?price=2"),
            fetch(state, "/api/devices"),
        );

        let a: serde_json::Value = serde_json::from_str(&a.1).unwrap();
        let b: serde_json::Value = serde_json::from_str(&b.1).unwrap();
        assert_eq!(a["total_cost"], 12.0);
        assert_eq!(b["total_cost"], 3.0);
        assert_eq!(c.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_run_blocking_reports_panics() {
        let result: Result<(), ApiError> = run_blocking(|| panic!("boom")).await;
        let response = result.unwrap_err().into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_attachment_name() {
        assert_eq!(attachment_name("meter-a"), "meter-a");
        assert_eq!(attachment_name("my \"meter\""), "my__meter_");
    }
}
