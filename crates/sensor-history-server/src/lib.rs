//! HTTP binding for the sensor history management interface.
//!
//! Maps the `GetInterval` / `SetInterval` / `GetTimeFrame` / `SetTimeFrame` /
//! `Read` contract onto a small JSON API. The engine itself knows nothing
//! about HTTP; anything implementing [`HistoryService`] can be served.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
};
use log::info;
use serde::{Deserialize, Serialize};

use sensor_history_core::HistoryService;

/// Shared server state.
struct AppState {
    service: Arc<dyn HistoryService>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValueBody {
    pub value: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SensorsResponse {
    pub sensors: Vec<String>,
    pub total: usize,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(e: impl std::fmt::Display) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

async fn handle_get_interval(State(state): State<Arc<AppState>>) -> Json<ValueBody> {
    Json(ValueBody {
        value: state.service.interval(),
    })
}

async fn handle_set_interval(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ValueBody>,
) -> Result<Json<ValueBody>, ApiError> {
    let value = state.service.set_interval(body.value).map_err(bad_request)?;
    Ok(Json(ValueBody { value }))
}

async fn handle_get_time_frame(State(state): State<Arc<AppState>>) -> Json<ValueBody> {
    Json(ValueBody {
        value: state.service.time_frame(),
    })
}

async fn handle_set_time_frame(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ValueBody>,
) -> Result<Json<ValueBody>, ApiError> {
    let value = state
        .service
        .set_time_frame(body.value)
        .map_err(bad_request)?;
    Ok(Json(ValueBody { value }))
}

async fn handle_sensors(State(state): State<Arc<AppState>>) -> Json<SensorsResponse> {
    let sensors = state.service.sensor_names();
    let total = sensors.len();
    Json(SensorsResponse { sensors, total })
}

async fn handle_history(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Json<BTreeMap<u64, f64>> {
    Json(state.service.read(&name))
}

async fn handle_index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "Sensor History Server",
        "version": sensor_history_core::VERSION,
        "interval": state.service.interval(),
        "time_frame": state.service.time_frame(),
        "endpoints": {
            "/": "This API index",
            "/interval": "GET poll interval in seconds; PUT {\"value\": n} to change it",
            "/time-frame": "GET retention window in minutes; PUT {\"value\": n} to change it",
            "/sensors": "Sensors observed so far",
            "/sensors/{name}/history": "Retained samples as {timestamp: value}",
        },
    }))
}

/// Build the axum router.
pub fn build_router(service: Arc<dyn HistoryService>) -> Router {
    let state = Arc::new(AppState { service });

    Router::new()
        .route("/", get(handle_index))
        .route(
            "/interval",
            get(handle_get_interval).put(handle_set_interval),
        )
        .route(
            "/time-frame",
            get(handle_get_time_frame).put(handle_set_time_frame),
        )
        .route("/sensors", get(handle_sensors))
        .route("/sensors/{name}/history", get(handle_history))
        .with_state(state)
}

/// Serve the API until `shutdown` resolves.
pub async fn run_server(
    service: Arc<dyn HistoryService>,
    host: &str,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = build_router(service);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("sensor history API listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
