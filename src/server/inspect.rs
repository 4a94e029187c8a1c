//! Inspection endpoints under `/__shell-cache/`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::coordinator::clients::ClientInfo;
use crate::host::WorkerState;
use crate::server::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub state: WorkerState,
    pub generation: String,
    pub uptime_secs: u64,
    pub pending_tasks: usize,
}

/// One generation in the store.
#[derive(Debug, Serialize)]
pub struct GenerationInfo {
    pub name: String,
    pub entries: usize,
    pub current: bool,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let worker_state = state.host.state().await;
    let status = if worker_state == WorkerState::Redundant {
        "failed"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status: status.to_string(),
        state: worker_state,
        generation: state.host.coordinator().generation().to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        pending_tasks: state.host.pending_tasks().await,
    })
}

pub async fn generations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<GenerationInfo>>, (StatusCode, String)> {
    let coordinator = state.host.coordinator();
    let storage = coordinator.storage();
    let internal = |e: crate::error::StoreError| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string());

    let mut generations = Vec::new();
    for name in storage.keys().await.map_err(internal)? {
        let cache = storage.open(&name).await.map_err(internal)?;
        let entries = cache.keys().await.map_err(internal)?.len();
        generations.push(GenerationInfo {
            current: name == coordinator.generation(),
            name,
            entries,
        });
    }

    Ok(Json(generations))
}

pub async fn clients(State(state): State<Arc<AppState>>) -> Json<Vec<ClientInfo>> {
    Json(state.host.coordinator().clients().list().await)
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> axum::response::Response {
    match state.host.coordinator().metrics().render() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
