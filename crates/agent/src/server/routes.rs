use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

use crate::{
    handler::AlertSchedulerHandler,
    metrics::gather_metrics,
    store::{ClusterDefinitions, ConfigurationCommand},
    Error,
};

type AppState = State<Arc<AlertSchedulerHandler>>;

pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("Request failed: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn list_alerts(State(handler): AppState) -> Response {
    Json(handler.collector().alerts().await).into_response()
}

pub async fn purge_alert(State(handler): AppState, Path(uuid): Path<String>) -> Response {
    match handler.collector().remove_by_uuid(&uuid).await {
        Some(removed) => Json(removed).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no pending result for alert {}", uuid) })),
        )
            .into_response(),
    }
}

pub async fn execute_alerts(State(handler): AppState, Json(commands): Json<Vec<Value>>) -> Response {
    info!("Received {} alert execution command(s)", commands.len());
    let executed = handler.execute_alert(commands).await;
    (StatusCode::ACCEPTED, Json(json!({ "executed": executed }))).into_response()
}

pub async fn update_configurations(
    State(handler): AppState,
    Json(commands): Json<Vec<ConfigurationCommand>>,
) -> Result<Json<Value>, ApiError> {
    let changed = handler.update_configurations(commands).await?;
    Ok(Json(json!({ "changed": changed })))
}

#[derive(Debug, Deserialize)]
pub struct DefinitionsQuery {
    #[serde(default)]
    pub reschedule: bool,
}

pub async fn update_definitions(
    State(handler): AppState,
    Query(query): Query<DefinitionsQuery>,
    Json(document): Json<Vec<ClusterDefinitions>>,
) -> Result<Json<Value>, ApiError> {
    let clusters = document.len();
    handler.update_definitions(document, query.reschedule).await?;
    Ok(Json(json!({
        "clusters": clusters,
        "rescheduled": query.reschedule,
        "jobs": handler.get_job_count().await,
    })))
}

pub async fn reschedule(State(handler): AppState) -> Json<Value> {
    handler.reschedule().await;
    Json(json!({ "jobs": handler.get_job_count().await }))
}

pub async fn list_jobs(State(handler): AppState) -> Json<Value> {
    let jobs = handler.jobs().await;
    Json(json!({ "count": jobs.len(), "jobs": jobs }))
}

pub async fn metrics() -> Result<String, ApiError> {
    Ok(gather_metrics()?)
}
